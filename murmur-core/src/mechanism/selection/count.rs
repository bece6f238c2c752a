//! Count-based selection: release up to N pieces per pool per iteration.

use crate::rng::SimRng;
use crate::state::{PropagatedRecord, UserState};

use super::{Quota, SelectionContext, SelectionMechanism, released, sorted_pieces};

/// Releases up to a fixed number of pieces from each pool every iteration,
/// drawn uniformly without replacement when more are available.
#[derive(Debug, Clone)]
pub struct CountSelector {
    num_own: Quota,
    num_received: Quota,
    num_repropagated: Quota,
    rng: SimRng,
}

impl CountSelector {
    /// Creates the selector with its own seeded generator.
    pub fn new(num_own: Quota, num_received: Quota, num_repropagated: Quota, seed: u64) -> Self {
        Self {
            num_own,
            num_received,
            num_repropagated,
            rng: SimRng::from_seed(seed),
        }
    }

    /// Common case: own and received quotas only, no re-repropagation.
    pub fn simple(num_own: Quota, num_received: Quota, seed: u64) -> Self {
        Self::new(num_own, num_received, Quota::None, seed)
    }
}

impl SelectionMechanism for CountSelector {
    fn release_own(
        &mut self,
        user: &UserState,
        cx: &SelectionContext<'_>,
    ) -> Vec<PropagatedRecord> {
        let pool = sorted_pieces(user.own());
        released(
            self.num_own.draw(&pool, &mut self.rng),
            user.user(),
            cx.iteration,
        )
    }

    fn release_received(
        &mut self,
        user: &UserState,
        cx: &SelectionContext<'_>,
    ) -> Vec<PropagatedRecord> {
        let pool = sorted_pieces(user.received());
        released(
            self.num_received.draw(&pool, &mut self.rng),
            user.user(),
            cx.iteration,
        )
    }

    fn release_repropagated(
        &mut self,
        user: &UserState,
        cx: &SelectionContext<'_>,
    ) -> Vec<PropagatedRecord> {
        let pool = sorted_pieces(user.propagated());
        released(
            self.num_repropagated.draw(&pool, &mut self.rng),
            user.user(),
            cx.iteration,
        )
    }
}
