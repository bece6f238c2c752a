//! Recommender-aware selection: bias repropagation towards pieces that
//! arrived over recommender-injected links.

use crate::corpus::{EdgeOrientation, InformationCorpus, PieceIdx};
use crate::protocol::ProtocolError;
use crate::rng::SimRng;
use crate::state::{PropagatedRecord, UserState};

use super::{Quota, SelectionContext, SelectionMechanism, released, sorted_pieces};

/// Splits received candidates into a "recommended" pool (at least one
/// creator reached this user over a recommended edge) and an "original"
/// pool, then draws with probability `prob_recommended` from the former.
///
/// When the preferred pool runs dry the draw falls back to whichever pool
/// still has candidates. Pieces whose only observations have unknown
/// sources are classified as original.
#[derive(Debug, Clone)]
pub struct RecommenderSelector {
    num_own: Quota,
    num_received: Quota,
    num_repropagated: Quota,
    prob_recommended: f64,
    orientation: EdgeOrientation,
    rng: SimRng,
}

impl RecommenderSelector {
    /// Creates the selector with its own seeded generator.
    pub fn new(
        num_own: Quota,
        num_received: Quota,
        num_repropagated: Quota,
        prob_recommended: f64,
        orientation: EdgeOrientation,
        seed: u64,
    ) -> Self {
        Self {
            num_own,
            num_received,
            num_repropagated,
            prob_recommended,
            orientation,
            rng: SimRng::from_seed(seed),
        }
    }

    fn mixed_draw(
        &mut self,
        mut recommended: Vec<PieceIdx>,
        mut original: Vec<PieceIdx>,
        quota: u32,
    ) -> Vec<PieceIdx> {
        let mut picked = Vec::new();
        while picked.len() < quota as usize && (!recommended.is_empty() || !original.is_empty()) {
            let prefer_recommended = !recommended.is_empty()
                && (original.is_empty() || self.rng.random_bool(self.prob_recommended));
            let pool = if prefer_recommended {
                &mut recommended
            } else {
                &mut original
            };
            let index = self.rng.random_range(0, pool.len() as u64) as usize;
            picked.push(pool.swap_remove(index));
        }
        picked
    }
}

impl SelectionMechanism for RecommenderSelector {
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
        let graph = cx.corpus.graph();
        let quota = match self.num_received {
            Quota::None => return Vec::new(),
            Quota::All => u32::MAX,
            Quota::Limit(n) => n,
        };

        let mut recommended = Vec::new();
        let mut original = Vec::new();
        let mut records: Vec<&PropagatedRecord> = user.received().collect();
        records.sort_by_key(|record| record.piece());
        for record in records {
            let from_recommended = record.known_creators().any(|creator| {
                graph.is_recommended_link(user.user(), creator, self.orientation)
            });
            if from_recommended {
                recommended.push(record.piece());
            } else {
                original.push(record.piece());
            }
        }

        let picked = if recommended.len() + original.len() <= quota as usize {
            recommended.extend(original);
            recommended
        } else {
            self.mixed_draw(recommended, original, quota)
        };
        released(picked, user.user(), cx.iteration)
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

    fn validate(&self, corpus: &InformationCorpus) -> Result<(), ProtocolError> {
        if !(0.0..=1.0).contains(&self.prob_recommended) {
            return Err(ProtocolError::InvalidParameter {
                mechanism: "RecommenderSelector",
                reason: format!(
                    "prob_recommended must lie in [0, 1], got {}",
                    self.prob_recommended
                ),
            });
        }
        if !corpus.graph().has_recommended_edges() {
            return Err(ProtocolError::MissingRecommendedEdges {
                mechanism: "RecommenderSelector",
            });
        }
        Ok(())
    }
}
