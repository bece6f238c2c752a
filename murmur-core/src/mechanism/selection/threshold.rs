//! Threshold selection: repropagate once enough neighbors already did.

use crate::corpus::{EdgeOrientation, InformationCorpus, PieceIdx};
use crate::protocol::ProtocolError;
use crate::rng::SimRng;
use crate::state::{PropagatedRecord, UserState};

use super::{Quota, SelectionContext, SelectionMechanism, released, sorted_pieces};

/// Activation threshold for a received piece.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Threshold {
    /// Absolute number of neighbors that must have propagated the piece.
    Count(u32),
    /// Fraction of the neighborhood that must have propagated the piece.
    Proportion(f64),
}

/// Linear-threshold-style selection: a received piece becomes eligible the
/// moment the number of distinct neighbors who already propagated it meets
/// the threshold. The comparison is inclusive, so a piece exactly at the
/// threshold is released.
#[derive(Debug, Clone)]
pub struct ThresholdSelector {
    num_own: Quota,
    threshold: Threshold,
    orientation: EdgeOrientation,
    rng: SimRng,
}

impl ThresholdSelector {
    /// Creates the selector with its own seeded generator (used only for
    /// the own-release quota draw).
    pub fn new(num_own: Quota, threshold: Threshold, orientation: EdgeOrientation, seed: u64) -> Self {
        Self {
            num_own,
            threshold,
            orientation,
            rng: SimRng::from_seed(seed),
        }
    }

    fn required(&self, neighborhood: usize) -> f64 {
        match self.threshold {
            Threshold::Count(count) => count as f64,
            Threshold::Proportion(fraction) => fraction * neighborhood as f64,
        }
    }
}

impl SelectionMechanism for ThresholdSelector {
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
        let neighbors = cx.corpus.graph().neighbors(user.user(), self.orientation);
        let required = self.required(neighbors.len());

        let eligible: Vec<PieceIdx> = sorted_pieces(user.received())
            .into_iter()
            .filter(|&piece| {
                let adopters = neighbors
                    .iter()
                    .filter(|&&neighbor| {
                        cx.snapshot
                            .user(neighbor)
                            .is_some_and(|state| state.has_propagated(piece))
                    })
                    .count();
                adopters as f64 >= required
            })
            .collect();
        released(eligible, user.user(), cx.iteration)
    }

    fn release_repropagated(
        &mut self,
        _user: &UserState,
        _cx: &SelectionContext<'_>,
    ) -> Vec<PropagatedRecord> {
        Vec::new()
    }

    fn validate(&self, _corpus: &InformationCorpus) -> Result<(), ProtocolError> {
        if let Threshold::Proportion(fraction) = self.threshold
            && !(fraction > 0.0 && fraction <= 1.0)
        {
            return Err(ProtocolError::InvalidParameter {
                mechanism: "ThresholdSelector",
                reason: format!("proportion must lie in (0, 1], got {fraction}"),
            });
        }
        Ok(())
    }
}
