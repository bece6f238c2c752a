//! Independent cascade selection: one activation chance per observation.

use crate::corpus::{EdgeOrientation, InformationCorpus, UserIdx};
use crate::protocol::ProtocolError;
use crate::rng::SimRng;
use crate::state::{PropagatedRecord, UserState};

use super::{Quota, SelectionContext, SelectionMechanism, released, sorted_pieces};

/// Where the per-observation activation probability comes from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CascadeProbability {
    /// The same probability for every observation.
    Fixed(f64),
    /// The weight of the edge the observation arrived over; observations
    /// with no matching edge (or an unknown source) never activate.
    EdgeWeight(EdgeOrientation),
}

/// Independent cascade model: each observation of a received piece gets one
/// Bernoulli trial; the first success flags the piece for repropagation.
///
/// Cascade protocols pair this with an expire-everything policy so a piece
/// is only eligible in the iteration right after it arrives, which yields
/// the classical one-chance-per-activated-neighbor semantics.
#[derive(Debug, Clone)]
pub struct CascadeSelector {
    num_own: Quota,
    num_repropagated: Quota,
    probability: CascadeProbability,
    rng: SimRng,
}

impl CascadeSelector {
    /// Creates the selector with its own seeded generator.
    pub fn new(
        num_own: Quota,
        num_repropagated: Quota,
        probability: CascadeProbability,
        seed: u64,
    ) -> Self {
        Self {
            num_own,
            num_repropagated,
            probability,
            rng: SimRng::from_seed(seed),
        }
    }

    fn activation_probability(
        &self,
        user: &UserState,
        creator: Option<UserIdx>,
        corpus: &InformationCorpus,
    ) -> f64 {
        match self.probability {
            CascadeProbability::Fixed(p) => p,
            CascadeProbability::EdgeWeight(orientation) => {
                let Some(creator) = creator else {
                    return 0.0;
                };
                let graph = corpus.graph();
                let weight = match orientation {
                    EdgeOrientation::In => graph.edge_weight(creator, user.user()),
                    EdgeOrientation::Out => graph.edge_weight(user.user(), creator),
                    EdgeOrientation::Both => graph
                        .edge_weight(user.user(), creator)
                        .or_else(|| graph.edge_weight(creator, user.user())),
                };
                weight.unwrap_or(0.0)
            }
        }
    }
}

impl SelectionMechanism for CascadeSelector {
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
        let mut records: Vec<&PropagatedRecord> = user.received().collect();
        records.sort_by_key(|record| record.piece());

        let mut activated = Vec::new();
        for record in records {
            for creator in record.creators() {
                let p = self.activation_probability(user, *creator, cx.corpus);
                if self.rng.random_bool(p) {
                    activated.push(record.piece());
                    break;
                }
            }
        }
        released(activated, user.user(), cx.iteration)
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

    fn validate(&self, _corpus: &InformationCorpus) -> Result<(), ProtocolError> {
        if let CascadeProbability::Fixed(p) = self.probability
            && !(0.0..=1.0).contains(&p)
        {
            return Err(ProtocolError::InvalidParameter {
                mechanism: "CascadeSelector",
                reason: format!("probability must lie in [0, 1], got {p}"),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{CorpusBuilder, EdgeKind, PieceIdx, UserIdx};
    use crate::mechanism::update::{DiscardPolicy, MergeUpdate};
    use crate::state::SimulationSnapshot;

    fn received_state(me: UserIdx, from: UserIdx, piece: PieceIdx) -> UserState {
        let update = MergeUpdate::new(DiscardPolicy::Resurrect);
        let mut state = UserState::new(me);
        state.update_seen(PropagatedRecord::new(piece, 0, Some(from)), &update);
        state.update_seen_to_received(&update);
        state
    }

    fn select_with(probability: CascadeProbability) -> usize {
        let corpus = CorpusBuilder::new()
            .user("me")
            .user("peer")
            .piece("p", 0, &["peer"])
            .edge("peer", "me", 1.0, EdgeKind::Original)
            .build()
            .unwrap();
        let me = corpus.user_idx("me").unwrap();
        let peer = corpus.user_idx("peer").unwrap();
        let piece = corpus.piece_idx("p").unwrap();
        let state = received_state(me, peer, piece);
        let snapshot = SimulationSnapshot::capture(0, std::slice::from_ref(&state));
        let cx = SelectionContext {
            corpus: &corpus,
            snapshot: &snapshot,
            iteration: 1,
            timestamp: None,
        };
        let mut selector = CascadeSelector::new(Quota::None, Quota::None, probability, 17);
        selector.select(&state, &cx).received.len()
    }

    #[test]
    fn test_certain_and_impossible_activation() {
        assert_eq!(select_with(CascadeProbability::Fixed(1.0)), 1);
        assert_eq!(select_with(CascadeProbability::Fixed(0.0)), 0);
    }

    #[test]
    fn test_edge_weight_probability_uses_arrival_edge() {
        // peer -> me carries weight 1.0, so In-orientation always fires.
        assert_eq!(
            select_with(CascadeProbability::EdgeWeight(EdgeOrientation::In)),
            1
        );
        // me -> peer does not exist; Out-orientation never fires.
        assert_eq!(
            select_with(CascadeProbability::EdgeWeight(EdgeOrientation::Out)),
            0
        );
    }

    #[test]
    fn test_unknown_source_never_activates_by_edge_weight() {
        let corpus = CorpusBuilder::new()
            .user("me")
            .piece("p", 0, &["me"])
            .build()
            .unwrap();
        let piece = corpus.piece_idx("p").unwrap();

        let update = MergeUpdate::new(DiscardPolicy::Resurrect);
        let mut state = UserState::new(UserIdx::new(5));
        state.update_seen(PropagatedRecord::new(piece, 0, None), &update);
        state.update_seen_to_received(&update);

        let snapshot = SimulationSnapshot::capture(0, std::slice::from_ref(&state));
        let cx = SelectionContext {
            corpus: &corpus,
            snapshot: &snapshot,
            iteration: 1,
            timestamp: None,
        };
        let mut selector = CascadeSelector::new(
            Quota::None,
            Quota::None,
            CascadeProbability::EdgeWeight(EdgeOrientation::Both),
            17,
        );
        assert!(selector.select(&state, &cx).received.is_empty());
    }

    #[test]
    fn test_fixed_probability_validation() {
        let corpus = CorpusBuilder::new().build().unwrap();
        let bad = CascadeSelector::new(
            Quota::None,
            Quota::None,
            CascadeProbability::Fixed(1.5),
            1,
        );
        assert!(bad.validate(&corpus).is_err());
    }
}
