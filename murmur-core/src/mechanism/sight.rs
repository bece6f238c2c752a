//! Destination-side awareness: which delivered pieces are actually seen.

use crate::corpus::{EdgeOrientation, InformationCorpus};
use crate::protocol::ProtocolError;
use crate::rng::SimRng;
use crate::state::{PropagatedRecord, UserState};

/// Decides which of the pieces a neighbor just sent become visible to the
/// destination user this iteration.
///
/// Every policy refuses pieces the destination has already propagated; a
/// user never re-observes something they have sent themselves.
pub trait SightMechanism: Send {
    /// Called once at the start of every iteration.
    fn begin_iteration(&mut self, corpus: &InformationCorpus) {
        let _ = corpus;
    }

    /// Filters one sender's delivery batch down to the visible records.
    fn observe(
        &mut self,
        user: &UserState,
        corpus: &InformationCorpus,
        incoming: &[PropagatedRecord],
    ) -> Vec<PropagatedRecord>;

    /// Checks compatibility with the corpus at protocol assembly time.
    ///
    /// # Errors
    ///
    /// - `ProtocolError` - The policy cannot run against this corpus
    fn validate(&self, corpus: &InformationCorpus) -> Result<(), ProtocolError> {
        let _ = corpus;
        Ok(())
    }
}

fn not_yet_propagated<'a>(
    user: &'a UserState,
    incoming: &'a [PropagatedRecord],
) -> impl Iterator<Item = &'a PropagatedRecord> {
    incoming
        .iter()
        .filter(|record| !user.contains_propagated(record.piece()))
}

/// Default sight: everything delivered is seen.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllSight;

impl SightMechanism for AllSight {
    fn observe(
        &mut self,
        user: &UserState,
        _corpus: &InformationCorpus,
        incoming: &[PropagatedRecord],
    ) -> Vec<PropagatedRecord> {
        not_yet_propagated(user, incoming).cloned().collect()
    }
}

/// At most `limit` of the delivered pieces are seen, drawn uniformly.
#[derive(Debug, Clone)]
pub struct CountSight {
    limit: usize,
    rng: SimRng,
}

impl CountSight {
    /// Creates the policy with its own seeded generator.
    pub fn new(limit: usize, seed: u64) -> Self {
        Self {
            limit,
            rng: SimRng::from_seed(seed),
        }
    }
}

impl SightMechanism for CountSight {
    fn observe(
        &mut self,
        user: &UserState,
        _corpus: &InformationCorpus,
        incoming: &[PropagatedRecord],
    ) -> Vec<PropagatedRecord> {
        let visible: Vec<PropagatedRecord> = not_yet_propagated(user, incoming).cloned().collect();
        self.rng.sample_distinct(&visible, self.limit)
    }
}

/// Observation probability depends on whether the piece arrived over a
/// recommender-injected link.
///
/// Each creator of a delivered record gets an independent trial with
/// `prob_recommended` or `prob_original`; one success makes the piece seen.
#[derive(Debug, Clone)]
pub struct RecommendedSight {
    prob_recommended: f64,
    prob_original: f64,
    orientation: EdgeOrientation,
    rng: SimRng,
}

impl RecommendedSight {
    /// Creates the policy with its own seeded generator.
    pub fn new(
        prob_recommended: f64,
        prob_original: f64,
        orientation: EdgeOrientation,
        seed: u64,
    ) -> Self {
        Self {
            prob_recommended,
            prob_original,
            orientation,
            rng: SimRng::from_seed(seed),
        }
    }
}

impl SightMechanism for RecommendedSight {
    fn observe(
        &mut self,
        user: &UserState,
        corpus: &InformationCorpus,
        incoming: &[PropagatedRecord],
    ) -> Vec<PropagatedRecord> {
        let graph = corpus.graph();
        let mut visible = Vec::new();
        for record in not_yet_propagated(user, incoming) {
            let mut seen = false;
            for creator in record.creators() {
                let probability = match creator {
                    Some(creator)
                        if graph.is_recommended_link(user.user(), *creator, self.orientation) =>
                    {
                        self.prob_recommended
                    }
                    _ => self.prob_original,
                };
                // One trial per observation; any success reveals the piece.
                if self.rng.random_bool(probability) {
                    seen = true;
                }
            }
            if seen {
                visible.push(record.clone());
            }
        }
        visible
    }

    fn validate(&self, corpus: &InformationCorpus) -> Result<(), ProtocolError> {
        for (name, p) in [
            ("prob_recommended", self.prob_recommended),
            ("prob_original", self.prob_original),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(ProtocolError::InvalidParameter {
                    mechanism: "RecommendedSight",
                    reason: format!("{name} must be within [0, 1], got {p}"),
                });
            }
        }
        if !corpus.graph().has_recommended_edges() {
            return Err(ProtocolError::MissingRecommendedEdges {
                mechanism: "RecommendedSight",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{CorpusBuilder, EdgeKind, PieceIdx, UserIdx};

    fn record(piece: u32, creator: u32) -> PropagatedRecord {
        PropagatedRecord::new(PieceIdx::new(piece), 1, Some(UserIdx::new(creator)))
    }

    fn empty_state() -> UserState {
        UserState::new(UserIdx::new(0))
    }

    fn simple_corpus() -> InformationCorpus {
        CorpusBuilder::new()
            .user("a")
            .user("b")
            .piece("p", 0, &["a"])
            .edge("b", "a", 1.0, EdgeKind::Recommended)
            .build()
            .unwrap()
    }

    #[test]
    fn test_all_sight_passes_everything_not_propagated() {
        let corpus = simple_corpus();
        let mut state = empty_state();
        state.reset_own(vec![record(3, 0)]);
        state.update_own_to_propagated(&[PieceIdx::new(3)]);

        let incoming = vec![record(1, 1), record(2, 1), record(3, 1)];
        let visible = AllSight.observe(&state, &corpus, &incoming);
        let pieces: Vec<PieceIdx> = visible.iter().map(PropagatedRecord::piece).collect();
        assert_eq!(pieces, vec![PieceIdx::new(1), PieceIdx::new(2)]);
    }

    #[test]
    fn test_count_sight_caps_batch() {
        let corpus = simple_corpus();
        let state = empty_state();
        let incoming = vec![record(1, 1), record(2, 1), record(3, 1)];

        let mut sight = CountSight::new(2, 11);
        assert_eq!(sight.observe(&state, &corpus, &incoming).len(), 2);

        let mut generous = CountSight::new(10, 11);
        assert_eq!(generous.observe(&state, &corpus, &incoming).len(), 3);
    }

    #[test]
    fn test_recommended_sight_extremes() {
        let corpus = simple_corpus();
        let state = empty_state();
        // b -> a is recommended; orientation In looks at edges pointing at us.
        let incoming = vec![record(1, 1)];

        let mut sees_rec = RecommendedSight::new(1.0, 0.0, EdgeOrientation::In, 5);
        assert_eq!(sees_rec.observe(&state, &corpus, &incoming).len(), 1);

        let mut blind_rec = RecommendedSight::new(0.0, 1.0, EdgeOrientation::In, 5);
        assert!(blind_rec.observe(&state, &corpus, &incoming).is_empty());
    }

    #[test]
    fn test_recommended_sight_requires_recommended_edges() {
        let plain = CorpusBuilder::new()
            .user("a")
            .user("b")
            .piece("p", 0, &["a"])
            .edge("a", "b", 1.0, EdgeKind::Original)
            .build()
            .unwrap();

        let sight = RecommendedSight::new(0.5, 0.5, EdgeOrientation::In, 5);
        assert!(matches!(
            sight.validate(&plain),
            Err(ProtocolError::MissingRecommendedEdges { .. })
        ));
    }
}
