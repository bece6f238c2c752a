//! Ground-truth replay: re-emit historically observed propagation.

use std::collections::HashMap;

use crate::corpus::{InformationCorpus, PieceIdx, UserIdx};
use crate::protocol::ProtocolError;
use crate::state::{PropagatedRecord, UserState};

use super::{SelectionContext, SelectionMechanism, released};

/// Replays the corpus's ground-truth record: own pieces are released when
/// their creation timestamp comes due, and repropagations happen exactly
/// when history says they did, independent of what the synthetic graph
/// delivered.
///
/// Holding part of the process fixed this way lets experimenters vary the
/// rest (for instance, only the recommender-injected edges). Each
/// ground-truth event fires once; a per-user cursor over the
/// timestamp-sorted event list guarantees that without rescanning.
#[derive(Debug, Clone, Default)]
pub struct ReplaySelector {
    /// Cap on replayed repropagations per user per iteration.
    cap: Option<usize>,
    cursors: HashMap<UserIdx, usize>,
}

impl ReplaySelector {
    /// Replays everything that comes due each iteration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replays at most `cap` repropagations per user per iteration; the
    /// remainder stays queued for later iterations.
    pub fn with_cap(cap: usize) -> Self {
        Self {
            cap: Some(cap),
            cursors: HashMap::new(),
        }
    }

    /// Whether a timestamp is due at the current simulated instant.
    ///
    /// Past the final corpus timestamp the cursor is exhausted (`None`) and
    /// everything remaining counts as due.
    fn due(timestamp: Option<i64>, event_ts: i64) -> bool {
        timestamp.is_none_or(|now| event_ts <= now)
    }
}

impl SelectionMechanism for ReplaySelector {
    fn release_own(
        &mut self,
        user: &UserState,
        cx: &SelectionContext<'_>,
    ) -> Vec<PropagatedRecord> {
        let mut due: Vec<PieceIdx> = user
            .own()
            .map(PropagatedRecord::piece)
            .filter(|&piece| {
                cx.corpus
                    .piece(piece)
                    .is_some_and(|info| Self::due(cx.timestamp, info.timestamp()))
            })
            .collect();
        due.sort_unstable();
        released(due, user.user(), cx.iteration)
    }

    fn release_received(
        &mut self,
        user: &UserState,
        cx: &SelectionContext<'_>,
    ) -> Vec<PropagatedRecord> {
        let events = cx.corpus.ground_truth(user.user());
        let cursor = self.cursors.entry(user.user()).or_insert(0);

        let mut replayed = Vec::new();
        while *cursor < events.len() {
            let (piece, event_ts) = events[*cursor];
            if !Self::due(cx.timestamp, event_ts) {
                break;
            }
            if self.cap.is_some_and(|cap| replayed.len() >= cap) {
                break;
            }
            replayed.push(piece);
            *cursor += 1;
        }
        released(replayed, user.user(), cx.iteration)
    }

    fn release_repropagated(
        &mut self,
        _user: &UserState,
        _cx: &SelectionContext<'_>,
    ) -> Vec<PropagatedRecord> {
        Vec::new()
    }

    fn validate(&self, corpus: &InformationCorpus) -> Result<(), ProtocolError> {
        if !corpus.has_ground_truth() {
            return Err(ProtocolError::MissingGroundTruth {
                mechanism: "ReplaySelector",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::CorpusBuilder;
    use crate::state::SimulationSnapshot;

    fn fixture() -> InformationCorpus {
        CorpusBuilder::new()
            .user("a")
            .user("b")
            .piece("p", 1, &["b"])
            .piece("q", 1, &["b"])
            .ground_truth("a", "p", 3)
            .ground_truth("a", "q", 5)
            .build()
            .unwrap()
    }

    fn replayed_at(selector: &mut ReplaySelector, corpus: &InformationCorpus, ts: Option<i64>) -> usize {
        let a = corpus.user_idx("a").unwrap();
        let state = UserState::new(a);
        let snapshot = SimulationSnapshot::capture(0, std::slice::from_ref(&state));
        let cx = SelectionContext {
            corpus,
            snapshot: &snapshot,
            iteration: 1,
            timestamp: ts,
        };
        selector.select(&state, &cx).received.len()
    }

    #[test]
    fn test_events_fire_at_their_timestamp_once() {
        let corpus = fixture();
        let mut selector = ReplaySelector::new();

        assert_eq!(replayed_at(&mut selector, &corpus, Some(1)), 0);
        assert_eq!(replayed_at(&mut selector, &corpus, Some(3)), 1);
        // Same instant again: the cursor already consumed the event.
        assert_eq!(replayed_at(&mut selector, &corpus, Some(3)), 0);
        assert_eq!(replayed_at(&mut selector, &corpus, Some(5)), 1);
    }

    #[test]
    fn test_exhausted_timeline_releases_remainder() {
        let corpus = fixture();
        let mut selector = ReplaySelector::new();
        assert_eq!(replayed_at(&mut selector, &corpus, None), 2);
    }

    #[test]
    fn test_cap_defers_overflow_to_next_iteration() {
        let corpus = fixture();
        let mut selector = ReplaySelector::with_cap(1);

        assert_eq!(replayed_at(&mut selector, &corpus, Some(5)), 1);
        assert_eq!(replayed_at(&mut selector, &corpus, Some(5)), 1);
        assert_eq!(replayed_at(&mut selector, &corpus, Some(5)), 0);
    }

    #[test]
    fn test_own_release_follows_creation_timestamps() {
        let corpus = fixture();
        let b = corpus.user_idx("b").unwrap();
        let mut state = UserState::new(b);
        state.reset_own(
            corpus
                .authored(b)
                .iter()
                .map(|&piece| PropagatedRecord::new(piece, 0, Some(b)))
                .collect::<Vec<_>>(),
        );
        let snapshot = SimulationSnapshot::capture(0, std::slice::from_ref(&state));

        let mut selector = ReplaySelector::new();
        let early = SelectionContext {
            corpus: &corpus,
            snapshot: &snapshot,
            iteration: 0,
            timestamp: Some(0),
        };
        assert!(selector.select(&state, &early).own.is_empty());

        let due = SelectionContext {
            corpus: &corpus,
            snapshot: &snapshot,
            iteration: 1,
            timestamp: Some(1),
        };
        assert_eq!(selector.select(&state, &due).own.len(), 2);
    }

    #[test]
    fn test_validation_requires_ground_truth() {
        let corpus = CorpusBuilder::new()
            .user("a")
            .piece("p", 0, &["a"])
            .build()
            .unwrap();
        assert!(matches!(
            ReplaySelector::new().validate(&corpus),
            Err(ProtocolError::MissingGroundTruth { .. })
        ));
    }
}
