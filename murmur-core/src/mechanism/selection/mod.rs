//! Selection: which pieces a user sends this iteration.
//!
//! Every concrete policy plugs into the same template: three independent
//! sub-policies (own-release, received-repropagation, already-propagated
//! re-repropagation) invoked in fixed order, their outputs deduplicated and
//! merged into one [`Selection`].

pub mod cascade;
pub mod count;
pub mod recommender;
pub mod replay;
pub mod threshold;

use std::collections::HashMap;
use std::collections::HashSet;

use crate::corpus::{InformationCorpus, PieceIdx, UserIdx};
use crate::protocol::ProtocolError;
use crate::rng::SimRng;
use crate::state::{PropagatedRecord, SimulationSnapshot, UserState};

pub use cascade::{CascadeProbability, CascadeSelector};
pub use count::CountSelector;
pub use recommender::RecommenderSelector;
pub use replay::ReplaySelector;
pub use threshold::{Threshold, ThresholdSelector};

/// Read-only inputs every selection decision sees.
///
/// The snapshot is the previous iteration's frozen population state;
/// selection never reads live cross-user state.
pub struct SelectionContext<'a> {
    pub corpus: &'a InformationCorpus,
    pub snapshot: &'a SimulationSnapshot,
    pub iteration: u32,
    pub timestamp: Option<i64>,
}

/// Output of one user's selection: three duplicate-free record lists.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Own pieces released for the first time.
    pub own: Vec<PropagatedRecord>,
    /// Received pieces being repropagated.
    pub received: Vec<PropagatedRecord>,
    /// Already-propagated pieces being sent again.
    pub repropagated: Vec<PropagatedRecord>,
}

impl Selection {
    /// Total number of flagged records.
    pub fn len(&self) -> usize {
        self.own.len() + self.received.len() + self.repropagated.len()
    }

    /// Whether nothing was flagged.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates all flagged records across the three lists.
    pub fn records(&self) -> impl Iterator<Item = &PropagatedRecord> {
        self.own
            .iter()
            .chain(self.received.iter())
            .chain(self.repropagated.iter())
    }

    /// Piece ids of the own-release list.
    pub fn own_pieces(&self) -> Vec<PieceIdx> {
        self.own.iter().map(PropagatedRecord::piece).collect()
    }

    /// Piece ids of the received-repropagation list.
    pub fn received_pieces(&self) -> Vec<PieceIdx> {
        self.received.iter().map(PropagatedRecord::piece).collect()
    }
}

/// How many pieces a sub-policy may release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quota {
    /// Release every available piece.
    All,
    /// Release nothing.
    None,
    /// Release up to this many, drawn uniformly when oversubscribed.
    Limit(u32),
}

impl Quota {
    /// Draws from `pool` under this quota: everything for `All`, nothing
    /// for `None`, and `min(pool, n)` distinct pieces for `Limit(n)`.
    pub fn draw(self, pool: &[PieceIdx], rng: &mut SimRng) -> Vec<PieceIdx> {
        match self {
            Quota::All => pool.to_vec(),
            Quota::None => Vec::new(),
            Quota::Limit(n) => rng.sample_distinct(pool, n as usize),
        }
    }
}

/// Policy choosing which pieces a user sends this iteration.
///
/// `select` is the shared template and is not meant to be overridden;
/// implementations provide the three sub-policies and, optionally, a
/// restriction of the selectable population.
pub trait SelectionMechanism: Send {
    /// Own pieces to release for the first time.
    fn release_own(&mut self, user: &UserState, cx: &SelectionContext<'_>)
    -> Vec<PropagatedRecord>;

    /// Received pieces to repropagate.
    fn release_received(
        &mut self,
        user: &UserState,
        cx: &SelectionContext<'_>,
    ) -> Vec<PropagatedRecord>;

    /// Already-propagated pieces to send again.
    fn release_repropagated(
        &mut self,
        user: &UserState,
        cx: &SelectionContext<'_>,
    ) -> Vec<PropagatedRecord>;

    /// Users allowed to run selection this iteration. Defaults to everyone.
    fn selectable_users(&self, cx: &SelectionContext<'_>) -> Vec<UserIdx> {
        cx.corpus.users().collect()
    }

    /// Checks compatibility with the corpus at protocol assembly time.
    ///
    /// # Errors
    ///
    /// - `ProtocolError` - The policy cannot run against this corpus
    fn validate(&self, corpus: &InformationCorpus) -> Result<(), ProtocolError> {
        let _ = corpus;
        Ok(())
    }

    /// Template: invokes the three sub-policies in fixed order and merges
    /// their deduplicated outputs.
    fn select(&mut self, user: &UserState, cx: &SelectionContext<'_>) -> Selection {
        Selection {
            own: dedup_by_piece(self.release_own(user, cx)),
            received: dedup_by_piece(self.release_received(user, cx)),
            repropagated: dedup_by_piece(self.release_repropagated(user, cx)),
        }
    }
}

fn dedup_by_piece(records: Vec<PropagatedRecord>) -> Vec<PropagatedRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| seen.insert(record.piece()))
        .collect()
}

/// Piece ids of a record set, sorted for deterministic draw order.
pub(crate) fn sorted_pieces<'a>(
    records: impl Iterator<Item = &'a PropagatedRecord>,
) -> Vec<PieceIdx> {
    let mut pieces: Vec<PieceIdx> = records.map(PropagatedRecord::piece).collect();
    pieces.sort_unstable();
    pieces
}

/// Builds fresh outgoing records: each flagged piece is stamped with the
/// current iteration and the sending user as originator.
pub(crate) fn released(
    pieces: impl IntoIterator<Item = PieceIdx>,
    sender: UserIdx,
    iteration: u32,
) -> Vec<PropagatedRecord> {
    pieces
        .into_iter()
        .map(|piece| PropagatedRecord::new(piece, iteration, Some(sender)))
        .collect()
}

/// Decorator enforcing a minimum wait between a user's selection rounds.
///
/// Pull-style protocols use this so a user that just ran selection sits out
/// the next `wait - 1` iterations.
pub struct WaitingSelection {
    inner: Box<dyn SelectionMechanism>,
    wait: u32,
    last_selected: HashMap<UserIdx, u32>,
}

impl WaitingSelection {
    pub fn new(inner: Box<dyn SelectionMechanism>, wait: u32) -> Self {
        Self {
            inner,
            wait,
            last_selected: HashMap::new(),
        }
    }
}

impl SelectionMechanism for WaitingSelection {
    fn release_own(
        &mut self,
        user: &UserState,
        cx: &SelectionContext<'_>,
    ) -> Vec<PropagatedRecord> {
        self.inner.release_own(user, cx)
    }

    fn release_received(
        &mut self,
        user: &UserState,
        cx: &SelectionContext<'_>,
    ) -> Vec<PropagatedRecord> {
        self.inner.release_received(user, cx)
    }

    fn release_repropagated(
        &mut self,
        user: &UserState,
        cx: &SelectionContext<'_>,
    ) -> Vec<PropagatedRecord> {
        self.inner.release_repropagated(user, cx)
    }

    fn selectable_users(&self, cx: &SelectionContext<'_>) -> Vec<UserIdx> {
        self.inner
            .selectable_users(cx)
            .into_iter()
            .filter(|user| {
                self.last_selected
                    .get(user)
                    .is_none_or(|&last| cx.iteration >= last + self.wait)
            })
            .collect()
    }

    fn validate(&self, corpus: &InformationCorpus) -> Result<(), ProtocolError> {
        self.inner.validate(corpus)
    }

    fn select(&mut self, user: &UserState, cx: &SelectionContext<'_>) -> Selection {
        let selection = Selection {
            own: dedup_by_piece(self.inner.release_own(user, cx)),
            received: dedup_by_piece(self.inner.release_received(user, cx)),
            repropagated: dedup_by_piece(self.inner.release_repropagated(user, cx)),
        };
        if !selection.is_empty() {
            self.last_selected.insert(user.user(), cx.iteration);
        }
        selection
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_draw() {
        let mut rng = SimRng::from_seed(1);
        let pool: Vec<PieceIdx> = (0..5).map(PieceIdx::new).collect();

        assert_eq!(Quota::All.draw(&pool, &mut rng).len(), 5);
        assert!(Quota::None.draw(&pool, &mut rng).is_empty());
        assert_eq!(Quota::Limit(3).draw(&pool, &mut rng).len(), 3);
        assert_eq!(Quota::Limit(9).draw(&pool, &mut rng).len(), 5);
    }

    #[test]
    fn test_dedup_by_piece_keeps_first() {
        let records = vec![
            PropagatedRecord::new(PieceIdx::new(0), 1, Some(UserIdx::new(1))),
            PropagatedRecord::new(PieceIdx::new(0), 2, Some(UserIdx::new(2))),
            PropagatedRecord::new(PieceIdx::new(1), 3, Some(UserIdx::new(3))),
        ];
        let deduped = dedup_by_piece(records);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].first_seen(), 1);
    }
}
