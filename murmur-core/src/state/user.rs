//! Per-user propagation state machine.

use std::collections::HashMap;

use crate::corpus::{PieceIdx, UserIdx};
use crate::mechanism::update::UpdateMechanism;

use super::record::PropagatedRecord;

/// Mutable per-user state tracked across iterations.
///
/// Six sets of [`PropagatedRecord`] keyed by piece id. The correctness
/// property the whole engine rests on: own / received / seen / discarded /
/// propagated are pairwise disjoint at every iteration boundary, while
/// `all` is a never-shrinking superset of their union. `seen` stages the
/// current iteration's deliveries and may shadow a received or discarded
/// entry until [`Self::update_seen_to_received`] reconciles them; it never
/// overlaps own or propagated. Operations referencing an absent id are
/// silent no-ops so mechanisms compose without defensive checks.
#[derive(Debug, Clone, Default)]
pub struct UserState {
    user: UserIdx,
    own: HashMap<PieceIdx, PropagatedRecord>,
    received: HashMap<PieceIdx, PropagatedRecord>,
    seen: HashMap<PieceIdx, PropagatedRecord>,
    discarded: HashMap<PieceIdx, PropagatedRecord>,
    propagated: HashMap<PieceIdx, PropagatedRecord>,
    all: HashMap<PieceIdx, PropagatedRecord>,
}

impl UserState {
    /// Creates empty state for one user.
    pub fn new(user: UserIdx) -> Self {
        Self {
            user,
            ..Self::default()
        }
    }

    /// The user this state belongs to.
    pub fn user(&self) -> UserIdx {
        self.user
    }

    /// Clears all six sets, then seeds `own` (and `all`) from `records`.
    pub fn reset_own(&mut self, records: impl IntoIterator<Item = PropagatedRecord>) {
        self.own.clear();
        self.received.clear();
        self.seen.clear();
        self.discarded.clear();
        self.propagated.clear();
        self.all.clear();
        for record in records {
            self.all.insert(record.piece(), record.clone());
            self.own.insert(record.piece(), record);
        }
    }

    /// Registers a delivered record as seen this iteration.
    ///
    /// No-op with respect to seen when the piece is already owned or
    /// propagated (mutual exclusion); an existing seen entry is merged via
    /// the update mechanism. The record is always folded into `all`.
    pub fn update_seen(&mut self, record: PropagatedRecord, update: &dyn UpdateMechanism) {
        let piece = record.piece();
        if !self.own.contains_key(&piece) && !self.propagated.contains_key(&piece) {
            let merged = match self.seen.get(&piece) {
                Some(existing) => update.merge_seen(existing, &record),
                None => record.clone(),
            };
            self.seen.insert(piece, merged);
        }
        self.fold_into_all(record);
    }

    /// Drains `seen` into `received`, one piece at a time in piece order.
    ///
    /// Pieces already propagated are dropped. A piece with a discarded
    /// entry is first reconciled through `update.merge_discarded`; `None`
    /// means the piece stays abandoned. Otherwise the drained record merges
    /// with any existing received entry via `update.merge_seen` or is
    /// inserted fresh. `seen` is empty afterwards regardless.
    pub fn update_seen_to_received(&mut self, update: &dyn UpdateMechanism) {
        let mut pieces: Vec<PieceIdx> = self.seen.keys().copied().collect();
        pieces.sort_unstable();

        for piece in pieces {
            let Some(record) = self.seen.remove(&piece) else {
                continue;
            };
            if self.propagated.contains_key(&piece) {
                continue;
            }

            let record = if let Some(old) = self.discarded.get(&piece) {
                match update.merge_discarded(old, &record) {
                    Some(revived) => {
                        self.discarded.remove(&piece);
                        revived
                    }
                    None => continue,
                }
            } else {
                record
            };

            let merged = match self.received.get(&piece) {
                Some(existing) => update.merge_seen(existing, &record),
                None => record,
            };
            self.received.insert(piece, merged);
        }

        self.seen.clear();
    }

    /// Moves pieces from `own` to `propagated`; absent ids are ignored.
    pub fn update_own_to_propagated(&mut self, pieces: &[PieceIdx]) {
        for piece in pieces {
            if let Some(record) = self.own.remove(piece) {
                self.propagated.insert(*piece, record);
            }
        }
    }

    /// Moves pieces from `received` to `propagated`; absent ids are
    /// ignored.
    pub fn update_received_to_propagated(&mut self, pieces: &[PieceIdx]) {
        for piece in pieces {
            if let Some(record) = self.received.remove(piece) {
                self.propagated.insert(*piece, record);
            }
        }
    }

    /// Moves pieces from `received` to `discarded`; absent ids are ignored.
    pub fn discard_received(&mut self, pieces: &[PieceIdx]) {
        for piece in pieces {
            if let Some(record) = self.received.remove(piece) {
                self.discarded.insert(*piece, record);
            }
        }
    }

    fn fold_into_all(&mut self, record: PropagatedRecord) {
        let merged = match self.all.get(&record.piece()) {
            Some(existing) => existing.merged(&record),
            None => record,
        };
        self.all.insert(merged.piece(), merged);
    }

    /// Pieces authored and not yet sent.
    pub fn own(&self) -> impl Iterator<Item = &PropagatedRecord> {
        self.own.values()
    }

    /// Pieces received from neighbors and not yet decided on.
    pub fn received(&self) -> impl Iterator<Item = &PropagatedRecord> {
        self.received.values()
    }

    /// Pieces delivered this iteration, not yet drained into received.
    pub fn seen(&self) -> impl Iterator<Item = &PropagatedRecord> {
        self.seen.values()
    }

    /// Received pieces that expired without being resent.
    pub fn discarded(&self) -> impl Iterator<Item = &PropagatedRecord> {
        self.discarded.values()
    }

    /// Pieces this user has sent at least once.
    pub fn propagated(&self) -> impl Iterator<Item = &PropagatedRecord> {
        self.propagated.values()
    }

    /// Every piece this user has ever held or observed.
    pub fn all(&self) -> impl Iterator<Item = &PropagatedRecord> {
        self.all.values()
    }

    pub fn contains_own(&self, piece: PieceIdx) -> bool {
        self.own.contains_key(&piece)
    }

    pub fn contains_received(&self, piece: PieceIdx) -> bool {
        self.received.contains_key(&piece)
    }

    pub fn contains_seen(&self, piece: PieceIdx) -> bool {
        self.seen.contains_key(&piece)
    }

    pub fn contains_discarded(&self, piece: PieceIdx) -> bool {
        self.discarded.contains_key(&piece)
    }

    pub fn contains_propagated(&self, piece: PieceIdx) -> bool {
        self.propagated.contains_key(&piece)
    }

    pub fn contains_all(&self, piece: PieceIdx) -> bool {
        self.all.contains_key(&piece)
    }

    /// Received record for a piece, if present.
    pub fn received_record(&self, piece: PieceIdx) -> Option<&PropagatedRecord> {
        self.received.get(&piece)
    }

    /// Number of pieces currently in `received`.
    pub fn received_count(&self) -> usize {
        self.received.len()
    }

    /// Checks the partition invariant, returning the first piece found in
    /// two mutually exclusive sets, or absent from `all`, together with the
    /// names of the offending sets.
    ///
    /// Intended for iteration boundaries, after the seen drain: there the
    /// public mutation API upholds the invariant for any mechanism
    /// behavior, and a violation means an engine bug. Mid-iteration, a
    /// staged `seen` entry may coexist with a received or discarded one.
    pub fn partition_violation(&self) -> Option<(PieceIdx, &'static str, &'static str)> {
        let sets: [(&'static str, &HashMap<PieceIdx, PropagatedRecord>); 5] = [
            ("own", &self.own),
            ("received", &self.received),
            ("seen", &self.seen),
            ("discarded", &self.discarded),
            ("propagated", &self.propagated),
        ];
        for (i, (first_name, first)) in sets.iter().enumerate() {
            for (second_name, second) in &sets[i + 1..] {
                if let Some(piece) = first.keys().find(|piece| second.contains_key(*piece)) {
                    return Some((*piece, *first_name, *second_name));
                }
            }
        }
        for (name, set) in &sets {
            if let Some(piece) = set.keys().find(|piece| !self.all.contains_key(*piece)) {
                return Some((*piece, *name, "all"));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mechanism::update::{DiscardPolicy, MergeUpdate};

    fn piece(idx: u32) -> PieceIdx {
        PieceIdx::new(idx)
    }

    fn record(idx: u32, iteration: u32, creator: u32) -> PropagatedRecord {
        PropagatedRecord::new(piece(idx), iteration, Some(UserIdx::new(creator)))
    }

    fn seeded() -> UserState {
        let mut state = UserState::new(UserIdx::new(0));
        state.reset_own(vec![record(0, 0, 0), record(1, 0, 0)]);
        state
    }

    #[test]
    fn test_reset_own_seeds_own_and_all() {
        let state = seeded();
        assert!(state.contains_own(piece(0)));
        assert!(state.contains_all(piece(0)));
        assert_eq!(state.own().count(), 2);
        assert!(state.partition_violation().is_none());
    }

    #[test]
    fn test_update_seen_refuses_own_and_propagated() {
        let update = MergeUpdate::new(DiscardPolicy::Resurrect);
        let mut state = seeded();
        state.update_own_to_propagated(&[piece(1)]);

        state.update_seen(record(0, 1, 5), &update);
        state.update_seen(record(1, 1, 5), &update);
        assert_eq!(state.seen().count(), 0);

        state.update_seen(record(2, 1, 5), &update);
        assert!(state.contains_seen(piece(2)));
        assert!(state.contains_all(piece(2)));
        assert!(state.partition_violation().is_none());
    }

    #[test]
    fn test_update_seen_merges_duplicate_deliveries() {
        let update = MergeUpdate::new(DiscardPolicy::Resurrect);
        let mut state = seeded();
        state.update_seen(record(2, 1, 5), &update);
        state.update_seen(record(2, 1, 6), &update);

        let seen: Vec<_> = state.seen().collect();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].times(), 2);
    }

    #[test]
    fn test_seen_drains_into_received() {
        let update = MergeUpdate::new(DiscardPolicy::Resurrect);
        let mut state = seeded();
        state.update_seen(record(2, 1, 5), &update);
        state.update_seen_to_received(&update);

        assert_eq!(state.seen().count(), 0);
        assert!(state.contains_received(piece(2)));
        assert!(state.partition_violation().is_none());
    }

    #[test]
    fn test_abandon_policy_keeps_piece_discarded() {
        let update = MergeUpdate::new(DiscardPolicy::Abandon);
        let mut state = seeded();
        state.update_seen(record(2, 1, 5), &update);
        state.update_seen_to_received(&update);
        state.discard_received(&[piece(2)]);

        state.update_seen(record(2, 2, 6), &update);
        state.update_seen_to_received(&update);
        assert!(state.contains_discarded(piece(2)));
        assert!(!state.contains_received(piece(2)));
        assert!(state.partition_violation().is_none());
    }

    #[test]
    fn test_resurrect_policy_revives_discarded_piece() {
        let update = MergeUpdate::new(DiscardPolicy::Resurrect);
        let mut state = seeded();
        state.update_seen(record(2, 1, 5), &update);
        state.update_seen_to_received(&update);
        state.discard_received(&[piece(2)]);

        state.update_seen(record(2, 2, 6), &update);
        state.update_seen_to_received(&update);
        assert!(!state.contains_discarded(piece(2)));
        assert!(state.contains_received(piece(2)));
        let revived = state.received_record(piece(2)).unwrap();
        assert_eq!(revived.times(), 2);
        assert!(state.partition_violation().is_none());
    }

    #[test]
    fn test_moves_are_idempotent_on_absent_ids() {
        let mut state = seeded();
        let before = format!("{state:?}");
        state.update_own_to_propagated(&[piece(9)]);
        state.update_received_to_propagated(&[piece(9)]);
        state.discard_received(&[piece(9)]);
        assert_eq!(before, format!("{state:?}"));
    }

    #[test]
    fn test_propagated_piece_never_reenters_received() {
        let update = MergeUpdate::new(DiscardPolicy::Resurrect);
        let mut state = seeded();
        state.update_own_to_propagated(&[piece(0)]);

        state.update_seen(record(0, 2, 5), &update);
        state.update_seen_to_received(&update);
        assert!(!state.contains_received(piece(0)));
        assert!(state.contains_propagated(piece(0)));
        assert!(state.partition_violation().is_none());
    }
}
