//! Immutable per-iteration views of the whole population.

use std::collections::HashSet;

use serde::Serialize;

use crate::corpus::{PieceIdx, UserIdx};

use super::record::PropagatedRecord;
use super::user::UserState;

/// Frozen copy of one user's six sets at an iteration boundary.
///
/// Records are sorted by piece id so snapshots of identical runs compare
/// equal regardless of hash-map layout.
#[derive(Debug, Clone, Serialize)]
pub struct UserSnapshot {
    user: UserIdx,
    own: Vec<PropagatedRecord>,
    received: Vec<PropagatedRecord>,
    seen: Vec<PropagatedRecord>,
    discarded: Vec<PropagatedRecord>,
    propagated: Vec<PropagatedRecord>,
    all: Vec<PropagatedRecord>,
    #[serde(skip)]
    propagated_ids: HashSet<PieceIdx>,
}

impl UserSnapshot {
    fn capture(state: &UserState) -> Self {
        fn sorted<'a>(records: impl Iterator<Item = &'a PropagatedRecord>) -> Vec<PropagatedRecord> {
            let mut records: Vec<PropagatedRecord> = records.cloned().collect();
            records.sort_by_key(PropagatedRecord::piece);
            records
        }

        let propagated = sorted(state.propagated());
        let propagated_ids = propagated.iter().map(PropagatedRecord::piece).collect();
        Self {
            user: state.user(),
            own: sorted(state.own()),
            received: sorted(state.received()),
            seen: sorted(state.seen()),
            discarded: sorted(state.discarded()),
            propagated,
            all: sorted(state.all()),
            propagated_ids,
        }
    }

    /// The user this snapshot belongs to.
    pub fn user(&self) -> UserIdx {
        self.user
    }

    pub fn own(&self) -> &[PropagatedRecord] {
        &self.own
    }

    pub fn received(&self) -> &[PropagatedRecord] {
        &self.received
    }

    pub fn seen(&self) -> &[PropagatedRecord] {
        &self.seen
    }

    pub fn discarded(&self) -> &[PropagatedRecord] {
        &self.discarded
    }

    pub fn propagated(&self) -> &[PropagatedRecord] {
        &self.propagated
    }

    pub fn all(&self) -> &[PropagatedRecord] {
        &self.all
    }

    /// Whether this user had propagated the piece by snapshot time.
    ///
    /// Constant-time; threshold selection polls this across whole
    /// neighborhoods every iteration.
    pub fn has_propagated(&self, piece: PieceIdx) -> bool {
        self.propagated_ids.contains(&piece)
    }
}

/// Immutable state of every user at one iteration boundary.
///
/// Mechanisms read the previous iteration's snapshot when they need other
/// users' state, never the live arena, so intra-iteration mutation order
/// cannot leak into decisions.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationSnapshot {
    iteration: u32,
    users: Vec<UserSnapshot>,
}

impl SimulationSnapshot {
    /// Freezes the full arena at the end of `iteration`.
    pub fn capture(iteration: u32, states: &[UserState]) -> Self {
        Self {
            iteration,
            users: states.iter().map(UserSnapshot::capture).collect(),
        }
    }

    /// Iteration this snapshot was taken after (0 = initial seeding).
    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    /// Snapshot of one user, absent for out-of-range indices.
    pub fn user(&self, user: UserIdx) -> Option<&UserSnapshot> {
        self.users.get(user.as_usize())
    }

    /// Iterates all user snapshots in dense-index order.
    pub fn users(&self) -> impl Iterator<Item = &UserSnapshot> {
        self.users.iter()
    }
}

/// Per-iteration activity counts consumed by stop conditions and reports.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IterationSummary {
    /// Iteration these counts describe
    pub iteration: u32,
    /// Users that flagged at least one piece to send
    pub propagating_users: Vec<UserIdx>,
    /// Pieces flagged to send, summed over users
    pub pieces_sent: u64,
    /// Delivery events accepted by sight
    pub deliveries: u64,
    /// Deliveries of pieces the destination had never observed before
    pub newly_seen: u64,
    /// Deliveries of pieces already received or discarded by the destination
    pub re_received: u64,
    /// Received pieces that expired this iteration
    pub discarded: u64,
}

impl IterationSummary {
    pub(crate) fn new(iteration: u32) -> Self {
        Self {
            iteration,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mechanism::update::{DiscardPolicy, MergeUpdate};

    #[test]
    fn test_snapshot_is_sorted_and_queryable() {
        let update = MergeUpdate::new(DiscardPolicy::Resurrect);
        let mut state = UserState::new(UserIdx::new(0));
        state.reset_own(vec![
            PropagatedRecord::new(PieceIdx::new(3), 0, Some(UserIdx::new(0))),
            PropagatedRecord::new(PieceIdx::new(1), 0, Some(UserIdx::new(0))),
        ]);
        state.update_own_to_propagated(&[PieceIdx::new(3)]);
        state.update_seen(
            PropagatedRecord::new(PieceIdx::new(2), 1, Some(UserIdx::new(4))),
            &update,
        );

        let snapshot = SimulationSnapshot::capture(1, std::slice::from_ref(&state));
        let user = snapshot.user(UserIdx::new(0)).unwrap();
        assert_eq!(user.own().len(), 1);
        assert_eq!(user.seen().len(), 1);
        assert!(user.has_propagated(PieceIdx::new(3)));
        assert!(!user.has_propagated(PieceIdx::new(1)));

        let all_pieces: Vec<PieceIdx> = user.all().iter().map(PropagatedRecord::piece).collect();
        assert_eq!(
            all_pieces,
            vec![PieceIdx::new(1), PieceIdx::new(2), PieceIdx::new(3)]
        );
        assert!(snapshot.user(UserIdx::new(9)).is_none());
    }
}
