//! Reconciliation of repeated observations of the same piece.

use crate::state::PropagatedRecord;

/// Pure reconciliation policy invoked whenever two observations of the same
/// piece id must be combined.
///
/// `merge_discarded` may return `None` to signal that the piece stays
/// permanently abandoned instead of being revived into the received set.
pub trait UpdateMechanism: Send {
    /// Combines an existing entry with a newly observed one.
    fn merge_seen(&self, old: &PropagatedRecord, new: &PropagatedRecord) -> PropagatedRecord;

    /// Reconciles a new observation with a previously discarded entry.
    ///
    /// `None` means the piece remains discarded.
    fn merge_discarded(
        &self,
        old: &PropagatedRecord,
        new: &PropagatedRecord,
    ) -> Option<PropagatedRecord>;
}

/// What happens when a discarded piece is observed again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardPolicy {
    /// Merge the observations and move the piece back to received.
    Resurrect,
    /// Ignore the new observation; once discarded, always discarded.
    Abandon,
}

/// Standard reconciliation: creator multisets concatenate and the earliest
/// first-seen iteration wins.
#[derive(Debug, Clone, Copy)]
pub struct MergeUpdate {
    discarded: DiscardPolicy,
}

impl MergeUpdate {
    /// Creates the policy with the given treatment of discarded pieces.
    pub fn new(discarded: DiscardPolicy) -> Self {
        Self { discarded }
    }
}

impl UpdateMechanism for MergeUpdate {
    fn merge_seen(&self, old: &PropagatedRecord, new: &PropagatedRecord) -> PropagatedRecord {
        old.merged(new)
    }

    fn merge_discarded(
        &self,
        old: &PropagatedRecord,
        new: &PropagatedRecord,
    ) -> Option<PropagatedRecord> {
        match self.discarded {
            DiscardPolicy::Resurrect => Some(old.merged(new)),
            DiscardPolicy::Abandon => None,
        }
    }
}
