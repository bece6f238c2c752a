//! Value type tracking one observed information piece.

use serde::{Deserialize, Serialize};

use crate::corpus::{PieceIdx, UserIdx};

/// One piece of information as observed by one user: the piece id, the
/// iteration it was first seen at, and the multiset of users it arrived
/// from.
///
/// A `None` creator entry means the source of that observation is unknown;
/// consumers must tolerate it. The observation count of a record equals the
/// size of its creator multiset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropagatedRecord {
    piece: PieceIdx,
    first_seen: u32,
    creators: Vec<Option<UserIdx>>,
}

impl PropagatedRecord {
    /// Creates a record for a single observation.
    pub fn new(piece: PieceIdx, iteration: u32, creator: Option<UserIdx>) -> Self {
        Self {
            piece,
            first_seen: iteration,
            creators: vec![creator],
        }
    }

    /// Creates a record carrying several observations at once.
    pub fn with_creators(piece: PieceIdx, iteration: u32, creators: Vec<Option<UserIdx>>) -> Self {
        Self {
            piece,
            first_seen: iteration,
            creators,
        }
    }

    /// The observed piece.
    pub fn piece(&self) -> PieceIdx {
        self.piece
    }

    /// Iteration this piece was first seen at.
    pub fn first_seen(&self) -> u32 {
        self.first_seen
    }

    /// Multiset of originating users; `None` marks an unknown source.
    pub fn creators(&self) -> &[Option<UserIdx>] {
        &self.creators
    }

    /// Originating users with known identity, in arrival order.
    pub fn known_creators(&self) -> impl Iterator<Item = UserIdx> + '_ {
        self.creators.iter().filter_map(|c| *c)
    }

    /// Number of times this piece has been observed.
    pub fn times(&self) -> usize {
        self.creators.len()
    }

    /// Combines two observations of the same piece: the earliest first-seen
    /// iteration wins and creator multisets are concatenated.
    pub fn merged(&self, other: &Self) -> Self {
        let mut creators = self.creators.clone();
        creators.extend_from_slice(&other.creators);
        Self {
            piece: self.piece,
            first_seen: self.first_seen.min(other.first_seen),
            creators,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_times_matches_creator_multiset() {
        let record = PropagatedRecord::with_creators(
            PieceIdx::new(0),
            3,
            vec![Some(UserIdx::new(1)), None, Some(UserIdx::new(1))],
        );
        assert_eq!(record.times(), 3);
        assert_eq!(record.known_creators().count(), 2);
    }

    #[test]
    fn test_merged_keeps_earliest_iteration_and_all_creators() {
        let a = PropagatedRecord::new(PieceIdx::new(0), 5, Some(UserIdx::new(1)));
        let b = PropagatedRecord::new(PieceIdx::new(0), 2, None);

        let merged = a.merged(&b);
        assert_eq!(merged.first_seen(), 2);
        assert_eq!(merged.times(), 2);
        assert_eq!(merged.creators(), &[Some(UserIdx::new(1)), None]);
    }
}
