//! Read-only information corpus: users, pieces, the social graph, feature
//! channels, and ground-truth propagation history.
//!
//! A corpus is built once per simulation run through [`CorpusBuilder`] and
//! never mutated afterwards. All id-based lookups return empty results for
//! absent ids rather than erroring, which keeps mechanism code free of
//! defensive branches.

pub mod creation;
pub mod data;
pub mod graph;
pub mod index;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use creation::CorpusBuilder;
pub use data::InformationCorpus;
pub use graph::{EdgeKind, EdgeOrientation, SocialGraph};
pub use index::IdIndex;

/// Dense index of a user within a corpus.
///
/// Assigned contiguously at corpus construction; usable directly as an
/// arena offset for per-user simulation state.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct UserIdx(pub u32);

impl UserIdx {
    /// Creates a user index from its dense value.
    pub fn new(idx: u32) -> Self {
        Self(idx)
    }

    /// Returns the underlying dense value.
    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// Returns the dense value widened for slice indexing.
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for UserIdx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "u{}", self.0)
    }
}

/// Dense index of an information piece within a corpus.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct PieceIdx(pub u32);

impl PieceIdx {
    /// Creates a piece index from its dense value.
    pub fn new(idx: u32) -> Self {
        Self(idx)
    }

    /// Returns the underlying dense value.
    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// Returns the dense value widened for slice indexing.
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PieceIdx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

/// An atomic unit of content that can be created and propagated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InformationPiece {
    idx: PieceIdx,
    external_id: String,
    timestamp: i64,
}

impl InformationPiece {
    pub(crate) fn new(idx: PieceIdx, external_id: String, timestamp: i64) -> Self {
        Self {
            idx,
            external_id,
            timestamp,
        }
    }

    /// Dense index of this piece.
    pub fn idx(&self) -> PieceIdx {
        self.idx
    }

    /// External identifier this piece was registered under.
    pub fn external_id(&self) -> &str {
        &self.external_id
    }

    /// Creation timestamp of this piece.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }
}

/// Errors raised while assembling a corpus.
///
/// Construction is the only fallible corpus operation; once built, every
/// lookup is total.
#[derive(Debug, thiserror::Error)]
pub enum CorpusError {
    /// The same piece external id was registered twice
    #[error("Duplicate information piece id: {id}")]
    DuplicatePiece {
        /// External id registered more than once
        id: String,
    },

    /// A creator relation referenced a user that was never registered
    #[error("Piece {piece} names unknown creator: {user}")]
    UnknownCreator {
        /// External id of the piece
        piece: String,
        /// External id of the missing user
        user: String,
    },

    /// A ground-truth record referenced an unknown user
    #[error("Ground truth references unknown user: {user}")]
    UnknownGroundTruthUser {
        /// External id of the missing user
        user: String,
    },

    /// A ground-truth record referenced an unknown piece
    #[error("Ground truth references unknown piece: {piece}")]
    UnknownGroundTruthPiece {
        /// External id of the missing piece
        piece: String,
    },

    /// A feature value referenced an unknown entity
    #[error("Feature channel {channel} references unknown entity: {entity}")]
    UnknownFeatureEntity {
        /// Name of the feature channel
        channel: String,
        /// External id of the missing user or piece
        entity: String,
    },
}
