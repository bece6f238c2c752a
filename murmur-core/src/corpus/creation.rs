//! Corpus assembly with fail-fast validation.
//!
//! The builder collects raw declarations and resolves them into dense
//! indices in [`CorpusBuilder::build`], so referential problems (unknown
//! creators, duplicate piece ids, dangling ground truth) surface before any
//! simulation starts.

use std::collections::BTreeMap;
use std::collections::HashMap;

use tracing::debug;

use super::data::{InformationCorpus, TimestampIndex};
use super::graph::{EdgeKind, SocialGraph};
use super::index::IdIndex;
use super::{CorpusError, InformationPiece, PieceIdx, UserIdx};

#[derive(Debug, Clone)]
struct PieceDecl {
    id: String,
    timestamp: i64,
    creators: Vec<String>,
}

/// Entity kind a feature declaration refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FeatureTarget {
    User,
    Piece,
}

/// Builder for [`InformationCorpus`].
///
/// Declaration order is irrelevant except for index assignment: users and
/// pieces receive dense indices in the order they are declared.
#[derive(Debug, Clone, Default)]
pub struct CorpusBuilder {
    users: Vec<String>,
    pieces: Vec<PieceDecl>,
    edges: Vec<(String, String, f64, EdgeKind)>,
    features: Vec<(FeatureTarget, String, String, f64)>,
    ground_truth: Vec<(String, String, i64)>,
}

impl CorpusBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a user.
    pub fn user(mut self, id: impl Into<String>) -> Self {
        self.users.push(id.into());
        self
    }

    /// Registers an information piece with its creation timestamp and the
    /// users who authored it.
    pub fn piece(mut self, id: impl Into<String>, timestamp: i64, creators: &[&str]) -> Self {
        self.pieces.push(PieceDecl {
            id: id.into(),
            timestamp,
            creators: creators.iter().map(|c| c.to_string()).collect(),
        });
        self
    }

    /// Adds a directed graph edge. Endpoints need not be registered users.
    pub fn edge(
        mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        weight: f64,
        kind: EdgeKind,
    ) -> Self {
        self.edges.push((from.into(), to.into(), weight, kind));
        self
    }

    /// Sets a named feature value for a user.
    pub fn user_feature(
        mut self,
        channel: impl Into<String>,
        user: impl Into<String>,
        value: f64,
    ) -> Self {
        self.features
            .push((FeatureTarget::User, channel.into(), user.into(), value));
        self
    }

    /// Sets a named feature value for a piece.
    pub fn piece_feature(
        mut self,
        channel: impl Into<String>,
        piece: impl Into<String>,
        value: f64,
    ) -> Self {
        self.features
            .push((FeatureTarget::Piece, channel.into(), piece.into(), value));
        self
    }

    /// Records a ground-truth repropagation: `user` really repropagated
    /// `piece` at `timestamp`.
    pub fn ground_truth(
        mut self,
        user: impl Into<String>,
        piece: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        self.ground_truth
            .push((user.into(), piece.into(), timestamp));
        self
    }

    /// Resolves all declarations into an immutable corpus.
    ///
    /// # Errors
    ///
    /// - `CorpusError::DuplicatePiece` - A piece id was declared twice
    /// - `CorpusError::UnknownCreator` - A creator is not a registered user
    /// - `CorpusError::UnknownGroundTruthUser` - Ground truth names an
    ///   unregistered user
    /// - `CorpusError::UnknownGroundTruthPiece` - Ground truth names an
    ///   undeclared piece
    /// - `CorpusError::UnknownFeatureEntity` - A feature value names an
    ///   unknown user or piece
    pub fn build(self) -> Result<InformationCorpus, CorpusError> {
        let mut users = IdIndex::new();
        let mut registered = Vec::new();
        let mut user_list = Vec::new();
        for id in &self.users {
            let idx = users.intern(id.clone());
            if registered.len() <= idx as usize {
                registered.resize(idx as usize + 1, false);
            }
            if !registered[idx as usize] {
                registered[idx as usize] = true;
                user_list.push(UserIdx::new(idx));
            }
        }

        let mut pieces = IdIndex::new();
        let mut piece_data = Vec::new();
        let mut creators: Vec<Vec<UserIdx>> = Vec::new();
        for decl in &self.pieces {
            if pieces.index_of(&decl.id).is_some() {
                return Err(CorpusError::DuplicatePiece {
                    id: decl.id.clone(),
                });
            }
            let idx = PieceIdx::new(pieces.intern(decl.id.clone()));
            piece_data.push(InformationPiece::new(idx, decl.id.clone(), decl.timestamp));

            let mut piece_creators = Vec::new();
            for creator in &decl.creators {
                let user = users
                    .index_of(creator)
                    .map(UserIdx::new)
                    .filter(|u| registered[u.as_usize()])
                    .ok_or_else(|| CorpusError::UnknownCreator {
                        piece: decl.id.clone(),
                        user: creator.clone(),
                    })?;
                piece_creators.push(user);
            }
            creators.push(piece_creators);
        }

        let mut graph = SocialGraph::new();
        for (from, to, weight, kind) in &self.edges {
            let from = UserIdx::new(users.intern(from.clone()));
            let to = UserIdx::new(users.intern(to.clone()));
            graph.add_edge(from, to, *weight, *kind);
        }
        registered.resize(users.len(), false);

        let mut authored: Vec<Vec<PieceIdx>> = vec![Vec::new(); users.len()];
        for (piece, piece_creators) in creators.iter().enumerate() {
            for user in piece_creators {
                authored[user.as_usize()].push(PieceIdx::new(piece as u32));
            }
        }

        let mut user_features: BTreeMap<String, HashMap<UserIdx, f64>> = BTreeMap::new();
        let mut piece_features: BTreeMap<String, HashMap<PieceIdx, f64>> = BTreeMap::new();
        for (target, channel, entity, value) in &self.features {
            match target {
                FeatureTarget::User => {
                    let user = users
                        .index_of(entity)
                        .map(UserIdx::new)
                        .filter(|u| registered[u.as_usize()])
                        .ok_or_else(|| CorpusError::UnknownFeatureEntity {
                            channel: channel.clone(),
                            entity: entity.clone(),
                        })?;
                    user_features
                        .entry(channel.clone())
                        .or_default()
                        .insert(user, *value);
                }
                FeatureTarget::Piece => {
                    let piece = pieces.index_of(entity).map(PieceIdx::new).ok_or_else(|| {
                        CorpusError::UnknownFeatureEntity {
                            channel: channel.clone(),
                            entity: entity.clone(),
                        }
                    })?;
                    piece_features
                        .entry(channel.clone())
                        .or_default()
                        .insert(piece, *value);
                }
            }
        }

        let mut ground_truth: Vec<Vec<(PieceIdx, i64)>> = vec![Vec::new(); users.len()];
        for (user, piece, timestamp) in &self.ground_truth {
            let user_idx = users
                .index_of(user)
                .map(UserIdx::new)
                .filter(|u| registered[u.as_usize()])
                .ok_or_else(|| CorpusError::UnknownGroundTruthUser { user: user.clone() })?;
            let piece_idx = pieces.index_of(piece).map(PieceIdx::new).ok_or_else(|| {
                CorpusError::UnknownGroundTruthPiece {
                    piece: piece.clone(),
                }
            })?;
            ground_truth[user_idx.as_usize()].push((piece_idx, *timestamp));
        }
        for events in &mut ground_truth {
            events.sort_by_key(|&(piece, ts)| (ts, piece));
        }

        let mut timestamps: Vec<i64> = piece_data.iter().map(InformationPiece::timestamp).collect();
        timestamps.extend(
            ground_truth
                .iter()
                .flat_map(|events| events.iter().map(|&(_, ts)| ts)),
        );
        timestamps.sort_unstable();
        timestamps.dedup();

        let mut authored_by_ts: TimestampIndex = BTreeMap::new();
        for piece in &piece_data {
            for user in &creators[piece.idx().as_usize()] {
                authored_by_ts
                    .entry(piece.timestamp())
                    .or_default()
                    .entry(*user)
                    .or_default()
                    .push(piece.idx());
            }
        }
        let mut replayed_by_ts: TimestampIndex = BTreeMap::new();
        for (user, events) in ground_truth.iter().enumerate() {
            for &(piece, ts) in events {
                replayed_by_ts
                    .entry(ts)
                    .or_default()
                    .entry(UserIdx::new(user as u32))
                    .or_default()
                    .push(piece);
            }
        }

        let corpus = InformationCorpus {
            users,
            registered,
            user_list,
            pieces,
            piece_data,
            creators,
            authored,
            graph,
            user_features,
            piece_features,
            ground_truth,
            timestamps,
            authored_by_ts,
            replayed_by_ts,
        };
        debug!(summary = %corpus.summary(), "corpus built");
        Ok(corpus)
    }
}
