//! The immutable corpus queried by every mechanism during a run.

use std::collections::BTreeMap;
use std::collections::HashMap;

use super::graph::SocialGraph;
use super::index::IdIndex;
use super::{InformationPiece, PieceIdx, UserIdx};

/// Per-timestamp reverse index: user to the pieces tied to that instant.
pub(crate) type TimestampIndex = BTreeMap<i64, BTreeMap<UserIdx, Vec<PieceIdx>>>;

/// Immutable snapshot of users, information pieces, the social graph,
/// optional feature channels, and optional ground-truth propagation data.
///
/// Constructed once per run by [`super::CorpusBuilder`]; every lookup is
/// total and returns an empty result for absent ids. The two temporal
/// indices (sorted timestamps, timestamp to user to piece-set) are
/// precomputed here so temporal-replay protocols never rescan the corpus
/// inside the iteration loop.
#[derive(Debug, Clone)]
pub struct InformationCorpus {
    pub(crate) users: IdIndex<String>,
    pub(crate) registered: Vec<bool>,
    pub(crate) user_list: Vec<UserIdx>,
    pub(crate) pieces: IdIndex<String>,
    pub(crate) piece_data: Vec<InformationPiece>,
    pub(crate) creators: Vec<Vec<UserIdx>>,
    pub(crate) authored: Vec<Vec<PieceIdx>>,
    pub(crate) graph: SocialGraph,
    pub(crate) user_features: BTreeMap<String, HashMap<UserIdx, f64>>,
    pub(crate) piece_features: BTreeMap<String, HashMap<PieceIdx, f64>>,
    pub(crate) ground_truth: Vec<Vec<(PieceIdx, i64)>>,
    pub(crate) timestamps: Vec<i64>,
    pub(crate) authored_by_ts: TimestampIndex,
    pub(crate) replayed_by_ts: TimestampIndex,
}

impl InformationCorpus {
    /// Iterates all registered users in dense-index order.
    pub fn users(&self) -> impl Iterator<Item = UserIdx> + '_ {
        self.user_list.iter().copied()
    }

    /// Number of registered users.
    pub fn user_count(&self) -> usize {
        self.user_list.len()
    }

    /// Size of the dense user-index space, including graph-only vertices.
    ///
    /// Arenas indexed by [`UserIdx`] must be sized by this, not by
    /// [`Self::user_count`].
    pub fn user_index_space(&self) -> usize {
        self.users.len()
    }

    /// Whether the index belongs to a registered user (graph-only vertices
    /// report false).
    pub fn is_user(&self, user: UserIdx) -> bool {
        self.registered
            .get(user.as_usize())
            .copied()
            .unwrap_or(false)
    }

    /// External id of a user index.
    pub fn user_id(&self, user: UserIdx) -> Option<&str> {
        self.users.object(user.as_u32()).map(String::as_str)
    }

    /// Dense index of a user external id.
    pub fn user_idx(&self, id: &str) -> Option<UserIdx> {
        self.users.index_of(&id.to_string()).map(UserIdx::new)
    }

    /// Iterates all information pieces in dense-index order.
    pub fn pieces(&self) -> impl Iterator<Item = &InformationPiece> {
        self.piece_data.iter()
    }

    /// Number of information pieces.
    pub fn piece_count(&self) -> usize {
        self.piece_data.len()
    }

    /// Piece metadata for a dense index.
    pub fn piece(&self, piece: PieceIdx) -> Option<&InformationPiece> {
        self.piece_data.get(piece.as_usize())
    }

    /// Dense index of a piece external id.
    pub fn piece_idx(&self, id: &str) -> Option<PieceIdx> {
        self.pieces.index_of(&id.to_string()).map(PieceIdx::new)
    }

    /// Users who authored a piece; empty for absent ids.
    pub fn creators(&self, piece: PieceIdx) -> &[UserIdx] {
        self.creators
            .get(piece.as_usize())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Pieces authored by a user; empty for absent ids.
    pub fn authored(&self, user: UserIdx) -> &[PieceIdx] {
        self.authored
            .get(user.as_usize())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The social graph.
    pub fn graph(&self) -> &SocialGraph {
        &self.graph
    }

    /// Value of a named user feature channel for one user.
    pub fn user_feature(&self, channel: &str, user: UserIdx) -> Option<f64> {
        self.user_features.get(channel)?.get(&user).copied()
    }

    /// Value of a named piece feature channel for one piece.
    pub fn piece_feature(&self, channel: &str, piece: PieceIdx) -> Option<f64> {
        self.piece_features.get(channel)?.get(&piece).copied()
    }

    /// All (user, value) pairs of a named user feature channel.
    pub fn user_feature_channel(&self, channel: &str) -> impl Iterator<Item = (UserIdx, f64)> + '_ {
        self.user_features
            .get(channel)
            .into_iter()
            .flat_map(|values| values.iter().map(|(&user, &value)| (user, value)))
    }

    /// All (piece, value) pairs of a named piece feature channel.
    pub fn piece_feature_channel(
        &self,
        channel: &str,
    ) -> impl Iterator<Item = (PieceIdx, f64)> + '_ {
        self.piece_features
            .get(channel)
            .into_iter()
            .flat_map(|values| values.iter().map(|(&piece, &value)| (piece, value)))
    }

    /// Names of the user feature channels, sorted.
    pub fn user_feature_names(&self) -> impl Iterator<Item = &str> {
        self.user_features.keys().map(String::as_str)
    }

    /// Names of the piece feature channels, sorted.
    pub fn piece_feature_names(&self) -> impl Iterator<Item = &str> {
        self.piece_features.keys().map(String::as_str)
    }

    /// Ground-truth repropagations of a user as (piece, timestamp) pairs
    /// sorted by timestamp; empty when no ground truth was supplied.
    pub fn ground_truth(&self, user: UserIdx) -> &[(PieceIdx, i64)] {
        self.ground_truth
            .get(user.as_usize())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether any ground-truth repropagation data was supplied.
    pub fn has_ground_truth(&self) -> bool {
        self.ground_truth.iter().any(|events| !events.is_empty())
    }

    /// Whether ground truth records `user` repropagating `piece`.
    pub fn is_real_repropagated(&self, user: UserIdx, piece: PieceIdx) -> bool {
        self.real_propagated_timestamp(user, piece).is_some()
    }

    /// Timestamp at which ground truth records `user` repropagating
    /// `piece`, if it does.
    pub fn real_propagated_timestamp(&self, user: UserIdx, piece: PieceIdx) -> Option<i64> {
        self.ground_truth(user)
            .iter()
            .find(|(p, _)| *p == piece)
            .map(|(_, ts)| *ts)
    }

    /// Sorted, deduplicated set of every timestamp appearing anywhere in
    /// the corpus (piece creation and ground-truth repropagation).
    pub fn timestamps(&self) -> &[i64] {
        &self.timestamps
    }

    /// Earliest corpus timestamp.
    pub fn first_timestamp(&self) -> Option<i64> {
        self.timestamps.first().copied()
    }

    /// Smallest corpus timestamp strictly greater than `after`.
    pub fn next_timestamp(&self, after: i64) -> Option<i64> {
        let pos = self.timestamps.partition_point(|&ts| ts <= after);
        self.timestamps.get(pos).copied()
    }

    /// Pieces authored by `user` exactly at `timestamp`.
    pub fn authored_at(&self, timestamp: i64, user: UserIdx) -> &[PieceIdx] {
        Self::at(&self.authored_by_ts, timestamp, user)
    }

    /// Pieces ground truth says `user` repropagated exactly at `timestamp`.
    pub fn replayed_at(&self, timestamp: i64, user: UserIdx) -> &[PieceIdx] {
        Self::at(&self.replayed_by_ts, timestamp, user)
    }

    fn at(index: &TimestampIndex, timestamp: i64, user: UserIdx) -> &[PieceIdx] {
        index
            .get(&timestamp)
            .and_then(|by_user| by_user.get(&user))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Human-readable corpus description, logged at simulation start.
    pub fn summary(&self) -> String {
        format!(
            "{} users, {} pieces, {} edges ({} recommended), {} user feature channels, \
             {} piece feature channels, ground truth: {}",
            self.user_count(),
            self.piece_count(),
            self.graph.edge_count(),
            self.graph.recommended_edge_count(),
            self.user_features.len(),
            self.piece_features.len(),
            if self.has_ground_truth() { "yes" } else { "no" },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::super::creation::CorpusBuilder;
    use super::super::graph::EdgeKind;

    #[test]
    fn test_lookups_on_absent_ids_are_empty() {
        let corpus = CorpusBuilder::new()
            .user("a")
            .piece("p", 0, &["a"])
            .build()
            .unwrap();

        let bogus_user = super::UserIdx::new(40);
        let bogus_piece = super::PieceIdx::new(40);
        assert!(corpus.authored(bogus_user).is_empty());
        assert!(corpus.creators(bogus_piece).is_empty());
        assert!(corpus.ground_truth(bogus_user).is_empty());
        assert_eq!(corpus.user_feature("missing", bogus_user), None);
        assert!(!corpus.is_real_repropagated(bogus_user, bogus_piece));
    }

    #[test]
    fn test_timestamp_navigation() {
        let corpus = CorpusBuilder::new()
            .user("a")
            .user("b")
            .piece("p", 5, &["a"])
            .piece("q", 2, &["b"])
            .ground_truth("a", "q", 9)
            .build()
            .unwrap();

        assert_eq!(corpus.timestamps(), &[2, 5, 9]);
        assert_eq!(corpus.first_timestamp(), Some(2));
        assert_eq!(corpus.next_timestamp(2), Some(5));
        assert_eq!(corpus.next_timestamp(5), Some(9));
        assert_eq!(corpus.next_timestamp(9), None);
    }

    #[test]
    fn test_temporal_reverse_indices() {
        let corpus = CorpusBuilder::new()
            .user("a")
            .user("b")
            .piece("p", 5, &["a"])
            .ground_truth("b", "p", 7)
            .build()
            .unwrap();

        let a = corpus.user_idx("a").unwrap();
        let b = corpus.user_idx("b").unwrap();
        let p = corpus.piece_idx("p").unwrap();
        assert_eq!(corpus.authored_at(5, a), &[p]);
        assert!(corpus.authored_at(5, b).is_empty());
        assert_eq!(corpus.replayed_at(7, b), &[p]);
        assert_eq!(corpus.real_propagated_timestamp(b, p), Some(7));
    }

    #[test]
    fn test_graph_vertices_independent_of_user_set() {
        let corpus = CorpusBuilder::new()
            .user("a")
            .piece("p", 0, &["a"])
            .edge("a", "ghost", 1.0, EdgeKind::Original)
            .build()
            .unwrap();

        let ghost = corpus.user_idx("ghost").unwrap();
        assert!(!corpus.is_user(ghost));
        assert_eq!(corpus.user_count(), 1);
        assert!(corpus.user_index_space() >= 2);
    }
}
