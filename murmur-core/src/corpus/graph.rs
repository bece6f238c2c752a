//! Social graph with weighted, typed, directed edges.

use serde::{Deserialize, Serialize};

use super::UserIdx;

/// Provenance of a graph edge.
///
/// Diffusion experiments distinguish links present in the observed network
/// from links injected by a recommendation layer, so that selection and
/// sight policies can treat the two differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    /// Edge from the original observed network.
    Original,
    /// Edge injected by a link recommender.
    Recommended,
}

/// Which neighborhood of a vertex a query refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeOrientation {
    /// Incoming edges: vertices pointing at the queried one.
    In,
    /// Outgoing edges: vertices the queried one points at.
    Out,
    /// Union of both directions.
    Both,
}

#[derive(Debug, Clone, Copy)]
struct GraphEdge {
    neighbor: UserIdx,
    weight: f64,
    kind: EdgeKind,
}

/// Directed graph over the dense user-index space.
///
/// The vertex set is independent of the corpus user set: edges may reference
/// vertices with no registered user, and registered users may be isolated.
/// All queries are non-throwing and return empty results for unknown
/// vertices.
#[derive(Debug, Clone, Default)]
pub struct SocialGraph {
    outgoing: Vec<Vec<GraphEdge>>,
    incoming: Vec<Vec<GraphEdge>>,
    edge_count: usize,
    recommended_count: usize,
}

impl SocialGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_vertex(&mut self, v: UserIdx) {
        let needed = v.as_usize() + 1;
        if self.outgoing.len() < needed {
            self.outgoing.resize_with(needed, Vec::new);
            self.incoming.resize_with(needed, Vec::new);
        }
    }

    /// Adds a directed edge, replacing weight and kind if it already exists.
    pub fn add_edge(&mut self, from: UserIdx, to: UserIdx, weight: f64, kind: EdgeKind) {
        self.ensure_vertex(from);
        self.ensure_vertex(to);

        let out = &mut self.outgoing[from.as_usize()];
        if let Some(existing) = out.iter_mut().find(|e| e.neighbor == to) {
            if existing.kind == EdgeKind::Recommended {
                self.recommended_count -= 1;
            }
            existing.weight = weight;
            existing.kind = kind;
        } else {
            out.push(GraphEdge {
                neighbor: to,
                weight,
                kind,
            });
            self.edge_count += 1;
        }

        let inc = &mut self.incoming[to.as_usize()];
        if let Some(existing) = inc.iter_mut().find(|e| e.neighbor == from) {
            existing.weight = weight;
            existing.kind = kind;
        } else {
            inc.push(GraphEdge {
                neighbor: from,
                weight,
                kind,
            });
        }

        if kind == EdgeKind::Recommended {
            self.recommended_count += 1;
        }
    }

    /// Number of vertices touched by at least one edge.
    pub fn vertex_count(&self) -> usize {
        self.outgoing.len()
    }

    /// Number of directed edges.
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Number of directed edges injected by the recommender.
    pub fn recommended_edge_count(&self) -> usize {
        self.recommended_count
    }

    /// Whether any recommender-injected edge is present.
    pub fn has_recommended_edges(&self) -> bool {
        self.recommended_count > 0
    }

    /// Whether the directed edge `from -> to` exists.
    pub fn contains_edge(&self, from: UserIdx, to: UserIdx) -> bool {
        self.outgoing
            .get(from.as_usize())
            .is_some_and(|edges| edges.iter().any(|e| e.neighbor == to))
    }

    /// Weight of the directed edge `from -> to`, if present.
    pub fn edge_weight(&self, from: UserIdx, to: UserIdx) -> Option<f64> {
        self.outgoing
            .get(from.as_usize())?
            .iter()
            .find(|e| e.neighbor == to)
            .map(|e| e.weight)
    }

    /// Kind of the directed edge `from -> to`, if present.
    pub fn edge_kind(&self, from: UserIdx, to: UserIdx) -> Option<EdgeKind> {
        self.outgoing
            .get(from.as_usize())?
            .iter()
            .find(|e| e.neighbor == to)
            .map(|e| e.kind)
    }

    /// Neighbors of `vertex` along `orientation`, deduplicated, in
    /// insertion order (outgoing first for `Both`).
    pub fn neighbors(&self, vertex: UserIdx, orientation: EdgeOrientation) -> Vec<UserIdx> {
        let mut result = Vec::new();
        let mut push_unique = |v: UserIdx, acc: &mut Vec<UserIdx>| {
            if !acc.contains(&v) {
                acc.push(v);
            }
        };

        if matches!(orientation, EdgeOrientation::Out | EdgeOrientation::Both)
            && let Some(edges) = self.outgoing.get(vertex.as_usize())
        {
            for edge in edges {
                push_unique(edge.neighbor, &mut result);
            }
        }
        if matches!(orientation, EdgeOrientation::In | EdgeOrientation::Both)
            && let Some(edges) = self.incoming.get(vertex.as_usize())
        {
            for edge in edges {
                push_unique(edge.neighbor, &mut result);
            }
        }
        result
    }

    /// Degree of `vertex` along `orientation` (deduplicated for `Both`).
    pub fn degree(&self, vertex: UserIdx, orientation: EdgeOrientation) -> usize {
        self.neighbors(vertex, orientation).len()
    }

    /// Whether the link between `user` and `other` along `orientation` is a
    /// recommender-injected one.
    ///
    /// For `In` the edge `other -> user` is inspected, for `Out` the edge
    /// `user -> other`; `Both` reports true if either direction is
    /// recommended.
    pub fn is_recommended_link(
        &self,
        user: UserIdx,
        other: UserIdx,
        orientation: EdgeOrientation,
    ) -> bool {
        match orientation {
            EdgeOrientation::In => self.edge_kind(other, user) == Some(EdgeKind::Recommended),
            EdgeOrientation::Out => self.edge_kind(user, other) == Some(EdgeKind::Recommended),
            EdgeOrientation::Both => {
                self.edge_kind(user, other) == Some(EdgeKind::Recommended)
                    || self.edge_kind(other, user) == Some(EdgeKind::Recommended)
            }
        }
    }
}
