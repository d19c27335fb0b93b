//! Node and edge tables of the review graph.

pub mod accumulator;

use std::collections::BTreeMap;

use crate::types::{Contributor, ContributorId, EdgeKey, ReviewEdge};

pub use accumulator::{AccumulatedGraph, AccumulationSummary, GraphAccumulator};

/// Error type for graph table operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// An edge or lookup referenced an id outside the node table.
    #[error("Contributor not found: {0}")]
    ContributorNotFound(ContributorId),
    /// A node table entry is stored under the wrong id.
    #[error("Contributor {found} stored at position {position}")]
    MisplacedContributor {
        /// Id carried by the entry.
        found: ContributorId,
        /// Position in the table.
        position: usize,
    },
    /// Outgoing edge counts do not add up to the approver's review count.
    #[error("Approver {approver} has review_count {review_count} but outgoing edges sum to {edge_total}")]
    ReviewCountMismatch {
        /// The approver.
        approver: ContributorId,
        /// Recorded review count.
        review_count: u32,
        /// Sum of outgoing edge counts.
        edge_total: u64,
    },
    /// An edge exists with a zero count.
    #[error("Edge {approver} -> {author} has zero count")]
    EmptyEdge {
        /// Source.
        approver: ContributorId,
        /// Target.
        author: ContributorId,
    },
}

/// Accumulated node and edge tables.
///
/// Uses a dense `Vec` for nodes and a `BTreeMap` for edges so that
/// iteration order is deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewGraph {
    /// Contributors indexed by `ContributorId`.
    contributors: Vec<Contributor>,
    /// (approver, author) -> approval count.
    edges: BTreeMap<EdgeKey, u32>,
}

impl ReviewGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a graph from previously exported tables.
    ///
    /// No invariants are checked here; call [`ReviewGraph::check_consistency`]
    /// before trusting restored tables.
    pub fn from_parts(contributors: Vec<Contributor>, edges: Vec<ReviewEdge>) -> Self {
        let edges = edges.into_iter().map(|e| (e.key(), e.count)).collect();
        Self {
            contributors,
            edges,
        }
    }

    /// Get a contributor by id.
    pub fn contributor(&self, id: ContributorId) -> Option<&Contributor> {
        self.contributors.get(id.index())
    }

    /// Get a contributor by id or fail.
    pub fn require(&self, id: ContributorId) -> Result<&Contributor, GraphError> {
        self.contributor(id).ok_or(GraphError::ContributorNotFound(id))
    }

    /// All contributors in creation order.
    pub fn contributors(&self) -> &[Contributor] {
        &self.contributors
    }

    /// Find a contributor by canonical name.
    pub fn find_by_name(&self, name: &str) -> Option<&Contributor> {
        self.contributors.iter().find(|c| c.name == name)
    }

    /// Approval count for an ordered pair, if the edge exists.
    pub fn edge_count(&self, approver: ContributorId, author: ContributorId) -> Option<u32> {
        self.edges.get(&EdgeKey::new(approver, author)).copied()
    }

    /// All edges in (approver, author) order.
    pub fn edges(&self) -> impl Iterator<Item = ReviewEdge> + '_ {
        self.edges
            .iter()
            .map(|(key, count)| ReviewEdge::new(key.approver, key.author, *count))
    }

    /// Outgoing edges of an approver.
    pub fn edges_from(&self, approver: ContributorId) -> impl Iterator<Item = ReviewEdge> + '_ {
        self.edges().filter(move |e| e.approver == approver)
    }

    /// Get number of contributors.
    pub fn num_contributors(&self) -> usize {
        self.contributors.len()
    }

    /// Get number of edges.
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// Verify table invariants.
    ///
    /// Every edge endpoint exists, every edge count is positive, and each
    /// approver's outgoing counts sum to its `review_count`.
    pub fn check_consistency(&self) -> Result<(), GraphError> {
        for (position, c) in self.contributors.iter().enumerate() {
            if c.id.index() != position {
                return Err(GraphError::MisplacedContributor {
                    found: c.id,
                    position,
                });
            }
        }

        let mut outgoing: BTreeMap<ContributorId, u64> = BTreeMap::new();
        for edge in self.edges() {
            self.require(edge.approver)?;
            self.require(edge.author)?;
            if edge.count == 0 {
                return Err(GraphError::EmptyEdge {
                    approver: edge.approver,
                    author: edge.author,
                });
            }
            *outgoing.entry(edge.approver).or_default() += u64::from(edge.count);
        }

        for c in &self.contributors {
            let edge_total = outgoing.get(&c.id).copied().unwrap_or(0);
            if edge_total != u64::from(c.review_count) {
                return Err(GraphError::ReviewCountMismatch {
                    approver: c.id,
                    review_count: c.review_count,
                    edge_total,
                });
            }
        }
        Ok(())
    }

    // Mutation is crate-private: only the accumulator and resolver write.

    pub(crate) fn push_contributor(
        &mut self,
        name: impl Into<String>,
        email: impl Into<String>,
    ) -> ContributorId {
        let id = ContributorId::new(self.contributors.len() as u32);
        self.contributors.push(Contributor::new(id, name, email));
        id
    }

    pub(crate) fn contributor_mut(&mut self, id: ContributorId) -> Result<&mut Contributor, GraphError> {
        self.contributors
            .get_mut(id.index())
            .ok_or(GraphError::ContributorNotFound(id))
    }

    pub(crate) fn record_patch(&mut self, author: ContributorId) -> Result<(), GraphError> {
        self.contributor_mut(author)?.patch_count += 1;
        Ok(())
    }

    /// Count one approval: bumps the approver's review count and the edge
    /// together so the sum invariant holds after every call.
    pub(crate) fn record_approval(
        &mut self,
        approver: ContributorId,
        author: ContributorId,
    ) -> Result<(), GraphError> {
        self.require(author)?;
        self.contributor_mut(approver)?.review_count += 1;
        *self.edges.entry(EdgeKey::new(approver, author)).or_default() += 1;
        Ok(())
    }
}
