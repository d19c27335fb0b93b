//! Edge scoring.

use serde::{Deserialize, Serialize};

use crate::graph::ReviewGraph;
use crate::types::{ContributorId, ReviewEdge};

/// Error computing a score.
///
/// Both variants mean the tables are internally inconsistent; they are
/// never produced by a graph built through the accumulator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScoreError {
    /// An edge exists for an approver that never counted a review.
    #[error("Edge {approver} -> {author} exists but approver has review_count 0")]
    ZeroReviewCount {
        /// Source of the edge.
        approver: ContributorId,
        /// Target of the edge.
        author: ContributorId,
    },
    /// An edge references a contributor missing from the node table.
    #[error("Edge references unknown contributor {0}")]
    UnknownContributor(ContributorId),
}

/// Compute the score of an edge.
///
/// Formula:
/// ```text
/// score = count / approver.review_count
/// ```
///
/// The fraction of the approver's approvals that went to this author.
/// Computed on every call; only meaningful once accumulation is complete.
pub fn edge_score(edge: &ReviewEdge, graph: &ReviewGraph) -> Result<f64, ScoreError> {
    let approver = graph
        .contributor(edge.approver)
        .ok_or(ScoreError::UnknownContributor(edge.approver))?;
    if approver.review_count == 0 {
        return Err(ScoreError::ZeroReviewCount {
            approver: edge.approver,
            author: edge.author,
        });
    }
    Ok(f64::from(edge.count) / f64::from(approver.review_count))
}

/// An edge with its computed score and the names used for tie-breaking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredEdge {
    /// The underlying edge.
    pub edge: ReviewEdge,
    /// `count / approver.review_count`.
    pub score: f64,
    /// Approver's total review count at scoring time.
    pub approver_reviews: u32,
    /// Approver canonical name.
    pub approver_name: String,
    /// Author canonical name.
    pub author_name: String,
}

impl ScoredEdge {
    /// Score an edge against its graph.
    pub fn new(edge: ReviewEdge, graph: &ReviewGraph) -> Result<Self, ScoreError> {
        let score = edge_score(&edge, graph)?;
        let approver = graph
            .contributor(edge.approver)
            .ok_or(ScoreError::UnknownContributor(edge.approver))?;
        let author = graph
            .contributor(edge.author)
            .ok_or(ScoreError::UnknownContributor(edge.author))?;
        Ok(Self {
            edge,
            score,
            approver_reviews: approver.review_count,
            approver_name: approver.name.clone(),
            author_name: author.name.clone(),
        })
    }
}

// Ranking order: strongest edge first.
impl PartialEq for ScoredEdge {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for ScoredEdge {}

impl PartialOrd for ScoredEdge {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScoredEdge {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Primary: higher score first
        // Secondary: higher count first
        // Tertiary: approver name, then author name, then ids for determinism
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| other.edge.count.cmp(&self.edge.count))
            .then_with(|| self.approver_name.cmp(&other.approver_name))
            .then_with(|| self.author_name.cmp(&other.author_name))
            .then_with(|| self.edge.key().cmp(&other.edge.key()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Contributor;

    fn graph_with_reviews(review_counts: &[u32]) -> ReviewGraph {
        let contributors = review_counts
            .iter()
            .enumerate()
            .map(|(i, &n)| {
                let mut c = Contributor::new(
                    ContributorId::new(i as u32),
                    format!("c{i}"),
                    format!("c{i}@x.org"),
                );
                c.review_count = n;
                c
            })
            .collect();
        ReviewGraph::from_parts(contributors, vec![])
    }

    #[test]
    fn test_edge_score() {
        let graph = graph_with_reviews(&[0, 4]);
        let edge = ReviewEdge::new(ContributorId::new(1), ContributorId::new(0), 3);
        assert_eq!(edge_score(&edge, &graph).unwrap(), 0.75);
    }

    #[test]
    fn test_zero_review_count_is_an_error() {
        let graph = graph_with_reviews(&[0, 0]);
        let edge = ReviewEdge::new(ContributorId::new(1), ContributorId::new(0), 1);
        assert!(matches!(
            edge_score(&edge, &graph),
            Err(ScoreError::ZeroReviewCount { .. })
        ));
    }

    #[test]
    fn test_scored_edge_ordering() {
        let graph = graph_with_reviews(&[10, 10, 10]);
        let id = ContributorId::new;

        let strong = ScoredEdge::new(ReviewEdge::new(id(0), id(1), 8), &graph).unwrap();
        let weak = ScoredEdge::new(ReviewEdge::new(id(0), id(2), 2), &graph).unwrap();
        let tie_a = ScoredEdge::new(ReviewEdge::new(id(1), id(0), 2), &graph).unwrap();

        assert!(strong < weak);
        // Same score and count: approver name breaks the tie
        assert!(weak < tie_a);
    }
}
