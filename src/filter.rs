//! Significance filtering.
//!
//! The filter scores every accumulated edge and drops the ones that do
//! not look like a real mentorship signal. Its output is the only graph
//! the ranking stage sees.
//!
//! ## Removal Rules
//!
//! An edge is removed if ANY of the following hold:
//!
//! 1. `score > max_edge_score`: an approver who spends (nearly) all of
//!    their approvals on one author is an artifact, not mentorship
//! 2. the approver is not core
//! 3. the author is not core and has fewer than `min_author_patch_count` changes
//! 4. the edge is a self-approval
//!
//! ## Purity
//!
//! Filtering reads the tables through a shared reference and never
//! touches counts. Same tables + same policy → same result.

use serde::{Deserialize, Serialize};

use crate::graph::ReviewGraph;
use crate::policy::{FilterPolicyV1, ScoreError, ScoredEdge};
use crate::types::{EdgeKey, ReviewEdge};

/// Error type for filter operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    /// The tables violate the accumulator invariants. This is a bug in
    /// whatever produced them, not a data condition.
    #[error("Internal consistency violation: {0}")]
    Inconsistent(#[from] ScoreError),
}

/// Why an edge was removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalReason {
    /// Score above `max_edge_score`.
    DegenerateScore,
    /// Approver's review count at or below the core threshold.
    ApproverNotCore,
    /// Author neither core nor above the patch-count minimum.
    AuthorTooNew,
    /// Approver and author are the same contributor.
    SelfApproval,
}

/// An edge dropped by the filter, with every rule it failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemovedEdge {
    /// The edge as accumulated.
    pub edge: ReviewEdge,
    /// Its score.
    pub score: f64,
    /// Rules it failed, in rule order.
    pub reasons: Vec<RemovalReason>,
}

/// Result of filtering one graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilteredGraph {
    /// Surviving edges in (approver, author) order.
    pub retained: Vec<ScoredEdge>,
    /// Removed edges in (approver, author) order.
    pub removed: Vec<RemovedEdge>,
    /// Params hash of the policy that produced this result.
    pub policy_params_hash: String,
}

impl FilteredGraph {
    /// Keys of surviving edges.
    pub fn retained_keys(&self) -> Vec<EdgeKey> {
        self.retained.iter().map(|e| e.edge.key()).collect()
    }

    /// Whether an edge survived.
    pub fn is_retained(&self, key: EdgeKey) -> bool {
        self.retained.iter().any(|e| e.edge.key() == key)
    }

    /// Reasons an edge was removed, if it was.
    pub fn removal_reasons(&self, key: EdgeKey) -> Option<&[RemovalReason]> {
        self.removed
            .iter()
            .find(|r| r.edge.key() == key)
            .map(|r| r.reasons.as_slice())
    }

    /// Number of surviving edges.
    pub fn len(&self) -> usize {
        self.retained.len()
    }

    /// Whether no edge survived.
    pub fn is_empty(&self) -> bool {
        self.retained.is_empty()
    }
}

/// Applies a [`FilterPolicyV1`] to accumulated tables.
#[derive(Debug, Clone)]
pub struct FilterEngine {
    policy: FilterPolicyV1,
}

impl FilterEngine {
    /// Create a filter for a policy.
    pub fn new(policy: FilterPolicyV1) -> Self {
        Self { policy }
    }

    /// Get the policy.
    pub fn policy(&self) -> &FilterPolicyV1 {
        &self.policy
    }

    /// Rules an edge fails. Empty means the edge is kept.
    pub fn removal_reasons(
        &self,
        scored: &ScoredEdge,
        graph: &ReviewGraph,
    ) -> Result<Vec<RemovalReason>, FilterError> {
        let p = &self.policy;
        let approver = graph
            .contributor(scored.edge.approver)
            .ok_or(ScoreError::UnknownContributor(scored.edge.approver))?;
        let author = graph
            .contributor(scored.edge.author)
            .ok_or(ScoreError::UnknownContributor(scored.edge.author))?;

        let mut reasons = Vec::new();
        if scored.score > p.max_edge_score {
            reasons.push(RemovalReason::DegenerateScore);
        }
        if !approver.is_core(p.core_review_threshold) {
            reasons.push(RemovalReason::ApproverNotCore);
        }
        if !author.is_core(p.core_review_threshold) && author.patch_count < p.min_author_patch_count {
            reasons.push(RemovalReason::AuthorTooNew);
        }
        if scored.edge.key().is_self_loop() {
            reasons.push(RemovalReason::SelfApproval);
        }
        Ok(reasons)
    }

    /// Score and filter every edge of `graph`.
    pub fn apply(&self, graph: &ReviewGraph) -> Result<FilteredGraph, FilterError> {
        let mut retained = Vec::new();
        let mut removed = Vec::new();

        for edge in graph.edges() {
            let scored = ScoredEdge::new(edge, graph).map_err(|e| {
                tracing::error!(error = %e, "review graph failed consistency check during scoring");
                FilterError::from(e)
            })?;
            let reasons = self.removal_reasons(&scored, graph)?;
            if reasons.is_empty() {
                retained.push(scored);
            } else {
                removed.push(RemovedEdge {
                    edge,
                    score: scored.score,
                    reasons,
                });
            }
        }

        tracing::debug!(
            policy = %self.policy.params_hash(),
            retained = retained.len(),
            removed = removed.len(),
            "edges filtered"
        );

        Ok(FilteredGraph {
            retained,
            removed,
            policy_params_hash: self.policy.params_hash(),
        })
    }
}
