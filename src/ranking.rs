//! Ranking and export of filtered edges.
//!
//! Orders the surviving edges strongest first, applies the selection mode,
//! and collects the contributors the selected edges touch. The result is
//! everything a renderer needs; nothing here writes files.
//!
//! ## Ordering
//!
//! score desc, count desc, approver canonical name, author canonical
//! name, then contributor ids. Two runs over the same tables with the same
//! policy produce the same `graph_hash`.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::canonical::canonical_hash_hex;
use crate::filter::FilteredGraph;
use crate::graph::{GraphError, ReviewGraph};
use crate::policy::{ScoredEdge, Selection};
use crate::types::{Contributor, ContributorId, DisplayMode};

/// Header printed above [`RankedGraph::records`].
pub const RECORDS_HEADER: &str = "'approver -> author': score (approvals/reviews)";

/// One selected edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEdge {
    /// Approver id.
    pub approver_id: ContributorId,
    /// Author id.
    pub author_id: ContributorId,
    /// Approver label under the run's display mode.
    pub approver: String,
    /// Author label under the run's display mode.
    pub author: String,
    /// Approvals from approver to author.
    pub count: u32,
    /// Approver's total review count.
    pub approver_reviews: u32,
    /// `count / approver_reviews`.
    pub score: f64,
}

impl RankedEdge {
    /// Printable record line.
    pub fn record(&self) -> String {
        format!(
            "'{} -> {}': {:.6} ({}/{})",
            self.approver, self.author, self.score, self.count, self.approver_reviews
        )
    }
}

/// A contributor touched by at least one selected edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedNode {
    /// Contributor id.
    pub id: ContributorId,
    /// Canonical name, or pseudonym in pseudonymous mode.
    pub name: String,
    /// Display label.
    pub label: String,
    /// Email; omitted in pseudonymous mode.
    pub email: Option<String>,
    /// Organization, if known.
    pub affiliation: Option<String>,
    /// Qualifying approvals given.
    pub review_count: u32,
    /// Changes authored.
    pub patch_count: u32,
    /// Whether the contributor cleared the core threshold.
    pub is_core: bool,
}

impl RankedNode {
    fn new(c: &Contributor, display: DisplayMode, core_review_threshold: u32) -> Self {
        let (name, email) = match display {
            DisplayMode::Real => (c.name.clone(), Some(c.email.clone())),
            DisplayMode::Pseudonymous => (c.label(display), None),
        };
        Self {
            id: c.id,
            name,
            label: c.label(display),
            email,
            affiliation: c.affiliation.clone(),
            review_count: c.review_count,
            patch_count: c.patch_count,
            is_core: c.is_core(core_review_threshold),
        }
    }
}

/// Ordered, selected edges plus the nodes they touch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedGraph {
    /// Selected edges, strongest first.
    pub edges: Vec<RankedEdge>,
    /// Distinct endpoints in order of first appearance in `edges`.
    pub nodes: Vec<RankedNode>,
    /// Selection that produced this graph.
    pub selection: Selection,
    /// Display mode labels were rendered under.
    pub display: DisplayMode,
    /// Edges available before selection.
    pub candidates: usize,
    /// Content hash of `edges` and `nodes`.
    pub graph_hash: String,
}

impl RankedGraph {
    /// Printable lines, one per edge, in rank order.
    pub fn records(&self) -> Vec<String> {
        self.edges.iter().map(RankedEdge::record).collect()
    }

    /// Number of selected edges.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Whether nothing was selected.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Find a node by id.
    pub fn node(&self, id: ContributorId) -> Option<&RankedNode> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

/// Rank and select the edges of a filtered graph.
///
/// `graph` must be the tables `filtered` was computed from.
pub fn rank(
    filtered: &FilteredGraph,
    graph: &ReviewGraph,
    selection: Selection,
    display: DisplayMode,
    core_review_threshold: u32,
) -> Result<RankedGraph, GraphError> {
    let mut ordered: Vec<&ScoredEdge> = filtered.retained.iter().collect();
    ordered.sort();

    let mut edges = Vec::new();
    let mut nodes = Vec::new();
    let mut seen = BTreeSet::new();

    for (rank, scored) in ordered.iter().enumerate() {
        if !selection.accepts(rank, scored.score) {
            // Both modes select a prefix of the ordering.
            break;
        }
        let approver = graph.require(scored.edge.approver)?;
        let author = graph.require(scored.edge.author)?;

        for c in [approver, author] {
            if seen.insert(c.id) {
                nodes.push(RankedNode::new(c, display, core_review_threshold));
            }
        }
        edges.push(RankedEdge {
            approver_id: approver.id,
            author_id: author.id,
            approver: approver.label(display),
            author: author.label(display),
            count: scored.edge.count,
            approver_reviews: scored.approver_reviews,
            score: scored.score,
        });
    }

    let graph_hash = canonical_hash_hex(&(&edges, &nodes));
    tracing::debug!(
        candidates = ordered.len(),
        selected = edges.len(),
        nodes = nodes.len(),
        graph_hash = %graph_hash,
        "edges ranked"
    );

    Ok(RankedGraph {
        edges,
        nodes,
        selection,
        display,
        candidates: ordered.len(),
        graph_hash,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterEngine;
    use crate::graph::GraphAccumulator;
    use crate::policy::FilterPolicyV1;
    use crate::types::{IdentityDescriptor, ReviewEvent};

    fn who(name: &str) -> IdentityDescriptor {
        IdentityDescriptor::new(name, format!("{}@x.org", name.to_lowercase()))
    }

    // R: 10 reviews split 5/3/2 over A, B, C. S: 4 reviews split 2/2 over A, B.
    fn sample() -> ReviewGraph {
        let mut acc = GraphAccumulator::default();
        let plan: &[(&str, &str, usize)] = &[
            ("A", "R", 5),
            ("B", "R", 3),
            ("C", "R", 2),
            ("A", "S", 2),
            ("B", "S", 2),
        ];
        for (author, approver, n) in plan {
            for _ in 0..*n {
                acc.ingest(&ReviewEvent::new(who(author), vec![who(approver)])).unwrap();
            }
        }
        acc.finish().graph
    }

    fn ranked(selection: Selection) -> RankedGraph {
        let graph = sample();
        let policy = FilterPolicyV1::new(3, 1, 0.99);
        let filtered = FilterEngine::new(policy.clone()).apply(&graph).unwrap();
        rank(&filtered, &graph, selection, DisplayMode::Real, policy.core_review_threshold).unwrap()
    }

    #[test]
    fn test_order_and_tiebreak() {
        let out = ranked(Selection::TopN { n: 10 });
        let pairs: Vec<_> = out
            .edges
            .iter()
            .map(|e| (e.approver.as_str(), e.author.as_str()))
            .collect();
        // 0.5 (count 5) beats 0.5 (count 2); S->A and S->B tie on everything but author name
        assert_eq!(
            pairs,
            vec![
                ("R (x.org)", "A (x.org)"),
                ("S (x.org)", "A (x.org)"),
                ("S (x.org)", "B (x.org)"),
                ("R (x.org)", "B (x.org)"),
                ("R (x.org)", "C (x.org)"),
            ]
        );
        assert_eq!(out.candidates, 5);
    }

    #[test]
    fn test_top_n() {
        let out = ranked(Selection::TopN { n: 2 });
        assert_eq!(out.len(), 2);
        let names: Vec<_> = out.nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["R", "A", "S"]);
        assert!(out.node(out.edges[0].approver_id).unwrap().is_core);
    }

    #[test]
    fn test_min_percent_is_exclusive() {
        let out = ranked(Selection::MinPercent { percent: 50.0 });
        assert!(out.is_empty());
        let out = ranked(Selection::MinPercent { percent: 29.0 });
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn test_records() {
        let out = ranked(Selection::TopN { n: 1 });
        assert_eq!(out.records(), vec!["'R (x.org) -> A (x.org)': 0.500000 (5/10)".to_string()]);
    }

    #[test]
    fn test_hash_is_deterministic() {
        let a = ranked(Selection::TopN { n: 3 });
        let b = ranked(Selection::TopN { n: 3 });
        assert_eq!(a.graph_hash, b.graph_hash);
        let c = ranked(Selection::TopN { n: 4 });
        assert_ne!(a.graph_hash, c.graph_hash);
    }
}
