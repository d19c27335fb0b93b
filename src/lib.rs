//! # review-graph-kernel
//!
//! Deterministic approver → author influence graphs mined from code review.
//!
//! The kernel answers one question:
//!
//! > Whose approvals shaped whose work, strongly enough to mean mentorship?
//!
//! ## Core Contract
//!
//! 1. Reduce review history to events: one author, zero or more approvers
//! 2. Resolve raw (name, email) sightings to canonical contributors
//! 3. Count approvals per ordered (approver, author) pair
//! 4. Score each pair as the share of the approver's approvals it received,
//!    drop artifacts and non-core activity, rank what survives
//!
//! ## Architecture
//!
//! ```text
//! ReviewEventSource → GraphAccumulator → FilterEngine → rank → RunReport
//!                          ↓
//!                  IdentityResolver ← AffiliationProvider
//! ```
//!
//! ## Determinism Guarantees
//!
//! - Counts do not depend on event order
//! - Filtering is pure: same tables + same policy → same edges
//! - Ranking ties break on names, then ids; `graph_hash` is stable across runs
//!
//! ## Example
//!
//! ```
//! use review_graph_kernel::{FilterPolicyV1, GraphAccumulator, IdentityDescriptor, ReviewEvent, RunReport};
//!
//! let who = |n: &str| IdentityDescriptor::new(n, format!("{}@example.org", n.to_lowercase()));
//! let mut acc = GraphAccumulator::default();
//! for _ in 0..4 {
//!     acc.ingest(&ReviewEvent::new(who("Ann"), vec![who("Rob")])).unwrap();
//!     acc.ingest(&ReviewEvent::new(who("Ben"), vec![who("Rob")])).unwrap();
//! }
//!
//! let report = RunReport::build(acc.finish(), &FilterPolicyV1::new(3, 1, 0.99)).unwrap();
//! assert_eq!(report.ranked.len(), 2);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod types;
pub mod canonical;
pub mod identity;
pub mod graph;
pub mod policy;
pub mod filter;
pub mod ranking;
pub mod report;
pub mod source;

// Re-exports
pub use types::{
    Contributor, ContributorId, Diagnostic, DiagnosticKind, DisplayMode, EdgeKey, EventError,
    IdentityDescriptor, ReviewEdge, ReviewEvent, Severity, SightingRole,
};
pub use identity::{
    AffiliationError, AffiliationProvider, AffiliationTable, FirstNamePseudonyms,
    IdentityResolver, NoAffiliations, PseudonymGenerator, SequentialPseudonyms,
};
pub use graph::{AccumulatedGraph, AccumulationSummary, GraphAccumulator, GraphError, ReviewGraph};
pub use policy::{edge_score, FilterPolicyV1, ScoreError, ScoredEdge, Selection};
pub use filter::{FilterEngine, FilterError, FilteredGraph, RemovalReason, RemovedEdge};
pub use ranking::{rank, RankedEdge, RankedGraph, RankedNode, RECORDS_HEADER};
pub use report::{ReportError, RunReport, RunStats};
pub use source::{
    ChangeFetcher, GerritConfig, GerritSource, GitLogConfig, GitLogSource, ReviewEventSource,
    SourceBatch, SourceError, StaticEventSource,
};
#[cfg(feature = "gerrit")]
pub use source::HttpChangeFetcher;
pub use canonical::{canonical_hash, canonical_hash_hex, to_canonical_bytes};

/// Schema version for exported reports.
/// Increment on breaking changes to any serialized type.
pub const GRAPH_SCHEMA_VERSION: &str = "1.0.0";

/// Default policy version identifier.
pub const DEFAULT_POLICY_VERSION: &str = "filter_policy_v1";
