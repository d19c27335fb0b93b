//! Filter policy definitions.

pub mod v1;
pub mod scoring;

pub use v1::{FilterPolicyV1, Selection};
pub use scoring::{edge_score, ScoreError, ScoredEdge};
