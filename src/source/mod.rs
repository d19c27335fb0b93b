//! Review event sources.
//!
//! A source turns some record of code review into an ordered batch of
//! [`ReviewEvent`]s. Sources do the I/O; everything downstream is pure.

pub mod gerrit;
pub mod git_log;

#[cfg(feature = "gerrit")]
pub mod http;

use async_trait::async_trait;

use crate::graph::{GraphAccumulator, GraphError};
use crate::types::{Diagnostic, ReviewEvent};

pub use gerrit::{
    parse_change_detail, parse_change_page, strip_xssi_prefix, ChangeFetcher, ChangeOutcome,
    ChangePage, ChangeSummary, FetchError, GerritConfig, GerritSource,
};
pub use git_log::{parse_git_log, GitLogConfig, GitLogSource};

#[cfg(feature = "gerrit")]
pub use http::HttpChangeFetcher;

/// Error type for event sources.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// The backing system could not be reached or refused the request.
    /// Distinct from a reachable source that matched nothing.
    #[error("Source {source_name} unavailable: {reason}")]
    Unavailable {
        /// Which source.
        source_name: String,
        /// What went wrong.
        reason: String,
    },
    /// The source was configured with unusable settings.
    #[error("Invalid source configuration: {0}")]
    InvalidConfig(String),
}

/// Events produced by one fetch, in source order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceBatch {
    /// Events in order.
    pub events: Vec<ReviewEvent>,
    /// Things the source skipped or could not fetch.
    pub diagnostics: Vec<Diagnostic>,
}

impl SourceBatch {
    /// Create a batch with no diagnostics.
    pub fn new(events: Vec<ReviewEvent>) -> Self {
        Self {
            events,
            diagnostics: Vec::new(),
        }
    }

    /// Whether the source returned no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Fold this batch into an accumulator, source diagnostics first.
    pub fn feed(self, acc: &mut GraphAccumulator) -> Result<(), GraphError> {
        for diagnostic in self.diagnostics {
            acc.push_diagnostic(diagnostic);
        }
        acc.ingest_all(&self.events)
    }
}

/// Trait for review event sources.
///
/// One `fetch` call per run. Implementations return events in a stable
/// order so repeated runs over unchanged data see the same stream.
#[async_trait]
pub trait ReviewEventSource: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &str;

    /// Fetch every event in the configured window.
    async fn fetch(&self) -> Result<SourceBatch, SourceError>;
}

/// Source over events already in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticEventSource {
    events: Vec<ReviewEvent>,
}

impl StaticEventSource {
    /// Wrap a list of events.
    pub fn new(events: Vec<ReviewEvent>) -> Self {
        Self { events }
    }
}

#[async_trait]
impl ReviewEventSource for StaticEventSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch(&self) -> Result<SourceBatch, SourceError> {
        Ok(SourceBatch::new(self.events.clone()))
    }
}
