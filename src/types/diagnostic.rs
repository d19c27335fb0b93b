//! Diagnostics recorded while building a review graph.
//!
//! Nothing recorded here aborts a run. Skipped events, identity conflicts
//! and degraded fetches are kept as data so callers can inspect how much
//! of the source actually made it into the graph.
//!
//! | Kind | Severity | Effect |
//! |------|----------|--------|
//! | MalformedEvent | MEDIUM | event skipped |
//! | EmailConflict | LOW | author email not overwritten |
//! | ChangeNotFound | LOW | change skipped |
//! | FetchFailed | HIGH | change skipped after retries |

use serde::{Deserialize, Serialize};

use super::event::EventError;

/// Severity levels for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    /// Expected noise in real review data.
    Low,
    /// Data was dropped.
    Medium,
    /// The source degraded; results are incomplete.
    High,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
        }
    }
}

/// What went wrong.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// The event failed validation and was skipped.
    MalformedEvent {
        /// Validation failure.
        error: EventError,
    },
    /// An author sighting carried an email already owned by another
    /// contributor, so it was not recorded on this one.
    EmailConflict {
        /// Contributor the sighting resolved to.
        contributor: String,
        /// Contributor that owns the email.
        owner: String,
        /// The contested email.
        email: String,
    },
    /// The review tool reported the change as missing.
    ChangeNotFound,
    /// The change could not be fetched.
    FetchFailed {
        /// Transport or decode failure.
        message: String,
        /// Attempts made, including the first.
        attempts: u32,
    },
}

impl DiagnosticKind {
    /// Severity of this kind.
    pub fn severity(&self) -> Severity {
        match self {
            Self::MalformedEvent { .. } => Severity::Medium,
            Self::EmailConflict { .. } | Self::ChangeNotFound => Severity::Low,
            Self::FetchFailed { .. } => Severity::High,
        }
    }

    /// Short snake_case name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::MalformedEvent { .. } => "malformed_event",
            Self::EmailConflict { .. } => "email_conflict",
            Self::ChangeNotFound => "change_not_found",
            Self::FetchFailed { .. } => "fetch_failed",
        }
    }
}

/// A recorded diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Position of the event in the stream, when known.
    pub event_index: Option<usize>,
    /// Change reference, when known.
    pub change: Option<String>,
    /// What went wrong.
    pub kind: DiagnosticKind,
}

impl Diagnostic {
    /// Create a diagnostic.
    pub fn new(event_index: Option<usize>, change: Option<String>, kind: DiagnosticKind) -> Self {
        Self {
            event_index,
            change,
            kind,
        }
    }

    /// Severity of this diagnostic.
    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }

    /// Log this diagnostic as a structured event.
    pub fn log(&self) {
        tracing::warn!(
            diagnostic = self.kind.name(),
            severity = %self.severity(),
            event_index = ?self.event_index,
            change = ?self.change,
            detail = ?self.kind,
            "review data diagnostic"
        );
    }
}
