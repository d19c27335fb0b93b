//! Core types for the review graph kernel.

pub mod contributor;
pub mod edge;
pub mod event;
pub mod diagnostic;

pub use contributor::{Contributor, ContributorId, DisplayMode, SightingRole, email_domain, normalize_email};
pub use edge::{EdgeKey, ReviewEdge};
pub use event::{EventError, IdentityDescriptor, ReviewEvent};
pub use diagnostic::{Diagnostic, DiagnosticKind, Severity};
