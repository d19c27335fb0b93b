//! Contributor types for the review graph.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Dense identifier for a contributor within one run.
///
/// Ids are assigned in creation order and index straight into the node
/// table. They are only meaningful for the graph that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContributorId(u32);

impl ContributorId {
    /// Create an id from a raw table index.
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    /// Position of this contributor in the node table.
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ContributorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Role in which an identity was sighted on a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SightingRole {
    /// Owner of the change. Author emails are the most trustworthy.
    Author,
    /// Issued a qualifying approval on the change.
    Reviewer,
}

impl fmt::Display for SightingRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Author => write!(f, "author"),
            Self::Reviewer => write!(f, "reviewer"),
        }
    }
}

/// How contributors are labelled when handed to a renderer.
///
/// Selected once per run. Pseudonymous runs assign every contributor a
/// pseudonym at creation time; the underlying identity is unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    /// Canonical name plus organization (or email domain).
    #[default]
    Real,
    /// Pseudonym only.
    Pseudonymous,
}

impl DisplayMode {
    /// Parse a display mode from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "real" => Some(Self::Real),
            "pseudonymous" | "pseudonyms" | "anonymous" => Some(Self::Pseudonymous),
            _ => None,
        }
    }
}

/// A node in the review graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contributor {
    /// Table id.
    pub id: ContributorId,
    /// Canonical name, the primary lookup key for the run.
    pub name: String,
    /// Best-known email address.
    pub email: String,
    /// Organization, set once on first availability.
    pub affiliation: Option<String>,
    /// Qualifying approvals issued.
    pub review_count: u32,
    /// Changes authored.
    pub patch_count: u32,
    /// Other display names that resolved here through the email index.
    pub aliases: BTreeSet<String>,
    /// Pseudonym, assigned only in pseudonymous runs.
    pub pseudonym: Option<String>,
}

impl Contributor {
    /// Create a contributor with zeroed counters.
    pub fn new(id: ContributorId, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            email: email.into(),
            affiliation: None,
            review_count: 0,
            patch_count: 0,
            aliases: BTreeSet::new(),
            pseudonym: None,
        }
    }

    /// Whether review volume exceeds the core threshold.
    ///
    /// Visible review activity is the only available proxy for seniority,
    /// so this is an approximation.
    pub fn is_core(&self, core_review_threshold: u32) -> bool {
        self.review_count > core_review_threshold
    }

    /// Domain part of the best-known email, if it has one.
    pub fn email_domain(&self) -> Option<&str> {
        email_domain(&self.email)
    }

    /// Organization to display: the affiliation, else the email domain.
    pub fn organization(&self) -> Option<&str> {
        self.affiliation.as_deref().or_else(|| self.email_domain())
    }

    /// Label for a renderer under the given display mode.
    pub fn label(&self, mode: DisplayMode) -> String {
        match (mode, &self.pseudonym) {
            (DisplayMode::Pseudonymous, Some(pseudonym)) => pseudonym.clone(),
            (DisplayMode::Pseudonymous, None) => self.id.to_string(),
            (DisplayMode::Real, _) => match self.organization() {
                Some(org) => format!("{} ({})", self.name, org),
                None => self.name.clone(),
            },
        }
    }
}

/// Extract the domain of an email address.
pub fn email_domain(email: &str) -> Option<&str> {
    email
        .rsplit_once('@')
        .map(|(_, domain)| domain)
        .filter(|domain| !domain.is_empty())
}

/// Normalize an email for index lookups.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_core_is_strict() {
        let mut c = Contributor::new(ContributorId::new(0), "name", "a@example.org");
        c.review_count = 3;
        assert!(!c.is_core(3));
        c.review_count = 4;
        assert!(c.is_core(3));
    }

    #[test]
    fn test_high_volume_reviewer_is_core() {
        let mut c = Contributor::new(ContributorId::new(0), "name", "a@example.org");
        c.review_count = 25;
        assert!(c.is_core(3));
        c.review_count = 1;
        assert!(!c.is_core(3));
    }

    #[test]
    fn test_label_falls_back_to_domain() {
        let c = Contributor::new(ContributorId::new(0), "Jane Doe", "jane@example.org");
        assert_eq!(c.label(DisplayMode::Real), "Jane Doe (example.org)");

        let mut c = c;
        c.affiliation = Some("Acme".to_string());
        assert_eq!(c.label(DisplayMode::Real), "Jane Doe (Acme)");
    }

    #[test]
    fn test_pseudonymous_label_hides_identity() {
        let mut c = Contributor::new(ContributorId::new(7), "Jane Doe", "jane@example.org");
        c.pseudonym = Some("Otto".to_string());
        assert_eq!(c.label(DisplayMode::Pseudonymous), "Otto");
        assert!(!c.label(DisplayMode::Pseudonymous).contains("Jane"));
    }

    #[test]
    fn test_email_domain() {
        assert_eq!(email_domain("a@b.org"), Some("b.org"));
        assert_eq!(email_domain("nobody"), None);
        assert_eq!(email_domain("trailing@"), None);
    }
}
