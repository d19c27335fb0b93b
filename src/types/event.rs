//! Review events produced by event sources.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

use regex_lite::Regex;

use super::contributor::{email_domain, SightingRole};

/// `Display Name <email>` with the name optional.
const IDENTITY_PATTERN: &str = r"^\s*(.*?)\s*<([^<>\s]*)>\s*$";

fn identity_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(IDENTITY_PATTERN).ok()).as_ref()
}

/// Raw (display-name, email) pair as sighted on one change.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentityDescriptor {
    /// Display name as written by the source.
    pub name: String,
    /// Email as written by the source.
    pub email: String,
}

impl IdentityDescriptor {
    /// Create a descriptor.
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// Parse `Display Name <email>`.
    ///
    /// Returns `None` when the text has no bracketed email.
    pub fn parse(text: &str) -> Option<Self> {
        let caps = identity_regex()?.captures(text)?;
        let name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        let email = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
        Some(Self::new(name, email))
    }

    /// Check the descriptor is usable for identity resolution.
    pub fn validate(&self, role: SightingRole) -> Result<(), EventError> {
        if self.email.trim().is_empty() {
            return Err(EventError::MissingEmail {
                role,
                name: self.name.clone(),
            });
        }
        if email_domain(self.email.trim()).is_none() {
            return Err(EventError::InvalidEmail {
                role,
                email: self.email.clone(),
            });
        }
        Ok(())
    }

    /// Display name, or the email local part when the name is blank.
    pub fn display_name(&self) -> &str {
        let name = self.name.trim();
        if !name.is_empty() {
            return name;
        }
        let email = self.email.trim();
        email.split_once('@').map(|(local, _)| local).unwrap_or(email)
    }
}

impl fmt::Display for IdentityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

/// One reviewed change reduced to its author and qualifying approvers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewEvent {
    /// Commit sha or review-tool change number, for diagnostics.
    pub change: Option<String>,
    /// Author of the change. `None` when the source could not find one.
    pub author: Option<IdentityDescriptor>,
    /// Approvers in source order. May be empty.
    pub approvers: Vec<IdentityDescriptor>,
}

impl ReviewEvent {
    /// Create an event with a known author.
    pub fn new(author: IdentityDescriptor, approvers: Vec<IdentityDescriptor>) -> Self {
        Self {
            change: None,
            author: Some(author),
            approvers,
        }
    }

    /// Attach a change reference.
    pub fn with_change(mut self, change: impl Into<String>) -> Self {
        self.change = Some(change.into());
        self
    }

    /// Validate the event before it is accumulated.
    ///
    /// Any invalid identity rejects the whole event so that no partial
    /// counts are recorded for it.
    pub fn validate(&self) -> Result<&IdentityDescriptor, EventError> {
        let author = self.author.as_ref().ok_or(EventError::MissingAuthor)?;
        author.validate(SightingRole::Author)?;
        for approver in &self.approvers {
            approver.validate(SightingRole::Reviewer)?;
        }
        Ok(author)
    }
}

/// Why an event could not be accumulated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventError {
    /// No author was found for the change.
    #[error("event has no author")]
    MissingAuthor,
    /// An identity had no email.
    #[error("{role} identity '{name}' has no email")]
    MissingEmail {
        /// Role of the bad identity.
        role: SightingRole,
        /// Display name that was sighted.
        name: String,
    },
    /// An identity had an email without a domain.
    #[error("{role} identity has malformed email '{email}'")]
    InvalidEmail {
        /// Role of the bad identity.
        role: SightingRole,
        /// Email that was sighted.
        email: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_identity() {
        let id = IdentityDescriptor::parse("Jane Q. Doe <jane@example.org>").unwrap();
        assert_eq!(id.name, "Jane Q. Doe");
        assert_eq!(id.email, "jane@example.org");

        let bare = IdentityDescriptor::parse("<bot@ci.example.org>").unwrap();
        assert_eq!(bare.name, "");
        assert_eq!(bare.display_name(), "bot");

        assert!(IdentityDescriptor::parse("Jane Doe").is_none());
    }

    #[test]
    fn test_validate_event() {
        let ok = ReviewEvent::new(IdentityDescriptor::new("A", "a@x.org"), vec![]);
        assert!(ok.validate().is_ok());

        let no_author = ReviewEvent {
            change: None,
            author: None,
            approvers: vec![],
        };
        assert_eq!(no_author.validate().unwrap_err(), EventError::MissingAuthor);

        let bad_approver = ReviewEvent::new(
            IdentityDescriptor::new("A", "a@x.org"),
            vec![IdentityDescriptor::new("R", "not-an-email")],
        );
        assert!(matches!(
            bad_approver.validate(),
            Err(EventError::InvalidEmail { role: SightingRole::Reviewer, .. })
        ));
    }
}
