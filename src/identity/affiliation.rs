//! Organizational affiliation lookup.
//!
//! The resolver only sees the [`AffiliationProvider`] trait. The bundled
//! [`AffiliationTable`] reads the stackalytics `default_data.json` layout:
//!
//! ```json
//! {
//!   "users": [{ "user_name": "Jane Doe", "emails": ["jane@example.org"],
//!               "companies": [{ "company_name": "Acme", "end_date": null }] }],
//!   "companies": [{ "company_name": "Acme", "domains": ["acme.com"] }]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::normalize_email;

/// Source of organization data for contributors.
pub trait AffiliationProvider: Send + Sync {
    /// Organization for an email, if known.
    fn lookup(&self, email: &str) -> Option<String>;

    /// Organization owning an email domain, if known.
    fn domain_suffix_lookup(&self, domain: &str) -> Option<String>;

    /// Canonical user name for an email, if known.
    fn canonical_name(&self, _email: &str) -> Option<String> {
        None
    }
}

/// Provider that knows nothing. Affiliations fall back to email domains.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAffiliations;

impl AffiliationProvider for NoAffiliations {
    fn lookup(&self, _email: &str) -> Option<String> {
        None
    }

    fn domain_suffix_lookup(&self, _domain: &str) -> Option<String> {
        None
    }
}

/// Error loading an affiliation table.
#[derive(Debug, thiserror::Error)]
pub enum AffiliationError {
    /// The JSON did not match the expected layout.
    #[error("Invalid affiliation data: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Employment record of a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyTenure {
    /// Organization name.
    pub company_name: String,
    /// End of tenure; `None` means current.
    #[serde(default)]
    pub end_date: Option<serde_json::Value>,
}

impl CompanyTenure {
    fn is_current(&self) -> bool {
        matches!(self.end_date, None | Some(serde_json::Value::Null))
    }
}

/// A known user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    /// Canonical user name.
    pub user_name: String,
    /// All emails the user commits with.
    #[serde(default)]
    pub emails: Vec<String>,
    /// Employment history.
    #[serde(default)]
    pub companies: Vec<CompanyTenure>,
}

/// A known organization and its email domains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyRecord {
    /// Organization name.
    pub company_name: String,
    /// Email domains owned by the organization.
    #[serde(default)]
    pub domains: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawTable {
    #[serde(default)]
    users: Vec<UserRecord>,
    #[serde(default)]
    companies: Vec<CompanyRecord>,
}

#[derive(Debug, Clone)]
struct UserEntry {
    user_name: String,
    current_company: Option<String>,
}

/// In-memory affiliation table indexed by email and domain.
#[derive(Debug, Clone, Default)]
pub struct AffiliationTable {
    /// Normalized email -> user.
    users_by_email: BTreeMap<String, UserEntry>,
    /// Lowercased domain -> organization.
    domains: BTreeMap<String, String>,
}

impl AffiliationTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a stackalytics-style JSON document.
    pub fn from_json(json: &str) -> Result<Self, AffiliationError> {
        let raw: RawTable = serde_json::from_str(json)?;
        let mut table = Self::new();
        for user in raw.users {
            table.add_user(user);
        }
        for company in raw.companies {
            for domain in &company.domains {
                table.add_domain(domain, &company.company_name);
            }
        }
        Ok(table)
    }

    /// Register a user. Later registrations of the same email win.
    pub fn add_user(&mut self, user: UserRecord) {
        let current_company = user
            .companies
            .iter()
            .find(|c| c.is_current())
            .map(|c| c.company_name.clone());

        for email in &user.emails {
            self.users_by_email.insert(
                normalize_email(email),
                UserEntry {
                    user_name: user.user_name.clone(),
                    current_company: current_company.clone(),
                },
            );
        }
    }

    /// Register an email domain for an organization.
    pub fn add_domain(&mut self, domain: &str, company: &str) {
        let domain = domain.trim().trim_start_matches('.').to_lowercase();
        if !domain.is_empty() {
            self.domains.insert(domain, company.to_string());
        }
    }

    /// Number of known emails.
    pub fn num_emails(&self) -> usize {
        self.users_by_email.len()
    }

    /// Number of known domains.
    pub fn num_domains(&self) -> usize {
        self.domains.len()
    }
}

impl AffiliationProvider for AffiliationTable {
    fn lookup(&self, email: &str) -> Option<String> {
        self.users_by_email
            .get(&normalize_email(email))
            .and_then(|u| u.current_company.clone())
    }

    /// Longest registered domain equal to `domain` or a dot-suffix of it.
    fn domain_suffix_lookup(&self, domain: &str) -> Option<String> {
        let domain = domain.trim().to_lowercase();
        self.domains
            .iter()
            .filter(|(known, _)| {
                domain == **known
                    || domain
                        .strip_suffix(known.as_str())
                        .is_some_and(|prefix| prefix.ends_with('.'))
            })
            .max_by_key(|(known, _)| known.len())
            .map(|(_, company)| company.clone())
    }

    fn canonical_name(&self, email: &str) -> Option<String> {
        self.users_by_email
            .get(&normalize_email(email))
            .map(|u| u.user_name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "users": [
            {
                "user_name": "Jane Doe",
                "emails": ["Jane@Example.org", "jdoe@acme.com"],
                "companies": [
                    {"company_name": "OldCo", "end_date": "2013-Jan-01"},
                    {"company_name": "Acme", "end_date": null}
                ]
            },
            {
                "user_name": "Free Agent",
                "emails": ["free@agent.net"],
                "companies": [{"company_name": "Gone", "end_date": "2014-Feb-02"}]
            }
        ],
        "companies": [
            {"company_name": "Acme", "domains": ["acme.com"]},
            {"company_name": "Acme Labs", "domains": ["labs.acme.com"]}
        ]
    }"#;

    #[test]
    fn test_lookup_current_company_case_insensitive() {
        let table = AffiliationTable::from_json(SAMPLE).unwrap();
        assert_eq!(table.lookup("jane@example.org"), Some("Acme".to_string()));
        assert_eq!(table.canonical_name("JANE@EXAMPLE.ORG"), Some("Jane Doe".to_string()));
        assert_eq!(table.num_emails(), 3);
    }

    #[test]
    fn test_no_current_company() {
        let table = AffiliationTable::from_json(SAMPLE).unwrap();
        assert_eq!(table.lookup("free@agent.net"), None);
        assert_eq!(table.canonical_name("free@agent.net"), Some("Free Agent".to_string()));
    }

    #[test]
    fn test_domain_suffix_prefers_longest() {
        let table = AffiliationTable::from_json(SAMPLE).unwrap();
        assert_eq!(table.domain_suffix_lookup("acme.com"), Some("Acme".to_string()));
        assert_eq!(table.domain_suffix_lookup("eu.acme.com"), Some("Acme".to_string()));
        assert_eq!(table.domain_suffix_lookup("x.labs.acme.com"), Some("Acme Labs".to_string()));
        assert_eq!(table.domain_suffix_lookup("notacme.com"), None);
    }

    #[test]
    fn test_rejects_bad_json() {
        assert!(AffiliationTable::from_json("{\"users\": 5}").is_err());
    }
}
