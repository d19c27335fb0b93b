//! Identity resolution.
//!
//! Maps raw (display-name, email) sightings to canonical contributors.
//!
//! ## Lookup Order
//!
//! 1. Exact canonical-name match.
//! 2. Case-insensitive email match (same person, different display name).
//! 3. Otherwise a new contributor is created.
//!
//! ## Index Invariant
//!
//! The resolver keeps two indexes over the node table, name → id and
//! email → id, and updates both in the same call. An email is owned by
//! exactly one contributor for the whole run, and a contributor's `email`
//! field is always an email it owns, so no two contributors ever carry
//! the same resolved email.

pub mod affiliation;
pub mod pseudonym;

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::graph::{GraphError, ReviewGraph};
use crate::types::{
    email_domain, normalize_email, ContributorId, DiagnosticKind, DisplayMode,
    IdentityDescriptor, SightingRole,
};

pub use affiliation::{AffiliationError, AffiliationProvider, AffiliationTable, NoAffiliations};
pub use pseudonym::{FirstNamePseudonyms, PseudonymGenerator, SequentialPseudonyms};

/// Result of resolving one sighting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Contributor the sighting resolved to.
    pub id: ContributorId,
    /// Whether the contributor was created by this sighting.
    pub created: bool,
    /// Set when an author email could not be recorded because another
    /// contributor owns it.
    pub conflict: Option<DiagnosticKind>,
}

/// Resolver holding the name and email indexes for one run.
pub struct IdentityResolver {
    by_name: BTreeMap<String, ContributorId>,
    by_email: BTreeMap<String, ContributorId>,
    affiliations: Arc<dyn AffiliationProvider>,
    display: DisplayMode,
    pseudonyms: Option<Box<dyn PseudonymGenerator>>,
}

impl IdentityResolver {
    /// Create a resolver for real-name display.
    pub fn new(affiliations: Arc<dyn AffiliationProvider>) -> Self {
        Self {
            by_name: BTreeMap::new(),
            by_email: BTreeMap::new(),
            affiliations,
            display: DisplayMode::Real,
            pseudonyms: None,
        }
    }

    /// Create a resolver for pseudonymous display.
    ///
    /// Every contributor gets a pseudonym from `generator` when created.
    pub fn pseudonymous(
        affiliations: Arc<dyn AffiliationProvider>,
        generator: Box<dyn PseudonymGenerator>,
    ) -> Self {
        Self {
            display: DisplayMode::Pseudonymous,
            pseudonyms: Some(generator),
            ..Self::new(affiliations)
        }
    }

    /// Display mode of this run.
    pub fn display_mode(&self) -> DisplayMode {
        self.display
    }

    /// Contributor owning an email, if any.
    pub fn lookup_email(&self, email: &str) -> Option<ContributorId> {
        self.by_email.get(&normalize_email(email)).copied()
    }

    /// Contributor with a canonical name, if any.
    pub fn lookup_name(&self, name: &str) -> Option<ContributorId> {
        self.by_name.get(name).copied()
    }

    /// Number of indexed emails.
    pub fn num_emails(&self) -> usize {
        self.by_email.len()
    }

    /// Resolve a sighting against the node table of `graph`.
    ///
    /// The descriptor must already be validated.
    pub fn resolve(
        &mut self,
        graph: &mut ReviewGraph,
        descriptor: &IdentityDescriptor,
        role: SightingRole,
    ) -> Result<Resolution, GraphError> {
        let email = descriptor.email.trim();
        let email_key = normalize_email(email);
        let name = self
            .affiliations
            .canonical_name(email)
            .unwrap_or_else(|| descriptor.display_name().to_string());
        let organization = self.affiliations.lookup(email).or_else(|| {
            email_domain(email).and_then(|domain| self.affiliations.domain_suffix_lookup(domain))
        });

        let named = self.by_name.get(&name).copied();
        let mailed = self.by_email.get(&email_key).copied();
        let (id, created) = match (named, mailed) {
            (Some(id), _) => (id, false),
            (None, Some(id)) => {
                graph.contributor_mut(id)?.aliases.insert(name.clone());
                (id, false)
            }
            (None, None) => {
                let id = graph.push_contributor(name.clone(), email);
                if let Some(generator) = self.pseudonyms.as_mut() {
                    graph.contributor_mut(id)?.pseudonym = Some(generator.next_pseudonym());
                }
                self.by_name.insert(name.clone(), id);
                tracing::debug!(contributor = %id, name = %name, "new contributor");
                (id, true)
            }
        };

        // Claim the email for this contributor unless someone else owns it.
        let owner = *self.by_email.entry(email_key).or_insert(id);
        let conflict = if owner == id {
            if role == SightingRole::Author {
                graph.contributor_mut(id)?.email = email.to_string();
            }
            None
        } else if role == SightingRole::Author {
            Some(DiagnosticKind::EmailConflict {
                contributor: graph.require(id)?.name.clone(),
                owner: graph.require(owner)?.name.clone(),
                email: email.to_string(),
            })
        } else {
            None
        };

        let contributor = graph.contributor_mut(id)?;
        if contributor.affiliation.is_none() {
            contributor.affiliation = organization;
        }

        Ok(Resolution {
            id,
            created,
            conflict,
        })
    }
}

impl std::fmt::Debug for IdentityResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityResolver")
            .field("names", &self.by_name.len())
            .field("emails", &self.by_email.len())
            .field("display", &self.display)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> IdentityResolver {
        IdentityResolver::new(Arc::new(NoAffiliations))
    }

    fn id(name: &str, email: &str) -> IdentityDescriptor {
        IdentityDescriptor::new(name, email)
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let mut graph = ReviewGraph::new();
        let mut r = resolver();

        let first = r.resolve(&mut graph, &id("Jane", "jane@x.org"), SightingRole::Reviewer).unwrap();
        let second = r.resolve(&mut graph, &id("Jane", "jane@x.org"), SightingRole::Reviewer).unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.id, second.id);
        assert_eq!(graph.num_contributors(), 1);
    }

    #[test]
    fn test_email_fallback_merges_display_names() {
        let mut graph = ReviewGraph::new();
        let mut r = resolver();

        let a = r.resolve(&mut graph, &id("Jane Doe", "jane@x.org"), SightingRole::Author).unwrap();
        let b = r.resolve(&mut graph, &id("J. Doe", "JANE@x.org"), SightingRole::Reviewer).unwrap();

        assert_eq!(a.id, b.id);
        let jane = graph.contributor(a.id).unwrap();
        assert_eq!(jane.name, "Jane Doe");
        assert!(jane.aliases.contains("J. Doe"));
    }

    #[test]
    fn test_author_email_overwrites_reviewer_does_not() {
        let mut graph = ReviewGraph::new();
        let mut r = resolver();

        let jane = r.resolve(&mut graph, &id("Jane", "old@x.org"), SightingRole::Reviewer).unwrap().id;
        r.resolve(&mut graph, &id("Jane", "other@x.org"), SightingRole::Reviewer).unwrap();
        assert_eq!(graph.contributor(jane).unwrap().email, "old@x.org");

        r.resolve(&mut graph, &id("Jane", "new@x.org"), SightingRole::Author).unwrap();
        assert_eq!(graph.contributor(jane).unwrap().email, "new@x.org");

        // Every email she was seen with now resolves to her
        assert_eq!(r.lookup_email("other@x.org"), Some(jane));
        assert_eq!(r.lookup_email("old@x.org"), Some(jane));
    }

    #[test]
    fn test_author_email_owned_by_other_is_a_conflict() {
        let mut graph = ReviewGraph::new();
        let mut r = resolver();

        let bob = r.resolve(&mut graph, &id("Bob", "bob@x.org"), SightingRole::Author).unwrap().id;
        let robert = r.resolve(&mut graph, &id("Robert", "robert@x.org"), SightingRole::Author).unwrap().id;

        let res = r.resolve(&mut graph, &id("Bob", "robert@x.org"), SightingRole::Author).unwrap();
        assert_eq!(res.id, bob);
        assert!(matches!(res.conflict, Some(DiagnosticKind::EmailConflict { .. })));

        // Emails stay unique across contributors
        assert_eq!(graph.contributor(bob).unwrap().email, "bob@x.org");
        assert_eq!(graph.contributor(robert).unwrap().email, "robert@x.org");
    }

    #[test]
    fn test_affiliation_first_non_null_wins() {
        let mut table = AffiliationTable::new();
        table.add_domain("acme.com", "Acme");
        table.add_domain("initech.com", "Initech");
        let mut graph = ReviewGraph::new();
        let mut r = IdentityResolver::new(Arc::new(table));

        let jane = r.resolve(&mut graph, &id("Jane", "jane@gmail.com"), SightingRole::Author).unwrap().id;
        assert_eq!(graph.contributor(jane).unwrap().affiliation, None);

        r.resolve(&mut graph, &id("Jane", "jane@acme.com"), SightingRole::Reviewer).unwrap();
        assert_eq!(graph.contributor(jane).unwrap().affiliation.as_deref(), Some("Acme"));

        r.resolve(&mut graph, &id("Jane", "jane@initech.com"), SightingRole::Author).unwrap();
        assert_eq!(graph.contributor(jane).unwrap().affiliation.as_deref(), Some("Acme"));
    }

    #[test]
    fn test_canonical_name_from_provider() {
        let table = AffiliationTable::from_json(
            r#"{"users": [{"user_name": "Jane Doe", "emails": ["jd@x.org"], "companies": []}]}"#,
        )
        .unwrap();
        let mut graph = ReviewGraph::new();
        let mut r = IdentityResolver::new(Arc::new(table));

        let a = r.resolve(&mut graph, &id("jdoe", "jd@x.org"), SightingRole::Author).unwrap();
        assert_eq!(graph.contributor(a.id).unwrap().name, "Jane Doe");
        assert_eq!(r.lookup_name("Jane Doe"), Some(a.id));
    }

    #[test]
    fn test_pseudonyms_assigned_on_creation() {
        let mut graph = ReviewGraph::new();
        let mut r = IdentityResolver::pseudonymous(
            Arc::new(NoAffiliations),
            Box::new(SequentialPseudonyms::new("dev")),
        );

        let a = r.resolve(&mut graph, &id("A", "a@x.org"), SightingRole::Author).unwrap().id;
        let b = r.resolve(&mut graph, &id("B", "b@x.org"), SightingRole::Author).unwrap().id;
        r.resolve(&mut graph, &id("A", "a@x.org"), SightingRole::Reviewer).unwrap();

        assert_eq!(graph.contributor(a).unwrap().pseudonym.as_deref(), Some("dev-1"));
        assert_eq!(graph.contributor(b).unwrap().pseudonym.as_deref(), Some("dev-2"));
        assert_eq!(r.display_mode(), DisplayMode::Pseudonymous);
    }
}
