//! Review graph accumulation.
//!
//! Drains review events into the node and edge tables.
//!
//! ## Algorithm
//!
//! For each event:
//! 1. Validate; a malformed event is recorded as a diagnostic and skipped whole
//! 2. Resolve the author (author role), `patch_count += 1`
//! 3. For each approver: resolve (reviewer role), `review_count += 1`,
//!    edge (approver → author) `count += 1`
//!
//! Counts do not depend on event order. Which display name becomes
//! canonical can: when one person appears under several names and the
//! affiliation provider knows none of their emails, the first name seen
//! wins and the rest become aliases. Self-approvals are counted here and
//! removed by the filter so raw counts stay inspectable.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{GraphError, ReviewGraph};
use crate::identity::{
    AffiliationProvider, IdentityResolver, NoAffiliations, PseudonymGenerator,
};
use crate::types::{Diagnostic, DiagnosticKind, ReviewEvent, SightingRole};

/// Counters describing one accumulation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccumulationSummary {
    /// Events offered to the accumulator.
    pub events_seen: usize,
    /// Events that were counted.
    pub events_accumulated: usize,
    /// Events skipped as malformed.
    pub events_skipped: usize,
    /// Qualifying approvals counted.
    pub approvals: u64,
}

/// Builds a [`ReviewGraph`] from a stream of review events.
///
/// Owns everything a single run mutates: the tables, the identity indexes,
/// the pseudonym generator and the diagnostics.
#[derive(Debug)]
pub struct GraphAccumulator {
    graph: ReviewGraph,
    resolver: IdentityResolver,
    diagnostics: Vec<Diagnostic>,
    summary: AccumulationSummary,
}

impl GraphAccumulator {
    /// Create an accumulator using the given resolver.
    pub fn new(resolver: IdentityResolver) -> Self {
        Self {
            graph: ReviewGraph::new(),
            resolver,
            diagnostics: Vec::new(),
            summary: AccumulationSummary::default(),
        }
    }

    /// Create an accumulator with real names and the given affiliations.
    pub fn with_affiliations(affiliations: Arc<dyn AffiliationProvider>) -> Self {
        Self::new(IdentityResolver::new(affiliations))
    }

    /// Create an accumulator whose contributors get pseudonyms.
    pub fn pseudonymous(
        affiliations: Arc<dyn AffiliationProvider>,
        generator: Box<dyn PseudonymGenerator>,
    ) -> Self {
        Self::new(IdentityResolver::pseudonymous(affiliations, generator))
    }

    /// Accumulate one event.
    ///
    /// Returns `Ok(false)` when the event was skipped as malformed. An
    /// `Err` means the tables themselves are broken.
    pub fn ingest(&mut self, event: &ReviewEvent) -> Result<bool, GraphError> {
        let index = self.summary.events_seen;
        self.summary.events_seen += 1;

        let author = match event.validate() {
            Ok(author) => author,
            Err(error) => {
                self.summary.events_skipped += 1;
                self.record(index, event, DiagnosticKind::MalformedEvent { error });
                return Ok(false);
            }
        };

        let resolved = self.resolver.resolve(&mut self.graph, author, SightingRole::Author)?;
        if let Some(conflict) = resolved.conflict {
            self.record(index, event, conflict);
        }
        self.graph.record_patch(resolved.id)?;

        for approver in &event.approvers {
            let reviewer = self.resolver.resolve(&mut self.graph, approver, SightingRole::Reviewer)?;
            self.graph.record_approval(reviewer.id, resolved.id)?;
            self.summary.approvals += 1;
        }

        tracing::debug!(
            event_index = index,
            change = ?event.change,
            author = %resolved.id,
            approvers = event.approvers.len(),
            "event accumulated"
        );
        self.summary.events_accumulated += 1;
        Ok(true)
    }

    /// Accumulate every event in order.
    pub fn ingest_all<'a, I>(&mut self, events: I) -> Result<(), GraphError>
    where
        I: IntoIterator<Item = &'a ReviewEvent>,
    {
        for event in events {
            self.ingest(event)?;
        }
        Ok(())
    }

    /// Keep a diagnostic produced outside accumulation, e.g. by a source.
    pub fn push_diagnostic(&mut self, diagnostic: Diagnostic) {
        diagnostic.log();
        self.diagnostics.push(diagnostic);
    }

    /// Tables built so far.
    pub fn graph(&self) -> &ReviewGraph {
        &self.graph
    }

    /// Diagnostics recorded so far.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Counters so far.
    pub fn summary(&self) -> AccumulationSummary {
        self.summary
    }

    /// The resolver (and its indexes).
    pub fn resolver(&self) -> &IdentityResolver {
        &self.resolver
    }

    /// Finish the run and hand over the accumulated graph.
    pub fn finish(self) -> AccumulatedGraph {
        tracing::info!(
            events = self.summary.events_seen,
            skipped = self.summary.events_skipped,
            contributors = self.graph.num_contributors(),
            edges = self.graph.num_edges(),
            diagnostics = self.diagnostics.len(),
            "accumulation complete"
        );
        AccumulatedGraph {
            graph: self.graph,
            diagnostics: self.diagnostics,
            summary: self.summary,
            display: self.resolver.display_mode(),
        }
    }

    fn record(&mut self, index: usize, event: &ReviewEvent, kind: DiagnosticKind) {
        self.push_diagnostic(Diagnostic::new(Some(index), event.change.clone(), kind));
    }
}

impl Default for GraphAccumulator {
    fn default() -> Self {
        Self::with_affiliations(Arc::new(NoAffiliations))
    }
}

/// Output of a finished accumulation run.
#[derive(Debug, Clone)]
pub struct AccumulatedGraph {
    /// Node and edge tables.
    pub graph: ReviewGraph,
    /// Everything skipped or degraded along the way.
    pub diagnostics: Vec<Diagnostic>,
    /// Run counters.
    pub summary: AccumulationSummary,
    /// Display mode the contributors were created under.
    pub display: crate::types::DisplayMode,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EventError, IdentityDescriptor};

    fn who(name: &str) -> IdentityDescriptor {
        IdentityDescriptor::new(name, format!("{}@x.org", name.to_lowercase()))
    }

    fn event(author: &str, approvers: &[&str]) -> ReviewEvent {
        ReviewEvent::new(who(author), approvers.iter().map(|a| who(a)).collect())
    }

    #[test]
    fn test_counts_patches_and_reviews() {
        let mut acc = GraphAccumulator::default();
        acc.ingest_all(&[
            event("A", &["R", "R", "R", "R"]),
            event("A", &["R"]),
            event("B", &[]),
        ])
        .unwrap();

        let out = acc.finish();
        let g = &out.graph;
        let a = g.find_by_name("A").unwrap();
        let r = g.find_by_name("R").unwrap();
        let b = g.find_by_name("B").unwrap();

        assert_eq!(a.patch_count, 2);
        assert_eq!(b.patch_count, 1);
        assert_eq!(r.review_count, 5);
        assert_eq!(r.patch_count, 0);
        assert_eq!(g.edge_count(r.id, a.id), Some(5));
        assert_eq!(g.num_edges(), 1);
        assert_eq!(out.summary.approvals, 5);
        assert!(g.check_consistency().is_ok());
    }

    #[test]
    fn test_malformed_event_skipped_with_diagnostic() {
        let mut acc = GraphAccumulator::default();
        let headless = ReviewEvent {
            change: Some("deadbeef".to_string()),
            author: None,
            approvers: vec![who("R")],
        };
        let bad_approver = ReviewEvent::new(who("A"), vec![IdentityDescriptor::new("R", "")]);

        assert!(!acc.ingest(&headless).unwrap());
        assert!(!acc.ingest(&bad_approver).unwrap());
        assert!(acc.ingest(&event("A", &["R"])).unwrap());

        let out = acc.finish();
        assert_eq!(out.summary.events_skipped, 2);
        assert_eq!(out.summary.events_accumulated, 1);
        assert_eq!(out.diagnostics.len(), 2);
        assert_eq!(out.diagnostics[0].change.as_deref(), Some("deadbeef"));
        assert_eq!(
            out.diagnostics[0].kind,
            DiagnosticKind::MalformedEvent { error: EventError::MissingAuthor }
        );
        // The skipped events left no trace in the counts
        let a = out.graph.find_by_name("A").unwrap();
        assert_eq!(a.patch_count, 1);
    }

    #[test]
    fn test_self_approval_is_kept() {
        let mut acc = GraphAccumulator::default();
        acc.ingest(&event("A", &["A"])).unwrap();
        let g = acc.graph();
        let a = g.find_by_name("A").unwrap();
        assert_eq!(g.edge_count(a.id, a.id), Some(1));
    }

    #[test]
    fn test_counts_independent_of_order() {
        let events = vec![
            event("A", &["R", "S"]),
            event("B", &["R"]),
            event("A", &["S"]),
        ];
        let mut forward = GraphAccumulator::default();
        forward.ingest_all(&events).unwrap();
        let mut backward = GraphAccumulator::default();
        backward.ingest_all(events.iter().rev()).unwrap();

        let f = forward.graph();
        let b = backward.graph();
        for c in f.contributors() {
            let other = b.find_by_name(&c.name).unwrap();
            assert_eq!(c.review_count, other.review_count);
            assert_eq!(c.patch_count, other.patch_count);
        }
        assert_eq!(f.num_edges(), b.num_edges());
    }
}
