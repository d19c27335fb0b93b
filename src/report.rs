//! Run report: the ranked graph packaged with everything needed to
//! reproduce and audit it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::filter::{FilterEngine, FilterError, FilteredGraph};
use crate::graph::{AccumulatedGraph, GraphError};
use crate::policy::FilterPolicyV1;
use crate::ranking::{rank, RankedGraph};
use crate::types::Diagnostic;
use crate::GRAPH_SCHEMA_VERSION;

/// Error building a report.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// Scoring hit inconsistent tables.
    #[error("Filter error: {0}")]
    Filter(#[from] FilterError),
    /// Ranking referenced a missing contributor.
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),
    /// Report serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Summary counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Events offered to the accumulator.
    pub events: usize,
    /// Events skipped as malformed.
    pub skipped_events: usize,
    /// Contributors resolved.
    pub contributors: usize,
    /// Edges after accumulation.
    pub raw_edges: usize,
    /// Edges surviving the filter.
    pub filtered_edges: usize,
    /// Edges selected by ranking.
    pub ranked_edges: usize,
    /// Diagnostics recorded (source + accumulation).
    pub diagnostics: usize,
}

/// Everything one run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Unique identifier for this run.
    pub run_id: Uuid,
    /// Schema version.
    pub version: String,
    /// When the report was built.
    pub generated_at: DateTime<Utc>,
    /// Policy version identifier.
    pub policy_id: String,
    /// Policy params hash.
    pub policy_params_hash: String,
    /// Full policy.
    pub policy: FilterPolicyV1,
    /// Hash of the ranked edges and nodes.
    pub graph_hash: String,
    /// Counters.
    pub stats: RunStats,
    /// Selected edges and nodes.
    pub ranked: RankedGraph,
    /// Everything skipped or degraded.
    pub diagnostics: Vec<Diagnostic>,
}

impl RunReport {
    /// Filter and rank an accumulated graph under `policy`.
    ///
    /// The display mode comes from the accumulation, since pseudonyms are
    /// only assigned when contributors are created.
    pub fn build(accumulated: AccumulatedGraph, policy: &FilterPolicyV1) -> Result<Self, ReportError> {
        if accumulated.display != policy.display {
            tracing::warn!(
                accumulated = ?accumulated.display,
                requested = ?policy.display,
                "display mode differs from accumulation; using accumulation mode"
            );
        }

        let filtered = FilterEngine::new(policy.clone()).apply(&accumulated.graph)?;
        let ranked = rank(
            &filtered,
            &accumulated.graph,
            policy.selection,
            accumulated.display,
            policy.core_review_threshold,
        )?;
        Ok(Self::assemble(accumulated, &filtered, ranked, policy))
    }

    fn assemble(
        accumulated: AccumulatedGraph,
        filtered: &FilteredGraph,
        ranked: RankedGraph,
        policy: &FilterPolicyV1,
    ) -> Self {
        let stats = RunStats {
            events: accumulated.summary.events_seen,
            skipped_events: accumulated.summary.events_skipped,
            contributors: accumulated.graph.num_contributors(),
            raw_edges: accumulated.graph.num_edges(),
            filtered_edges: filtered.len(),
            ranked_edges: ranked.len(),
            diagnostics: accumulated.diagnostics.len(),
        };

        let report = Self {
            run_id: Uuid::new_v4(),
            version: GRAPH_SCHEMA_VERSION.to_string(),
            generated_at: Utc::now(),
            policy_id: policy.policy_id().to_string(),
            policy_params_hash: policy.params_hash(),
            policy: policy.clone(),
            graph_hash: ranked.graph_hash.clone(),
            stats,
            ranked,
            diagnostics: accumulated.diagnostics,
        };
        tracing::info!(
            run_id = %report.run_id,
            graph_hash = %report.graph_hash,
            raw_edges = stats.raw_edges,
            filtered_edges = stats.filtered_edges,
            ranked_edges = stats.ranked_edges,
            "run report built"
        );
        report
    }

    /// Printable record lines.
    pub fn records(&self) -> Vec<String> {
        self.ranked.records()
    }

    /// Pretty JSON rendering.
    pub fn to_json(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
