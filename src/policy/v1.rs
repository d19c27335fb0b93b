//! FilterPolicyV1: significance thresholds and ranking selection.
//!
//! ## Threshold Defaults
//!
//! The heuristics were tuned by hand against OpenStack review data and
//! the core threshold in particular never settled: it has been used both
//! as `review_count > 3` and with fixtures expecting 25 reviews to be core
//! and 1 not. The defaults below (3 / 10 / 0.99) follow the most widely
//! used variant. Callers analysing projects of a different size should set
//! them explicitly.
//!
//! ## Float Normalization for Deterministic Hashing
//!
//! Floats are quantized to integers before hashing (multiply by 1e6 and
//! round to i64) so `params_hash` does not depend on float formatting.

use serde::{Deserialize, Serialize};
use crate::canonical::canonical_hash_hex;
use crate::types::DisplayMode;
use crate::DEFAULT_POLICY_VERSION;

/// Quantization factor for float normalization.
const FLOAT_QUANTIZATION_FACTOR: f64 = 1_000_000.0;

/// Quantize a float to an i64 for deterministic hashing.
fn quantize_float(value: f64) -> i64 {
    (value * FLOAT_QUANTIZATION_FACTOR).round() as i64
}

/// Which ranked edges are handed to the renderer.
///
/// Exactly one mode is active per invocation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Selection {
    /// The `n` highest-ranked edges.
    TopN {
        /// Number of edges to keep.
        n: usize,
    },
    /// Every edge whose `score * 100` exceeds `percent`.
    MinPercent {
        /// Percentage threshold, exclusive.
        percent: f64,
    },
}

impl Selection {
    /// Whether an edge at `rank` (0-based) with `score` is selected.
    pub fn accepts(&self, rank: usize, score: f64) -> bool {
        match *self {
            Self::TopN { n } => rank < n,
            Self::MinPercent { percent } => score * 100.0 > percent,
        }
    }

    fn to_quantized(self) -> QuantizedSelection {
        match self {
            Self::TopN { n } => QuantizedSelection::TopN { n },
            Self::MinPercent { percent } => QuantizedSelection::MinPercent {
                percent: quantize_float(percent),
            },
        }
    }
}

impl Default for Selection {
    fn default() -> Self {
        Self::TopN { n: 20 }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
enum QuantizedSelection {
    TopN { n: usize },
    MinPercent { percent: i64 },
}

/// Quantized policy parameters for deterministic hashing.
#[derive(Debug, Clone, Serialize)]
struct QuantizedPolicyParams {
    version: String,
    core_review_threshold: u32,
    min_author_patch_count: u32,
    max_edge_score: i64,
    selection: QuantizedSelection,
    display: DisplayMode,
}

/// Filter policy version 1.
///
/// ## Parameters
///
/// - `core_review_threshold`: a contributor is core when `review_count` exceeds this
/// - `min_author_patch_count`: non-core authors need at least this many changes
/// - `max_edge_score`: edges scoring above this are treated as artifacts
/// - `selection`: top-N or minimum-percentage ranking selection
/// - `display`: real or pseudonymous contributor labels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterPolicyV1 {
    /// Policy version identifier.
    pub version: String,
    /// Review count a contributor must exceed to be core.
    pub core_review_threshold: u32,
    /// Minimum authored changes for a non-core author.
    pub min_author_patch_count: u32,
    /// Maximum edge score kept.
    pub max_edge_score: f64,
    /// Ranking selection mode.
    pub selection: Selection,
    /// Contributor display mode.
    pub display: DisplayMode,
}

impl FilterPolicyV1 {
    /// Create a policy with explicit thresholds and default selection.
    pub fn new(core_review_threshold: u32, min_author_patch_count: u32, max_edge_score: f64) -> Self {
        Self {
            core_review_threshold,
            min_author_patch_count,
            max_edge_score: max_edge_score.clamp(0.0, 1.0),
            ..Self::default()
        }
    }

    /// Replace the selection mode.
    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = selection;
        self
    }

    /// Replace the display mode.
    pub fn with_display(mut self, display: DisplayMode) -> Self {
        self.display = display;
        self
    }

    /// Get the policy ID.
    pub fn policy_id(&self) -> &str {
        &self.version
    }

    /// Compute a hash of the policy parameters.
    ///
    /// Uses quantized float representation, so two policies that differ
    /// only below 1e-6 hash the same.
    pub fn params_hash(&self) -> String {
        canonical_hash_hex(&self.to_quantized())
    }

    fn to_quantized(&self) -> QuantizedPolicyParams {
        QuantizedPolicyParams {
            version: self.version.clone(),
            core_review_threshold: self.core_review_threshold,
            min_author_patch_count: self.min_author_patch_count,
            max_edge_score: quantize_float(self.max_edge_score),
            selection: self.selection.to_quantized(),
            display: self.display,
        }
    }
}

impl Default for FilterPolicyV1 {
    fn default() -> Self {
        Self {
            version: DEFAULT_POLICY_VERSION.to_string(),
            core_review_threshold: 3,
            min_author_patch_count: 10,
            max_edge_score: 0.99,
            selection: Selection::default(),
            display: DisplayMode::Real,
        }
    }
}
