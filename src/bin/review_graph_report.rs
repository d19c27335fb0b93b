//! Review Graph Report Binary
//!
//! Mines approver → author edges from a repository's git review notes or
//! from a Gerrit server, then prints the strongest edges.
//!
//! ## Configuration
//!
//! Flags, with environment fallbacks:
//! - `--repo` / `REVIEW_GRAPH_REPO`: repository to read `git log` from (default: .)
//! - `--gerrit-url` / `GERRIT_URL`: read from the Gerrit REST API instead
//! - `GERRIT_USERNAME`, `GERRIT_PASSWORD`: optional HTTP credentials
//! - `RUST_LOG`: Log level filter (default: info)
//! - `LOG_FORMAT`: "json" for structured logs, "pretty" for development (default: json)
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin review_graph_report --features cli -- --repo ../nova --top 30
//! cargo run --bin review_graph_report --features cli -- \
//!     --gerrit-url https://review.opendev.org --query 'project:openstack/nova status:merged -age:6mon' \
//!     --min-percent 20 --json report.json
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use review_graph_kernel::{
    AffiliationProvider, AffiliationTable, DisplayMode, FilterPolicyV1, FirstNamePseudonyms,
    GerritConfig, GerritSource, GitLogConfig, GitLogSource, GraphAccumulator, HttpChangeFetcher,
    NoAffiliations, PseudonymGenerator, ReviewEventSource, RunReport, Selection, RECORDS_HEADER,
};

/// Rank approver → author influence in code review history.
#[derive(Debug, Parser)]
#[command(name = "review_graph_report", version)]
struct Args {
    /// Repository with Gerrit review notes fetched into refs/notes/review.
    #[arg(long, env = "REVIEW_GRAPH_REPO", default_value = ".")]
    repo: PathBuf,

    /// Window passed to `git log --since`.
    #[arg(long, default_value = "6.month")]
    since: String,

    /// Gerrit server URL; when set, the REST API is used instead of git.
    #[arg(long, env = "GERRIT_URL")]
    gerrit_url: Option<String>,

    /// Gerrit change query.
    #[arg(long, default_value = "status:merged -age:6mon")]
    query: String,

    /// Gerrit HTTP username.
    #[arg(long, env = "GERRIT_USERNAME")]
    gerrit_username: Option<String>,

    /// Gerrit HTTP password.
    #[arg(long, env = "GERRIT_PASSWORD", hide_env_values = true)]
    gerrit_password: Option<String>,

    /// Concurrent Gerrit detail requests.
    #[arg(long, default_value_t = 4)]
    max_in_flight: usize,

    /// Stackalytics-style affiliation JSON file.
    #[arg(long)]
    affiliations: Option<PathBuf>,

    /// Replace names with pseudonyms.
    #[arg(long)]
    pseudonyms: bool,

    /// Seed for pseudonym assignment; random when absent.
    #[arg(long, requires = "pseudonyms")]
    seed: Option<u64>,

    /// Review count a contributor must exceed to be core.
    #[arg(long, default_value_t = 3)]
    core_threshold: u32,

    /// Minimum authored changes for a non-core author.
    #[arg(long, default_value_t = 10)]
    min_patches: u32,

    /// Edges scoring above this are dropped.
    #[arg(long, default_value_t = 0.99)]
    max_score: f64,

    /// Print the N strongest edges.
    #[arg(long, conflicts_with = "min_percent")]
    top: Option<usize>,

    /// Print every edge scoring above P percent.
    #[arg(long)]
    min_percent: Option<f64>,

    /// Write the full run report as JSON to this path.
    #[arg(long)]
    json: Option<PathBuf>,
}

impl Args {
    fn policy(&self) -> FilterPolicyV1 {
        let selection = match (self.top, self.min_percent) {
            (_, Some(percent)) => Selection::MinPercent { percent },
            (Some(n), None) => Selection::TopN { n },
            (None, None) => Selection::default(),
        };
        let display = if self.pseudonyms {
            DisplayMode::Pseudonymous
        } else {
            DisplayMode::Real
        };
        FilterPolicyV1::new(self.core_threshold, self.min_patches, self.max_score)
            .with_selection(selection)
            .with_display(display)
    }

    fn source(&self) -> Box<dyn ReviewEventSource> {
        match &self.gerrit_url {
            Some(url) => {
                let mut fetcher = HttpChangeFetcher::new(url.as_str());
                if let (Some(user), Some(password)) = (&self.gerrit_username, &self.gerrit_password) {
                    fetcher = fetcher.with_credentials(user.as_str(), password.as_str());
                }
                let config = GerritConfig {
                    query: self.query.clone(),
                    max_in_flight: self.max_in_flight,
                    ..GerritConfig::default()
                };
                Box::new(GerritSource::new(fetcher, config))
            }
            None => Box::new(GitLogSource::new(GitLogConfig {
                repo: self.repo.clone(),
                since: self.since.clone(),
                ..GitLogConfig::default()
            })),
        }
    }
}

/// Initialize the tracing subscriber with JSON or pretty format
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "review_graph_report=info,review_graph_kernel=info".into());

    if log_format == "pretty" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .flatten_event(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let args = Args::parse();
    let policy = args.policy();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        policy = %policy.params_hash(),
        "Starting review graph report"
    );

    let affiliations: Arc<dyn AffiliationProvider> = match &args.affiliations {
        Some(path) => {
            let table = AffiliationTable::from_json(&std::fs::read_to_string(path)?)?;
            info!(
                emails = table.num_emails(),
                domains = table.num_domains(),
                "Affiliation table loaded"
            );
            Arc::new(table)
        }
        None => Arc::new(NoAffiliations),
    };

    let mut acc = match policy.display {
        DisplayMode::Pseudonymous => {
            let generator: Box<dyn PseudonymGenerator> = match args.seed {
                Some(seed) => Box::new(FirstNamePseudonyms::with_seed(seed)),
                None => Box::new(FirstNamePseudonyms::from_entropy()),
            };
            GraphAccumulator::pseudonymous(affiliations, generator)
        }
        DisplayMode::Real => GraphAccumulator::with_affiliations(affiliations),
    };

    let source = args.source();
    let batch = source.fetch().await?;
    if batch.is_empty() {
        tracing::warn!(source = source.name(), "source returned no review events");
    }
    batch.feed(&mut acc)?;

    let report = RunReport::build(acc.finish(), &policy)?;

    println!("{RECORDS_HEADER}");
    for line in report.records() {
        println!("{line}");
    }

    if let Some(path) = &args.json {
        std::fs::write(path, report.to_json()?)?;
        info!(path = %path.display(), run_id = %report.run_id, "Run report written");
    }
    Ok(())
}
