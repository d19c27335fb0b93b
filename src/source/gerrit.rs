//! Review events from the Gerrit REST API.
//!
//! ## Flow
//!
//! 1. Page through `GET /changes/?q=<query>&n=<page_size>&S=<start>` until
//!    the last entry stops carrying `_more_changes`
//! 2. Fetch `GET /changes/<id>/detail` for every listed change, at most
//!    `max_in_flight` outstanding
//! 3. Fold the results in listing order
//!
//! Each listed change owns exactly one result slot. Retries overwrite the
//! slot, never append, so a change is counted at most once. A change that
//! 404s or keeps failing becomes a diagnostic and the run continues; only
//! a failing listing makes the whole source unavailable.
//!
//! HTTP lives behind [`ChangeFetcher`] so the engine can be driven by any
//! transport. See `HttpChangeFetcher` (feature `gerrit`).

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::{ReviewEventSource, SourceBatch, SourceError};
use crate::types::{Diagnostic, DiagnosticKind, IdentityDescriptor, ReviewEvent};

/// Prefix Gerrit puts in front of every JSON response.
pub const XSSI_PREFIX: &str = ")]}'";

/// Upper bound on a single retry delay.
const MAX_BACKOFF_MS: u64 = 10_000;

/// Error from a single fetch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Worth retrying: transport failure, 5xx, rate limiting.
    #[error("Transient fetch error: {0}")]
    Transient(String),
    /// Not worth retrying: auth failure, other 4xx.
    #[error("Fetch rejected: {0}")]
    Rejected(String),
    /// The response body could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),
}

impl FetchError {
    /// Whether another attempt may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Result of fetching one change's detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeOutcome {
    /// Raw detail body.
    Found(String),
    /// The server does not know the change.
    NotFound,
}

/// Transport used by [`GerritSource`].
#[async_trait]
pub trait ChangeFetcher: Send + Sync {
    /// Raw body of one listing page.
    async fn list_changes(&self, query: &str, start: usize, limit: usize) -> Result<String, FetchError>;

    /// Raw body of one change detail.
    async fn fetch_change(&self, change: &str) -> Result<ChangeOutcome, FetchError>;
}

/// Settings for [`GerritSource`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GerritConfig {
    /// Change query, as typed into the Gerrit search box.
    pub query: String,
    /// Changes per listing page.
    pub page_size: usize,
    /// Detail requests outstanding at once.
    pub max_in_flight: usize,
    /// Extra attempts after a transient failure.
    pub max_retries: u32,
    /// First retry delay; doubles on each retry.
    pub retry_backoff_ms: u64,
    /// Label whose votes count as approvals.
    pub approval_label: String,
    /// Vote value that counts as an approval.
    pub approval_value: i32,
}

impl Default for GerritConfig {
    fn default() -> Self {
        Self {
            query: "status:merged -age:6mon".to_string(),
            page_size: 100,
            max_in_flight: 4,
            max_retries: 3,
            retry_backoff_ms: 500,
            approval_label: "Code-Review".to_string(),
            approval_value: 2,
        }
    }
}

impl GerritConfig {
    fn backoff(&self, attempt: u32) -> Duration {
        let ms = self
            .retry_backoff_ms
            .saturating_mul(1u64 << attempt.min(16))
            .min(MAX_BACKOFF_MS);
        Duration::from_millis(ms)
    }
}

/// Strip the XSSI guard line from a Gerrit response body.
pub fn strip_xssi_prefix(body: &str) -> &str {
    let trimmed = body.trim_start();
    trimmed.strip_prefix(XSSI_PREFIX).unwrap_or(trimmed)
}

/// One entry of a listing page.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChangeSummary {
    /// Gerrit change id triplet.
    pub id: String,
    /// Numeric change number, when present.
    #[serde(rename = "_number", default)]
    pub number: Option<u64>,
    #[serde(rename = "_more_changes", default)]
    more_changes: bool,
}

impl ChangeSummary {
    /// Reference used for detail requests and diagnostics.
    pub fn key(&self) -> String {
        match self.number {
            Some(n) => n.to_string(),
            None => self.id.clone(),
        }
    }
}

/// One decoded listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangePage {
    /// Changes on the page.
    pub changes: Vec<ChangeSummary>,
    /// Whether another page follows.
    pub more: bool,
}

/// Decode a listing page body.
pub fn parse_change_page(body: &str) -> Result<ChangePage, FetchError> {
    let changes: Vec<ChangeSummary> = serde_json::from_str(strip_xssi_prefix(body))
        .map_err(|e| FetchError::Decode(e.to_string()))?;
    let more = changes.last().is_some_and(|c| c.more_changes);
    Ok(ChangePage { changes, more })
}

#[derive(Debug, Default, Deserialize)]
struct AccountInfo {
    name: Option<String>,
    email: Option<String>,
    username: Option<String>,
}

impl AccountInfo {
    fn descriptor(&self) -> IdentityDescriptor {
        let name = self.name.as_ref().or(self.username.as_ref()).cloned().unwrap_or_default();
        IdentityDescriptor::new(name, self.email.clone().unwrap_or_default())
    }
}

#[derive(Debug, Deserialize)]
struct ApprovalInfo {
    #[serde(flatten)]
    account: AccountInfo,
    value: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
struct LabelInfo {
    #[serde(default)]
    all: Vec<ApprovalInfo>,
}

#[derive(Debug, Deserialize)]
struct ChangeDetail {
    id: String,
    #[serde(rename = "_number", default)]
    number: Option<u64>,
    owner: Option<AccountInfo>,
    #[serde(default)]
    labels: BTreeMap<String, LabelInfo>,
}

/// Decode a change detail body into an event.
///
/// The owner is the author; every vote on the configured label with the
/// configured value is an approver, in the order Gerrit lists them.
pub fn parse_change_detail(body: &str, config: &GerritConfig) -> Result<ReviewEvent, FetchError> {
    let detail: ChangeDetail = serde_json::from_str(strip_xssi_prefix(body))
        .map_err(|e| FetchError::Decode(e.to_string()))?;

    let approvers = detail
        .labels
        .get(&config.approval_label)
        .map(|label| {
            label
                .all
                .iter()
                .filter(|a| a.value == Some(config.approval_value))
                .map(|a| a.account.descriptor())
                .collect()
        })
        .unwrap_or_default();

    Ok(ReviewEvent {
        change: Some(detail.number.map(|n| n.to_string()).unwrap_or(detail.id)),
        author: detail.owner.as_ref().map(AccountInfo::descriptor),
        approvers,
    })
}

/// Event source over a Gerrit server.
pub struct GerritSource<F> {
    fetcher: Arc<F>,
    config: GerritConfig,
}

impl<F: ChangeFetcher + 'static> GerritSource<F> {
    /// Create a source.
    pub fn new(fetcher: F, config: GerritConfig) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            config,
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &GerritConfig {
        &self.config
    }

    fn unavailable(&self, reason: impl Into<String>) -> SourceError {
        SourceError::Unavailable {
            source_name: self.name().to_string(),
            reason: reason.into(),
        }
    }

    /// List every change matching the query.
    pub async fn list_all(&self) -> Result<Vec<ChangeSummary>, SourceError> {
        if self.config.page_size == 0 {
            return Err(SourceError::InvalidConfig("page_size must be positive".to_string()));
        }

        let mut all = Vec::new();
        loop {
            let start = all.len();
            let mut attempt = 0;
            let body = loop {
                match self
                    .fetcher
                    .list_changes(&self.config.query, start, self.config.page_size)
                    .await
                {
                    Ok(body) => break body,
                    Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                        tracing::debug!(start, attempt, error = %e, "retrying change listing");
                        tokio::time::sleep(self.config.backoff(attempt)).await;
                        attempt += 1;
                    }
                    Err(e) => return Err(self.unavailable(format!("listing at {start} failed: {e}"))),
                }
            };
            let page = parse_change_page(&body)
                .map_err(|e| self.unavailable(format!("listing at {start} failed: {e}")))?;

            let done = !page.more || page.changes.is_empty();
            all.extend(page.changes);
            if done {
                break;
            }
        }
        tracing::debug!(query = %self.config.query, changes = all.len(), "changes listed");
        Ok(all)
    }

    async fn fetch_details(&self, changes: &[ChangeSummary]) -> Vec<Option<(Result<ChangeOutcome, FetchError>, u32)>> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_in_flight.max(1)));
        let mut join_set = JoinSet::new();

        for (index, change) in changes.iter().enumerate() {
            let fetcher = Arc::clone(&self.fetcher);
            let semaphore = Arc::clone(&semaphore);
            let config = self.config.clone();
            let key = change.key();

            join_set.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (index, Err(FetchError::Transient("fetch pool closed".to_string())), 0);
                };
                let (result, attempts) = fetch_with_retries(fetcher.as_ref(), &key, &config).await;
                (index, result, attempts)
            });
        }

        let mut slots: Vec<Option<(Result<ChangeOutcome, FetchError>, u32)>> = vec![None; changes.len()];
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, result, attempts)) => slots[index] = Some((result, attempts)),
                Err(e) => tracing::error!(error = %e, "change fetch task failed"),
            }
        }
        slots
    }
}

async fn fetch_with_retries<F: ChangeFetcher + ?Sized>(
    fetcher: &F,
    change: &str,
    config: &GerritConfig,
) -> (Result<ChangeOutcome, FetchError>, u32) {
    let mut attempt = 0;
    loop {
        let result = fetcher.fetch_change(change).await;
        match result {
            Err(ref e) if e.is_transient() && attempt < config.max_retries => {
                tracing::debug!(change, attempt, error = %e, "retrying change fetch");
                tokio::time::sleep(config.backoff(attempt)).await;
                attempt += 1;
            }
            _ => return (result, attempt + 1),
        }
    }
}

#[async_trait]
impl<F: ChangeFetcher + 'static> ReviewEventSource for GerritSource<F> {
    fn name(&self) -> &str {
        "gerrit"
    }

    async fn fetch(&self) -> Result<SourceBatch, SourceError> {
        let changes = self.list_all().await?;
        let slots = self.fetch_details(&changes).await;

        let mut batch = SourceBatch::default();
        for (change, slot) in changes.iter().zip(slots) {
            let key = change.key();
            let kind = match slot {
                Some((Ok(ChangeOutcome::Found(body)), attempts)) => {
                    match parse_change_detail(&body, &self.config) {
                        Ok(event) => {
                            batch.events.push(event);
                            continue;
                        }
                        Err(e) => DiagnosticKind::FetchFailed {
                            message: e.to_string(),
                            attempts,
                        },
                    }
                }
                Some((Ok(ChangeOutcome::NotFound), _)) => DiagnosticKind::ChangeNotFound,
                Some((Err(e), attempts)) => DiagnosticKind::FetchFailed {
                    message: e.to_string(),
                    attempts,
                },
                None => DiagnosticKind::FetchFailed {
                    message: "fetch task did not complete".to_string(),
                    attempts: 0,
                },
            };
            batch.diagnostics.push(Diagnostic::new(None, Some(key), kind));
        }

        tracing::info!(
            changes = changes.len(),
            events = batch.events.len(),
            degraded = batch.diagnostics.len(),
            "gerrit changes fetched"
        );
        Ok(batch)
    }
}
