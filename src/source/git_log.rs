//! Review events from `git log` with Gerrit review notes.
//!
//! Gerrit can publish review metadata as git notes under
//! `refs/notes/review`. With those fetched, `git log --notes=refs/notes/review`
//! prints a block like this after each commit message:
//!
//! ```text
//! Notes (review):
//!     Code-Review+2: Jane Doe <jane@example.org>
//!     Workflow+1: Jane Doe <jane@example.org>
//!     Submitted-by: Jenkins <jenkins@review.openstack.org>
//! ```
//!
//! Only `Code-Review+2` lines count as approvals, and only below the notes
//! marker, so a commit message quoting one is ignored.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;

use super::{ReviewEventSource, SourceBatch, SourceError};
use crate::types::{IdentityDescriptor, ReviewEvent};

const COMMIT_PREFIX: &str = "commit ";
const AUTHOR_PREFIX: &str = "Author: ";
const NOTES_MARKER: &str = "Notes (review):";
const APPROVAL_MARKER: &str = "Code-Review+2: ";

/// Parse `git log --notes` output into events, one per commit.
///
/// A commit without a parseable `Author:` line yields an event with no
/// author; an approval line without a parseable identity yields an
/// approver with no email. The accumulator skips both with a diagnostic.
pub fn parse_git_log(text: &str) -> Vec<ReviewEvent> {
    let mut events = Vec::new();
    let mut current: Option<ReviewEvent> = None;
    let mut in_notes = false;

    for line in text.lines() {
        if let Some(sha) = line.strip_prefix(COMMIT_PREFIX) {
            events.extend(current.take());
            let sha = sha.split_whitespace().next().unwrap_or_default();
            current = Some(ReviewEvent {
                change: Some(sha.to_string()),
                author: None,
                approvers: Vec::new(),
            });
            in_notes = false;
            continue;
        }

        // Output that does not start with a commit header is ignored.
        let Some(event) = current.as_mut() else {
            continue;
        };

        if line.trim() == NOTES_MARKER {
            in_notes = true;
        } else if in_notes {
            if let Some((_, who)) = line.split_once(APPROVAL_MARKER) {
                let approver = IdentityDescriptor::parse(who)
                    .unwrap_or_else(|| IdentityDescriptor::new(who.trim(), ""));
                event.approvers.push(approver);
            }
        } else if event.author.is_none() {
            if let Some(who) = line.strip_prefix(AUTHOR_PREFIX) {
                event.author = IdentityDescriptor::parse(who);
            }
        }
    }
    events.extend(current);
    events
}

/// Settings for [`GitLogSource`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitLogConfig {
    /// Repository working directory.
    pub repo: PathBuf,
    /// Value passed to `--since`.
    pub since: String,
    /// Notes ref holding review metadata.
    pub notes_ref: String,
}

impl Default for GitLogConfig {
    fn default() -> Self {
        Self {
            repo: PathBuf::from("."),
            since: "6.month".to_string(),
            notes_ref: "refs/notes/review".to_string(),
        }
    }
}

/// Runs `git log` in a repository and parses its review notes.
#[derive(Debug, Clone)]
pub struct GitLogSource {
    config: GitLogConfig,
}

impl GitLogSource {
    /// Create a source for a repository.
    pub fn new(config: GitLogConfig) -> Self {
        Self { config }
    }

    /// Get the configuration.
    pub fn config(&self) -> &GitLogConfig {
        &self.config
    }

    fn unavailable(&self, reason: impl Into<String>) -> SourceError {
        SourceError::Unavailable {
            source_name: self.name().to_string(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl ReviewEventSource for GitLogSource {
    fn name(&self) -> &str {
        "git_log"
    }

    async fn fetch(&self) -> Result<SourceBatch, SourceError> {
        let output = Command::new("git")
            .arg("log")
            .arg(format!("--notes={}", self.config.notes_ref))
            .arg("--no-merges")
            .arg(format!("--since={}", self.config.since))
            .current_dir(&self.config.repo)
            .output()
            .await
            .map_err(|e| self.unavailable(format!("failed to run git: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(self.unavailable(format!(
                "git log exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout);
        let events = parse_git_log(&text);
        tracing::info!(
            repo = %self.config.repo.display(),
            since = %self.config.since,
            commits = events.len(),
            "git log parsed"
        );
        Ok(SourceBatch::new(events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOG: &str = "\
commit 1111111111111111111111111111111111111111
Author: Alice Smith <alice@example.org>
Date:   Mon Mar 3 10:00:00 2014 +0000

    Fix the thing

    Code-Review+2: Not Counted <quoted@example.org>

Notes (review):
    Code-Review+2: Rob Reviewer <rob@example.org>
    Code-Review+2: Sue Reviewer <sue@example.org>
    Workflow+1: Rob Reviewer <rob@example.org>
    Verified+2: Jenkins <jenkins@example.org>

commit 2222222222222222222222222222222222222222
Author: Bob Jones <bob@example.org>
Date:   Tue Mar 4 10:00:00 2014 +0000

    Trivial change
";

    #[test]
    fn test_parse_commits_and_approvals() {
        let events = parse_git_log(LOG);
        assert_eq!(events.len(), 2);

        let first = &events[0];
        assert_eq!(first.change.as_deref(), Some("1111111111111111111111111111111111111111"));
        assert_eq!(first.author.as_ref().unwrap().email, "alice@example.org");
        let approvers: Vec<_> = first.approvers.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(approvers, vec!["Rob Reviewer", "Sue Reviewer"]);

        assert_eq!(events[1].author.as_ref().unwrap().name, "Bob Jones");
        assert!(events[1].approvers.is_empty());
    }

    #[test]
    fn test_missing_author_yields_headless_event() {
        let events = parse_git_log("commit abc\nDate: today\n\nNotes (review):\n    Code-Review+2: R <r@x.org>\n");
        assert_eq!(events.len(), 1);
        assert!(events[0].author.is_none());
        assert!(events[0].validate().is_err());
    }

    #[test]
    fn test_unparseable_approver_invalidates_event() {
        let events = parse_git_log(
            "commit abc\nAuthor: A <a@x.org>\n\nNotes (review):\n    Code-Review+2: somebody\n",
        );
        assert_eq!(events[0].approvers.len(), 1);
        assert!(events[0].validate().is_err());
    }

    #[test]
    fn test_empty_output() {
        assert!(parse_git_log("").is_empty());
    }

    #[tokio::test]
    async fn test_missing_repo_is_unavailable() {
        let source = GitLogSource::new(GitLogConfig {
            repo: PathBuf::from("/nonexistent/review-graph-kernel-test"),
            ..GitLogConfig::default()
        });
        let err = source.fetch().await.unwrap_err();
        assert!(matches!(err, SourceError::Unavailable { .. }));
    }
}
