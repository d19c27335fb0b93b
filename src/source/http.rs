//! reqwest transport for [`GerritSource`](super::GerritSource).

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use super::gerrit::{ChangeFetcher, ChangeOutcome, FetchError};

/// Gerrit REST client.
pub struct HttpChangeFetcher {
    http: Client,
    base_url: String,
    credentials: Option<(String, String)>,
}

impl HttpChangeFetcher {
    /// Anonymous client for a Gerrit server, e.g. `https://review.opendev.org`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials: None,
        }
    }

    /// Authenticate with an HTTP password.
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }

    fn api_url(&self, path: &str) -> String {
        // Authenticated endpoints live under /a/
        match self.credentials {
            Some(_) => format!("{}/a{}", self.base_url, path),
            None => format!("{}{}", self.base_url, path),
        }
    }

    async fn get(&self, url: String, query: &[(&str, String)]) -> Result<reqwest::Response, FetchError> {
        let mut request = self.http.get(url).query(query);
        if let Some((user, password)) = &self.credentials {
            request = request.basic_auth(user, Some(password));
        }
        request
            .send()
            .await
            .map_err(|e| FetchError::Transient(e.to_string()))
    }

    async fn handle_response(&self, response: reqwest::Response) -> Result<String, FetchError> {
        let status = response.status();
        if status.is_success() {
            response
                .text()
                .await
                .map_err(|e| FetchError::Transient(e.to_string()))
        } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            Err(FetchError::Transient(format!("HTTP {status}")))
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(FetchError::Rejected(format!("HTTP {status}: {}", message.trim())))
        }
    }
}

/// Encode a change reference for use as one path segment.
fn encode_segment(change: &str) -> String {
    change.replace('%', "%25").replace('/', "%2F")
}

#[async_trait]
impl ChangeFetcher for HttpChangeFetcher {
    async fn list_changes(&self, query: &str, start: usize, limit: usize) -> Result<String, FetchError> {
        let response = self
            .get(
                self.api_url("/changes/"),
                &[
                    ("q", query.to_string()),
                    ("n", limit.to_string()),
                    ("S", start.to_string()),
                ],
            )
            .await?;
        self.handle_response(response).await
    }

    async fn fetch_change(&self, change: &str) -> Result<ChangeOutcome, FetchError> {
        let url = self.api_url(&format!("/changes/{}/detail", encode_segment(change)));
        let response = self.get(url, &[]).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(ChangeOutcome::NotFound);
        }
        self.handle_response(response).await.map(ChangeOutcome::Found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_url() {
        let anon = HttpChangeFetcher::new("https://review.example.org/");
        assert_eq!(anon.api_url("/changes/"), "https://review.example.org/changes/");
        let authed = anon.with_credentials("bot", "secret");
        assert_eq!(authed.api_url("/changes/1/detail"), "https://review.example.org/a/changes/1/detail");
    }

    #[test]
    fn test_encode_segment() {
        assert_eq!(encode_segment("openstack/nova~master~I12"), "openstack%2Fnova~master~I12");
        assert_eq!(encode_segment("42"), "42");
    }
}
