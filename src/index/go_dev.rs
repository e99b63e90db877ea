//! go.dev download index implementation

use std::time::Duration;

use tracing::{debug, warn};

use crate::index::error::FetchError;
use crate::index::remote::RemoteIndex;
use crate::index::retry::RetryPolicy;
use crate::index::types::{RawRelease, Release};

/// RemoteIndex backed by the JSON listing of a Go download site
pub struct GoDevIndex {
    client: reqwest::Client,
    url: String,
    retry: RetryPolicy,
}

impl GoDevIndex {
    /// Creates a GoDevIndex reading the listing at `url`
    pub fn new(url: &str, timeout: Duration) -> Result<Self, FetchError> {
        Ok(Self {
            client: reqwest::Client::builder()
                .user_agent(concat!("gvm/", env!("CARGO_PKG_VERSION")))
                .timeout(timeout)
                .build()?,
            url: url.to_string(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn fetch_once(&self) -> Result<Vec<Release>, FetchError> {
        let response = self.client.get(&self.url).send().await?;

        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(self.url.clone()));
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok());
            return Err(FetchError::RateLimited { retry_after_secs });
        }

        if status.is_server_error() {
            return Err(FetchError::ServerError(status.as_u16()));
        }

        if !status.is_success() {
            warn!("Release index returned status {}: {}", status, self.url);
            return Err(FetchError::InvalidResponse(format!(
                "Unexpected status: {}",
                status
            )));
        }

        let body = response.text().await?;

        let raw: Vec<RawRelease> = serde_json::from_str(&body).map_err(|e| {
            warn!("Failed to parse release index: {}", e);
            FetchError::InvalidResponse(e.to_string())
        })?;

        let releases = Release::from_raw(raw);
        debug!("Fetched {} releases from {}", releases.len(), self.url);
        Ok(releases)
    }
}

#[async_trait::async_trait]
impl RemoteIndex for GoDevIndex {
    fn source_url(&self) -> String {
        self.url.clone()
    }

    async fn fetch_releases(&self) -> Result<Vec<Release>, FetchError> {
        self.retry
            .run("release index fetch", || self.fetch_once())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    const BODY: &str = r#"[
        {"version": "go1.21.1", "stable": true, "files": [
            {"filename": "go1.21.1.linux-amd64.tar.gz", "os": "linux", "arch": "amd64",
             "version": "go1.21.1", "sha256": "abc", "size": 1, "kind": "archive"}]},
        {"version": "go1.21.0", "stable": true, "files": []}
    ]"#;

    fn index(server: &Server) -> GoDevIndex {
        GoDevIndex::new(
            &format!("{}/dl/index.json", server.url()),
            Duration::from_secs(5),
        )
        .unwrap()
        .with_retry(RetryPolicy::immediate(3))
    }

    #[tokio::test]
    async fn fetch_releases_parses_listing() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/dl/index.json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(BODY)
            .create_async()
            .await;

        let releases = index(&server).fetch_releases().await.unwrap();

        mock.assert_async().await;
        assert_eq!(releases.len(), 2);
        assert_eq!(releases[0].version.to_string(), "1.21.1");
        assert_eq!(releases[0].files[0].sha256, "abc");
    }

    #[tokio::test]
    async fn fetch_releases_returns_not_found_without_retrying() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/dl/index.json")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        let result = index(&server).fetch_releases().await;

        mock.assert_async().await;
        assert!(matches!(result, Err(FetchError::NotFound(_))));
    }

    #[tokio::test]
    async fn fetch_releases_retries_server_errors() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/dl/index.json")
            .with_status(503)
            .expect(3)
            .create_async()
            .await;

        let result = index(&server).fetch_releases().await;

        mock.assert_async().await;
        assert!(matches!(result, Err(FetchError::ServerError(503))));
    }

    #[tokio::test]
    async fn fetch_releases_reports_invalid_json() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/dl/index.json")
            .with_status(200)
            .with_body("<html>maintenance</html>")
            .create_async()
            .await;

        let result = index(&server).fetch_releases().await;

        mock.assert_async().await;
        assert!(matches!(result, Err(FetchError::InvalidResponse(_))));
    }
}
