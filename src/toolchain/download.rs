//! Archive downloads
//!
//! Archives are streamed to a uniquely named partial file next to the
//! destination and renamed into place once complete, so concurrent installs
//! never share a file and an interrupted download never looks finished.
//! Transient failures are retried with capped exponential backoff.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::StreamExt;
use rand::Rng;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::GvmError;
use crate::index::error::FetchError;
use crate::index::retry::RetryPolicy;

pub struct Downloader {
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl Downloader {
    pub fn new(timeout: Duration) -> Result<Self, GvmError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("gvm/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| GvmError::network("HTTP client", e))?;

        Ok(Self {
            client,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Downloads `url` to `dest`
    pub async fn download(&self, url: &str, dest: &Path) -> Result<(), GvmError> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let partial = partial_path(dest);
        info!("Downloading {}", url);

        let result = self
            .retry
            .run("archive download", || self.download_once(url, &partial))
            .await;

        match result {
            Ok(bytes) => {
                tokio::fs::rename(&partial, dest).await?;
                debug!("Downloaded {} bytes to {:?}", bytes, dest);
                Ok(())
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&partial).await;
                Err(match e {
                    FetchError::Io(io) => GvmError::Io(io),
                    other => GvmError::network(url, other),
                })
            }
        }
    }

    async fn download_once(&self, url: &str, partial: &Path) -> Result<u64, FetchError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(url.to_string()));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited {
                retry_after_secs: None,
            });
        }
        if status.is_server_error() {
            return Err(FetchError::ServerError(status.as_u16()));
        }
        if !status.is_success() {
            return Err(FetchError::InvalidResponse(format!(
                "Unexpected status: {}",
                status
            )));
        }

        let expected_len = response.content_length();
        let mut file = tokio::fs::File::create(partial).await?;
        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;
        }

        file.flush().await?;
        file.sync_all().await?;

        if let Some(expected) = expected_len
            && expected != downloaded
        {
            return Err(FetchError::InvalidResponse(format!(
                "truncated download: {} of {} bytes",
                downloaded, expected
            )));
        }

        Ok(downloaded)
    }
}

/// Unique sibling of `dest` used while the download is in progress
fn partial_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "download".to_string());
    let suffix: u32 = rand::rng().random();
    dest.with_file_name(format!(
        ".{}.{}-{:08x}.part",
        name,
        std::process::id(),
        suffix
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;
    use tempfile::TempDir;

    fn downloader() -> Downloader {
        Downloader::new(Duration::from_secs(5))
            .unwrap()
            .with_retry(RetryPolicy::immediate(3))
    }

    #[test]
    fn partial_path_is_unique_and_hidden() {
        let dest = Path::new("/tmp/downloads/go1.21.0.linux-amd64.tar.gz");

        let a = partial_path(dest);
        let b = partial_path(dest);

        assert_ne!(a, b);
        assert_eq!(a.parent(), dest.parent());
        let name = a.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(".go1.21.0.linux-amd64.tar.gz."));
        assert!(name.ends_with(".part"));
    }

    #[tokio::test]
    async fn download_writes_body_to_destination() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/go1.21.0.linux-amd64.tar.gz")
            .with_status(200)
            .with_body(b"archive bytes")
            .create_async()
            .await;
        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("go1.21.0.linux-amd64.tar.gz");

        downloader()
            .download(&format!("{}/go1.21.0.linux-amd64.tar.gz", server.url()), &dest)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(std::fs::read(&dest).unwrap(), b"archive bytes");
        // Only the finished file remains
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn download_retries_then_reports_network_failure() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/flaky.tar.gz")
            .with_status(502)
            .expect(3)
            .create_async()
            .await;
        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("flaky.tar.gz");

        let result = downloader()
            .download(&format!("{}/flaky.tar.gz", server.url()), &dest)
            .await;

        mock.assert_async().await;
        assert!(matches!(result, Err(GvmError::NetworkFailure { .. })));
        assert!(!dest.exists());
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn download_does_not_retry_missing_archive() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/missing.tar.gz")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;
        let temp_dir = TempDir::new().unwrap();

        let result = downloader()
            .download(
                &format!("{}/missing.tar.gz", server.url()),
                &temp_dir.path().join("missing.tar.gz"),
            )
            .await;

        mock.assert_async().await;
        assert!(matches!(result, Err(GvmError::NetworkFailure { .. })));
    }
}
