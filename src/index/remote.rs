//! RemoteIndex trait for fetching the list of published Go releases

#[cfg(test)]
use mockall::automock;

use crate::index::error::FetchError;
use crate::index::types::Release;

/// Trait for fetching the published Go releases
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait RemoteIndex: Send + Sync {
    /// Where the releases come from, used in error messages
    fn source_url(&self) -> String;

    /// Fetches all published releases
    ///
    /// # Returns
    /// * `Ok(Vec<Release>)` - Releases, ordered from newest to oldest
    /// * `Err(FetchError)` - If the fetch fails after retries
    async fn fetch_releases(&self) -> Result<Vec<Release>, FetchError>;
}
