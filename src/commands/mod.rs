//! Command implementations behind the `gvm` binary
//!
//! Every command takes a [`Context`] holding the loaded configuration, the
//! registry snapshot and the collaborators needed to reach the network and
//! the system `go`. Commands return data; printing is left to `main`.
//!
//! # Modules
//!
//! - [`install`]: `install`, `use`, `upgrade`
//! - [`query`]: `list`, `list --remote`, `search`, `current`
//! - [`uninstall`]: single and batch uninstall
//! - [`setup`]: `deactivate`, `link`, `pin`, `init`, `config`

pub mod install;
pub mod query;
pub mod setup;
pub mod uninstall;

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::{DOWNLOAD_TIMEOUT_MS, GvmConfig};
use crate::error::GvmError;
use crate::index::cache::{CachedIndex, IndexCache};
use crate::index::go_dev::GoDevIndex;
use crate::index::remote::RemoteIndex;
use crate::index::retry::RetryPolicy;
use crate::toolchain::activation::ActivationEngine;
use crate::toolchain::download::Downloader;
use crate::toolchain::installer::Installer;
use crate::toolchain::link::{GoBinaryProbe, ToolchainProbe};
use crate::toolchain::paths::GvmPaths;
use crate::toolchain::platform::Platform;
use crate::toolchain::registry::Registry;
use crate::version::resolver::Resolver;

pub struct Context {
    pub paths: GvmPaths,
    pub config: GvmConfig,
    pub registry: Registry,
    pub index: Arc<dyn RemoteIndex>,
    pub probe: Arc<dyn ToolchainProbe>,
    pub platform: Platform,
    download_retry: RetryPolicy,
}

impl Context {
    /// Loads configuration and registry from `paths` and wires up the
    /// go.dev index, its SQLite cache and the system `go` probe
    pub fn load(paths: GvmPaths) -> Result<Self, GvmError> {
        let config = GvmConfig::load(&paths.config_file())?;
        let platform = Platform::detect()?;

        let remote = GoDevIndex::new(
            &config.download_source_json,
            Duration::from_millis(config.fetch_timeout_ms),
        )
        .map_err(|e| GvmError::network(&config.download_source_json, e))?;

        let cache = match std::fs::create_dir_all(paths.root())
            .map_err(GvmError::from)
            .and_then(|_| {
                IndexCache::new(&paths.index_db(), config.index_refresh_interval)
                    .map_err(GvmError::from)
            }) {
            Ok(cache) => Some(cache),
            Err(e) => {
                warn!("Index cache unavailable, fetching live: {}", e);
                None
            }
        };
        let index: Arc<dyn RemoteIndex> = Arc::new(CachedIndex::new(Box::new(remote), cache));

        Self::with_parts(paths, config, index, Arc::new(GoBinaryProbe), platform)
    }

    /// Builds a context from explicit collaborators
    pub fn with_parts(
        paths: GvmPaths,
        config: GvmConfig,
        index: Arc<dyn RemoteIndex>,
        probe: Arc<dyn ToolchainProbe>,
        platform: Platform,
    ) -> Result<Self, GvmError> {
        let registry = Registry::load(&paths, Duration::from_millis(config.lock_timeout_ms))?;
        debug!("Context ready for {} at {:?}", platform, paths.root());

        Ok(Self {
            paths,
            config,
            registry,
            index,
            probe,
            platform,
            download_retry: RetryPolicy::default(),
        })
    }

    pub fn with_download_retry(mut self, retry: RetryPolicy) -> Self {
        self.download_retry = retry;
        self
    }

    pub fn resolver(&self) -> Resolver {
        Resolver::new(
            self.index.clone(),
            self.probe.clone(),
            self.platform.clone(),
            self.paths.root().to_path_buf(),
        )
        .prefer_installed(self.config.prefer_installed)
    }

    pub fn installer(&self) -> Result<Installer, GvmError> {
        let downloader = Downloader::new(Duration::from_millis(DOWNLOAD_TIMEOUT_MS))?
            .with_retry(self.download_retry);

        Ok(Installer::new(
            self.paths.clone(),
            self.index.clone(),
            downloader,
            self.platform.clone(),
            &self.config.download_source,
        ))
    }

    pub fn activation(&self) -> ActivationEngine {
        ActivationEngine::new(&self.paths)
    }
}
