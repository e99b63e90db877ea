//! Toolchain Fetcher/Installer
//!
//! ```text
//! index lookup ─▶ download (partial ─▶ archive) ─▶ sha256 ─▶ extract to .staging-*
//!                                                                │
//!                      registry lock ◀───────────────────────────┘
//!                      ├─ .staging-* renamed to go<version> (or go<version>-<token> on reinstall)
//!                      ├─ registry entry recorded, goroot re-pointed if the version is active
//!                      └─ previous directory deleted after commit
//! ```
//!
//! The toolchain directory appears under its final name only once it is
//! complete, and the registry entry is written only after that. A forced
//! reinstall extracts next to the registered directory, so an active
//! `goroot` always resolves to a complete SDK. A process killed mid-install
//! leaves at most a `.staging-*` directory, removed by a later install once it
//! is older than an hour, or an unregistered final directory, replaced by the
//! next install of that version.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::Utc;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::config::{STALE_STAGING_SECS, archive_url};
use crate::error::GvmError;
use crate::index::remote::RemoteIndex;
use crate::index::types::find_archive;
use crate::toolchain::activation::ActivationEngine;
use crate::toolchain::archive::extract_archive;
use crate::toolchain::download::Downloader;
use crate::toolchain::paths::{GvmPaths, STAGING_PREFIX};
use crate::toolchain::platform::Platform;
use crate::toolchain::registry::{InstalledToolchain, Origin, Registry};
use crate::toolchain::verify::verify_checksum;
use crate::version::Version;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstallOptions {
    /// Reinstall even if the version is already registered
    pub force: bool,
}

/// Result of a successful uninstall
#[derive(Debug)]
pub struct Uninstalled {
    pub toolchain: InstalledToolchain,
    /// Set when the registry entry was removed but its directory was not
    pub warning: Option<GvmError>,
}

pub struct Installer {
    paths: GvmPaths,
    index: Arc<dyn RemoteIndex>,
    downloader: Downloader,
    platform: Platform,
    download_source: String,
}

impl Installer {
    pub fn new(
        paths: GvmPaths,
        index: Arc<dyn RemoteIndex>,
        downloader: Downloader,
        platform: Platform,
        download_source: &str,
    ) -> Self {
        Self {
            paths,
            index,
            downloader,
            platform,
            download_source: download_source.to_string(),
        }
    }

    pub async fn install(
        &self,
        registry: &mut Registry,
        version: &Version,
        options: InstallOptions,
    ) -> Result<InstalledToolchain, GvmError> {
        if registry.contains(version) && !options.force {
            return Err(GvmError::AlreadyInstalled {
                version: version.clone(),
            });
        }

        self.paths.ensure_dirs()?;
        self.cleanup_stale();

        let releases = self
            .index
            .fetch_releases()
            .await
            .map_err(|e| GvmError::network(self.index.source_url(), e))?;
        let file = find_archive(&releases, version, &self.platform).ok_or_else(|| {
            GvmError::NoMatchingVersion {
                specifier: format!("{} ({})", version, self.platform),
            }
        })?;

        let token = unique_token();
        let archive = self
            .paths
            .downloads_dir()
            .join(format!("{}-{}", token, file.filename));
        let staging = self
            .paths
            .toolchains_dir()
            .join(format!("{}{}-{}", STAGING_PREFIX, version, token));

        let result = self
            .fetch_and_commit(
                registry,
                version,
                options,
                &file.filename,
                &file.sha256,
                &archive,
                &staging,
            )
            .await;

        remove_file_quietly(&archive);
        if staging.exists() {
            remove_dir_quietly(&staging);
        }

        result
    }

    #[allow(clippy::too_many_arguments)]
    async fn fetch_and_commit(
        &self,
        registry: &mut Registry,
        version: &Version,
        options: InstallOptions,
        filename: &str,
        sha256: &str,
        archive: &Path,
        staging: &Path,
    ) -> Result<InstalledToolchain, GvmError> {
        let url = archive_url(&self.download_source, filename);
        self.downloader.download(&url, archive).await?;

        let checksum = verify_checksum(archive, version, sha256)?;
        debug!("Checksum verified for go{}", version);

        let (archive_owned, staging_owned) = (archive.to_path_buf(), staging.to_path_buf());
        tokio::task::spawn_blocking(move || extract_archive(&archive_owned, &staging_owned))
            .await
            .map_err(|e| GvmError::Io(std::io::Error::other(e)))??;

        let go_binary = staging.join("bin").join(self.platform.go_binary());
        if !go_binary.is_file() {
            return Err(GvmError::Archive {
                path: archive.to_path_buf(),
                reason: format!("archive does not contain bin/{}", self.platform.go_binary()),
            });
        }

        let final_dir = self.paths.toolchain_dir(version);
        // Reinstalls never touch the registered directory until the new one is committed
        let sibling = self
            .paths
            .toolchains_dir()
            .join(format!("{}-{}", version.dir_name(), unique_token()));
        let activation = ActivationEngine::new(&self.paths);
        let mut placed: Option<PathBuf> = None;
        let mut repointed = false;

        let committed = registry.transaction(|state| {
            let previous = state.get(version).cloned();
            if previous.is_some() && !options.force {
                return Err(GvmError::AlreadyInstalled {
                    version: version.clone(),
                });
            }

            let target = match &previous {
                Some(p) if p.location == final_dir => sibling.clone(),
                _ => {
                    if final_dir.exists() {
                        warn!("Removing unregistered directory {:?}", final_dir);
                        std::fs::remove_dir_all(&final_dir)?;
                    }
                    final_dir.clone()
                }
            };

            std::fs::rename(staging, &target)?;
            placed = Some(target.clone());

            let toolchain = InstalledToolchain {
                version: version.clone(),
                location: target,
                checksum: checksum.clone(),
                installed_at: Utc::now(),
                origin: Origin::Downloaded,
            };
            state.insert(toolchain.clone())?;

            if state.active() == Some(version) {
                activation.swap_link(&toolchain.location)?;
                repointed = true;
            }

            Ok((toolchain, previous))
        });

        match committed {
            Ok((toolchain, previous)) => {
                if let Some(previous) = previous
                    && previous.location != toolchain.location
                    && self.owns(&previous)
                {
                    remove_dir_quietly(&previous.location);
                }
                info!("Installed go{} into {:?}", version, toolchain.location);
                Ok(toolchain)
            }
            Err(e) => {
                // Nothing was committed: the registry still names the previous directory
                if repointed && let Ok(previous) = registry.get(version) {
                    let _ = activation.swap_link(&previous.location);
                }
                if let Some(placed) = placed {
                    remove_dir_quietly(&placed);
                }
                Err(e)
            }
        }
    }

    // Downloaded toolchains living under `toolchains/` are ours to delete
    fn owns(&self, toolchain: &InstalledToolchain) -> bool {
        toolchain.origin == Origin::Downloaded
            && toolchain.location.starts_with(self.paths.toolchains_dir())
    }

    /// Removes `version` from the registry, then deletes its directory.
    ///
    /// Linked SDKs are only unregistered.
    pub fn uninstall(
        &self,
        registry: &mut Registry,
        version: &Version,
    ) -> Result<Uninstalled, GvmError> {
        let toolchain = registry.remove(version)?;

        if toolchain.origin == Origin::Linked {
            info!("Unlinked go{} (left {:?} in place)", version, toolchain.location);
            return Ok(Uninstalled {
                toolchain,
                warning: None,
            });
        }

        if !self.owns(&toolchain) {
            warn!(
                "Not deleting {:?}: outside of {:?}",
                toolchain.location,
                self.paths.toolchains_dir()
            );
            return Ok(Uninstalled {
                toolchain,
                warning: None,
            });
        }

        let warning = match std::fs::remove_dir_all(&toolchain.location) {
            Ok(()) => None,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!("Failed to delete {:?}: {}", toolchain.location, e);
                Some(GvmError::CleanupFailed {
                    version: version.clone(),
                    path: toolchain.location.clone(),
                    reason: e.to_string(),
                })
            }
        };

        info!("Uninstalled go{}", version);
        Ok(Uninstalled { toolchain, warning })
    }

    /// Removes staging and partial download leftovers of killed installs
    pub fn cleanup_stale(&self) -> usize {
        let max_age = Duration::from_secs(STALE_STAGING_SECS);
        let mut removed = 0;

        for dir in [self.paths.toolchains_dir(), self.paths.downloads_dir()] {
            let Ok(entries) = std::fs::read_dir(&dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let name = entry.file_name().to_string_lossy().into_owned();
                let leftover = name.starts_with(STAGING_PREFIX) || name.ends_with(".part");
                if !leftover || !is_older_than(&entry.path(), max_age) {
                    continue;
                }

                let path = entry.path();
                let result = if path.is_dir() {
                    std::fs::remove_dir_all(&path)
                } else {
                    std::fs::remove_file(&path)
                };
                match result {
                    Ok(()) => {
                        debug!("Removed stale {:?}", path);
                        removed += 1;
                    }
                    Err(e) => warn!("Failed to remove stale {:?}: {}", path, e),
                }
            }
        }

        removed
    }
}

fn is_older_than(path: &Path, max_age: Duration) -> bool {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|age| age > max_age)
}

/// `<pid>-<random>`: unique per process and per call
fn unique_token() -> String {
    format!("{}-{:08x}", std::process::id(), rand::rng().random::<u32>())
}

fn remove_file_quietly(path: &Path) {
    if let Err(e) = std::fs::remove_file(path)
        && e.kind() != std::io::ErrorKind::NotFound
    {
        warn!("Failed to remove {:?}: {}", path, e);
    }
}

fn remove_dir_quietly(path: &Path) {
    if let Err(e) = std::fs::remove_dir_all(path)
        && e.kind() != std::io::ErrorKind::NotFound
    {
        warn!("Failed to remove {:?}: {}", path, e);
    }
}
