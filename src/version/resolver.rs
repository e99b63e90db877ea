//! Resolver: turns a `VersionSpecifier` into a concrete `Version`
//!
//! Candidates come from the registry (installed toolchains) and the remote
//! index (releases with an archive for this platform). Among candidates of
//! equal precedence the installed one wins.

use std::cmp::Ordering;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::GvmError;
use crate::index::remote::RemoteIndex;
use crate::toolchain::link::ToolchainProbe;
use crate::toolchain::platform::Platform;
use crate::toolchain::registry::Registry;
use crate::version::Version;
use crate::version::pin::PinReader;
use crate::version::specifier::VersionSpecifier;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub version: Version,
    /// Whether the registry already holds this version
    pub installed: bool,
    /// GOROOT of a system SDK, for `system` resolutions
    pub source: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Candidate {
    version: Version,
    installed: bool,
}

pub struct Resolver {
    index: Arc<dyn RemoteIndex>,
    probe: Arc<dyn ToolchainProbe>,
    platform: Platform,
    pins: PinReader,
    /// Satisfy ranges from installed toolchains before asking the index
    prefer_installed: bool,
    /// gvm home; a `go` found below it is not a system SDK
    activation_dir: PathBuf,
}

impl Resolver {
    pub fn new(
        index: Arc<dyn RemoteIndex>,
        probe: Arc<dyn ToolchainProbe>,
        platform: Platform,
        activation_dir: PathBuf,
    ) -> Self {
        Self {
            index,
            probe,
            platform,
            pins: PinReader::new(),
            prefer_installed: true,
            activation_dir,
        }
    }

    pub fn prefer_installed(mut self, prefer_installed: bool) -> Self {
        self.prefer_installed = prefer_installed;
        self
    }

    pub async fn resolve(
        &self,
        specifier: &VersionSpecifier,
        registry: &Registry,
    ) -> Result<Resolution, GvmError> {
        let VersionSpecifier::Pinned(dir) = specifier else {
            return self.resolve_direct(specifier, registry).await;
        };

        let pin = self.pins.find(dir)?;
        debug!("Pin {:?} requests {}", pin.path, pin.specifier);

        self.resolve_direct(&pin.specifier, registry)
            .await
            .map_err(|e| match e {
                GvmError::NoMatchingVersion { specifier } => GvmError::NoMatchingVersion {
                    specifier: format!("{} (pinned in {})", specifier, pin.path.display()),
                },
                other => other,
            })
    }

    async fn resolve_direct(
        &self,
        specifier: &VersionSpecifier,
        registry: &Registry,
    ) -> Result<Resolution, GvmError> {
        match specifier {
            VersionSpecifier::Exact(version) => Ok(Resolution {
                version: version.clone(),
                installed: registry.contains(version),
                source: None,
            }),
            VersionSpecifier::System => self.resolve_system(registry),
            VersionSpecifier::Pinned(dir) => Err(GvmError::InvalidPin {
                path: dir.clone(),
                reason: "a pin cannot refer to another pin".to_string(),
            }),
            VersionSpecifier::Constraint(_) | VersionSpecifier::Latest | VersionSpecifier::Stable => {
                self.resolve_candidates(specifier, registry).await
            }
        }
    }

    fn resolve_system(&self, registry: &Registry) -> Result<Resolution, GvmError> {
        let go = self
            .probe
            .find_system_go(&self.activation_dir)?
            .ok_or_else(|| GvmError::NoMatchingVersion {
                specifier: "system".to_string(),
            })?;

        let info = self.probe.inspect(&go)?;
        Ok(Resolution {
            installed: registry.contains(&info.version),
            version: info.version,
            source: Some(info.goroot),
        })
    }

    async fn resolve_candidates(
        &self,
        specifier: &VersionSpecifier,
        registry: &Registry,
    ) -> Result<Resolution, GvmError> {
        let installed: Vec<Candidate> = registry
            .list()
            .filter(|t| specifier.matches(&t.version))
            .map(|t| Candidate {
                version: t.version.clone(),
                installed: true,
            })
            .collect();

        let is_range = matches!(specifier, VersionSpecifier::Constraint(_));
        if is_range && self.prefer_installed && !installed.is_empty() {
            return finish(specifier, installed);
        }

        let remote = match self.index.fetch_releases().await {
            Ok(releases) => releases
                .into_iter()
                .filter(|r| r.is_available_for(&self.platform))
                .filter(|r| specifier.matches(&r.version))
                .filter(|r| r.stable || !matches!(specifier, VersionSpecifier::Stable))
                .map(|r| Candidate {
                    installed: registry.contains(&r.version),
                    version: r.version,
                })
                .collect::<Vec<_>>(),
            Err(e) if !installed.is_empty() => {
                warn!(
                    "Release index unavailable ({}); resolving {} from installed toolchains",
                    e, specifier
                );
                Vec::new()
            }
            Err(e) => return Err(GvmError::network(self.index.source_url(), e)),
        };

        let mut candidates = installed;
        candidates.extend(remote);
        finish(specifier, candidates)
    }
}

fn finish(
    specifier: &VersionSpecifier,
    candidates: Vec<Candidate>,
) -> Result<Resolution, GvmError> {
    let best = candidates
        .into_iter()
        .max_by(compare_candidates)
        .ok_or_else(|| GvmError::NoMatchingVersion {
            specifier: specifier.to_string(),
        })?;

    debug!("Resolved {} to {}", specifier, best.version);
    Ok(Resolution {
        version: best.version,
        installed: best.installed,
        source: None,
    })
}

// Precedence first, then installed over remote, then full order
fn compare_candidates(a: &Candidate, b: &Candidate) -> Ordering {
    a.version
        .cmp_precedence(&b.version)
        .then(a.installed.cmp(&b.installed))
        .then(a.version.cmp(&b.version))
}
