//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use flate2::Compression;
use flate2::write::GzEncoder;
use mockito::{Server, ServerGuard};
use sha2::{Digest, Sha256};
use tempfile::TempDir;

use gvm::commands::Context;
use gvm::config::GvmConfig;
use gvm::error::GvmError;
use gvm::index::error::FetchError;
use gvm::index::retry::RetryPolicy;
use gvm::index::{Release, ReleaseFile, RemoteIndex};
use gvm::toolchain::link::{SdkInfo, ToolchainProbe};
use gvm::toolchain::paths::GvmPaths;
use gvm::toolchain::platform::Platform;
use gvm::toolchain::registry::{InstalledToolchain, Origin, Registry};
use gvm::version::Version;

pub fn v(s: &str) -> Version {
    Version::parse(s).unwrap()
}

/// Index serving a fixed release list, or failing like an unreachable host
pub struct StaticIndex {
    releases: Vec<Release>,
    reachable: bool,
}

impl StaticIndex {
    pub fn new(releases: Vec<Release>) -> Self {
        Self {
            releases,
            reachable: true,
        }
    }

    pub fn unreachable() -> Self {
        Self {
            releases: Vec::new(),
            reachable: false,
        }
    }
}

#[async_trait]
impl RemoteIndex for StaticIndex {
    fn source_url(&self) -> String {
        "static test index".to_string()
    }

    async fn fetch_releases(&self) -> Result<Vec<Release>, FetchError> {
        if self.reachable {
            Ok(self.releases.clone())
        } else {
            Err(FetchError::ServerError(503))
        }
    }
}

/// Probe for a machine without a system Go
pub struct NoSystemGo;

impl ToolchainProbe for NoSystemGo {
    fn find_system_go(&self, _exclude: &Path) -> Result<Option<PathBuf>, GvmError> {
        Ok(None)
    }

    fn inspect(&self, path: &Path) -> Result<SdkInfo, GvmError> {
        Err(GvmError::InvalidSdk {
            path: path.to_path_buf(),
            reason: "no go binary in tests".to_string(),
        })
    }
}

/// A `.tar.gz` laid out like an official Go SDK archive
pub fn sdk_archive(version: &Version) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::fast());
    let mut builder = tar::Builder::new(encoder);
    let entries = [
        ("go/bin/go", b"#!/bin/sh\necho go\n".to_vec()),
        ("go/VERSION", format!("{}\n", version.go_tag()).into_bytes()),
        ("go/src/fmt/print.go", b"package fmt\n".to_vec()),
    ];
    for (name, data) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder.append_data(&mut header, name, data.as_slice()).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// Isolated gvm home plus an HTTP server publishing SDK archives
pub struct TestEnv {
    pub temp_dir: TempDir,
    pub paths: GvmPaths,
    pub server: ServerGuard,
    pub releases: Vec<Release>,
}

impl TestEnv {
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let paths = GvmPaths::new(temp_dir.path().join("gvm"));
        Self {
            temp_dir,
            paths,
            server: Server::new_async().await,
            releases: Vec::new(),
        }
    }

    pub fn platform() -> Platform {
        Platform::new("linux", "amd64")
    }

    /// Serves an archive for `version` and adds it to the release list
    pub async fn publish(&mut self, version: &str) {
        let version = v(version);
        let body = sdk_archive(&version);
        let filename = format!("{}.linux-amd64.tar.gz", version.go_tag());

        self.server
            .mock("GET", format!("/dl/{}", filename).as_str())
            .with_status(200)
            .with_body(&body)
            .create_async()
            .await;

        self.releases.push(Release {
            stable: !version.is_prerelease(),
            files: vec![ReleaseFile {
                filename,
                os: "linux".to_string(),
                arch: "amd64".to_string(),
                sha256: hex::encode(Sha256::digest(&body)),
                size: body.len() as u64,
                kind: "archive".to_string(),
            }],
            version,
        });
    }

    pub fn config(&self) -> GvmConfig {
        GvmConfig {
            download_source: format!("{}/dl/", self.server.url()),
            lock_timeout_ms: 2_000,
            ..GvmConfig::default()
        }
    }

    pub fn context(&self) -> Result<Context, GvmError> {
        self.context_with(StaticIndex::new(self.releases.clone()))
    }

    pub fn offline_context(&self) -> Result<Context, GvmError> {
        self.context_with(StaticIndex::unreachable())
    }

    fn context_with(&self, index: StaticIndex) -> Result<Context, GvmError> {
        Ok(Context::with_parts(
            self.paths.clone(),
            self.config(),
            Arc::new(index),
            Arc::new(NoSystemGo),
            Self::platform(),
        )?
        .with_download_retry(RetryPolicy::immediate(2)))
    }

    /// Registers an SDK directory without downloading it
    pub fn preinstall(&self, version: &str) -> InstalledToolchain {
        let version = v(version);
        let location = self.paths.toolchain_dir(&version);
        std::fs::create_dir_all(location.join("bin")).unwrap();
        std::fs::write(location.join("bin").join("go"), "#!/bin/sh\n").unwrap();

        let toolchain = InstalledToolchain {
            version,
            location,
            checksum: "preinstalled".to_string(),
            installed_at: Utc::now(),
            origin: Origin::Downloaded,
        };
        let mut registry = Registry::load(&self.paths, std::time::Duration::from_secs(2)).unwrap();
        registry.record(toolchain.clone()).unwrap();
        toolchain
    }

    pub fn registry_contents(&self) -> Option<String> {
        std::fs::read_to_string(self.paths.registry_file()).ok()
    }
}

/// The active pointer names an installed toolchain and `goroot` points at it
pub fn assert_active_consistent(ctx: &Context) {
    let Some(version) = ctx.registry.state().active() else {
        return;
    };
    let active = ctx.registry.get(version).unwrap();
    let target = std::fs::read_link(ctx.paths.goroot_link()).unwrap();
    assert_eq!(target, active.location);
    assert!(active.location.is_dir());
}
