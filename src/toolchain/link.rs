//! External Go SDKs: discovery on `PATH` and registration via `gvm link`

#[cfg(test)]
use mockall::automock;

use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::Utc;
use tracing::{debug, info};

use crate::error::GvmError;
use crate::toolchain::registry::{InstalledToolchain, LINKED_CHECKSUM, Origin, Registry};
use crate::version::Version;

/// What `go env GOROOT` and `go version` report for an SDK
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdkInfo {
    pub goroot: PathBuf,
    pub version: Version,
}

/// Trait for inspecting Go SDKs that gvm did not install
#[cfg_attr(test, automock)]
pub trait ToolchainProbe: Send + Sync {
    /// First `go` on `PATH` that does not live under `exclude`
    fn find_system_go(&self, exclude: &Path) -> Result<Option<PathBuf>, GvmError>;

    /// Inspects an SDK given its GOROOT directory or its `go` binary
    fn inspect(&self, path: &Path) -> Result<SdkInfo, GvmError>;
}

/// ToolchainProbe that runs the `go` binary
#[derive(Debug, Default)]
pub struct GoBinaryProbe;

impl GoBinaryProbe {
    fn run(go: &Path, args: &[&str]) -> Result<String, GvmError> {
        let output = Command::new(go)
            .args(args)
            .env_remove("GOROOT")
            .output()
            .map_err(|e| invalid_sdk(go, format!("failed to run go {}: {}", args.join(" "), e)))?;

        if !output.status.success() {
            return Err(invalid_sdk(
                go,
                format!(
                    "go {} exited with {}: {}",
                    args.join(" "),
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl ToolchainProbe for GoBinaryProbe {
    fn find_system_go(&self, exclude: &Path) -> Result<Option<PathBuf>, GvmError> {
        let Ok(candidates) = which::which_all("go") else {
            return Ok(None);
        };

        let exclude = exclude.canonicalize().unwrap_or_else(|_| exclude.to_path_buf());
        let found = candidates.into_iter().find(|candidate| {
            let resolved = candidate
                .canonicalize()
                .unwrap_or_else(|_| candidate.clone());
            !resolved.starts_with(&exclude) && !candidate.starts_with(&exclude)
        });

        debug!("System go lookup found {:?}", found);
        Ok(found)
    }

    fn inspect(&self, path: &Path) -> Result<SdkInfo, GvmError> {
        let go = go_binary_for(path);
        if !go.is_file() {
            return Err(invalid_sdk(path, "no go binary found"));
        }

        let goroot = PathBuf::from(Self::run(&go, &["env", "GOROOT"])?);
        let version = parse_go_version_output(&Self::run(&go, &["version"])?)
            .ok_or_else(|| invalid_sdk(path, "unrecognised `go version` output"))?;

        Ok(SdkInfo { goroot, version })
    }
}

/// Registers the SDK at `path` as a linked toolchain
pub fn link_sdk(
    registry: &mut Registry,
    probe: &dyn ToolchainProbe,
    path: &Path,
) -> Result<InstalledToolchain, GvmError> {
    let info = probe.inspect(path)?;
    let location = info.goroot.canonicalize().unwrap_or(info.goroot);

    let toolchain = InstalledToolchain {
        version: info.version,
        location,
        checksum: LINKED_CHECKSUM.to_string(),
        installed_at: Utc::now(),
        origin: Origin::Linked,
    };

    // Checked under the lock so a concurrent install is never overwritten
    registry.transaction(|state| {
        if state.get(&toolchain.version).is_some() {
            return Err(GvmError::AlreadyInstalled {
                version: toolchain.version.clone(),
            });
        }
        state.insert(toolchain.clone())
    })?;

    info!(
        "Linked go{} at {:?}",
        toolchain.version, toolchain.location
    );
    Ok(toolchain)
}

fn go_binary_for(path: &Path) -> PathBuf {
    if path.is_dir() {
        let name = if cfg!(windows) { "go.exe" } else { "go" };
        path.join("bin").join(name)
    } else {
        path.to_path_buf()
    }
}

/// Extracts the version from `go version go1.21.3 linux/amd64`
fn parse_go_version_output(output: &str) -> Option<Version> {
    output
        .split_whitespace()
        .find(|token| token.starts_with("go") && token.len() > 2)
        .and_then(|token| Version::parse(token).ok())
}

fn invalid_sdk(path: &Path, reason: impl Into<String>) -> GvmError {
    GvmError::InvalidSdk {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}
