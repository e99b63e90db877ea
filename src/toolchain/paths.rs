//! Filesystem layout of the gvm home directory
//!
//! ```text
//! ~/.gvm/                     # Root directory (or GVM_HOME)
//!   toolchains/
//!     go1.21.3/               # Extracted SDK (bin/go, src/, pkg/ ...)
//!     .staging-1.22.0-4711-8f3a/   # In-progress install
//!   downloads/                # Partial archive downloads
//!   goroot -> toolchains/go1.21.3
//!   registry.json             # Installed toolchains and the active pointer
//!   registry.lock             # Cross-process lock for registry mutations
//!   config.json
//!   index.db                  # Cached release index
//!   env                       # Shell snippet sourced from the rc file
//!   gvm.log
//! ```

use std::path::{Path, PathBuf};

use crate::version::Version;

pub const STAGING_PREFIX: &str = ".staging-";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GvmPaths {
    root: PathBuf,
}

impl GvmPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Layout under `$GVM_HOME` or `~/.gvm`
    pub fn from_env() -> Self {
        Self::new(crate::config::gvm_home())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn toolchains_dir(&self) -> PathBuf {
        self.root.join("toolchains")
    }

    /// Install location of a downloaded toolchain
    pub fn toolchain_dir(&self, version: &Version) -> PathBuf {
        self.toolchains_dir().join(version.dir_name())
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.root.join("downloads")
    }

    pub fn registry_file(&self) -> PathBuf {
        self.root.join("registry.json")
    }

    pub fn registry_lock(&self) -> PathBuf {
        self.root.join("registry.lock")
    }

    /// Symlink pointing at the active toolchain
    pub fn goroot_link(&self) -> PathBuf {
        self.root.join("goroot")
    }

    /// Directory added to `PATH` by the env script
    pub fn active_bin_dir(&self) -> PathBuf {
        self.goroot_link().join("bin")
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.json")
    }

    pub fn index_db(&self) -> PathBuf {
        self.root.join("index.db")
    }

    pub fn env_file(&self) -> PathBuf {
        self.root.join("env")
    }

    pub fn log_file(&self) -> PathBuf {
        self.root.join("gvm.log")
    }

    /// Creates the directories gvm writes into
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.toolchains_dir())?;
        std::fs::create_dir_all(self.downloads_dir())?;
        Ok(())
    }
}
