//! Release index records
//!
//! Mirrors the JSON served at `https://go.dev/dl/?mode=json&include=all`:
//!
//! ```text
//! [{"version": "go1.21.0", "stable": true,
//!   "files": [{"filename": "go1.21.0.linux-amd64.tar.gz", "os": "linux",
//!              "arch": "amd64", "version": "go1.21.0", "sha256": "...",
//!              "size": 66646497, "kind": "archive"}]}]
//! ```

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::toolchain::platform::Platform;
use crate::version::Version;

/// `kind` of a file that holds a complete SDK
pub const ARCHIVE_KIND: &str = "archive";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub version: Version,
    pub stable: bool,
    pub files: Vec<ReleaseFile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseFile {
    pub filename: String,
    #[serde(default)]
    pub os: String,
    #[serde(default)]
    pub arch: String,
    #[serde(default)]
    pub sha256: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub kind: String,
}

/// A release as published, before its version tag is parsed
#[derive(Debug, Clone, Deserialize)]
pub struct RawRelease {
    pub version: String,
    #[serde(default)]
    pub stable: bool,
    #[serde(default)]
    pub files: Vec<ReleaseFile>,
}

impl Release {
    /// Converts published releases, dropping those with unparseable tags
    pub fn from_raw(raw: Vec<RawRelease>) -> Vec<Release> {
        raw.into_iter()
            .filter_map(|r| match Version::parse(&r.version) {
                Ok(version) => Some(Release {
                    version,
                    stable: r.stable,
                    files: r.files,
                }),
                Err(_) => {
                    debug!("Skipping release with unrecognised tag {}", r.version);
                    None
                }
            })
            .collect()
    }

    /// The SDK archive published for `platform`
    pub fn archive_for(&self, platform: &Platform) -> Option<&ReleaseFile> {
        self.files.iter().find(|f| {
            f.kind == ARCHIVE_KIND
                && f.os == platform.os
                && f.arch == platform.arch
                && !f.sha256.is_empty()
        })
    }

    pub fn is_available_for(&self, platform: &Platform) -> bool {
        self.archive_for(platform).is_some()
    }
}

/// Finds the archive of `version` for `platform`
pub fn find_archive<'a>(
    releases: &'a [Release],
    version: &Version,
    platform: &Platform,
) -> Option<&'a ReleaseFile> {
    releases
        .iter()
        .find(|r| &r.version == version)
        .and_then(|r| r.archive_for(platform))
}
