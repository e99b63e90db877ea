//! Project version pins
//!
//! A project pins its Go version with a `.go-version` file holding a single
//! specifier, or implicitly through the `toolchain` / `go` directives of its
//! `go.mod`. Lookup walks up from the starting directory; the nearest
//! `.go-version` wins, and `go.mod` is only consulted when no `.go-version`
//! exists in any ancestor.
//!
//! Format examples:
//! - `.go-version`: `1.21.3`, `1.20.x`, `stable` (lines starting with `#` are ignored)
//! - `go.mod`: `toolchain go1.21.3` (preferred) or `go 1.21`

use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::debug;

use crate::error::GvmError;
use crate::version::specifier::VersionSpecifier;

pub const GO_VERSION_FILE: &str = ".go-version";
pub const GO_MOD_FILE: &str = "go.mod";

/// A pin found on disk
#[derive(Debug, Clone, PartialEq)]
pub struct Pin {
    /// File the pin was read from
    pub path: PathBuf,
    pub specifier: VersionSpecifier,
}

/// Reader for `.go-version` and `go.mod` pins
pub struct PinReader {
    /// Regex for the toolchain directive: `toolchain go1.21.3`
    toolchain_re: Regex,
    /// Regex for the go directive: `go 1.21`
    go_directive_re: Regex,
}

impl PinReader {
    pub fn new() -> Self {
        Self {
            // Match: toolchain go1.21.3 [// comment]
            toolchain_re: Regex::new(r"^toolchain\s+(go\S+)(?:\s*//.*)?$").expect("valid regex"),
            // Match: go 1.21 [// comment]
            go_directive_re: Regex::new(r"^go\s+(\d\S*)(?:\s*//.*)?$").expect("valid regex"),
        }
    }

    /// Finds the pin governing `dir`
    pub fn find(&self, dir: &Path) -> Result<Pin, GvmError> {
        if let Some(path) = find_upwards(dir, GO_VERSION_FILE) {
            debug!("Using pin file {:?}", path);
            let content = std::fs::read_to_string(&path)?;
            return Ok(Pin {
                specifier: self.parse_go_version(&path, &content)?,
                path,
            });
        }

        if let Some(path) = find_upwards(dir, GO_MOD_FILE) {
            debug!("Using go.mod {:?}", path);
            let content = std::fs::read_to_string(&path)?;
            return Ok(Pin {
                specifier: self.parse_go_mod(&path, &content)?,
                path,
            });
        }

        Err(GvmError::InvalidPin {
            path: dir.to_path_buf(),
            reason: format!("no {} or {} found", GO_VERSION_FILE, GO_MOD_FILE),
        })
    }

    /// Parses the content of a `.go-version` file
    pub fn parse_go_version(&self, path: &Path, content: &str) -> Result<VersionSpecifier, GvmError> {
        let mut lines = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'));

        let Some(line) = lines.next() else {
            return Err(invalid_pin(path, "file is empty"));
        };

        if line.split_whitespace().count() != 1 || lines.next().is_some() {
            return Err(invalid_pin(path, "expected a single version specifier"));
        }

        VersionSpecifier::parse(line).map_err(|e| invalid_pin(path, e))
    }

    /// Parses the `toolchain` or `go` directive of a `go.mod`
    pub fn parse_go_mod(&self, path: &Path, content: &str) -> Result<VersionSpecifier, GvmError> {
        let mut go_directive = None;

        for line in content.lines().map(str::trim) {
            if let Some(caps) = self.toolchain_re.captures(line) {
                return VersionSpecifier::parse(&caps[1]).map_err(|e| invalid_pin(path, e));
            }
            if go_directive.is_none()
                && let Some(caps) = self.go_directive_re.captures(line)
            {
                go_directive = Some(caps[1].to_string());
            }
        }

        match go_directive {
            Some(version) => VersionSpecifier::parse(&version).map_err(|e| invalid_pin(path, e)),
            None => Err(invalid_pin(path, "no go or toolchain directive")),
        }
    }
}

impl Default for PinReader {
    fn default() -> Self {
        Self::new()
    }
}

/// Writes a `.go-version` file into `dir`
pub fn write_pin(dir: &Path, specifier: &VersionSpecifier) -> Result<PathBuf, GvmError> {
    let path = dir.join(GO_VERSION_FILE);
    std::fs::write(&path, format!("{}\n", specifier))?;
    Ok(path)
}

fn find_upwards(dir: &Path, file_name: &str) -> Option<PathBuf> {
    dir.ancestors()
        .map(|ancestor| ancestor.join(file_name))
        .find(|candidate| candidate.is_file())
}

fn invalid_pin(path: &Path, reason: impl std::fmt::Display) -> GvmError {
    GvmError::InvalidPin {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}
