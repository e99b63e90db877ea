use std::path::PathBuf;

use thiserror::Error;

use crate::index::error::CacheError;
use crate::version::Version;

/// How a failure should be presented to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The operation succeeded; something could not be cleaned up
    Warning,
    /// The operation failed and can be retried
    Error,
    /// Persisted state is unusable; the tool must not continue
    Fatal,
}

#[derive(Debug, Error)]
pub enum GvmError {
    #[error("go{version} is not installed")]
    NotInstalled { version: Version },

    #[error("go{version} is already installed (use --force to reinstall)")]
    AlreadyInstalled { version: Version },

    #[error("cannot record go{version}: {} is already used by go{existing}", location.display())]
    ConflictingLocation {
        version: Version,
        existing: Version,
        location: PathBuf,
    },

    #[error("checksum mismatch for go{version}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        version: Version,
        expected: String,
        actual: String,
    },

    #[error("no Go version matches '{specifier}'")]
    NoMatchingVersion { specifier: String },

    #[error("no active Go version (run `gvm use <version>`)")]
    NoActiveVersion,

    #[error("go{version} is the active version; run `gvm deactivate` or switch first")]
    ActiveVersionInUse { version: Version },

    #[error("invalid version pin in {}: {reason}", path.display())]
    InvalidPin { path: PathBuf, reason: String },

    #[error("timed out after {waited_ms}ms waiting for lock {}", path.display())]
    LockTimeout { path: PathBuf, waited_ms: u64 },

    #[error("network failure fetching {target}: {reason}")]
    NetworkFailure { target: String, reason: String },

    #[error("registry file {} is corrupt ({reason}); refusing to continue", path.display())]
    CorruptRegistry { path: PathBuf, reason: String },

    #[error("invalid version '{0}'")]
    InvalidVersion(String),

    #[error("invalid version specifier '{input}': {reason}")]
    InvalidSpecifier { input: String, reason: String },

    #[error("go{version} was uninstalled but {} could not be deleted: {reason}", path.display())]
    CleanupFailed {
        version: Version,
        path: PathBuf,
        reason: String,
    },

    #[error("unsupported platform {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    #[error("invalid Go SDK at {}: {reason}", path.display())]
    InvalidSdk { path: PathBuf, reason: String },

    #[error("failed to extract {}: {reason}", path.display())]
    Archive { path: PathBuf, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("index cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GvmError {
    /// Short, stable name of the error kind, printed next to the message
    pub fn kind(&self) -> &'static str {
        match self {
            GvmError::NotInstalled { .. } => "NotInstalled",
            GvmError::AlreadyInstalled { .. } => "AlreadyInstalled",
            GvmError::ConflictingLocation { .. } => "ConflictingLocation",
            GvmError::ChecksumMismatch { .. } => "ChecksumMismatch",
            GvmError::NoMatchingVersion { .. } => "NoMatchingVersion",
            GvmError::NoActiveVersion => "NoActiveVersion",
            GvmError::ActiveVersionInUse { .. } => "ActiveVersionInUse",
            GvmError::InvalidPin { .. } => "InvalidPin",
            GvmError::LockTimeout { .. } => "LockTimeout",
            GvmError::NetworkFailure { .. } => "NetworkFailure",
            GvmError::CorruptRegistry { .. } => "CorruptRegistry",
            GvmError::InvalidVersion(_) => "InvalidVersion",
            GvmError::InvalidSpecifier { .. } => "InvalidSpecifier",
            GvmError::CleanupFailed { .. } => "CleanupFailed",
            GvmError::UnsupportedPlatform { .. } => "UnsupportedPlatform",
            GvmError::InvalidSdk { .. } => "InvalidSdk",
            GvmError::Archive { .. } => "Archive",
            GvmError::Config(_) => "Config",
            GvmError::Cache(_) => "Cache",
            GvmError::Io(_) => "Io",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            GvmError::CleanupFailed { .. } => Severity::Warning,
            GvmError::CorruptRegistry { .. } => Severity::Fatal,
            _ => Severity::Error,
        }
    }

    /// Whether repeating the same command later may succeed without user action
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GvmError::NetworkFailure { .. } | GvmError::LockTimeout { .. }
        )
    }

    /// Process exit code for this error
    ///
    /// 2 is shared with clap's usage errors.
    pub fn exit_code(&self) -> u8 {
        match self {
            GvmError::InvalidVersion(_)
            | GvmError::InvalidSpecifier { .. }
            | GvmError::InvalidPin { .. } => 2,
            GvmError::NotInstalled { .. }
            | GvmError::NoMatchingVersion { .. }
            | GvmError::NoActiveVersion => 3,
            GvmError::AlreadyInstalled { .. }
            | GvmError::ActiveVersionInUse { .. }
            | GvmError::ConflictingLocation { .. } => 4,
            GvmError::LockTimeout { .. } => 5,
            GvmError::NetworkFailure { .. } => 6,
            GvmError::ChecksumMismatch { .. } => 7,
            GvmError::CorruptRegistry { .. } => 8,
            _ => 1,
        }
    }

    pub(crate) fn network(target: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        GvmError::NetworkFailure {
            target: target.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<serde_json::Error> for GvmError {
    fn from(e: serde_json::Error) -> Self {
        GvmError::Io(e.into())
    }
}
