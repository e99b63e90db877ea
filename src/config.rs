use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::GvmError;

// =============================================================================
// Time-related constants
// =============================================================================

/// Default refresh interval of the cached remote index in milliseconds (1 hour)
pub const DEFAULT_INDEX_REFRESH_INTERVAL_MS: i64 = 60 * 60 * 1000;

/// Timeout for remote index requests in milliseconds (30 seconds)
pub const FETCH_TIMEOUT_MS: u64 = 30_000;

/// Timeout for a whole archive download in milliseconds (10 minutes)
pub const DOWNLOAD_TIMEOUT_MS: u64 = 600_000;

/// Default time to wait for the registry lock in milliseconds (10 seconds)
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 10_000;

/// Delay between attempts to take a contended lock
pub const LOCK_POLL_INTERVAL_MS: u64 = 50;

/// Attempts made for a network request before reporting a failure
pub const MAX_FETCH_ATTEMPTS: u32 = 4;

/// First retry delay; doubled on every further attempt
pub const BASE_RETRY_DELAY_MS: u64 = 500;

/// Upper bound for a single retry delay
pub const MAX_RETRY_DELAY_MS: u64 = 8_000;

/// Staging directories older than this are leftovers of a killed install
pub const STALE_STAGING_SECS: u64 = 60 * 60;

// =============================================================================
// Locations
// =============================================================================

/// Environment variable overriding the gvm home directory
pub const GVM_HOME_ENV: &str = "GVM_HOME";

/// Environment variable holding the tracing filter (e.g. `debug`, `gvm=trace`)
pub const LOG_ENV: &str = "GVM_LOG";

/// Default Go archive download source
pub const DEFAULT_DOWNLOAD_SOURCE: &str = "https://go.dev/dl/";

/// Default JSON release index
pub const DEFAULT_DOWNLOAD_SOURCE_JSON: &str = "https://go.dev/dl/?mode=json&include=all";

/// gvm configuration stored in `<home>/config.json`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GvmConfig {
    /// Base URL archives are downloaded from (`<source><filename>`)
    pub download_source: String,
    /// URL of the JSON release index
    pub download_source_json: String,
    /// Resolve partial versions against installed toolchains before the remote index
    pub prefer_installed: bool,
    /// Remote index cache refresh interval in milliseconds
    pub index_refresh_interval: i64,
    /// Registry lock timeout in milliseconds
    pub lock_timeout_ms: u64,
    /// Remote index request timeout in milliseconds
    pub fetch_timeout_ms: u64,
}

impl Default for GvmConfig {
    fn default() -> Self {
        Self {
            download_source: DEFAULT_DOWNLOAD_SOURCE.to_string(),
            download_source_json: DEFAULT_DOWNLOAD_SOURCE_JSON.to_string(),
            prefer_installed: true,
            index_refresh_interval: DEFAULT_INDEX_REFRESH_INTERVAL_MS,
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
            fetch_timeout_ms: FETCH_TIMEOUT_MS,
        }
    }
}

impl GvmConfig {
    /// Loads the configuration, returning defaults if the file does not exist
    pub fn load(path: &Path) -> Result<Self, GvmError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No config at {:?}, using defaults", path);
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        let config: GvmConfig = serde_json::from_str(&content)
            .map_err(|e| GvmError::Config(format!("{}: {}", path.display(), e)))?;

        Ok(config.normalized())
    }

    /// Writes the configuration as pretty JSON
    pub fn save(&self, path: &Path) -> Result<(), GvmError> {
        let parent = path.parent().unwrap_or(Path::new("."));
        std::fs::create_dir_all(parent)?;

        let mut file = tempfile::NamedTempFile::new_in(parent)?;
        serde_json::to_writer_pretty(&mut file, self)?;
        file.persist(path).map_err(|e| GvmError::Io(e.error))?;
        Ok(())
    }

    // Empty values fall back to defaults
    fn normalized(mut self) -> Self {
        if self.download_source.trim().is_empty() {
            self.download_source = DEFAULT_DOWNLOAD_SOURCE.to_string();
        }
        if self.download_source_json.trim().is_empty() {
            self.download_source_json = DEFAULT_DOWNLOAD_SOURCE_JSON.to_string();
        }
        if self.index_refresh_interval < 0 {
            self.index_refresh_interval = DEFAULT_INDEX_REFRESH_INTERVAL_MS;
        }
        self
    }
}

/// Joins a download source and an archive filename
pub fn archive_url(download_source: &str, filename: &str) -> String {
    if download_source.ends_with('/') {
        format!("{}{}", download_source, filename)
    } else {
        format!("{}/{}", download_source, filename)
    }
}

/// Returns the gvm home directory.
/// Uses $GVM_HOME if set and non-empty,
/// otherwise falls back to ~/.gvm,
/// or ./.gvm if no home directory is available.
pub fn gvm_home() -> PathBuf {
    gvm_home_with_env(std::env::var(GVM_HOME_ENV).ok(), dirs::home_dir())
}

fn gvm_home_with_env(gvm_home: Option<String>, home_dir: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = gvm_home.filter(|d| !d.trim().is_empty()) {
        return PathBuf::from(dir.trim());
    }

    home_dir
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".gvm")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn gvm_config_from_partial_object_uses_defaults_for_missing_fields() {
        let result = serde_json::from_value::<GvmConfig>(json!({
            "download_source": "https://mirrors.example.com/go/"
        }))
        .unwrap();

        assert_eq!(result.download_source, "https://mirrors.example.com/go/");
        assert_eq!(result.download_source_json, DEFAULT_DOWNLOAD_SOURCE_JSON);
        assert!(result.prefer_installed);
        assert_eq!(result.lock_timeout_ms, DEFAULT_LOCK_TIMEOUT_MS);
    }

    #[test]
    fn load_returns_defaults_when_file_is_missing() {
        let temp_dir = TempDir::new().unwrap();

        let config = GvmConfig::load(&temp_dir.path().join("config.json")).unwrap();

        assert_eq!(config, GvmConfig::default());
    }

    #[test]
    fn load_replaces_empty_sources_with_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"download_source": "", "download_source_json": "  "}"#,
        )
        .unwrap();

        let config = GvmConfig::load(&path).unwrap();

        assert_eq!(config.download_source, DEFAULT_DOWNLOAD_SOURCE);
        assert_eq!(config.download_source_json, DEFAULT_DOWNLOAD_SOURCE_JSON);
    }

    #[test]
    fn load_rejects_malformed_json() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let result = GvmConfig::load(&path);

        assert!(matches!(result, Err(GvmError::Config(_))));
    }

    #[test]
    fn save_then_load_preserves_values() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.json");
        let config = GvmConfig {
            download_source: "https://golang.google.cn/dl/".to_string(),
            prefer_installed: false,
            ..GvmConfig::default()
        };

        config.save(&path).unwrap();

        assert_eq!(GvmConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn archive_url_joins_source_and_filename() {
        let config = GvmConfig::default();
        assert_eq!(
            archive_url(&config.download_source, "go1.21.0.linux-amd64.tar.gz"),
            "https://go.dev/dl/go1.21.0.linux-amd64.tar.gz"
        );
        assert_eq!(
            archive_url("https://mirror.example.com/golang", "go1.21.0.linux-amd64.tar.gz"),
            "https://mirror.example.com/golang/go1.21.0.linux-amd64.tar.gz"
        );
    }

    #[test]
    fn gvm_home_with_env_uses_gvm_home_when_set() {
        let path = gvm_home_with_env(
            Some("/opt/gvm".to_string()),
            Some(PathBuf::from("/home/user")),
        );

        assert_eq!(path, PathBuf::from("/opt/gvm"));
    }

    #[test]
    fn gvm_home_with_env_ignores_blank_override() {
        let path = gvm_home_with_env(Some("  ".to_string()), Some(PathBuf::from("/home/user")));

        assert_eq!(path, PathBuf::from("/home/user/.gvm"));
    }

    #[test]
    fn gvm_home_with_env_falls_back_to_current_dir_when_no_dirs_available() {
        let path = gvm_home_with_env(None, None);
        assert_eq!(path, PathBuf::from("./.gvm"));
    }
}
