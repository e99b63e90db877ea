//! Version Registry: installed toolchains and the active pointer
//!
//! State lives in `registry.json`. Reads take a lock-free snapshot of the last
//! committed file. Every mutation takes `registry.lock`, re-reads the file,
//! applies the change and replaces the file through a synced temp file and a
//! rename, so a reader sees either the old or the new state.
//!
//! A file that cannot be parsed, or that breaks the registry invariants
//! (active pointer naming a missing entry, two entries sharing a location),
//! is reported as `CorruptRegistry` and never overwritten.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::GvmError;
use crate::toolchain::lock::LockGuard;
use crate::toolchain::paths::GvmPaths;
use crate::version::Version;

pub const SCHEMA_VERSION: u32 = 1;

/// Checksum recorded for SDKs that were linked rather than downloaded
pub const LINKED_CHECKSUM: &str = "linked";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Downloaded and extracted by gvm; gvm owns the directory
    Downloaded,
    /// External SDK registered with `gvm link`; never deleted by gvm
    Linked,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledToolchain {
    pub version: Version,
    pub location: PathBuf,
    pub checksum: String,
    pub installed_at: DateTime<Utc>,
    pub origin: Origin,
}

impl InstalledToolchain {
    pub fn go_binary(&self) -> PathBuf {
        let name = if cfg!(windows) { "go.exe" } else { "go" };
        self.location.join("bin").join(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ToolchainEntry {
    location: PathBuf,
    checksum: String,
    installed_at: DateTime<Utc>,
    origin: Origin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RegistryFile {
    schema_version: u32,
    #[serde(default)]
    active: Option<Version>,
    #[serde(default)]
    toolchains: BTreeMap<Version, ToolchainEntry>,
}

/// In-memory registry contents
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryState {
    active: Option<Version>,
    toolchains: BTreeMap<Version, InstalledToolchain>,
}

impl RegistryState {
    pub fn get(&self, version: &Version) -> Option<&InstalledToolchain> {
        self.toolchains.get(version)
    }

    pub fn active(&self) -> Option<&Version> {
        self.active.as_ref()
    }

    /// Inserts or replaces the entry for `toolchain.version`
    pub fn insert(&mut self, toolchain: InstalledToolchain) -> Result<(), GvmError> {
        if let Some(other) = self
            .toolchains
            .values()
            .find(|t| t.location == toolchain.location && t.version != toolchain.version)
        {
            return Err(GvmError::ConflictingLocation {
                version: toolchain.version.clone(),
                existing: other.version.clone(),
                location: toolchain.location.clone(),
            });
        }

        self.toolchains.insert(toolchain.version.clone(), toolchain);
        Ok(())
    }

    pub fn remove(&mut self, version: &Version) -> Result<InstalledToolchain, GvmError> {
        if self.active.as_ref() == Some(version) {
            return Err(GvmError::ActiveVersionInUse {
                version: version.clone(),
            });
        }

        self.toolchains
            .remove(version)
            .ok_or_else(|| GvmError::NotInstalled {
                version: version.clone(),
            })
    }

    pub fn set_active(&mut self, version: &Version) -> Result<(), GvmError> {
        if !self.toolchains.contains_key(version) {
            return Err(GvmError::NotInstalled {
                version: version.clone(),
            });
        }
        self.active = Some(version.clone());
        Ok(())
    }

    pub fn clear_active(&mut self) {
        self.active = None;
    }

    fn from_file(file: RegistryFile) -> Result<Self, String> {
        if file.schema_version > SCHEMA_VERSION {
            return Err(format!(
                "schema version {} is newer than supported version {}",
                file.schema_version, SCHEMA_VERSION
            ));
        }

        let mut state = RegistryState::default();
        for (version, entry) in file.toolchains {
            state
                .insert(InstalledToolchain {
                    version,
                    location: entry.location,
                    checksum: entry.checksum,
                    installed_at: entry.installed_at,
                    origin: entry.origin,
                })
                .map_err(|e| e.to_string())?;
        }

        if let Some(active) = file.active {
            if !state.toolchains.contains_key(&active) {
                return Err(format!("active version {} is not installed", active));
            }
            state.active = Some(active);
        }

        Ok(state)
    }

    fn to_file(&self) -> RegistryFile {
        RegistryFile {
            schema_version: SCHEMA_VERSION,
            active: self.active.clone(),
            toolchains: self
                .toolchains
                .iter()
                .map(|(version, t)| {
                    (
                        version.clone(),
                        ToolchainEntry {
                            location: t.location.clone(),
                            checksum: t.checksum.clone(),
                            installed_at: t.installed_at,
                            origin: t.origin,
                        },
                    )
                })
                .collect(),
        }
    }
}

/// Persistent Version Registry
#[derive(Debug)]
pub struct Registry {
    file: PathBuf,
    lock: PathBuf,
    lock_timeout: Duration,
    state: RegistryState,
}

impl Registry {
    /// Loads the committed registry; a missing file is an empty registry
    pub fn load(paths: &GvmPaths, lock_timeout: Duration) -> Result<Self, GvmError> {
        let file = paths.registry_file();
        let state = read_state(&file)?;
        debug!(
            "Loaded registry with {} toolchains from {:?}",
            state.toolchains.len(),
            file
        );

        Ok(Self {
            file,
            lock: paths.registry_lock(),
            lock_timeout,
            state,
        })
    }

    /// Re-reads the last committed state
    pub fn reload(&mut self) -> Result<(), GvmError> {
        self.state = read_state(&self.file)?;
        Ok(())
    }

    pub fn state(&self) -> &RegistryState {
        &self.state
    }

    /// Installed toolchains, newest version first.
    ///
    /// The iterator borrows the snapshot and can be cloned to start over.
    pub fn list(&self) -> impl Iterator<Item = &InstalledToolchain> + Clone {
        self.state.toolchains.values().rev()
    }

    pub fn versions(&self) -> Vec<Version> {
        self.list().map(|t| t.version.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.state.toolchains.is_empty()
    }

    pub fn contains(&self, version: &Version) -> bool {
        self.state.toolchains.contains_key(version)
    }

    pub fn get(&self, version: &Version) -> Result<&InstalledToolchain, GvmError> {
        self.state.get(version).ok_or_else(|| GvmError::NotInstalled {
            version: version.clone(),
        })
    }

    pub fn active(&self) -> Option<&InstalledToolchain> {
        self.state.active().and_then(|v| self.state.get(v))
    }

    pub fn record(&mut self, toolchain: InstalledToolchain) -> Result<(), GvmError> {
        let version = toolchain.version.clone();
        self.transaction(|state| state.insert(toolchain))?;
        info!("Recorded go{} in registry", version);
        Ok(())
    }

    pub fn remove(&mut self, version: &Version) -> Result<InstalledToolchain, GvmError> {
        let removed = self.transaction(|state| state.remove(version))?;
        info!("Removed go{} from registry", version);
        Ok(removed)
    }

    pub fn set_active(&mut self, version: &Version) -> Result<(), GvmError> {
        self.transaction(|state| state.set_active(version))
    }

    pub fn clear_active(&mut self) -> Result<(), GvmError> {
        self.transaction(|state| {
            state.clear_active();
            Ok(())
        })
    }

    /// Runs `apply` against the latest committed state while holding the
    /// registry lock, then commits the result.
    ///
    /// If `apply` fails nothing is written and the in-memory snapshot is
    /// refreshed to the committed state.
    pub(crate) fn transaction<T>(
        &mut self,
        apply: impl FnOnce(&mut RegistryState) -> Result<T, GvmError>,
    ) -> Result<T, GvmError> {
        let _guard = LockGuard::acquire(&self.lock, self.lock_timeout)?;

        let mut state = read_state(&self.file)?;
        let committed = state.clone();

        match apply(&mut state) {
            Ok(value) => {
                if state != committed {
                    write_state(&self.file, &state)?;
                }
                self.state = state;
                Ok(value)
            }
            Err(e) => {
                self.state = committed;
                Err(e)
            }
        }
    }
}

fn read_state(path: &Path) -> Result<RegistryState, GvmError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(RegistryState::default());
        }
        Err(e) => return Err(e.into()),
    };

    let corrupt = |reason: String| GvmError::CorruptRegistry {
        path: path.to_path_buf(),
        reason,
    };

    let file: RegistryFile = serde_json::from_str(&content).map_err(|e| corrupt(e.to_string()))?;
    RegistryState::from_file(file).map_err(corrupt)
}

fn write_state(path: &Path, state: &RegistryState) -> Result<(), GvmError> {
    let dir = path.parent().unwrap_or(Path::new("."));
    std::fs::create_dir_all(dir)?;

    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut temp, &state.to_file())?;
    temp.write_all(b"\n")?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| GvmError::Io(e.error))?;

    debug!("Committed registry to {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn toolchain(paths: &GvmPaths, version: &str) -> InstalledToolchain {
        let version = v(version);
        InstalledToolchain {
            location: paths.toolchain_dir(&version),
            version,
            checksum: "deadbeef".to_string(),
            installed_at: Utc::now(),
            origin: Origin::Downloaded,
        }
    }

    fn setup() -> (TempDir, GvmPaths, Registry) {
        let temp_dir = TempDir::new().unwrap();
        let paths = GvmPaths::new(temp_dir.path());
        let registry = Registry::load(&paths, Duration::from_millis(500)).unwrap();
        (temp_dir, paths, registry)
    }

    #[test]
    fn missing_file_is_empty_registry() {
        let (_temp_dir, _paths, registry) = setup();

        assert!(registry.is_empty());
        assert!(registry.active().is_none());
    }

    #[test]
    fn list_is_newest_first_and_restartable() {
        let (_temp_dir, paths, mut registry) = setup();
        for version in ["1.20.3", "1.21.0", "1.19.9", "go1.22rc1"] {
            registry.record(toolchain(&paths, version)).unwrap();
        }

        let listing = registry.list();
        let first: Vec<String> = listing.clone().map(|t| t.version.to_string()).collect();
        let second: Vec<String> = listing.map(|t| t.version.to_string()).collect();

        assert_eq!(first, vec!["1.22.0-rc.1", "1.21.0", "1.20.3", "1.19.9"]);
        assert_eq!(first, second);
    }

    #[test]
    fn record_persists_across_loads() {
        let (_temp_dir, paths, mut registry) = setup();
        registry.record(toolchain(&paths, "1.21.0")).unwrap();
        registry.set_active(&v("1.21.0")).unwrap();

        let reloaded = Registry::load(&paths, Duration::from_millis(500)).unwrap();

        assert_eq!(reloaded.versions(), vec![v("1.21.0")]);
        assert_eq!(reloaded.active().unwrap().version, v("1.21.0"));
    }

    #[test]
    fn record_rejects_conflicting_location() {
        let (_temp_dir, paths, mut registry) = setup();
        registry.record(toolchain(&paths, "1.21.0")).unwrap();

        let mut clash = toolchain(&paths, "1.21.1");
        clash.location = paths.toolchain_dir(&v("1.21.0"));
        let result = registry.record(clash);

        assert!(matches!(result, Err(GvmError::ConflictingLocation { .. })));
        assert_eq!(registry.versions(), vec![v("1.21.0")]);
    }

    #[test]
    fn record_replaces_same_version() {
        let (_temp_dir, paths, mut registry) = setup();
        registry.record(toolchain(&paths, "1.21.0")).unwrap();

        let mut again = toolchain(&paths, "1.21.0");
        again.checksum = "cafe".to_string();
        registry.record(again).unwrap();

        assert_eq!(registry.get(&v("1.21.0")).unwrap().checksum, "cafe");
    }

    #[rstest]
    #[case("1.21.0", true)]
    #[case("1.20.0", false)]
    fn remove_checks_active_and_presence(#[case] target: &str, #[case] active_in_use: bool) {
        let (_temp_dir, paths, mut registry) = setup();
        registry.record(toolchain(&paths, "1.21.0")).unwrap();
        registry.set_active(&v("1.21.0")).unwrap();

        let result = registry.remove(&v(target));

        if active_in_use {
            assert!(matches!(result, Err(GvmError::ActiveVersionInUse { .. })));
        } else {
            assert!(matches!(result, Err(GvmError::NotInstalled { .. })));
        }
        assert_eq!(registry.versions(), vec![v("1.21.0")]);
    }

    #[test]
    fn remove_after_clear_active_succeeds() {
        let (_temp_dir, paths, mut registry) = setup();
        registry.record(toolchain(&paths, "1.21.0")).unwrap();
        registry.set_active(&v("1.21.0")).unwrap();

        registry.clear_active().unwrap();
        let removed = registry.remove(&v("1.21.0")).unwrap();

        assert_eq!(removed.version, v("1.21.0"));
        assert!(registry.is_empty());
    }

    #[test]
    fn set_active_requires_installed_version() {
        let (_temp_dir, _paths, mut registry) = setup();

        let result = registry.set_active(&v("1.21.0"));

        assert!(matches!(result, Err(GvmError::NotInstalled { .. })));
        assert!(registry.active().is_none());
    }

    #[test]
    fn mutation_sees_changes_from_other_handles() {
        let (_temp_dir, paths, mut first) = setup();
        let mut second = Registry::load(&paths, Duration::from_millis(500)).unwrap();

        first.record(toolchain(&paths, "1.20.0")).unwrap();
        second.record(toolchain(&paths, "1.21.0")).unwrap();

        assert_eq!(second.versions(), vec![v("1.21.0"), v("1.20.0")]);
    }

    #[rstest]
    #[case("{ not json")]
    #[case(r#"{"schema_version": 1, "active": "1.21.0", "toolchains": {}}"#)]
    #[case(r#"{"schema_version": 99, "toolchains": {}}"#)]
    fn corrupt_file_is_reported_and_left_untouched(#[case] content: &str) {
        let temp_dir = TempDir::new().unwrap();
        let paths = GvmPaths::new(temp_dir.path());
        std::fs::write(paths.registry_file(), content).unwrap();

        let result = Registry::load(&paths, Duration::from_millis(500));

        assert!(matches!(result, Err(GvmError::CorruptRegistry { .. })));
        assert_eq!(
            std::fs::read_to_string(paths.registry_file()).unwrap(),
            content
        );
    }

    #[test]
    fn record_while_another_process_holds_lock_times_out() {
        let (_temp_dir, paths, mut registry) = setup();
        let _held = LockGuard::acquire(&paths.registry_lock(), Duration::from_millis(100)).unwrap();

        let result = registry.record(toolchain(&paths, "1.21.0"));

        assert!(matches!(result, Err(GvmError::LockTimeout { .. })));
        assert!(registry.is_empty());
        assert!(!paths.registry_file().exists());
    }

    #[test]
    fn transaction_refuses_to_overwrite_file_corrupted_after_load() {
        let (_temp_dir, paths, mut registry) = setup();
        std::fs::write(paths.registry_file(), "garbage").unwrap();

        let result = registry.record(toolchain(&paths, "1.21.0"));

        assert!(matches!(result, Err(GvmError::CorruptRegistry { .. })));
        assert_eq!(
            std::fs::read_to_string(paths.registry_file()).unwrap(),
            "garbage"
        );
    }

    #[test]
    fn file_format_maps_versions_to_entries() {
        let (_temp_dir, paths, mut registry) = setup();
        registry.record(toolchain(&paths, "1.21.0")).unwrap();
        registry.set_active(&v("1.21.0")).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(paths.registry_file()).unwrap())
                .unwrap();

        assert_eq!(json["schema_version"], 1);
        assert_eq!(json["active"], "1.21.0");
        assert_eq!(json["toolchains"]["1.21.0"]["origin"], "downloaded");
        assert_eq!(json["toolchains"]["1.21.0"]["checksum"], "deadbeef");
    }
}
