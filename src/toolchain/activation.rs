//! Activation Engine
//!
//! The active toolchain is the target of the `<home>/goroot` symlink. A switch
//! creates the new link under a unique name and renames it over `goroot`, so
//! a process resolving the link sees either the old or the new toolchain. The
//! link swap and the registry's active pointer change together under the
//! registry lock.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use rand::Rng;
use tracing::{debug, info};

use crate::error::GvmError;
use crate::toolchain::paths::GvmPaths;
use crate::toolchain::registry::{InstalledToolchain, Registry};
use crate::version::Version;

pub struct ActivationEngine {
    link: PathBuf,
}

impl ActivationEngine {
    pub fn new(paths: &GvmPaths) -> Self {
        Self {
            link: paths.goroot_link(),
        }
    }

    /// Points `goroot` at `version` and records it as active
    pub fn activate(
        &self,
        registry: &mut Registry,
        version: &Version,
    ) -> Result<InstalledToolchain, GvmError> {
        let toolchain = registry.transaction(|state| {
            let toolchain = state
                .get(version)
                .cloned()
                .ok_or_else(|| GvmError::NotInstalled {
                    version: version.clone(),
                })?;

            if !toolchain.go_binary().is_file() {
                return Err(GvmError::InvalidSdk {
                    path: toolchain.location.clone(),
                    reason: "go binary is missing; reinstall with --force".to_string(),
                });
            }

            self.swap_link(&toolchain.location)?;
            state.set_active(version)?;
            Ok(toolchain)
        })?;

        info!("Activated go{} ({:?})", version, toolchain.location);
        Ok(toolchain)
    }

    /// Removes `goroot` and clears the active pointer
    pub fn deactivate(&self, registry: &mut Registry) -> Result<Option<Version>, GvmError> {
        let previous = registry.transaction(|state| {
            remove_link(&self.link)?;
            let previous = state.active().cloned();
            state.clear_active();
            Ok(previous)
        })?;

        match &previous {
            Some(version) => info!("Deactivated go{}", version),
            None => debug!("Nothing to deactivate"),
        }
        Ok(previous)
    }

    /// The active toolchain, if the pointer is set and `goroot` exists
    pub fn current(&self, registry: &Registry) -> Result<InstalledToolchain, GvmError> {
        let active = registry.active().ok_or(GvmError::NoActiveVersion)?;

        if std::fs::symlink_metadata(&self.link).is_err() {
            debug!("Active pointer set but {:?} is missing", self.link);
            return Err(GvmError::NoActiveVersion);
        }

        Ok(active.clone())
    }

    /// Where `goroot` currently points
    pub fn link_target(&self) -> Option<PathBuf> {
        std::fs::read_link(&self.link).ok()
    }

    /// Atomically points `goroot` at `target`
    pub(crate) fn swap_link(&self, target: &Path) -> Result<(), GvmError> {
        let parent = self.link.parent().unwrap_or(Path::new("."));
        std::fs::create_dir_all(parent)?;

        let temp = parent.join(format!(
            ".goroot-{}-{:08x}",
            std::process::id(),
            rand::rng().random::<u32>()
        ));

        create_symlink(target, &temp)?;
        if let Err(e) = replace_link(&temp, &self.link) {
            let _ = std::fs::remove_file(&temp);
            return Err(e.into());
        }

        debug!("{:?} -> {:?}", self.link, target);
        Ok(())
    }
}

#[cfg(unix)]
fn create_symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn create_symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_dir(target, link)
}

#[cfg(unix)]
fn replace_link(temp: &Path, link: &Path) -> std::io::Result<()> {
    std::fs::rename(temp, link)
}

// Directory symlinks cannot be renamed over on Windows
#[cfg(windows)]
fn replace_link(temp: &Path, link: &Path) -> std::io::Result<()> {
    remove_link(link)?;
    std::fs::rename(temp, link)
}

fn remove_link(link: &Path) -> std::io::Result<()> {
    let result = if cfg!(windows) {
        std::fs::remove_dir(link).or_else(|_| std::fs::remove_file(link))
    } else {
        std::fs::remove_file(link)
    };

    match result {
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::toolchain::registry::Origin;
    use chrono::Utc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn setup(versions: &[&str]) -> (TempDir, GvmPaths, Registry) {
        let temp_dir = TempDir::new().unwrap();
        let paths = GvmPaths::new(temp_dir.path());
        let mut registry = Registry::load(&paths, Duration::from_millis(500)).unwrap();
        for version in versions {
            let version = v(version);
            let location = paths.toolchain_dir(&version);
            std::fs::create_dir_all(location.join("bin")).unwrap();
            std::fs::write(location.join("bin").join("go"), "").unwrap();
            registry
                .record(InstalledToolchain {
                    version,
                    location,
                    checksum: "abc".to_string(),
                    installed_at: Utc::now(),
                    origin: Origin::Downloaded,
                })
                .unwrap();
        }
        (temp_dir, paths, registry)
    }

    #[test]
    fn activate_points_link_at_toolchain() {
        let (_temp_dir, paths, mut registry) = setup(&["1.21.0"]);
        let engine = ActivationEngine::new(&paths);

        engine.activate(&mut registry, &v("1.21.0")).unwrap();

        assert_eq!(
            engine.link_target().unwrap(),
            paths.toolchain_dir(&v("1.21.0"))
        );
        assert_eq!(engine.current(&registry).unwrap().version, v("1.21.0"));
    }

    #[test]
    fn switching_replaces_link_without_leftovers() {
        let (temp_dir, paths, mut registry) = setup(&["1.20.7", "1.21.0"]);
        let engine = ActivationEngine::new(&paths);

        engine.activate(&mut registry, &v("1.20.7")).unwrap();
        engine.activate(&mut registry, &v("1.21.0")).unwrap();

        assert_eq!(
            engine.link_target().unwrap(),
            paths.toolchain_dir(&v("1.21.0"))
        );
        let temp_links = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().starts_with(".goroot-"))
            .count();
        assert_eq!(temp_links, 0);
    }

    #[test]
    fn activate_unregistered_version_changes_nothing() {
        let (_temp_dir, paths, mut registry) = setup(&["1.21.0"]);
        let engine = ActivationEngine::new(&paths);
        engine.activate(&mut registry, &v("1.21.0")).unwrap();

        let result = engine.activate(&mut registry, &v("1.22.0"));

        assert!(matches!(result, Err(GvmError::NotInstalled { .. })));
        assert_eq!(
            engine.link_target().unwrap(),
            paths.toolchain_dir(&v("1.21.0"))
        );
        assert_eq!(registry.active().unwrap().version, v("1.21.0"));
    }

    #[test]
    fn activate_broken_toolchain_is_refused() {
        let (_temp_dir, paths, mut registry) = setup(&["1.21.0"]);
        std::fs::remove_file(paths.toolchain_dir(&v("1.21.0")).join("bin").join("go")).unwrap();
        let engine = ActivationEngine::new(&paths);

        let result = engine.activate(&mut registry, &v("1.21.0"));

        assert!(matches!(result, Err(GvmError::InvalidSdk { .. })));
        assert!(engine.link_target().is_none());
        assert!(registry.active().is_none());
    }

    #[test]
    fn deactivate_removes_link_and_pointer() {
        let (_temp_dir, paths, mut registry) = setup(&["1.21.0"]);
        let engine = ActivationEngine::new(&paths);
        engine.activate(&mut registry, &v("1.21.0")).unwrap();

        let previous = engine.deactivate(&mut registry).unwrap();

        assert_eq!(previous, Some(v("1.21.0")));
        assert!(engine.link_target().is_none());
        assert!(matches!(
            engine.current(&registry),
            Err(GvmError::NoActiveVersion)
        ));
    }

    #[test]
    fn current_without_link_is_no_active_version() {
        let (_temp_dir, paths, mut registry) = setup(&["1.21.0"]);
        let engine = ActivationEngine::new(&paths);
        engine.activate(&mut registry, &v("1.21.0")).unwrap();
        std::fs::remove_file(paths.goroot_link()).unwrap();

        assert!(matches!(
            engine.current(&registry),
            Err(GvmError::NoActiveVersion)
        ));
    }
}
