//! `deactivate`, `link`, `pin`, `init` and `config`

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::info;

use crate::commands::Context;
use crate::config::{DEFAULT_LOCK_TIMEOUT_MS, GvmConfig};
use crate::error::GvmError;
use crate::toolchain::link::link_sdk;
use crate::toolchain::paths::GvmPaths;
use crate::toolchain::registry::{InstalledToolchain, Registry};
use crate::toolchain::shell::{ShellSetup, init_shell};
use crate::version::Version;
use crate::version::pin::write_pin;
use crate::version::specifier::VersionSpecifier;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConfigAction {
    #[default]
    Show,
    Set {
        source: Option<String>,
        json_source: Option<String>,
    },
    Reset,
}

/// Clears the active toolchain; returns the version that was active
pub fn deactivate(ctx: &mut Context) -> Result<Option<Version>, GvmError> {
    ctx.activation().deactivate(&mut ctx.registry)
}

/// Registers an SDK installed outside of gvm
pub fn link(ctx: &mut Context, path: &Path) -> Result<InstalledToolchain, GvmError> {
    link_sdk(&mut ctx.registry, ctx.probe.as_ref(), path)
}

/// Writes `.go-version` into `dir`
pub fn pin(paths: &GvmPaths, dir: &Path, input: &str) -> Result<PathBuf, GvmError> {
    ensure_registry_readable(paths)?;
    let specifier = VersionSpecifier::parse(input)?;
    if matches!(
        specifier,
        VersionSpecifier::System | VersionSpecifier::Pinned(_)
    ) {
        return Err(GvmError::InvalidSpecifier {
            input: input.to_string(),
            reason: "a pin must name a version, range or channel".to_string(),
        });
    }

    let path = write_pin(dir, &specifier)?;
    info!("Pinned {} in {:?}", specifier, path);
    Ok(path)
}

/// Writes the env script and hooks it into the shell rc file under `user_home`
pub fn init(paths: &GvmPaths, user_home: Option<&Path>) -> Result<ShellSetup, GvmError> {
    ensure_registry_readable(paths)?;
    paths.ensure_dirs()?;
    init_shell(paths, user_home)
}

/// Applies `action` to `<home>/config.json`; returns the resulting config
pub fn config(paths: &GvmPaths, action: ConfigAction) -> Result<GvmConfig, GvmError> {
    ensure_registry_readable(paths)?;
    let file = paths.config_file();

    match action {
        ConfigAction::Show => GvmConfig::load(&file),
        ConfigAction::Reset => {
            let config = GvmConfig::default();
            config.save(&file)?;
            info!("Reset configuration at {:?}", file);
            Ok(config)
        }
        ConfigAction::Set {
            source,
            json_source,
        } => {
            let mut config = GvmConfig::load(&file)?;
            if let Some(source) = source {
                config.download_source = validated_url(&source)?;
            }
            if let Some(json_source) = json_source {
                config.download_source_json = validated_url(&json_source)?;
            }
            config.save(&file)?;
            info!("Updated configuration at {:?}", file);
            Ok(config)
        }
    }
}

// Commands that never touch the registry still refuse to run on a corrupt one
fn ensure_registry_readable(paths: &GvmPaths) -> Result<(), GvmError> {
    Registry::load(paths, Duration::from_millis(DEFAULT_LOCK_TIMEOUT_MS)).map(|_| ())
}

fn validated_url(input: &str) -> Result<String, GvmError> {
    let url = input.trim();
    if url.starts_with("https://") || url.starts_with("http://") {
        Ok(url.to_string())
    } else {
        Err(GvmError::Config(format!(
            "'{}' is not an http(s) URL",
            input
        )))
    }
}
