//! `install`, `use` and `upgrade`

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use crate::commands::Context;
use crate::error::GvmError;
use crate::toolchain::installer::InstallOptions;
use crate::toolchain::link::link_sdk;
use crate::toolchain::registry::InstalledToolchain;
use crate::version::Version;
use crate::version::resolver::Resolution;
use crate::version::semver::latest_patch;
use crate::version::specifier::VersionSpecifier;

// `1.21`, `go1.21`, `1.21.4`: the minor line is what counts
static MINOR_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:go)?(\d+)\.(\d+)(?:\.\d+)?$").expect("valid regex"));

#[derive(Debug)]
pub struct UseOutcome {
    pub toolchain: InstalledToolchain,
    /// Whether the version had to be installed (or linked) first
    pub installed_now: bool,
}

#[derive(Debug)]
pub struct UpgradeOutcome {
    pub line: (u64, u64),
    /// Newest installed patch of the line before the upgrade
    pub previous: Option<Version>,
    pub latest: Version,
    pub upgraded: bool,
    /// Version activated afterwards, the newest patch of the line
    pub activated: Option<Version>,
}

/// Resolves `specifier` and installs the result
pub async fn install(
    ctx: &mut Context,
    specifier: &VersionSpecifier,
    options: InstallOptions,
) -> Result<InstalledToolchain, GvmError> {
    let resolution = ctx.resolver().resolve(specifier, &ctx.registry).await?;
    debug!("{} resolved to {:?}", specifier, resolution);
    install_resolution(ctx, &resolution, options).await
}

/// Resolves `specifier`, installs it if needed and activates it
pub async fn use_version(
    ctx: &mut Context,
    specifier: &VersionSpecifier,
) -> Result<UseOutcome, GvmError> {
    let resolution = ctx.resolver().resolve(specifier, &ctx.registry).await?;

    let installed_now = if resolution.installed {
        false
    } else {
        match install_resolution(ctx, &resolution, InstallOptions::default()).await {
            Ok(_) => true,
            // Another process installed it in the meantime
            Err(GvmError::AlreadyInstalled { .. }) => {
                ctx.registry.reload()?;
                false
            }
            Err(e) => return Err(e),
        }
    };

    let toolchain = ctx
        .activation()
        .activate(&mut ctx.registry, &resolution.version)?;

    Ok(UseOutcome {
        toolchain,
        installed_now,
    })
}

/// Installs the newest patch of a minor line if it is newer than the newest
/// installed one, optionally activating the line's newest patch afterwards
pub async fn upgrade(
    ctx: &mut Context,
    line: &str,
    activate: bool,
) -> Result<UpgradeOutcome, GvmError> {
    let (major, minor) = parse_minor_line(line)?;

    let releases = ctx
        .index
        .fetch_releases()
        .await
        .map_err(|e| GvmError::network(ctx.index.source_url(), e))?;
    let latest = latest_patch(
        major,
        minor,
        releases
            .iter()
            .filter(|r| r.stable && r.is_available_for(&ctx.platform))
            .map(|r| &r.version),
    )
    .ok_or_else(|| GvmError::NoMatchingVersion {
        specifier: format!("{}.{}.x ({})", major, minor, ctx.platform),
    })?;

    let previous = latest_patch(major, minor, ctx.registry.list().map(|t| &t.version));

    let upgraded = previous.as_ref().is_none_or(|p| p < &latest);
    if upgraded {
        info!("Upgrading {}.{} line to go{}", major, minor, latest);
        let installer = ctx.installer()?;
        installer
            .install(&mut ctx.registry, &latest, InstallOptions::default())
            .await?;
    } else {
        debug!("go{} is already the newest {}.{} patch", latest, major, minor);
    }

    // A linked SDK can be newer than anything the index offers
    let activated = if activate {
        let newest = match &previous {
            Some(previous) if previous > &latest => previous.clone(),
            _ => latest.clone(),
        };
        ctx.activation().activate(&mut ctx.registry, &newest)?;
        Some(newest)
    } else {
        None
    };

    Ok(UpgradeOutcome {
        line: (major, minor),
        previous,
        latest,
        upgraded,
        activated,
    })
}

async fn install_resolution(
    ctx: &mut Context,
    resolution: &Resolution,
    options: InstallOptions,
) -> Result<InstalledToolchain, GvmError> {
    // A system SDK is registered in place rather than downloaded
    if let Some(goroot) = &resolution.source {
        return link_sdk(&mut ctx.registry, ctx.probe.as_ref(), goroot);
    }

    let installer = ctx.installer()?;
    installer
        .install(&mut ctx.registry, &resolution.version, options)
        .await
}

/// Parses `1.21`, `go1.21` or `1.21.4` into `(1, 21)`
pub fn parse_minor_line(input: &str) -> Result<(u64, u64), GvmError> {
    let invalid = |reason: &str| GvmError::InvalidSpecifier {
        input: input.to_string(),
        reason: reason.to_string(),
    };

    let caps = MINOR_LINE_RE
        .captures(input.trim())
        .ok_or_else(|| invalid("expected a minor line such as 1.21"))?;
    let major = caps[1].parse().map_err(|_| invalid("major out of range"))?;
    let minor = caps[2].parse().map_err(|_| invalid("minor out of range"))?;
    Ok((major, minor))
}
