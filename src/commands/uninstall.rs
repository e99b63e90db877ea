//! `uninstall`: a single version or a batch selected by `--below`,
//! `--pattern`, `--keep` or `--all`

use std::fmt;

use tracing::{info, warn};

use crate::commands::Context;
use crate::error::GvmError;
use crate::toolchain::installer::Uninstalled;
use crate::toolchain::registry::Registry;
use crate::version::Version;
use crate::version::specifier::VersionSpecifier;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchSelector {
    /// Versions strictly lower than this one
    Below(Version),
    /// Versions matching a range such as `1.21.*` or `<1.20`
    Pattern(VersionSpecifier),
    /// Everything except the newest N
    Keep(usize),
    All,
}

impl fmt::Display for BatchSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchSelector::Below(v) => write!(f, "--below {}", v),
            BatchSelector::Pattern(spec) => write!(f, "--pattern {}", spec),
            BatchSelector::Keep(n) => write!(f, "--keep {}", n),
            BatchSelector::All => write!(f, "--all"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOptions {
    pub selector: BatchSelector,
    /// Leave the active version alone
    pub keep_current: bool,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub removed: Vec<Uninstalled>,
    pub failed: Vec<(Version, GvmError)>,
}

/// Uninstalls one version
pub fn uninstall(ctx: &mut Context, version: &Version) -> Result<Uninstalled, GvmError> {
    ctx.installer()?.uninstall(&mut ctx.registry, version)
}

/// Versions a batch would remove, newest first
pub fn select_for_removal(registry: &Registry, options: &BatchOptions) -> Vec<Version> {
    let active = registry.state().active();
    let skip_active = |v: &Version| options.keep_current && active == Some(v);

    let installed = registry.list().map(|t| &t.version);
    let selected: Vec<&Version> = match &options.selector {
        BatchSelector::Below(bound) => installed.filter(|v| *v < bound).collect(),
        BatchSelector::Pattern(spec) => installed.filter(|v| spec.matches(v)).collect(),
        BatchSelector::Keep(n) => installed.skip(*n).collect(),
        BatchSelector::All => installed.collect(),
    };

    selected
        .into_iter()
        .filter(|v| !skip_active(v))
        .cloned()
        .collect()
}

/// Uninstalls every selected version, continuing past individual failures
pub fn uninstall_batch(ctx: &mut Context, options: &BatchOptions) -> Result<BatchReport, GvmError> {
    let targets = select_for_removal(&ctx.registry, options);
    if targets.is_empty() {
        return Err(GvmError::NoMatchingVersion {
            specifier: options.selector.to_string(),
        });
    }

    // Without --keep-current the active version may be selected
    let active = ctx.registry.state().active().cloned();
    if let Some(active) = active
        && targets.contains(&active)
    {
        info!("Deactivating go{} before removing it", active);
        ctx.activation().deactivate(&mut ctx.registry)?;
    }

    let installer = ctx.installer()?;
    let mut report = BatchReport::default();
    for version in targets {
        match installer.uninstall(&mut ctx.registry, &version) {
            Ok(uninstalled) => report.removed.push(uninstalled),
            Err(e) => {
                warn!("Failed to uninstall go{}: {}", version, e);
                report.failed.push((version, e));
            }
        }
    }

    Ok(report)
}
