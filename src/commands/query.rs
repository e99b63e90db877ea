//! Read-only commands: `list`, `list --remote`, `search`, `current`

use crate::commands::Context;
use crate::error::GvmError;
use crate::index::types::Release;
use crate::toolchain::registry::InstalledToolchain;
use crate::version::Version;
use crate::version::specifier::VersionSpecifier;

/// Number of results shown by `search`
pub const SEARCH_LIMIT: usize = 20;

/// Number of releases shown by `list --remote`
pub const REMOTE_LIST_LIMIT: usize = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedToolchain {
    pub toolchain: InstalledToolchain,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteVersion {
    pub version: Version,
    pub stable: bool,
    pub installed: bool,
}

/// Installed toolchains, newest first
pub fn list_installed(ctx: &Context) -> Vec<ListedToolchain> {
    let active = ctx.registry.state().active();
    ctx.registry
        .list()
        .map(|t| ListedToolchain {
            active: active == Some(&t.version),
            toolchain: t.clone(),
        })
        .collect()
}

/// Newest releases published for this platform
pub async fn list_remote(ctx: &Context, limit: usize) -> Result<Vec<RemoteVersion>, GvmError> {
    remote_matching(ctx, |_| true, limit).await
}

/// Releases matching `query` (`1.21` finds every 1.21 patch), newest first
pub async fn search(ctx: &Context, query: &str) -> Result<Vec<RemoteVersion>, GvmError> {
    let specifier = VersionSpecifier::parse(query)?;
    if matches!(
        specifier,
        VersionSpecifier::System | VersionSpecifier::Pinned(_)
    ) {
        return Err(GvmError::InvalidSpecifier {
            input: query.to_string(),
            reason: "search needs a version, range or keyword".to_string(),
        });
    }

    let found = remote_matching(ctx, |v| specifier.matches(v), SEARCH_LIMIT).await?;
    if found.is_empty() {
        return Err(GvmError::NoMatchingVersion {
            specifier: query.to_string(),
        });
    }
    Ok(found)
}

/// The active toolchain
pub fn current(ctx: &Context) -> Result<InstalledToolchain, GvmError> {
    ctx.activation().current(&ctx.registry)
}

async fn remote_matching(
    ctx: &Context,
    filter: impl Fn(&Version) -> bool,
    limit: usize,
) -> Result<Vec<RemoteVersion>, GvmError> {
    let mut releases: Vec<Release> = ctx
        .index
        .fetch_releases()
        .await
        .map_err(|e| GvmError::network(ctx.index.source_url(), e))?
        .into_iter()
        .filter(|r| r.is_available_for(&ctx.platform) && filter(&r.version))
        .collect();
    releases.sort_by(|a, b| b.version.cmp(&a.version));

    Ok(releases
        .into_iter()
        .take(limit)
        .map(|r| RemoteVersion {
            installed: ctx.registry.contains(&r.version),
            version: r.version,
            stable: r.stable,
        })
        .collect())
}
