use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::index::error::{CacheError, FetchError};
use crate::index::remote::RemoteIndex;
use crate::index::types::{Release, ReleaseFile};
use crate::version::Version;

/// Schema migrations
/// Each version contains a list of SQL statements to execute
const MIGRATIONS: &[&[&str]] = &[
    // v1: platform lookup index
    &["CREATE INDEX IF NOT EXISTS idx_files_platform ON files(os, arch)"],
];

const UPDATED_AT_KEY: &str = "updated_at";

/// Releases read back from the cache
#[derive(Debug, Clone, PartialEq)]
pub struct CachedReleases {
    pub releases: Vec<Release>,
    /// When the releases were stored, in milliseconds since UNIX epoch
    pub updated_at: i64,
}

/// SQLite copy of the last fetched release index
pub struct IndexCache {
    conn: Mutex<Connection>,
    refresh_interval: i64,
}

impl IndexCache {
    pub fn new(db_path: &Path, refresh_interval: i64) -> Result<Self, CacheError> {
        info!("Initializing index cache at {:?}", db_path);

        let conn = Connection::open(db_path)?;

        // Enable WAL mode for better concurrency
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        let cache = Self {
            conn: Mutex::new(conn),
            refresh_interval,
        };

        cache.create_schema()?;
        debug!("Index cache ready");

        Ok(cache)
    }

    /// Acquire database connection lock with proper error handling
    fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>, CacheError> {
        self.conn.lock().map_err(|_| CacheError::LockPoisoned)
    }

    /// Get current timestamp in milliseconds since UNIX epoch
    fn current_timestamp_ms() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    fn create_schema(&self) -> Result<(), CacheError> {
        let conn = self.lock_conn()?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS releases (
                version TEXT PRIMARY KEY,
                stable INTEGER NOT NULL,
                position INTEGER NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS files (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                version TEXT NOT NULL,
                filename TEXT NOT NULL,
                os TEXT NOT NULL,
                arch TEXT NOT NULL,
                sha256 TEXT NOT NULL,
                size INTEGER NOT NULL,
                kind TEXT NOT NULL,
                FOREIGN KEY (version) REFERENCES releases(version) ON DELETE CASCADE
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS meta (key TEXT PRIMARY KEY, value INTEGER NOT NULL)",
            [],
        )?;

        Self::apply_migrations(&conn)?;
        Ok(())
    }

    /// Apply pending migrations based on user_version pragma
    fn apply_migrations(conn: &Connection) -> Result<(), CacheError> {
        let current_version: i32 =
            conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

        for (i, statements) in MIGRATIONS.iter().enumerate() {
            let version = (i + 1) as i32;
            if version > current_version {
                for sql in *statements {
                    conn.execute(sql, [])?;
                }
                debug!("Applied migration v{}", version);
            }
        }

        let target_version = MIGRATIONS.len() as i32;
        if target_version > current_version {
            conn.pragma_update(None, "user_version", target_version)?;
            debug!("Updated schema version to v{}", target_version);
        }

        Ok(())
    }

    /// Replaces the cached releases and stamps the update time
    pub fn replace_releases(&self, releases: &[Release]) -> Result<(), CacheError> {
        debug!("Caching {} releases", releases.len());

        let now = Self::current_timestamp_ms();
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM files", [])?;
        tx.execute("DELETE FROM releases", [])?;

        {
            let mut release_stmt = tx.prepare(
                "INSERT OR IGNORE INTO releases (version, stable, position) VALUES (?1, ?2, ?3)",
            )?;
            let mut file_stmt = tx.prepare(
                r#"
                INSERT INTO files (version, filename, os, arch, sha256, size, kind)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )?;

            for (position, release) in releases.iter().enumerate() {
                let version = release.version.to_string();
                let inserted =
                    release_stmt.execute((&version, release.stable, position as i64))?;
                if inserted == 0 {
                    continue;
                }
                for file in &release.files {
                    file_stmt.execute((
                        &version,
                        &file.filename,
                        &file.os,
                        &file.arch,
                        &file.sha256,
                        file.size as i64,
                        &file.kind,
                    ))?;
                }
            }
        }

        tx.execute(
            r#"
            INSERT INTO meta (key, value) VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
            (UPDATED_AT_KEY, now),
        )?;

        tx.commit()?;
        Ok(())
    }

    /// Reads the cached releases, newest first; `None` if nothing was stored yet
    pub fn load_releases(&self) -> Result<Option<CachedReleases>, CacheError> {
        let conn = self.lock_conn()?;

        let updated_at = match conn.query_row(
            "SELECT value FROM meta WHERE key = ?1",
            [UPDATED_AT_KEY],
            |row| row.get::<_, i64>(0),
        ) {
            Ok(updated_at) => updated_at,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut release_stmt =
            conn.prepare("SELECT version, stable FROM releases ORDER BY position")?;
        let mut file_stmt = conn.prepare(
            r#"
            SELECT filename, os, arch, sha256, size, kind FROM files
            WHERE version = ?1 ORDER BY id
            "#,
        )?;

        let rows = release_stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, bool>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut releases = Vec::with_capacity(rows.len());
        for (version_str, stable) in rows {
            let Ok(version) = Version::parse(&version_str) else {
                warn!("Ignoring cached release with invalid version {}", version_str);
                continue;
            };

            let files = file_stmt
                .query_map([&version_str], |row| {
                    Ok(ReleaseFile {
                        filename: row.get(0)?,
                        os: row.get(1)?,
                        arch: row.get(2)?,
                        sha256: row.get(3)?,
                        size: row.get::<_, i64>(4)? as u64,
                        kind: row.get(5)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            releases.push(Release {
                version,
                stable,
                files,
            });
        }

        Ok(Some(CachedReleases {
            releases,
            updated_at,
        }))
    }

    /// Whether releases stored at `updated_at` may still be served
    pub fn is_fresh(&self, updated_at: i64) -> bool {
        Self::current_timestamp_ms() - updated_at < self.refresh_interval
    }
}

/// RemoteIndex that serves a fresh cached copy and falls back to a stale one
/// when the remote cannot be reached
pub struct CachedIndex {
    inner: Box<dyn RemoteIndex>,
    cache: Option<IndexCache>,
}

impl CachedIndex {
    pub fn new(inner: Box<dyn RemoteIndex>, cache: Option<IndexCache>) -> Self {
        Self { inner, cache }
    }

    fn load_cached(&self) -> Option<CachedReleases> {
        let cache = self.cache.as_ref()?;
        match cache.load_releases() {
            Ok(cached) => cached,
            Err(e) => {
                warn!("Failed to read index cache: {}", e);
                None
            }
        }
    }
}

#[async_trait::async_trait]
impl RemoteIndex for CachedIndex {
    fn source_url(&self) -> String {
        self.inner.source_url()
    }

    async fn fetch_releases(&self) -> Result<Vec<Release>, FetchError> {
        let cached = self.load_cached();

        if let (Some(cache), Some(cached)) = (&self.cache, &cached)
            && cache.is_fresh(cached.updated_at)
        {
            debug!("Serving {} releases from cache", cached.releases.len());
            return Ok(cached.releases.clone());
        }

        match self.inner.fetch_releases().await {
            Ok(releases) => {
                if let Some(cache) = &self.cache
                    && let Err(e) = cache.replace_releases(&releases)
                {
                    warn!("Failed to update index cache: {}", e);
                }
                Ok(releases)
            }
            Err(e) => match cached {
                Some(stale) if !stale.releases.is_empty() => {
                    warn!(
                        "Release index unavailable ({}); using cached copy from {}",
                        e,
                        chrono::DateTime::from_timestamp_millis(stale.updated_at)
                            .map(|t| t.to_rfc3339())
                            .unwrap_or_else(|| stale.updated_at.to_string())
                    );
                    Ok(stale.releases)
                }
                _ => Err(e),
            },
        }
    }
}
