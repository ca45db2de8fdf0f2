//! On-disk page cache.
//!
//! Raw page markup keyed by indicator-set name, plus the reserved
//! `updated` entry holding when the pages were last sourced. A connection
//! is opened per operation and dropped straight after, so nothing is held
//! across a fetch and the publish that follows it. Reads open the file
//! read-only and never create it, so `status` can run beside the daemon.

use chrono::{DateTime, Local, NaiveDateTime, Utc};
use duckdb::{AccessMode, Config, Connection, OptionalExt, params};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Reserved key for the last-sourced timestamp.
pub const UPDATED_KEY: &str = "updated";

/// `DD/MM/YYYY, HH:MM:SS`
pub const UPDATED_FORMAT: &str = "%d/%m/%Y, %H:%M:%S";

// ── Schema ────────────────────────────────────────────────────────────────────

const DDL: &str = r#"
CREATE TABLE IF NOT EXISTS pages (
    key         VARCHAR   PRIMARY KEY,
    body        VARCHAR   NOT NULL,
    stored_at   TIMESTAMP NOT NULL
);
"#;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("nothing cached under {0:?}")]
    Miss(String),

    #[error("cache store error: {0}")]
    Store(#[from] duckdb::Error),

    #[error("could not create cache directory {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ── Cache ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Cache {
    path: PathBuf,
}

impl Cache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<Connection, CacheError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| CacheError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let conn = Connection::open(&self.path)?;
        conn.execute_batch(DDL)?;
        Ok(conn)
    }

    /// Read-only connection, or `None` when nothing was ever written.
    fn open_reader(&self) -> Result<Option<Connection>, CacheError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let config = Config::default().access_mode(AccessMode::ReadOnly)?;
        Ok(Some(Connection::open_with_flags(&self.path, config)?))
    }

    /// Raw markup for `key`. A key never written is a [`CacheError::Miss`].
    pub fn get(&self, key: &str) -> Result<String, CacheError> {
        self.lookup(key)?
            .ok_or_else(|| CacheError::Miss(key.to_string()))
    }

    fn lookup(&self, key: &str) -> Result<Option<String>, CacheError> {
        let Some(conn) = self.open_reader()? else {
            return Ok(None);
        };
        let body = conn
            .query_row("SELECT body FROM pages WHERE key = ?", params![key], |r| r.get(0))
            .optional()?;
        Ok(body)
    }

    /// Store (or overwrite) the markup for `key`.
    pub fn put(&self, key: &str, markup: &str) -> Result<(), CacheError> {
        let conn = self.open()?;
        conn.execute(
            r#"INSERT INTO pages (key, body, stored_at) VALUES (?, ?, ?)
               ON CONFLICT (key) DO UPDATE SET
                   body = excluded.body,
                   stored_at = excluded.stored_at"#,
            params![key, markup, Utc::now().naive_utc()],
        )?;
        debug!("cached {} ({} bytes)", key, markup.len());
        Ok(())
    }

    /// Whether the cache has ever been filled. A missing stamp is the
    /// signal to fetch everything before the first rebuild.
    pub fn has_updated(&self) -> Result<bool, CacheError> {
        Ok(self.lookup(UPDATED_KEY)?.is_some())
    }

    pub fn updated_timestamp(&self) -> Result<String, CacheError> {
        self.get(UPDATED_KEY)
    }

    pub fn put_updated_timestamp(&self, now: DateTime<Local>) -> Result<String, CacheError> {
        let stamp = format_updated(now);
        self.put(UPDATED_KEY, &stamp)?;
        Ok(stamp)
    }

    /// Every cached key with the time it was stored, for `status`.
    pub fn entries(&self) -> Result<Vec<(String, NaiveDateTime, usize)>, CacheError> {
        let Some(conn) = self.open_reader()? else {
            return Ok(Vec::new());
        };
        let mut stmt =
            conn.prepare("SELECT key, stored_at, length(body) FROM pages ORDER BY key")?;
        let rows = stmt
            .query_map([], |r| {
                let len: i64 = r.get(2)?;
                Ok((r.get(0)?, r.get(1)?, len as usize))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

pub fn format_updated(now: DateTime<Local>) -> String {
    now.format(UPDATED_FORMAT).to_string()
}
