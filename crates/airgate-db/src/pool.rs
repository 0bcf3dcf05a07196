//! # Store Connection Management
//!
//! Opens the SQLite file behind the sample store and hands out the pool.
//!
//! The store lives on whatever disk the gateway host has, often an SD card
//! or small eMMC, and is written by two loops at once: the acquisition loop
//! inserting rows while the upload loop claims and marks them. WAL journal
//! mode keeps those two from blocking each other; NORMAL synchronous keeps
//! the file corruption-safe while tolerating the loss of the very last
//! transaction on a power cut, which the insert-before-delete acquisition
//! order already covers (the device still holds any sample whose row did
//! not make it to disk).

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::sample::SampleRepository;

// =============================================================================
// Configuration
// =============================================================================

/// How to open the sample store.
///
/// Built with [`DbConfig::new`] for an on-disk store or
/// [`DbConfig::in_memory`] for tests, then adjusted through the builder
/// methods.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite file. Created on first open.
    pub database_path: PathBuf,

    /// Pool ceiling. The gateway needs one connection per pipeline loop
    /// plus one for startup recovery; the default of 4 leaves one spare.
    pub max_connections: u32,

    /// Connections kept open while idle.
    pub min_connections: u32,

    /// How long an acquire may wait for a free connection before the
    /// query fails.
    pub connect_timeout: Duration,

    /// Idle time before a surplus connection is dropped.
    pub idle_timeout: Duration,

    /// Apply pending migrations on open. On by default; turned off only
    /// by tooling that inspects a store without touching its schema.
    pub run_migrations: bool,
}

impl DbConfig {
    /// Configuration for an on-disk store at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 4,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            run_migrations: true,
        }
    }

    /// Sets the pool ceiling.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the number of connections kept open while idle.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the acquire timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Enables or disables migrations on open.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Configuration for a throwaway in-memory store (tests).
    ///
    /// Pinned to a single connection: each `:memory:` connection is its
    /// own database, so a second connection would see empty tables.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(":memory:"),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            run_migrations: true,
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// Open handle to the sample store's SQLite file.
///
/// Cheap to clone; clones share the pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens (creating if needed) the store and brings its schema current.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Opening sample store"
        );

        let connect_url = format!("sqlite://{}?mode=rwc", config.database_path.display());

        let connect_options = SqliteConnectOptions::from_str(&connect_url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            // WAL: the upload loop's claim reads don't block acquisition
            // inserts.
            .journal_mode(SqliteJournalMode::Wal)
            // NORMAL: corruption-safe; a power cut may cost the last
            // transaction, which the device-side copy still covers.
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .create_if_missing(true);

        debug!("Connection options configured");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "Sample store pool ready"
        );

        let db = Database { pool };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Applies pending migrations. Idempotent; `new` already runs this
    /// unless the config disabled it.
    pub async fn run_migrations(&self) -> DbResult<()> {
        info!("Running store migrations");
        migrations::run_migrations(&self.pool).await?;
        info!("Migrations complete");
        Ok(())
    }

    /// Raw pool access for queries the repository does not cover.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// The sample repository over this store.
    pub fn samples(&self) -> SampleRepository {
        SampleRepository::new(self.pool.clone())
    }

    /// Closes the pool; every repository call afterwards fails.
    pub async fn close(&self) {
        info!("Closing sample store");
        self.pool.close().await;
    }

    /// True when the store still answers queries.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Tests
// =============================================================================
