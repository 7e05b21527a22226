use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use rusqlite::{Connection, params};

use super::models::JobRecord;

/// Async-safe handle to the job registry database.
///
/// Wraps `RegistryDb` behind `Arc<Mutex>` and runs all access on tokio's
/// blocking thread pool via `spawn_blocking`, preventing synchronous SQLite
/// I/O from tying up async worker threads.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<std::sync::Mutex<RegistryDb>>,
}

impl DbHandle {
    pub fn new(db: RegistryDb) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
        }
    }

    /// Run a closure with access to the database on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&RegistryDb) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db.lock().map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
            f(&guard)
        })
        .await
        .context("DB task panicked")?
    }
}

pub struct RegistryDb {
    conn: Connection,
}

impl RegistryDb {
    /// Open (or create) a SQLite database at the given path and run migrations.
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        self.run_migrations().context("Failed to run migrations")?;
        Ok(())
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS agent_jobs (
                    job_id TEXT PRIMARY KEY,
                    callback_url TEXT NOT NULL,
                    metadata TEXT NOT NULL DEFAULT '{}',
                    created_at TEXT NOT NULL
                );
                ",
            )
            .context("Failed to create agent_jobs table")?;

        // Additive migration, safe to re-run. Rows written before this column
        // existed keep NULL and read back as legacy unsigned jobs.
        match self
            .conn
            .execute("ALTER TABLE agent_jobs ADD COLUMN signing_secret TEXT", [])
        {
            Ok(_) => {}
            Err(e) if e.to_string().contains("duplicate column") => {}
            Err(e) => return Err(anyhow::anyhow!("Failed to add signing_secret column: {}", e)),
        }

        Ok(())
    }

    // ── Job rows ──────────────────────────────────────────────────────

    /// Insert a new job mapping. Returns `None` if a row for `job_id` already
    /// exists; registrations are write-once and never overwrite.
    pub fn insert_job(
        &self,
        job_id: &str,
        callback_url: &str,
        signing_secret: Option<&str>,
        metadata: &serde_json::Value,
    ) -> Result<Option<JobRecord>> {
        let exists: bool = self
            .conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM agent_jobs WHERE job_id = ?1",
                params![job_id],
                |row| row.get(0),
            )
            .context("Failed to check for existing job")?;
        if exists {
            return Ok(None);
        }

        let metadata_str =
            serde_json::to_string(metadata).context("Failed to serialize job metadata")?;
        let created_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO agent_jobs (job_id, callback_url, signing_secret, metadata, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![job_id, callback_url, signing_secret, metadata_str, created_at],
            )
            .context("Failed to insert job")?;
        self.get_job(job_id)?
            .context("Job not found after insert")
            .map(Some)
    }

    pub fn get_job(&self, job_id: &str) -> Result<Option<JobRecord>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT job_id, callback_url, signing_secret, metadata, created_at
                 FROM agent_jobs WHERE job_id = ?1",
            )
            .context("Failed to prepare get_job")?;
        let mut rows = stmt
            .query_map(params![job_id], |row| {
                Ok(JobRow {
                    job_id: row.get(0)?,
                    callback_url: row.get(1)?,
                    signing_secret: row.get(2)?,
                    metadata: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })
            .context("Failed to query job")?;
        match rows.next() {
            Some(row) => {
                let r = row.context("Failed to read job row")?;
                Ok(Some(r.into_job_record()?))
            }
            None => Ok(None),
        }
    }
}

// ── Internal row helpers ──────────────────────────────────────────────

/// Intermediate row struct for reading jobs from SQLite before converting
/// the metadata string into a JSON value.
struct JobRow {
    job_id: String,
    callback_url: String,
    signing_secret: Option<String>,
    metadata: String,
    created_at: String,
}

impl JobRow {
    fn into_job_record(self) -> Result<JobRecord> {
        let metadata: serde_json::Value =
            serde_json::from_str(&self.metadata).context("Failed to parse job metadata JSON")?;
        Ok(JobRecord {
            job_id: self.job_id,
            callback_url: self.callback_url,
            signing_secret: self.signing_secret,
            metadata,
            created_at: self.created_at,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────
