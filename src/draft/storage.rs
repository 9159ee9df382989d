/// Draft persistence boundary and its SQLite implementation
///
/// `DraftStore` is the only way the engine touches durable storage. Any backend
/// works as long as it offers upsert-by-session and read-by-session, with "not
/// found" as an ordinary result rather than an error.

use crate::draft::snapshot::{DraftSnapshot, DraftSummary};
use crate::error::EngineError;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{sqlite::SqlitePool, Row};
use thiserror::Error;

/// Infrastructure failure of a draft store
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("snapshot encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("corrupt draft row: {0}")]
    Corrupt(String),

    #[error("store offline: {0}")]
    Offline(String),

    #[error("draft {0} was discarded")]
    Discarded(String),
}

impl From<StorageError> for EngineError {
    fn from(err: StorageError) -> Self {
        EngineError::StorageUnavailable(err.to_string())
    }
}

/// Result of a draft lookup
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Found(DraftSnapshot),
    NotFound,
}

#[async_trait]
pub trait DraftStore: Send + Sync {
    /// Upsert, fully replacing any prior snapshot of the session
    async fn save(&self, snapshot: &DraftSnapshot) -> Result<(), StorageError>;

    /// Most recently saved snapshot of the session
    async fn load(&self, session_id: &str) -> Result<LoadOutcome, StorageError>;

    /// Discard a draft; returns whether one existed
    async fn delete(&self, session_id: &str) -> Result<bool, StorageError>;

    /// All drafts, most recently saved first
    async fn list(&self) -> Result<Vec<DraftSummary>, StorageError>;
}

/// SQLite-backed draft store
///
/// Snapshots are stored whole as JSON, with the listing fields copied into
/// indexed columns.
#[derive(Debug, Clone)]
pub struct SqliteDraftStore {
    pool: SqlitePool,
}

impl SqliteDraftStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the drafts table and indexes (safe to call repeatedly)
    pub async fn init_schema(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS drafts (
                session_id TEXT PRIMARY KEY,
                flow_kind TEXT NOT NULL,
                flow_variant TEXT NOT NULL,
                current_phase_id TEXT NOT NULL,
                progress_percent INTEGER NOT NULL,
                snapshot JSON NOT NULL,
                saved_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_drafts_saved_at ON drafts(saved_at)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl DraftStore for SqliteDraftStore {
    async fn save(&self, snapshot: &DraftSnapshot) -> Result<(), StorageError> {
        let snapshot_json = serde_json::to_string(snapshot)?;

        sqlx::query(
            r#"
            INSERT INTO drafts (session_id, flow_kind, flow_variant, current_phase_id, progress_percent, snapshot, saved_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(session_id) DO UPDATE SET
                flow_kind = excluded.flow_kind,
                flow_variant = excluded.flow_variant,
                current_phase_id = excluded.current_phase_id,
                progress_percent = excluded.progress_percent,
                snapshot = excluded.snapshot,
                saved_at = excluded.saved_at
            "#,
        )
        .bind(&snapshot.session_id)
        .bind(snapshot.flow_kind.as_str())
        .bind(snapshot.flow_variant.as_str())
        .bind(&snapshot.current_phase_id)
        .bind(i64::from(snapshot.progress_percent))
        .bind(&snapshot_json)
        .bind(snapshot.saved_at.to_rfc3339_opts(SecondsFormat::Micros, true))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load(&self, session_id: &str) -> Result<LoadOutcome, StorageError> {
        let row = sqlx::query("SELECT snapshot FROM drafts WHERE session_id = ?")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let snapshot_json: String = row.try_get("snapshot")?;
                let snapshot: DraftSnapshot = serde_json::from_str(&snapshot_json)?;
                Ok(LoadOutcome::Found(snapshot))
            }
            None => Ok(LoadOutcome::NotFound),
        }
    }

    async fn delete(&self, session_id: &str) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM drafts WHERE session_id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(&self) -> Result<Vec<DraftSummary>, StorageError> {
        let rows = sqlx::query(
            "SELECT session_id, flow_kind, flow_variant, current_phase_id, progress_percent, saved_at \
             FROM drafts ORDER BY saved_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut drafts = Vec::with_capacity(rows.len());
        for row in rows {
            let flow_kind: String = row.try_get("flow_kind")?;
            let flow_variant: String = row.try_get("flow_variant")?;
            let progress: i64 = row.try_get("progress_percent")?;
            let saved_at: String = row.try_get("saved_at")?;

            drafts.push(DraftSummary {
                session_id: row.try_get("session_id")?,
                flow_kind: flow_kind.parse().map_err(|e: EngineError| StorageError::Corrupt(e.to_string()))?,
                flow_variant: flow_variant
                    .parse()
                    .map_err(|e: EngineError| StorageError::Corrupt(e.to_string()))?,
                current_phase_id: row.try_get("current_phase_id")?,
                progress_percent: u8::try_from(progress.clamp(0, 100)).unwrap_or(100),
                saved_at: DateTime::parse_from_rfc3339(&saved_at)
                    .map(|ts| ts.with_timezone(&Utc))
                    .map_err(|e| StorageError::Corrupt(format!("saved_at '{}': {}", saved_at, e)))?,
            });
        }

        Ok(drafts)
    }
}
