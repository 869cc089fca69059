//! # Sync Run Repository
//!
//! Persists [`SyncRun`] records so callers can inspect what previous runs
//! fetched, when they finished and why they failed.

use crate::{Result, SyncError, SyncPhase, SyncRun, SyncRunId};
use async_trait::async_trait;
use sqlx::{FromRow, SqlitePool};

// ============================================================================
// Repository Trait
// ============================================================================

#[async_trait]
pub trait SyncRunRepository: Send + Sync {
    /// Insert a newly created run
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    async fn insert(&self, run: &SyncRun) -> Result<()>;

    /// Overwrite phase, counters and error of an existing run
    ///
    /// # Errors
    ///
    /// Returns `RunNotFound` if the run was never inserted
    async fn update(&self, run: &SyncRun) -> Result<()>;

    async fn find_by_id(&self, id: &SyncRunId) -> Result<Option<SyncRun>>;

    /// Most recent runs for a source, newest first
    async fn history(&self, source_id: &str, limit: u32) -> Result<Vec<SyncRun>>;

    async fn latest(&self, source_id: &str) -> Result<Option<SyncRun>>;
}

// ============================================================================
// SQLite Implementation
// ============================================================================

pub struct SqliteSyncRunRepository {
    pool: SqlitePool,
}

impl SqliteSyncRunRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the `sync_runs` table if it does not exist yet
    pub async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sync_runs (
                id TEXT PRIMARY KEY NOT NULL,
                source_id TEXT NOT NULL,
                phase TEXT NOT NULL,
                started_at INTEGER NOT NULL,
                finished_at INTEGER,
                items_fetched INTEGER NOT NULL DEFAULT 0,
                items_written INTEGER NOT NULL DEFAULT 0,
                error_message TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_sync_runs_source ON sync_runs(source_id, started_at DESC)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[derive(Debug, FromRow)]
struct SyncRunRow {
    id: String,
    source_id: String,
    phase: String,
    started_at: i64,
    finished_at: Option<i64>,
    items_fetched: i64,
    items_written: i64,
    error_message: Option<String>,
}

impl TryFrom<SyncRunRow> for SyncRun {
    type Error = SyncError;

    fn try_from(row: SyncRunRow) -> Result<Self> {
        Ok(SyncRun {
            id: SyncRunId::from_string(&row.id)?,
            source_id: row.source_id,
            phase: row.phase.parse::<SyncPhase>()?,
            started_at: row.started_at,
            finished_at: row.finished_at,
            items_fetched: row.items_fetched.max(0) as u64,
            items_written: row.items_written.max(0) as u64,
            error_message: row.error_message,
        })
    }
}

const SELECT_RUN: &str = r#"
    SELECT id, source_id, phase, started_at, finished_at,
           items_fetched, items_written, error_message
    FROM sync_runs
"#;

#[async_trait]
impl SyncRunRepository for SqliteSyncRunRepository {
    async fn insert(&self, run: &SyncRun) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sync_runs (
                id, source_id, phase, started_at, finished_at,
                items_fetched, items_written, error_message
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(run.id.as_str())
        .bind(&run.source_id)
        .bind(run.phase.as_str())
        .bind(run.started_at)
        .bind(run.finished_at)
        .bind(run.items_fetched as i64)
        .bind(run.items_written as i64)
        .bind(&run.error_message)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update(&self, run: &SyncRun) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE sync_runs SET
                phase = ?,
                finished_at = ?,
                items_fetched = ?,
                items_written = ?,
                error_message = ?
            WHERE id = ?
            "#,
        )
        .bind(run.phase.as_str())
        .bind(run.finished_at)
        .bind(run.items_fetched as i64)
        .bind(run.items_written as i64)
        .bind(&run.error_message)
        .bind(run.id.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(SyncError::RunNotFound {
                run_id: run.id.to_string(),
            });
        }

        Ok(())
    }

    async fn find_by_id(&self, id: &SyncRunId) -> Result<Option<SyncRun>> {
        let row = sqlx::query_as::<_, SyncRunRow>(&format!("{} WHERE id = ?", SELECT_RUN))
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(SyncRun::try_from).transpose()
    }

    async fn history(&self, source_id: &str, limit: u32) -> Result<Vec<SyncRun>> {
        let rows = sqlx::query_as::<_, SyncRunRow>(&format!(
            "{} WHERE source_id = ? ORDER BY started_at DESC, rowid DESC LIMIT ?",
            SELECT_RUN
        ))
        .bind(source_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(SyncRun::try_from)
            .collect::<Result<Vec<_>>>()
    }

    async fn latest(&self, source_id: &str) -> Result<Option<SyncRun>> {
        Ok(self.history(source_id, 1).await?.into_iter().next())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use core_library::create_test_pool;

    async fn setup_repo() -> SqliteSyncRunRepository {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteSyncRunRepository::new(pool);
        repo.initialize().await.unwrap();
        repo
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let repo = setup_repo().await;
        repo.initialize().await.unwrap();
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let repo = setup_repo().await;
        let run = SyncRun::new("src-1");

        repo.insert(&run).await.unwrap();

        let found = repo.find_by_id(&run.id).await.unwrap().unwrap();
        assert_eq!(found, run);
    }

    #[tokio::test]
    async fn test_update_persists_terminal_state() {
        let repo = setup_repo().await;
        let run = SyncRun::new("src-1").enter(SyncPhase::FetchingBasic).unwrap();
        repo.insert(&run).await.unwrap();

        let mut run = run.fail("driver down").unwrap();
        run.record_totals(40, 30);
        repo.update(&run).await.unwrap();

        let found = repo.find_by_id(&run.id).await.unwrap().unwrap();
        assert_eq!(found.phase, SyncPhase::Failed);
        assert_eq!(found.items_fetched, 40);
        assert_eq!(found.items_written, 30);
        assert_eq!(found.error_message.as_deref(), Some("driver down"));
    }

    #[tokio::test]
    async fn test_update_unknown_run() {
        let repo = setup_repo().await;
        let err = repo.update(&SyncRun::new("src-1")).await.unwrap_err();
        assert!(matches!(err, SyncError::RunNotFound { .. }));
    }

    #[tokio::test]
    async fn test_history_is_scoped_and_newest_first() {
        let repo = setup_repo().await;

        let mut first = SyncRun::new("src-1");
        first.started_at = 100;
        let mut second = SyncRun::new("src-1");
        second.started_at = 200;
        let other = SyncRun::new("src-2");

        repo.insert(&first).await.unwrap();
        repo.insert(&second).await.unwrap();
        repo.insert(&other).await.unwrap();

        let history = repo.history("src-1", 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, second.id);
        assert_eq!(history[1].id, first.id);

        assert_eq!(repo.history("src-1", 1).await.unwrap().len(), 1);
        assert_eq!(repo.latest("src-1").await.unwrap().unwrap().id, second.id);
        assert!(repo.latest("missing").await.unwrap().is_none());
    }
}
