//! Sync cursor repository
//!
//! Cursors are keyed by `(source_id, entity_kind, parent_id)`. The table stores
//! an empty string for kinds without a parent; the model uses `None`.

use crate::error::Result;
use crate::models::{EntityKind, SyncCursor};
use async_trait::async_trait;
use sqlx::{query, query_as, FromRow, SqlitePool};

#[async_trait]
pub trait CursorRepository: Send + Sync {
    async fn find(
        &self,
        source_id: &str,
        kind: EntityKind,
        parent_id: Option<&str>,
    ) -> Result<Option<SyncCursor>>;

    /// Insert or overwrite a cursor
    async fn save(&self, cursor: &SyncCursor) -> Result<()>;

    /// Every cursor of a source, optionally narrowed to one kind
    async fn list(&self, source_id: &str, kind: Option<EntityKind>) -> Result<Vec<SyncCursor>>;

    /// Rewind cursors to `{start_index: 0, completed: false}`.
    ///
    /// With `kind == None` every cursor of the source is reset. Returns the
    /// number of cursors touched.
    async fn reset(&self, source_id: &str, kind: Option<EntityKind>) -> Result<u64>;
}

#[derive(FromRow)]
struct CursorRow {
    source_id: String,
    entity_kind: String,
    parent_id: String,
    start_index: i64,
    page_size: i64,
    completed: bool,
    updated_at: i64,
}

impl TryFrom<CursorRow> for SyncCursor {
    type Error = crate::error::LibraryError;

    fn try_from(row: CursorRow) -> Result<Self> {
        Ok(SyncCursor {
            source_id: row.source_id,
            kind: row.entity_kind.parse()?,
            parent_id: Some(row.parent_id).filter(|p| !p.is_empty()),
            start_index: row.start_index,
            page_size: row.page_size,
            completed: row.completed,
            updated_at: row.updated_at,
        })
    }
}

pub struct SqliteCursorRepository {
    pool: SqlitePool,
}

impl SqliteCursorRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CursorRepository for SqliteCursorRepository {
    async fn find(
        &self,
        source_id: &str,
        kind: EntityKind,
        parent_id: Option<&str>,
    ) -> Result<Option<SyncCursor>> {
        let row = query_as::<_, CursorRow>(
            r#"
            SELECT * FROM sync_cursors
            WHERE source_id = ? AND entity_kind = ? AND parent_id = ?
            "#,
        )
        .bind(source_id)
        .bind(kind.as_str())
        .bind(parent_id.unwrap_or(""))
        .fetch_optional(&self.pool)
        .await?;

        row.map(SyncCursor::try_from).transpose()
    }

    async fn save(&self, cursor: &SyncCursor) -> Result<()> {
        query(
            r#"
            INSERT INTO sync_cursors (
                source_id, entity_kind, parent_id, start_index, page_size, completed, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(source_id, entity_kind, parent_id) DO UPDATE SET
                start_index = excluded.start_index,
                page_size = excluded.page_size,
                completed = excluded.completed,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&cursor.source_id)
        .bind(cursor.kind.as_str())
        .bind(cursor.parent_id.as_deref().unwrap_or(""))
        .bind(cursor.start_index)
        .bind(cursor.page_size)
        .bind(cursor.completed)
        .bind(cursor.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list(&self, source_id: &str, kind: Option<EntityKind>) -> Result<Vec<SyncCursor>> {
        let rows = match kind {
            Some(kind) => {
                query_as::<_, CursorRow>(
                    "SELECT * FROM sync_cursors WHERE source_id = ? AND entity_kind = ?",
                )
                .bind(source_id)
                .bind(kind.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                query_as::<_, CursorRow>("SELECT * FROM sync_cursors WHERE source_id = ?")
                    .bind(source_id)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.into_iter().map(SyncCursor::try_from).collect()
    }

    async fn reset(&self, source_id: &str, kind: Option<EntityKind>) -> Result<u64> {
        let now = chrono::Utc::now().timestamp();

        let result = match kind {
            Some(kind) => {
                query(
                    r#"
                    UPDATE sync_cursors SET start_index = 0, completed = 0, updated_at = ?
                    WHERE source_id = ? AND entity_kind = ?
                    "#,
                )
                .bind(now)
                .bind(source_id)
                .bind(kind.as_str())
                .execute(&self.pool)
                .await?
            }
            None => {
                query(
                    r#"
                    UPDATE sync_cursors SET start_index = 0, completed = 0, updated_at = ?
                    WHERE source_id = ?
                    "#,
                )
                .bind(now)
                .bind(source_id)
                .execute(&self.pool)
                .await?
            }
        };

        Ok(result.rows_affected())
    }
}
