//! Artist repository trait and implementation

use crate::error::Result;
use crate::models::Artist;
use crate::repositories::{invalid, sql_limit};
use async_trait::async_trait;
use sqlx::{query, query_as, query_scalar, SqlitePool};

/// Artist repository interface for data access operations
#[async_trait]
pub trait ArtistRepository: Send + Sync {
    /// Insert or update a batch of artists in one transaction.
    ///
    /// Existing rows keep their `created_at`. Returns the number of rows written.
    ///
    /// # Errors
    /// Returns error if any artist fails validation (nothing is written) or a
    /// database error occurs.
    async fn upsert_batch(&self, artists: &[Artist]) -> Result<u64>;

    /// Find an artist by its remote id
    async fn find_by_id(&self, source_id: &str, id: &str) -> Result<Option<Artist>>;

    /// Artist ids for a source in insertion order, optionally limited
    async fn list_ids(&self, source_id: &str, limit: Option<i64>) -> Result<Vec<String>>;

    async fn exists(&self, source_id: &str, id: &str) -> Result<bool>;

    async fn count(&self, source_id: &str) -> Result<i64>;
}

/// SQLite implementation of ArtistRepository
pub struct SqliteArtistRepository {
    pool: SqlitePool,
}

impl SqliteArtistRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ArtistRepository for SqliteArtistRepository {
    async fn upsert_batch(&self, artists: &[Artist]) -> Result<u64> {
        for artist in artists {
            artist.validate().map_err(|e| invalid("Artist", e))?;
        }

        let mut tx = self.pool.begin().await?;
        let mut written = 0;

        for artist in artists {
            let result = query(
                r#"
                INSERT INTO artists (
                    source_id, id, name, normalized_name, sort_name, image_url,
                    created_at, updated_at
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(source_id, id) DO UPDATE SET
                    name = excluded.name,
                    normalized_name = excluded.normalized_name,
                    sort_name = excluded.sort_name,
                    image_url = excluded.image_url,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&artist.source_id)
            .bind(&artist.id)
            .bind(&artist.name)
            .bind(&artist.normalized_name)
            .bind(&artist.sort_name)
            .bind(&artist.image_url)
            .bind(artist.created_at)
            .bind(artist.updated_at)
            .execute(&mut *tx)
            .await?;

            written += result.rows_affected();
        }

        tx.commit().await?;
        Ok(written)
    }

    async fn find_by_id(&self, source_id: &str, id: &str) -> Result<Option<Artist>> {
        let artist =
            query_as::<_, Artist>("SELECT * FROM artists WHERE source_id = ? AND id = ?")
                .bind(source_id)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(artist)
    }

    async fn list_ids(&self, source_id: &str, limit: Option<i64>) -> Result<Vec<String>> {
        let ids = query_scalar::<_, String>(
            "SELECT id FROM artists WHERE source_id = ? ORDER BY created_at ASC, id ASC LIMIT ?",
        )
        .bind(source_id)
        .bind(sql_limit(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn exists(&self, source_id: &str, id: &str) -> Result<bool> {
        let found = query_scalar::<_, i64>("SELECT 1 FROM artists WHERE source_id = ? AND id = ?")
            .bind(source_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(found.is_some())
    }

    async fn count(&self, source_id: &str) -> Result<i64> {
        let count = query_scalar::<_, i64>("SELECT COUNT(*) FROM artists WHERE source_id = ?")
            .bind(source_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
