//! Lyrics repository trait and implementation

use crate::error::Result;
use crate::models::Lyrics;
use crate::repositories::invalid;
use async_trait::async_trait;
use sqlx::{query, query_as, query_scalar, SqlitePool};

/// Lyrics repository interface for data access operations
#[async_trait]
pub trait LyricsRepository: Send + Sync {
    /// Insert or replace the lyrics of a track. `created_at` is kept on update.
    async fn upsert(&self, lyrics: &Lyrics) -> Result<()>;

    async fn find_by_track_id(&self, source_id: &str, track_id: &str) -> Result<Option<Lyrics>>;

    async fn count(&self, source_id: &str) -> Result<i64>;
}

/// SQLite implementation of LyricsRepository
pub struct SqliteLyricsRepository {
    pool: SqlitePool,
}

impl SqliteLyricsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LyricsRepository for SqliteLyricsRepository {
    async fn upsert(&self, lyrics: &Lyrics) -> Result<()> {
        lyrics.validate().map_err(|e| invalid("Lyrics", e))?;

        query(
            r#"
            INSERT INTO lyrics (source_id, track_id, synced, body, language, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(source_id, track_id) DO UPDATE SET
                synced = excluded.synced,
                body = excluded.body,
                language = excluded.language,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&lyrics.source_id)
        .bind(&lyrics.track_id)
        .bind(lyrics.synced)
        .bind(&lyrics.body)
        .bind(&lyrics.language)
        .bind(lyrics.created_at)
        .bind(lyrics.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_track_id(&self, source_id: &str, track_id: &str) -> Result<Option<Lyrics>> {
        let lyrics =
            query_as::<_, Lyrics>("SELECT * FROM lyrics WHERE source_id = ? AND track_id = ?")
                .bind(source_id)
                .bind(track_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(lyrics)
    }

    async fn count(&self, source_id: &str) -> Result<i64> {
        let count = query_scalar::<_, i64>("SELECT COUNT(*) FROM lyrics WHERE source_id = ?")
            .bind(source_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;
    use crate::error::LibraryError;

    #[tokio::test]
    async fn test_upsert_and_replace_lyrics() {
        let repo = SqliteLyricsRepository::new(create_test_pool().await.unwrap());

        let mut plain = Lyrics::new("src", "t-1", "first line");
        plain.created_at = 10;
        repo.upsert(&plain).await.unwrap();

        let mut synced = Lyrics::new("src", "t-1", "[00:01.00] first line");
        synced.synced = true;
        synced.language = Some("en".to_string());
        repo.upsert(&synced).await.unwrap();

        let found = repo.find_by_track_id("src", "t-1").await.unwrap().unwrap();
        assert!(found.synced);
        assert_eq!(found.created_at, 10);
        assert_eq!(found.language.as_deref(), Some("en"));
        assert_eq!(repo.count("src").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_empty_lyrics_rejected() {
        let repo = SqliteLyricsRepository::new(create_test_pool().await.unwrap());
        let result = repo.upsert(&Lyrics::new("src", "t-1", " ")).await;
        assert!(matches!(result, Err(LibraryError::InvalidInput { .. })));
    }
}
