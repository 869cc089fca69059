//! Playlist repository trait and implementation

use crate::error::Result;
use crate::models::Playlist;
use crate::repositories::{invalid, sql_limit};
use async_trait::async_trait;
use sqlx::{query, query_as, query_scalar, SqlitePool};

/// Playlist repository interface for data access operations
#[async_trait]
pub trait PlaylistRepository: Send + Sync {
    /// Insert or update a batch of playlists in one transaction.
    ///
    /// Returns the number of rows written.
    async fn upsert_batch(&self, playlists: &[Playlist]) -> Result<u64>;

    async fn find_by_id(&self, source_id: &str, id: &str) -> Result<Option<Playlist>>;

    /// Playlist ids for a source in insertion order, optionally limited
    async fn list_ids(&self, source_id: &str, limit: Option<i64>) -> Result<Vec<String>>;

    async fn exists(&self, source_id: &str, id: &str) -> Result<bool>;

    async fn count(&self, source_id: &str) -> Result<i64>;

    /// Replace the whole track list of a playlist
    async fn replace_tracks(
        &self,
        source_id: &str,
        playlist_id: &str,
        track_ids: &[String],
    ) -> Result<()>;

    /// Write `track_ids` at positions `start_position..`, dropping anything
    /// previously stored at or after `start_position`
    async fn append_tracks(
        &self,
        source_id: &str,
        playlist_id: &str,
        start_position: i64,
        track_ids: &[String],
    ) -> Result<()>;

    /// Track ids of a playlist in playlist order
    async fn track_ids(&self, source_id: &str, playlist_id: &str) -> Result<Vec<String>>;
}

/// SQLite implementation of PlaylistRepository
pub struct SqlitePlaylistRepository {
    pool: SqlitePool,
}

impl SqlitePlaylistRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PlaylistRepository for SqlitePlaylistRepository {
    async fn upsert_batch(&self, playlists: &[Playlist]) -> Result<u64> {
        for playlist in playlists {
            playlist.validate().map_err(|e| invalid("Playlist", e))?;
        }

        let mut tx = self.pool.begin().await?;
        let mut written = 0;

        for playlist in playlists {
            let result = query(
                r#"
                INSERT INTO playlists (
                    source_id, id, name, normalized_name, description,
                    track_count, duration_ms, created_at, updated_at
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(source_id, id) DO UPDATE SET
                    name = excluded.name,
                    normalized_name = excluded.normalized_name,
                    description = excluded.description,
                    track_count = excluded.track_count,
                    duration_ms = excluded.duration_ms,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&playlist.source_id)
            .bind(&playlist.id)
            .bind(&playlist.name)
            .bind(&playlist.normalized_name)
            .bind(&playlist.description)
            .bind(playlist.track_count)
            .bind(playlist.duration_ms)
            .bind(playlist.created_at)
            .bind(playlist.updated_at)
            .execute(&mut *tx)
            .await?;

            written += result.rows_affected();
        }

        tx.commit().await?;
        Ok(written)
    }

    async fn find_by_id(&self, source_id: &str, id: &str) -> Result<Option<Playlist>> {
        let playlist =
            query_as::<_, Playlist>("SELECT * FROM playlists WHERE source_id = ? AND id = ?")
                .bind(source_id)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(playlist)
    }

    async fn list_ids(&self, source_id: &str, limit: Option<i64>) -> Result<Vec<String>> {
        let ids = query_scalar::<_, String>(
            "SELECT id FROM playlists WHERE source_id = ? ORDER BY created_at ASC, id ASC LIMIT ?",
        )
        .bind(source_id)
        .bind(sql_limit(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn exists(&self, source_id: &str, id: &str) -> Result<bool> {
        let found =
            query_scalar::<_, i64>("SELECT 1 FROM playlists WHERE source_id = ? AND id = ?")
                .bind(source_id)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(found.is_some())
    }

    async fn count(&self, source_id: &str) -> Result<i64> {
        let count = query_scalar::<_, i64>("SELECT COUNT(*) FROM playlists WHERE source_id = ?")
            .bind(source_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn replace_tracks(
        &self,
        source_id: &str,
        playlist_id: &str,
        track_ids: &[String],
    ) -> Result<()> {
        self.append_tracks(source_id, playlist_id, 0, track_ids).await
    }

    async fn append_tracks(
        &self,
        source_id: &str,
        playlist_id: &str,
        start_position: i64,
        track_ids: &[String],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        query(
            "DELETE FROM playlist_tracks WHERE source_id = ? AND playlist_id = ? AND position >= ?",
        )
        .bind(source_id)
        .bind(playlist_id)
        .bind(start_position)
        .execute(&mut *tx)
        .await?;

        for (i, track_id) in track_ids.iter().enumerate() {
            query(
                r#"
                INSERT INTO playlist_tracks (source_id, playlist_id, position, track_id)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(source_id)
            .bind(playlist_id)
            .bind(start_position + i as i64)
            .bind(track_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn track_ids(&self, source_id: &str, playlist_id: &str) -> Result<Vec<String>> {
        let ids = query_scalar::<_, String>(
            r#"
            SELECT track_id FROM playlist_tracks
            WHERE source_id = ? AND playlist_id = ?
            ORDER BY position ASC
            "#,
        )
        .bind(source_id)
        .bind(playlist_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    async fn setup_repo() -> SqlitePlaylistRepository {
        SqlitePlaylistRepository::new(create_test_pool().await.unwrap())
    }

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test]
    async fn test_upsert_and_find() {
        let repo = setup_repo().await;

        let mut playlist = Playlist::new("src", "pl-1", "Road Trip");
        playlist.description = Some("Long drives".to_string());
        playlist.track_count = 12;
        assert_eq!(repo.upsert_batch(&[playlist]).await.unwrap(), 1);

        let found = repo.find_by_id("src", "pl-1").await.unwrap().unwrap();
        assert_eq!(found.name, "Road Trip");
        assert_eq!(found.track_count, 12);
        assert_eq!(repo.list_ids("src", None).await.unwrap(), ids(&["pl-1"]));
    }

    #[tokio::test]
    async fn test_replace_tracks_is_authoritative() {
        let repo = setup_repo().await;

        repo.replace_tracks("src", "P", &ids(&["a", "b", "c"])).await.unwrap();
        repo.replace_tracks("src", "P", &ids(&["a", "d"])).await.unwrap();

        assert_eq!(repo.track_ids("src", "P").await.unwrap(), ids(&["a", "d"]));
    }

    #[tokio::test]
    async fn test_append_continues_after_first_page() {
        let repo = setup_repo().await;

        repo.replace_tracks("src", "P", &ids(&["a", "b"])).await.unwrap();
        repo.append_tracks("src", "P", 2, &ids(&["c", "a"])).await.unwrap();

        assert_eq!(
            repo.track_ids("src", "P").await.unwrap(),
            ids(&["a", "b", "c", "a"]),
            "playlists may repeat a track"
        );
    }

    #[tokio::test]
    async fn test_append_truncates_stale_tail() {
        let repo = setup_repo().await;

        repo.replace_tracks("src", "P", &ids(&["a", "b", "c", "d"])).await.unwrap();
        repo.append_tracks("src", "P", 2, &ids(&["x"])).await.unwrap();

        assert_eq!(repo.track_ids("src", "P").await.unwrap(), ids(&["a", "b", "x"]));
    }
}
