//! Album repository trait and implementation

use crate::error::Result;
use crate::models::Album;
use crate::repositories::{invalid, load_links, replace_links, sql_limit, ALBUM_ARTISTS, SIMILAR_ALBUMS};
use async_trait::async_trait;
use sqlx::{query, query_as, query_scalar, SqlitePool};

/// Album repository interface for data access operations
#[async_trait]
pub trait AlbumRepository: Send + Sync {
    /// Insert or update a batch of albums in one transaction.
    ///
    /// Each album's artist links are replaced by its `artist_ids`.
    /// Returns the number of album rows written.
    async fn upsert_batch(&self, albums: &[Album]) -> Result<u64>;

    /// Find an album by its remote id, with its artist ids loaded
    async fn find_by_id(&self, source_id: &str, id: &str) -> Result<Option<Album>>;

    /// Album ids for a source in insertion order, optionally limited
    async fn list_ids(&self, source_id: &str, limit: Option<i64>) -> Result<Vec<String>>;

    async fn exists(&self, source_id: &str, id: &str) -> Result<bool>;

    async fn count(&self, source_id: &str) -> Result<i64>;

    /// Replace the similar-album set of `album_id`
    async fn replace_similar(
        &self,
        source_id: &str,
        album_id: &str,
        similar_ids: &[String],
    ) -> Result<()>;

    /// Similar album ids of `album_id`, most similar first
    async fn similar_ids(&self, source_id: &str, album_id: &str) -> Result<Vec<String>>;
}

/// SQLite implementation of AlbumRepository
pub struct SqliteAlbumRepository {
    pool: SqlitePool,
}

impl SqliteAlbumRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AlbumRepository for SqliteAlbumRepository {
    async fn upsert_batch(&self, albums: &[Album]) -> Result<u64> {
        for album in albums {
            album.validate().map_err(|e| invalid("Album", e))?;
        }

        let mut tx = self.pool.begin().await?;
        let mut written = 0;

        for album in albums {
            let result = query(
                r#"
                INSERT INTO albums (
                    source_id, id, name, normalized_name, year, artwork_url,
                    track_count, duration_ms, created_at, updated_at
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(source_id, id) DO UPDATE SET
                    name = excluded.name,
                    normalized_name = excluded.normalized_name,
                    year = excluded.year,
                    artwork_url = excluded.artwork_url,
                    track_count = excluded.track_count,
                    duration_ms = excluded.duration_ms,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&album.source_id)
            .bind(&album.id)
            .bind(&album.name)
            .bind(&album.normalized_name)
            .bind(album.year)
            .bind(&album.artwork_url)
            .bind(album.track_count)
            .bind(album.duration_ms)
            .bind(album.created_at)
            .bind(album.updated_at)
            .execute(&mut *tx)
            .await?;

            written += result.rows_affected();

            replace_links(&mut tx, ALBUM_ARTISTS, &album.source_id, &album.id, &album.artist_ids)
                .await?;
        }

        tx.commit().await?;
        Ok(written)
    }

    async fn find_by_id(&self, source_id: &str, id: &str) -> Result<Option<Album>> {
        let mut conn = self.pool.acquire().await?;

        let album = query_as::<_, Album>("SELECT * FROM albums WHERE source_id = ? AND id = ?")
            .bind(source_id)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        match album {
            Some(mut album) => {
                album.artist_ids = load_links(&mut conn, ALBUM_ARTISTS, source_id, id).await?;
                Ok(Some(album))
            }
            None => Ok(None),
        }
    }

    async fn list_ids(&self, source_id: &str, limit: Option<i64>) -> Result<Vec<String>> {
        let ids = query_scalar::<_, String>(
            "SELECT id FROM albums WHERE source_id = ? ORDER BY created_at ASC, id ASC LIMIT ?",
        )
        .bind(source_id)
        .bind(sql_limit(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn exists(&self, source_id: &str, id: &str) -> Result<bool> {
        let found = query_scalar::<_, i64>("SELECT 1 FROM albums WHERE source_id = ? AND id = ?")
            .bind(source_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(found.is_some())
    }

    async fn count(&self, source_id: &str) -> Result<i64> {
        let count = query_scalar::<_, i64>("SELECT COUNT(*) FROM albums WHERE source_id = ?")
            .bind(source_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn replace_similar(
        &self,
        source_id: &str,
        album_id: &str,
        similar_ids: &[String],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        replace_links(&mut tx, SIMILAR_ALBUMS, source_id, album_id, similar_ids).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn similar_ids(&self, source_id: &str, album_id: &str) -> Result<Vec<String>> {
        let mut conn = self.pool.acquire().await?;
        load_links(&mut conn, SIMILAR_ALBUMS, source_id, album_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    async fn setup_repo() -> SqliteAlbumRepository {
        SqliteAlbumRepository::new(create_test_pool().await.unwrap())
    }

    fn album(id: &str, artists: &[&str]) -> Album {
        let mut album = Album::new("src", id, format!("Album {}", id));
        album.artist_ids = artists.iter().map(|a| a.to_string()).collect();
        album
    }

    #[tokio::test]
    async fn test_upsert_stores_artist_links_in_order() {
        let repo = setup_repo().await;

        repo.upsert_batch(&[album("al-1", &["ar-2", "ar-1"])]).await.unwrap();

        let found = repo.find_by_id("src", "al-1").await.unwrap().unwrap();
        assert_eq!(found.artist_ids, vec!["ar-2", "ar-1"]);
    }

    #[tokio::test]
    async fn test_refetch_replaces_artist_links() {
        let repo = setup_repo().await;

        repo.upsert_batch(&[album("al-1", &["ar-1", "ar-2", "ar-3"])]).await.unwrap();
        repo.upsert_batch(&[album("al-1", &["ar-3"])]).await.unwrap();

        let found = repo.find_by_id("src", "al-1").await.unwrap().unwrap();
        assert_eq!(found.artist_ids, vec!["ar-3"]);
        assert_eq!(repo.count("src").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_artist_ids_are_collapsed() {
        let repo = setup_repo().await;

        repo.upsert_batch(&[album("al-1", &["ar-1", "ar-1"])]).await.unwrap();

        let found = repo.find_by_id("src", "al-1").await.unwrap().unwrap();
        assert_eq!(found.artist_ids, vec!["ar-1"]);
    }

    #[tokio::test]
    async fn test_replace_similar() {
        let repo = setup_repo().await;
        repo.upsert_batch(&[album("al-1", &[])]).await.unwrap();

        let first: Vec<String> = vec!["al-2".into(), "al-3".into()];
        repo.replace_similar("src", "al-1", &first).await.unwrap();
        assert_eq!(repo.similar_ids("src", "al-1").await.unwrap(), first);

        let second: Vec<String> = vec!["al-4".into()];
        repo.replace_similar("src", "al-1", &second).await.unwrap();
        assert_eq!(repo.similar_ids("src", "al-1").await.unwrap(), second);
    }

    #[tokio::test]
    async fn test_missing_album() {
        let repo = setup_repo().await;
        assert!(repo.find_by_id("src", "nope").await.unwrap().is_none());
        assert!(!repo.exists("src", "nope").await.unwrap());
    }
}
