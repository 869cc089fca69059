//! Track repository trait and implementation

use crate::error::Result;
use crate::models::Track;
use crate::repositories::{invalid, load_links, replace_links, sql_limit, TRACK_ARTISTS};
use async_trait::async_trait;
use sqlx::{query, query_as, query_scalar, SqlitePool};

/// Track repository interface for data access operations
#[async_trait]
pub trait TrackRepository: Send + Sync {
    /// Insert or update a batch of tracks in one transaction.
    ///
    /// Each track's artist links are replaced by its `artist_ids`. A track
    /// written without an `album_id` keeps the album it already had.
    /// Returns the number of track rows written.
    async fn upsert_batch(&self, tracks: &[Track]) -> Result<u64>;

    /// Find a track by its remote id, with its artist ids loaded
    async fn find_by_id(&self, source_id: &str, id: &str) -> Result<Option<Track>>;

    /// Track ids for a source in insertion order, optionally limited
    async fn list_ids(&self, source_id: &str, limit: Option<i64>) -> Result<Vec<String>>;

    async fn exists(&self, source_id: &str, id: &str) -> Result<bool>;

    async fn count(&self, source_id: &str) -> Result<i64>;

    /// Tracks of an album in disc and track order
    async fn list_by_album(&self, source_id: &str, album_id: &str) -> Result<Vec<Track>>;
}

/// SQLite implementation of TrackRepository
pub struct SqliteTrackRepository {
    pool: SqlitePool,
}

impl SqliteTrackRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TrackRepository for SqliteTrackRepository {
    async fn upsert_batch(&self, tracks: &[Track]) -> Result<u64> {
        for track in tracks {
            track.validate().map_err(|e| invalid("Track", e))?;
        }

        let mut tx = self.pool.begin().await?;
        let mut written = 0;

        for track in tracks {
            let result = query(
                r#"
                INSERT INTO tracks (
                    source_id, id, title, normalized_title, album_id, track_number,
                    disc_number, duration_ms, genre, year, created_at, updated_at
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(source_id, id) DO UPDATE SET
                    title = excluded.title,
                    normalized_title = excluded.normalized_title,
                    album_id = COALESCE(excluded.album_id, tracks.album_id),
                    track_number = excluded.track_number,
                    disc_number = excluded.disc_number,
                    duration_ms = excluded.duration_ms,
                    genre = excluded.genre,
                    year = excluded.year,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&track.source_id)
            .bind(&track.id)
            .bind(&track.title)
            .bind(&track.normalized_title)
            .bind(&track.album_id)
            .bind(track.track_number)
            .bind(track.disc_number)
            .bind(track.duration_ms)
            .bind(&track.genre)
            .bind(track.year)
            .bind(track.created_at)
            .bind(track.updated_at)
            .execute(&mut *tx)
            .await?;

            written += result.rows_affected();

            replace_links(&mut tx, TRACK_ARTISTS, &track.source_id, &track.id, &track.artist_ids)
                .await?;
        }

        tx.commit().await?;
        Ok(written)
    }

    async fn find_by_id(&self, source_id: &str, id: &str) -> Result<Option<Track>> {
        let mut conn = self.pool.acquire().await?;

        let track = query_as::<_, Track>("SELECT * FROM tracks WHERE source_id = ? AND id = ?")
            .bind(source_id)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        match track {
            Some(mut track) => {
                track.artist_ids = load_links(&mut conn, TRACK_ARTISTS, source_id, id).await?;
                Ok(Some(track))
            }
            None => Ok(None),
        }
    }

    async fn list_ids(&self, source_id: &str, limit: Option<i64>) -> Result<Vec<String>> {
        let ids = query_scalar::<_, String>(
            "SELECT id FROM tracks WHERE source_id = ? ORDER BY created_at ASC, id ASC LIMIT ?",
        )
        .bind(source_id)
        .bind(sql_limit(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn exists(&self, source_id: &str, id: &str) -> Result<bool> {
        let found = query_scalar::<_, i64>("SELECT 1 FROM tracks WHERE source_id = ? AND id = ?")
            .bind(source_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(found.is_some())
    }

    async fn count(&self, source_id: &str) -> Result<i64> {
        let count = query_scalar::<_, i64>("SELECT COUNT(*) FROM tracks WHERE source_id = ?")
            .bind(source_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn list_by_album(&self, source_id: &str, album_id: &str) -> Result<Vec<Track>> {
        let tracks = query_as::<_, Track>(
            r#"
            SELECT * FROM tracks
            WHERE source_id = ? AND album_id = ?
            ORDER BY disc_number ASC, track_number ASC, id ASC
            "#,
        )
        .bind(source_id)
        .bind(album_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(tracks)
    }
}
