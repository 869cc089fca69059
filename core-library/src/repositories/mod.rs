//! # Repository Pattern Implementation
//!
//! Repository traits and SQLite implementations for the catalog mirror.
//!
//! ## Architecture
//!
//! - Traits define the interface for each aggregate
//! - SQLite implementations use sqlx for async database access
//! - Record writes are batch upserts run inside one transaction
//! - Relation writes replace the full child set of one parent
//!
//! ## Available Repositories
//!
//! - `ArtistRepository` - Artists
//! - `AlbumRepository` - Albums, album artists and similar albums
//! - `PlaylistRepository` - Playlists and their ordered track lists
//! - `TrackRepository` - Tracks and track artists
//! - `LyricsRepository` - Plain and time-synced lyrics per track
//! - `CursorRepository` - Sync resume points

pub mod album;
pub mod artist;
pub mod cursor;
pub mod lyrics;
pub mod playlist;
pub mod track;

pub use album::{AlbumRepository, SqliteAlbumRepository};
pub use artist::{ArtistRepository, SqliteArtistRepository};
pub use cursor::{CursorRepository, SqliteCursorRepository};
pub use lyrics::{LyricsRepository, SqliteLyricsRepository};
pub use playlist::{PlaylistRepository, SqlitePlaylistRepository};
pub use track::{SqliteTrackRepository, TrackRepository};

use crate::error::{LibraryError, Result};
use sqlx::{query, SqliteConnection};

/// A link table between a parent record and an ordered set of children.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LinkTable {
    pub table: &'static str,
    pub parent_column: &'static str,
    pub child_column: &'static str,
}

pub(crate) const ALBUM_ARTISTS: LinkTable = LinkTable {
    table: "album_artists",
    parent_column: "album_id",
    child_column: "artist_id",
};

pub(crate) const TRACK_ARTISTS: LinkTable = LinkTable {
    table: "track_artists",
    parent_column: "track_id",
    child_column: "artist_id",
};

pub(crate) const SIMILAR_ALBUMS: LinkTable = LinkTable {
    table: "similar_albums",
    parent_column: "album_id",
    child_column: "similar_album_id",
};

/// Delete every link of `parent_id` and insert `child_ids` in order.
///
/// Duplicate children keep their first position.
pub(crate) async fn replace_links(
    conn: &mut SqliteConnection,
    links: LinkTable,
    source_id: &str,
    parent_id: &str,
    child_ids: &[String],
) -> Result<()> {
    let delete_sql = format!(
        "DELETE FROM {} WHERE source_id = ? AND {} = ?",
        links.table, links.parent_column
    );
    query(&delete_sql)
        .bind(source_id)
        .bind(parent_id)
        .execute(&mut *conn)
        .await?;

    let insert_sql = format!(
        "INSERT OR IGNORE INTO {} (source_id, {}, {}, position) VALUES (?, ?, ?, ?)",
        links.table, links.parent_column, links.child_column
    );
    for (position, child_id) in child_ids.iter().enumerate() {
        query(&insert_sql)
            .bind(source_id)
            .bind(parent_id)
            .bind(child_id)
            .bind(position as i64)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

/// Child ids of `parent_id` in position order.
pub(crate) async fn load_links(
    conn: &mut SqliteConnection,
    links: LinkTable,
    source_id: &str,
    parent_id: &str,
) -> Result<Vec<String>> {
    let sql = format!(
        "SELECT {} FROM {} WHERE source_id = ? AND {} = ? ORDER BY position ASC",
        links.child_column, links.table, links.parent_column
    );
    let rows: Vec<(String,)> = sqlx::query_as(&sql)
        .bind(source_id)
        .bind(parent_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(rows.into_iter().map(|(id,)| id).collect())
}

pub(crate) fn invalid(entity: &str, message: String) -> LibraryError {
    LibraryError::InvalidInput {
        field: entity.to_string(),
        message,
    }
}

/// SQLite treats a negative LIMIT as "no limit".
pub(crate) fn sql_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(-1)
}
