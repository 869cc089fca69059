//! # Catalog Store
//!
//! The persistence seam of the sync engine: record upserts, relation
//! replacement, cursor access and parent enumeration.
//!
//! [`SqliteCatalogStore`] composes the `core-library` repositories and
//! publishes a [`LibraryEvent`] on the event bus after every successful
//! write, so view layers can invalidate what they show.

use crate::records::RecordBatch;
use crate::{Result, SyncError};
use async_trait::async_trait;
use core_library::{
    AlbumRepository, ArtistRepository, CursorRepository, EntityKind, Lyrics, LyricsRepository,
    PlaylistRepository, SqliteAlbumRepository, SqliteArtistRepository, SqliteCursorRepository,
    SqliteLyricsRepository, SqlitePlaylistRepository, SqliteTrackRepository, SyncCursor,
    TrackRepository,
};
use core_runtime::events::{CoreEvent, EventBus, LibraryEvent};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::debug;

/// Parent → children relation sets maintained by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    /// Ordered track list of a playlist
    PlaylistTracks,
    /// Albums the server lists as similar to an album
    SimilarAlbums,
}

impl Relation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Relation::PlaylistTracks => "playlist_tracks",
            Relation::SimilarAlbums => "similar_albums",
        }
    }
}

impl std::fmt::Display for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Storage operations the sync engine relies on.
///
/// Record writes are upserts keyed by `(source_id, id)`, so replaying a page
/// is harmless. Relation writes are authoritative for the parent they name.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Upsert one page of records. Returns the number of rows written.
    async fn upsert_batch(&self, source_id: &str, batch: &RecordBatch) -> Result<u64>;

    /// Replace the full child set of `parent_id`
    async fn replace_relations(
        &self,
        source_id: &str,
        relation: Relation,
        parent_id: &str,
        child_ids: &[String],
    ) -> Result<()>;

    /// Write `child_ids` at positions `start_position..`, truncating anything
    /// stored at or after `start_position`
    async fn append_relations(
        &self,
        source_id: &str,
        relation: Relation,
        parent_id: &str,
        start_position: u32,
        child_ids: &[String],
    ) -> Result<()>;

    async fn read_cursor(
        &self,
        source_id: &str,
        kind: EntityKind,
        parent_id: Option<&str>,
    ) -> Result<Option<SyncCursor>>;

    /// All cursors of one kind for a source, across parents
    async fn list_cursors(&self, source_id: &str, kind: EntityKind) -> Result<Vec<SyncCursor>>;

    async fn write_cursor(&self, cursor: &SyncCursor) -> Result<()>;

    /// Rewind cursors of one kind (or all kinds) to `{0, incomplete}`
    async fn reset_cursors(&self, source_id: &str, kind: Option<EntityKind>) -> Result<u64>;

    /// Ids of stored records that can act as parents for `kind`'s children.
    ///
    /// `Album` and `Playlist` enumerate their tables; `AlbumTrack` enumerates
    /// stored tracks.
    async fn query_parents(
        &self,
        source_id: &str,
        kind: EntityKind,
        limit: Option<u32>,
    ) -> Result<Vec<String>>;

    async fn parent_exists(&self, source_id: &str, kind: EntityKind, id: &str) -> Result<bool>;

    async fn upsert_lyrics(&self, source_id: &str, lyrics: &Lyrics) -> Result<()>;
}

// ============================================================================
// SQLite Implementation
// ============================================================================

/// [`CatalogStore`] backed by the `core-library` SQLite repositories.
pub struct SqliteCatalogStore {
    artists: Arc<dyn ArtistRepository>,
    albums: Arc<dyn AlbumRepository>,
    playlists: Arc<dyn PlaylistRepository>,
    tracks: Arc<dyn TrackRepository>,
    lyrics: Arc<dyn LyricsRepository>,
    cursors: Arc<dyn CursorRepository>,
    event_bus: Option<EventBus>,
}

impl SqliteCatalogStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            artists: Arc::new(SqliteArtistRepository::new(pool.clone())),
            albums: Arc::new(SqliteAlbumRepository::new(pool.clone())),
            playlists: Arc::new(SqlitePlaylistRepository::new(pool.clone())),
            tracks: Arc::new(SqliteTrackRepository::new(pool.clone())),
            lyrics: Arc::new(SqliteLyricsRepository::new(pool.clone())),
            cursors: Arc::new(SqliteCursorRepository::new(pool)),
            event_bus: None,
        }
    }

    /// Publish invalidation events on `event_bus` after writes
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn artists(&self) -> Arc<dyn ArtistRepository> {
        Arc::clone(&self.artists)
    }

    pub fn albums(&self) -> Arc<dyn AlbumRepository> {
        Arc::clone(&self.albums)
    }

    pub fn playlists(&self) -> Arc<dyn PlaylistRepository> {
        Arc::clone(&self.playlists)
    }

    pub fn tracks(&self) -> Arc<dyn TrackRepository> {
        Arc::clone(&self.tracks)
    }

    pub fn lyrics(&self) -> Arc<dyn LyricsRepository> {
        Arc::clone(&self.lyrics)
    }

    pub fn cursors(&self) -> Arc<dyn CursorRepository> {
        Arc::clone(&self.cursors)
    }

    fn emit(&self, event: LibraryEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Library(event)).ok();
        }
    }

    fn emit_relation(&self, source_id: &str, relation: Relation, parent_id: &str) {
        self.emit(LibraryEvent::RelationsReplaced {
            source_id: source_id.to_string(),
            relation: relation.as_str().to_string(),
            parent_id: parent_id.to_string(),
        });
    }
}

fn unsupported(field: &str, message: String) -> SyncError {
    SyncError::InvalidInput {
        field: field.to_string(),
        message,
    }
}

#[async_trait]
impl CatalogStore for SqliteCatalogStore {
    async fn upsert_batch(&self, source_id: &str, batch: &RecordBatch) -> Result<u64> {
        if batch.is_empty() {
            return Ok(0);
        }

        let written = match batch {
            RecordBatch::Artists(rows) => self.artists.upsert_batch(rows).await?,
            RecordBatch::Albums(rows) => self.albums.upsert_batch(rows).await?,
            RecordBatch::Playlists(rows) => self.playlists.upsert_batch(rows).await?,
            RecordBatch::Tracks(rows) => self.tracks.upsert_batch(rows).await?,
        };

        debug!(
            source_id = %source_id,
            entity = batch.entity_name(),
            written,
            "Batch upserted"
        );
        self.emit(LibraryEvent::EntitiesUpserted {
            source_id: source_id.to_string(),
            entity: batch.entity_name().to_string(),
            count: written,
        });

        Ok(written)
    }

    async fn replace_relations(
        &self,
        source_id: &str,
        relation: Relation,
        parent_id: &str,
        child_ids: &[String],
    ) -> Result<()> {
        match relation {
            Relation::PlaylistTracks => {
                self.playlists
                    .replace_tracks(source_id, parent_id, child_ids)
                    .await?
            }
            Relation::SimilarAlbums => {
                self.albums
                    .replace_similar(source_id, parent_id, child_ids)
                    .await?
            }
        }

        self.emit_relation(source_id, relation, parent_id);
        Ok(())
    }

    async fn append_relations(
        &self,
        source_id: &str,
        relation: Relation,
        parent_id: &str,
        start_position: u32,
        child_ids: &[String],
    ) -> Result<()> {
        match relation {
            Relation::PlaylistTracks => {
                self.playlists
                    .append_tracks(source_id, parent_id, i64::from(start_position), child_ids)
                    .await?
            }
            Relation::SimilarAlbums => {
                return Err(unsupported(
                    "relation",
                    "similar_albums is unordered and only supports replacement".to_string(),
                ))
            }
        }

        self.emit_relation(source_id, relation, parent_id);
        Ok(())
    }

    async fn read_cursor(
        &self,
        source_id: &str,
        kind: EntityKind,
        parent_id: Option<&str>,
    ) -> Result<Option<SyncCursor>> {
        Ok(self.cursors.find(source_id, kind, parent_id).await?)
    }

    async fn list_cursors(&self, source_id: &str, kind: EntityKind) -> Result<Vec<SyncCursor>> {
        Ok(self.cursors.list(source_id, Some(kind)).await?)
    }

    async fn write_cursor(&self, cursor: &SyncCursor) -> Result<()> {
        Ok(self.cursors.save(cursor).await?)
    }

    async fn reset_cursors(&self, source_id: &str, kind: Option<EntityKind>) -> Result<u64> {
        let count = self.cursors.reset(source_id, kind).await?;

        self.emit(LibraryEvent::CursorsReset {
            source_id: source_id.to_string(),
            entity: kind.map(|k| k.as_str().to_string()),
            count,
        });

        Ok(count)
    }

    async fn query_parents(
        &self,
        source_id: &str,
        kind: EntityKind,
        limit: Option<u32>,
    ) -> Result<Vec<String>> {
        let limit = limit.map(i64::from);

        let ids = match kind {
            EntityKind::Album => self.albums.list_ids(source_id, limit).await?,
            EntityKind::Playlist => self.playlists.list_ids(source_id, limit).await?,
            EntityKind::AlbumTrack => self.tracks.list_ids(source_id, limit).await?,
            other => {
                return Err(unsupported(
                    "kind",
                    format!("{} records cannot act as parents", other),
                ))
            }
        };

        Ok(ids)
    }

    async fn parent_exists(&self, source_id: &str, kind: EntityKind, id: &str) -> Result<bool> {
        let exists = match kind {
            EntityKind::Album => self.albums.exists(source_id, id).await?,
            EntityKind::Playlist => self.playlists.exists(source_id, id).await?,
            EntityKind::AlbumTrack => self.tracks.exists(source_id, id).await?,
            other => {
                return Err(unsupported(
                    "kind",
                    format!("{} records cannot act as parents", other),
                ))
            }
        };

        Ok(exists)
    }

    async fn upsert_lyrics(&self, source_id: &str, lyrics: &Lyrics) -> Result<()> {
        self.lyrics.upsert(lyrics).await?;

        self.emit(LibraryEvent::EntitiesUpserted {
            source_id: source_id.to_string(),
            entity: EntityKind::Lyrics.as_str().to_string(),
            count: 1,
        });

        Ok(())
    }
}
