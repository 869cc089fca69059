//! # Fetch Tasks
//!
//! A [`PageFetch`] is one page of one paginated listing, carried as a value.
//! Executing it fetches `[offset, offset + page_size)`, persists the records,
//! advances the cursor and hands back the continuation for the next page.
//! The engine submits that continuation to the same scheduler, so pages of
//! one chain run strictly one after another while different chains overlap.
//!
//! [`EnrichmentFetch`] is the single-shot counterpart used for similar
//! albums and lyrics.

use crate::records::{
    album_record, artist_record, lyrics_record, playlist_record, track_record, RecordBatch,
};
use crate::store::{CatalogStore, Relation};
use crate::{Result, SyncError};
use bridge_traits::catalog::{CatalogSource, PageWindow};
use core_library::{EntityKind, SyncCursor};
use tracing::{debug, trace};

/// Result of executing one fetch task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageOutcome {
    /// Records received from the driver
    pub fetched: u64,
    /// Records persisted
    pub written: u64,
    /// The listing is exhausted for this key
    pub completed: bool,
    /// Next page of the same chain, if any
    pub next: Option<PageFetch>,
}

// ============================================================================
// Paginated fetch
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFetch {
    pub source_id: String,
    pub kind: EntityKind,
    /// Album or playlist the listing is scoped to, for dependent kinds
    pub parent_id: Option<String>,
    pub offset: u32,
    pub page_size: u32,
}

impl PageFetch {
    pub fn new(
        source_id: impl Into<String>,
        kind: EntityKind,
        parent_id: Option<String>,
        offset: u32,
        page_size: u32,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            kind,
            parent_id,
            offset,
            page_size,
        }
    }

    /// Resume a listing where `cursor` left off
    pub fn from_cursor(cursor: &SyncCursor, page_size: u32) -> Self {
        Self::new(
            cursor.source_id.clone(),
            cursor.kind,
            cursor.parent_id.clone(),
            u32::try_from(cursor.start_index.max(0)).unwrap_or(u32::MAX),
            page_size,
        )
    }

    /// Human-readable task label, e.g. `album@500` or `album_track[al-1]@0`
    pub fn label(&self) -> String {
        match &self.parent_id {
            Some(parent) => format!("{}[{}]@{}", self.kind, parent, self.offset),
            None => format!("{}@{}", self.kind, self.offset),
        }
    }

    fn window(&self) -> PageWindow {
        PageWindow::new(self.offset, self.page_size)
    }

    fn continuation(&self, offset: u32) -> Self {
        Self {
            offset,
            ..self.clone()
        }
    }

    fn parent(&self) -> Result<&str> {
        self.parent_id.as_deref().ok_or_else(|| SyncError::InvalidInput {
            field: "parent_id".to_string(),
            message: format!("{} listings are scoped to a parent", self.kind),
        })
    }

    /// Fetch, persist and advance one page.
    ///
    /// # Errors
    ///
    /// Driver and store errors propagate unchanged. A dependent listing whose
    /// parent is no longer stored fails with `NotFound` before the driver is
    /// called.
    pub async fn execute(
        &self,
        source: &dyn CatalogSource,
        store: &dyn CatalogStore,
    ) -> Result<PageOutcome> {
        if self.offset == 0 {
            if let Some(parent_kind) = self.kind.parent_kind() {
                let parent = self.parent()?;
                if !store.parent_exists(&self.source_id, parent_kind, parent).await? {
                    return Err(SyncError::NotFound(format!("{} {}", parent_kind, parent)));
                }
            }
        }

        trace!(task = %self.label(), "Fetching page");
        let (batch, relation_ids) = self.fetch_batch(source).await?;
        let received = batch.len();
        let mut cursor = SyncCursor::new(
            self.source_id.clone(),
            self.kind,
            self.parent_id.clone(),
            i64::from(self.page_size),
        );

        if received == 0 {
            if let Some(ids) = relation_ids {
                // Nothing at or past this offset any more.
                let parent = self.parent()?;
                store
                    .append_relations(
                        &self.source_id,
                        Relation::PlaylistTracks,
                        parent,
                        self.offset,
                        &ids,
                    )
                    .await?;
            }
            cursor.mark_completed(i64::from(self.offset));
            store.write_cursor(&cursor).await?;

            debug!(task = %self.label(), "Listing exhausted");
            return Ok(PageOutcome {
                fetched: 0,
                written: 0,
                completed: true,
                next: None,
            });
        }

        let written = store.upsert_batch(&self.source_id, &batch).await?;

        if let Some(ids) = relation_ids {
            let parent = self.parent()?;
            if self.offset == 0 {
                store
                    .replace_relations(&self.source_id, Relation::PlaylistTracks, parent, &ids)
                    .await?;
            } else {
                store
                    .append_relations(
                        &self.source_id,
                        Relation::PlaylistTracks,
                        parent,
                        self.offset,
                        &ids,
                    )
                    .await?;
            }
        }

        cursor.record_page(i64::from(self.offset), received as i64);
        store.write_cursor(&cursor).await?;

        let next = if cursor.completed {
            None
        } else {
            let offset = u32::try_from(cursor.start_index).unwrap_or(u32::MAX);
            Some(self.continuation(offset))
        };

        debug!(
            task = %self.label(),
            received,
            written,
            completed = cursor.completed,
            "Page persisted"
        );

        Ok(PageOutcome {
            fetched: received as u64,
            written,
            completed: cursor.completed,
            next,
        })
    }

    /// Call the driver and convert the page. Playlist tracks also return the
    /// ordered track ids for the playlist relation.
    async fn fetch_batch(
        &self,
        source: &dyn CatalogSource,
    ) -> Result<(RecordBatch, Option<Vec<String>>)> {
        let source_id = self.source_id.as_str();
        let window = self.window();

        let fetched = match self.kind {
            EntityKind::Artist => {
                let page = source.list_artists(source_id, window).await?;
                let rows = page.into_iter().map(|r| artist_record(source_id, r)).collect();
                (RecordBatch::Artists(rows), None)
            }
            EntityKind::Album => {
                let page = source.list_albums(source_id, window).await?;
                let rows = page.into_iter().map(|r| album_record(source_id, r)).collect();
                (RecordBatch::Albums(rows), None)
            }
            EntityKind::Playlist => {
                let page = source.list_playlists(source_id, window).await?;
                let rows = page.into_iter().map(|r| playlist_record(source_id, r)).collect();
                (RecordBatch::Playlists(rows), None)
            }
            EntityKind::AlbumTrack => {
                let album_id = self.parent()?;
                let page = source.list_album_tracks(source_id, album_id, window).await?;
                let rows = page
                    .into_iter()
                    .map(|r| track_record(source_id, r, Some(album_id)))
                    .collect();
                (RecordBatch::Tracks(rows), None)
            }
            EntityKind::PlaylistTrack => {
                let playlist_id = self.parent()?;
                let page = source.list_playlist_tracks(source_id, playlist_id, window).await?;
                let ids = page.iter().map(|r| r.id.clone()).collect();
                let rows = page
                    .into_iter()
                    .map(|r| track_record(source_id, r, None))
                    .collect();
                (RecordBatch::Tracks(rows), Some(ids))
            }
            EntityKind::SimilarAlbum | EntityKind::Lyrics => {
                return Err(SyncError::InvalidInput {
                    field: "kind".to_string(),
                    message: format!("{} is not a paginated listing", self.kind),
                })
            }
        };

        Ok(fetched)
    }
}

// ============================================================================
// Enrichment fetch
// ============================================================================

/// Best-effort single request deriving data from one stored record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentFetch {
    pub source_id: String,
    /// `SimilarAlbum` or `Lyrics`
    pub kind: EntityKind,
    /// Album id for similar albums, track id for lyrics
    pub parent_id: String,
    /// Maximum similar albums to request
    pub limit: u32,
}

impl EnrichmentFetch {
    pub fn new(
        source_id: impl Into<String>,
        kind: EntityKind,
        parent_id: impl Into<String>,
        limit: u32,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            kind,
            parent_id: parent_id.into(),
            limit,
        }
    }

    pub fn label(&self) -> String {
        format!("{}[{}]", self.kind, self.parent_id)
    }

    /// Fetch and persist, then store a completed cursor for the parent.
    pub async fn execute(
        &self,
        source: &dyn CatalogSource,
        store: &dyn CatalogStore,
    ) -> Result<PageOutcome> {
        let source_id = self.source_id.as_str();

        let (fetched, written) = match self.kind {
            EntityKind::SimilarAlbum => {
                let albums = source
                    .list_similar_albums(source_id, &self.parent_id, self.limit)
                    .await?;
                let ids: Vec<String> = albums.iter().map(|a| a.id.clone()).collect();
                let batch = RecordBatch::Albums(
                    albums.into_iter().map(|a| album_record(source_id, a)).collect(),
                );

                let written = store.upsert_batch(source_id, &batch).await?;
                store
                    .replace_relations(source_id, Relation::SimilarAlbums, &self.parent_id, &ids)
                    .await?;
                (ids.len() as u64, written)
            }
            EntityKind::Lyrics => match source.get_lyrics(source_id, &self.parent_id).await? {
                Some(remote) => {
                    let lyrics = lyrics_record(source_id, remote);
                    store.upsert_lyrics(source_id, &lyrics).await?;
                    (1, 1)
                }
                None => (0, 0),
            },
            other => {
                return Err(SyncError::InvalidInput {
                    field: "kind".to_string(),
                    message: format!("{} is not an enrichment kind", other),
                })
            }
        };

        let mut cursor = SyncCursor::new(
            self.source_id.clone(),
            self.kind,
            Some(self.parent_id.clone()),
            i64::from(self.limit),
        );
        cursor.mark_completed(fetched as i64);
        store.write_cursor(&cursor).await?;

        trace!(task = %self.label(), fetched, written, "Enrichment stored");

        Ok(PageOutcome {
            fetched,
            written,
            completed: true,
            next: None,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteCatalogStore;
    use async_trait::async_trait;
    use bridge_traits::catalog::{
        RemoteAlbum, RemoteArtist, RemoteLyrics, RemotePlaylist, RemoteTrack,
    };
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use core_library::{create_test_pool, Album, Playlist};
    use mockall::mock;
    use mockall::predicate::*;

    mock! {
        pub Source {}

        #[async_trait]
        impl CatalogSource for Source {
            async fn list_artists(&self, source_id: &str, window: PageWindow) -> BridgeResult<Vec<RemoteArtist>>;
            async fn list_albums(&self, source_id: &str, window: PageWindow) -> BridgeResult<Vec<RemoteAlbum>>;
            async fn list_playlists(&self, source_id: &str, window: PageWindow) -> BridgeResult<Vec<RemotePlaylist>>;
            async fn list_album_tracks(&self, source_id: &str, album_id: &str, window: PageWindow) -> BridgeResult<Vec<RemoteTrack>>;
            async fn list_playlist_tracks(&self, source_id: &str, playlist_id: &str, window: PageWindow) -> BridgeResult<Vec<RemoteTrack>>;
            async fn list_similar_albums(&self, source_id: &str, album_id: &str, limit: u32) -> BridgeResult<Vec<RemoteAlbum>>;
            async fn get_lyrics(&self, source_id: &str, track_id: &str) -> BridgeResult<Option<RemoteLyrics>>;
        }
    }

    fn artists(range: std::ops::Range<u32>) -> Vec<RemoteArtist> {
        range
            .map(|i| RemoteArtist {
                id: format!("ar-{}", i),
                name: format!("Artist {}", i),
                sort_name: None,
                image_url: None,
            })
            .collect()
    }

    fn album(id: &str) -> RemoteAlbum {
        RemoteAlbum {
            id: id.to_string(),
            name: format!("Album {}", id),
            artist_ids: Vec::new(),
            year: None,
            artwork_url: None,
            track_count: None,
            duration_ms: None,
        }
    }

    fn tracks(ids: &[&str]) -> Vec<RemoteTrack> {
        ids.iter()
            .map(|id| RemoteTrack {
                id: id.to_string(),
                title: format!("Track {}", id),
                album_id: None,
                artist_ids: Vec::new(),
                track_number: None,
                disc_number: None,
                duration_ms: Some(1000),
                genre: None,
                year: None,
            })
            .collect()
    }

    async fn setup_store() -> SqliteCatalogStore {
        SqliteCatalogStore::new(create_test_pool().await.unwrap())
    }

    #[tokio::test]
    async fn test_full_page_returns_continuation() {
        let store = setup_store().await;
        let mut source = MockSource::new();
        source
            .expect_list_artists()
            .with(eq("src"), eq(PageWindow::new(0, 10)))
            .times(1)
            .returning(|_, _| Ok(artists(0..10)));

        let task = PageFetch::new("src", EntityKind::Artist, None, 0, 10);
        let outcome = task.execute(&source, &store).await.unwrap();

        assert_eq!(outcome.fetched, 10);
        assert_eq!(outcome.written, 10);
        assert!(!outcome.completed);
        assert_eq!(
            outcome.next,
            Some(PageFetch::new("src", EntityKind::Artist, None, 10, 10))
        );

        let cursor = store
            .read_cursor("src", EntityKind::Artist, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cursor.start_index, 10);
        assert!(!cursor.completed);
    }

    #[tokio::test]
    async fn test_short_page_completes_listing() {
        let store = setup_store().await;
        let mut source = MockSource::new();
        source
            .expect_list_artists()
            .times(1)
            .returning(|_, _| Ok(artists(10..14)));

        let task = PageFetch::new("src", EntityKind::Artist, None, 10, 10);
        let outcome = task.execute(&source, &store).await.unwrap();

        assert!(outcome.completed);
        assert!(outcome.next.is_none());

        let cursor = store
            .read_cursor("src", EntityKind::Artist, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cursor.start_index, 14);
        assert!(cursor.completed);
    }

    #[tokio::test]
    async fn test_empty_page_marks_completed_at_offset() {
        let store = setup_store().await;
        let mut source = MockSource::new();
        source.expect_list_albums().times(1).returning(|_, _| Ok(Vec::new()));

        let task = PageFetch::new("src", EntityKind::Album, None, 200, 100);
        let outcome = task.execute(&source, &store).await.unwrap();

        assert_eq!(outcome.fetched, 0);
        assert!(outcome.completed);

        let cursor = store
            .read_cursor("src", EntityKind::Album, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cursor.start_index, 200);
        assert!(cursor.completed);
    }

    #[tokio::test]
    async fn test_album_tracks_are_pinned_to_album() {
        let store = setup_store().await;
        store
            .upsert_batch("src", &RecordBatch::Albums(vec![Album::new("src", "al-1", "One")]))
            .await
            .unwrap();

        let mut source = MockSource::new();
        source
            .expect_list_album_tracks()
            .with(eq("src"), eq("al-1"), eq(PageWindow::new(0, 5)))
            .times(1)
            .returning(|_, _, _| Ok(tracks(&["t-1", "t-2"])));

        let task = PageFetch::new("src", EntityKind::AlbumTrack, Some("al-1".to_string()), 0, 5);
        task.execute(&source, &store).await.unwrap();

        let stored = store.tracks().list_by_album("src", "al-1").await.unwrap();
        assert_eq!(stored.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_parent_is_not_found_without_driver_call() {
        let store = setup_store().await;
        let mut source = MockSource::new();
        source.expect_list_album_tracks().times(0);

        let task = PageFetch::new("src", EntityKind::AlbumTrack, Some("gone".to_string()), 0, 5);
        let err = task.execute(&source, &store).await.unwrap_err();

        assert!(matches!(err, SyncError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_driver_error_leaves_cursor_untouched() {
        let store = setup_store().await;
        let mut source = MockSource::new();
        source
            .expect_list_playlists()
            .times(1)
            .returning(|_, _| Err(BridgeError::OperationFailed("HTTP 503".to_string())));

        let task = PageFetch::new("src", EntityKind::Playlist, None, 0, 10);
        let err = task.execute(&source, &store).await.unwrap_err();

        assert!(matches!(err, SyncError::Driver(_)));
        assert!(store
            .read_cursor("src", EntityKind::Playlist, None)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_playlist_pages_replace_then_append() {
        let store = setup_store().await;
        store
            .upsert_batch("src", &RecordBatch::Playlists(vec![Playlist::new("src", "p-1", "Mix")]))
            .await
            .unwrap();

        let mut source = MockSource::new();
        source
            .expect_list_playlist_tracks()
            .returning(|_, _, window| {
                Ok(match window.offset {
                    0 => tracks(&["a", "b"]),
                    2 => tracks(&["c"]),
                    _ => Vec::new(),
                })
            });

        let first = PageFetch::new("src", EntityKind::PlaylistTrack, Some("p-1".to_string()), 0, 2);
        let outcome = first.execute(&source, &store).await.unwrap();
        let second = outcome.next.unwrap();
        assert_eq!(second.offset, 2);
        let outcome = second.execute(&source, &store).await.unwrap();
        assert!(outcome.completed);

        assert_eq!(
            store.playlists().track_ids("src", "p-1").await.unwrap(),
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
    }

    #[tokio::test]
    async fn test_similar_albums_enrichment() {
        let store = setup_store().await;
        let mut source = MockSource::new();
        source
            .expect_list_similar_albums()
            .with(eq("src"), eq("al-1"), eq(20))
            .times(1)
            .returning(|_, _, _| Ok(vec![album("al-2"), album("al-3")]));

        let task = EnrichmentFetch::new("src", EntityKind::SimilarAlbum, "al-1", 20);
        let outcome = task.execute(&source, &store).await.unwrap();

        assert_eq!(outcome.written, 2);
        assert_eq!(
            store.albums().similar_ids("src", "al-1").await.unwrap(),
            vec!["al-2".to_string(), "al-3".to_string()]
        );
        let cursor = store
            .read_cursor("src", EntityKind::SimilarAlbum, Some("al-1"))
            .await
            .unwrap()
            .unwrap();
        assert!(cursor.completed);
    }

    #[tokio::test]
    async fn test_missing_lyrics_still_complete_cursor() {
        let store = setup_store().await;
        let mut source = MockSource::new();
        source.expect_get_lyrics().times(1).returning(|_, _| Ok(None));

        let task = EnrichmentFetch::new("src", EntityKind::Lyrics, "t-1", 20);
        let outcome = task.execute(&source, &store).await.unwrap();

        assert_eq!(outcome.written, 0);
        assert!(store
            .read_cursor("src", EntityKind::Lyrics, Some("t-1"))
            .await
            .unwrap()
            .unwrap()
            .completed);
    }

    #[test]
    fn test_labels() {
        assert_eq!(
            PageFetch::new("src", EntityKind::Album, None, 500, 100).label(),
            "album@500"
        );
        assert_eq!(
            PageFetch::new("src", EntityKind::AlbumTrack, Some("al-1".to_string()), 0, 100).label(),
            "album_track[al-1]@0"
        );
        assert_eq!(
            EnrichmentFetch::new("src", EntityKind::Lyrics, "t-9", 1).label(),
            "lyrics[t-9]"
        );
    }
}
