//! Remote Catalog Abstractions
//!
//! Transfer types and the paginated read contract for a remote media library.
//! Identifiers are the remote-assigned ids; they are only unique within a
//! single `source_id` (one remote library instance).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A `[offset, offset + limit)` window into a remote listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageWindow {
    pub offset: u32,
    pub limit: u32,
}

impl PageWindow {
    pub fn new(offset: u32, limit: u32) -> Self {
        Self { offset, limit }
    }

    /// Exclusive end of the window.
    pub fn end(&self) -> u32 {
        self.offset.saturating_add(self.limit)
    }

    /// Whether a page of `received` records closes the listing.
    pub fn is_last_page(&self, received: usize) -> bool {
        received < self.limit as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteArtist {
    pub id: String,
    pub name: String,
    pub sort_name: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteAlbum {
    pub id: String,
    pub name: String,
    /// Album artists in display order
    pub artist_ids: Vec<String>,
    pub year: Option<i32>,
    pub artwork_url: Option<String>,
    pub track_count: Option<u32>,
    pub duration_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemotePlaylist {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub track_count: Option<u32>,
    pub duration_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTrack {
    pub id: String,
    pub title: String,
    pub album_id: Option<String>,
    /// Track artists in display order
    pub artist_ids: Vec<String>,
    pub track_number: Option<u32>,
    pub disc_number: Option<u32>,
    pub duration_ms: Option<u64>,
    pub genre: Option<String>,
    pub year: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteLyrics {
    pub track_id: String,
    /// True when `body` is LRC-style time-synced text
    pub synced: bool,
    pub body: String,
    pub language: Option<String>,
}

/// Paginated read access to a remote media library.
///
/// Implementations own authentication, response shaping and retry/backoff.
/// Any error returned here is final for that call.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::catalog::{CatalogSource, PageWindow};
///
/// async fn count_artists(source: &dyn CatalogSource, source_id: &str) -> Result<usize> {
///     let mut offset = 0;
///     let mut total = 0;
///     loop {
///         let window = PageWindow::new(offset, 100);
///         let page = source.list_artists(source_id, window).await?;
///         total += page.len();
///         if window.is_last_page(page.len()) {
///             return Ok(total);
///         }
///         offset += page.len() as u32;
///     }
/// }
/// ```
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn list_artists(&self, source_id: &str, window: PageWindow) -> Result<Vec<RemoteArtist>>;

    async fn list_albums(&self, source_id: &str, window: PageWindow) -> Result<Vec<RemoteAlbum>>;

    async fn list_playlists(
        &self,
        source_id: &str,
        window: PageWindow,
    ) -> Result<Vec<RemotePlaylist>>;

    /// List the tracks of one album.
    ///
    /// Returns `BridgeError::NotFound` if the album no longer exists remotely.
    async fn list_album_tracks(
        &self,
        source_id: &str,
        album_id: &str,
        window: PageWindow,
    ) -> Result<Vec<RemoteTrack>>;

    /// List the tracks of one playlist, in playlist order.
    ///
    /// Returns `BridgeError::NotFound` if the playlist no longer exists remotely.
    async fn list_playlist_tracks(
        &self,
        source_id: &str,
        playlist_id: &str,
        window: PageWindow,
    ) -> Result<Vec<RemoteTrack>>;

    /// Albums the server considers similar to `album_id`, at most `limit`.
    async fn list_similar_albums(
        &self,
        source_id: &str,
        album_id: &str,
        limit: u32,
    ) -> Result<Vec<RemoteAlbum>>;

    /// Lyrics for a track, or `None` if the server has none.
    async fn get_lyrics(&self, source_id: &str, track_id: &str) -> Result<Option<RemoteLyrics>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;

    struct FixedArtists {
        total: u32,
    }

    #[async_trait]
    impl CatalogSource for FixedArtists {
        async fn list_artists(&self, _source_id: &str, window: PageWindow) -> Result<Vec<RemoteArtist>> {
            Ok((window.offset..window.end().min(self.total))
                .map(|i| RemoteArtist {
                    id: format!("artist-{}", i),
                    name: format!("Artist {}", i),
                    sort_name: None,
                    image_url: None,
                })
                .collect())
        }

        async fn list_albums(&self, _: &str, _: PageWindow) -> Result<Vec<RemoteAlbum>> {
            Ok(Vec::new())
        }

        async fn list_playlists(&self, _: &str, _: PageWindow) -> Result<Vec<RemotePlaylist>> {
            Ok(Vec::new())
        }

        async fn list_album_tracks(&self, _: &str, album_id: &str, _: PageWindow) -> Result<Vec<RemoteTrack>> {
            Err(BridgeError::NotFound(album_id.to_string()))
        }

        async fn list_playlist_tracks(&self, _: &str, _: &str, _: PageWindow) -> Result<Vec<RemoteTrack>> {
            Ok(Vec::new())
        }

        async fn list_similar_albums(&self, _: &str, _: &str, _: u32) -> Result<Vec<RemoteAlbum>> {
            Ok(Vec::new())
        }

        async fn get_lyrics(&self, _: &str, _: &str) -> Result<Option<RemoteLyrics>> {
            Ok(None)
        }
    }

    #[test]
    fn test_page_window_bounds() {
        let window = PageWindow::new(200, 100);
        assert_eq!(window.end(), 300);
        assert!(!window.is_last_page(100));
        assert!(window.is_last_page(99));
        assert!(window.is_last_page(0));
    }

    #[test]
    fn test_page_window_end_saturates() {
        let window = PageWindow::new(u32::MAX - 1, 10);
        assert_eq!(window.end(), u32::MAX);
    }

    #[test]
    fn test_remote_album_serialization() {
        let album = RemoteAlbum {
            id: "al-1".to_string(),
            name: "Blue Train".to_string(),
            artist_ids: vec!["ar-1".to_string()],
            year: Some(1958),
            artwork_url: None,
            track_count: Some(5),
            duration_ms: Some(2_520_000),
        };

        let json = serde_json::to_string(&album).unwrap();
        let parsed: RemoteAlbum = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, album);
    }

    #[tokio::test]
    async fn test_source_signals_last_page() {
        let source = FixedArtists { total: 250 };

        let full = source.list_artists("src", PageWindow::new(100, 100)).await.unwrap();
        assert_eq!(full.len(), 100);

        let window = PageWindow::new(200, 100);
        let short = source.list_artists("src", window).await.unwrap();
        assert_eq!(short.len(), 50);
        assert!(window.is_last_page(short.len()));
        assert_eq!(short[0].id, "artist-200");
    }

    #[tokio::test]
    async fn test_not_found_is_distinguishable() {
        let source = FixedArtists { total: 0 };
        let err = source
            .list_album_tracks("src", "gone", PageWindow::new(0, 50))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(!BridgeError::OperationFailed("boom".into()).is_not_found());
    }
}
