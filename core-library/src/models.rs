//! Domain models for the catalog mirror
//!
//! Record models map one-to-one onto catalog tables. Ids are the identifiers
//! assigned by the remote library and are unique only within a `source_id`.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

use crate::error::LibraryError;

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Normalize a string for searching and sorting
pub fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

// =============================================================================
// Entity kinds
// =============================================================================

/// Scheduling and failure-policy tier of an [`EntityKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityTier {
    /// Independent top-level listings
    Basic,
    /// Listings scoped to one stored parent record
    Dependent,
    /// Best-effort data derived from stored records
    Enrichment,
}

impl EntityTier {
    /// Kinds belonging to this tier, in scheduling order
    pub fn kinds(&self) -> &'static [EntityKind] {
        match self {
            EntityTier::Basic => &[EntityKind::Artist, EntityKind::Album, EntityKind::Playlist],
            EntityTier::Dependent => &[EntityKind::AlbumTrack, EntityKind::PlaylistTrack],
            EntityTier::Enrichment => &[EntityKind::SimilarAlbum, EntityKind::Lyrics],
        }
    }

    /// Whether errors in this tier fail a sync run
    pub fn is_critical(&self) -> bool {
        !matches!(self, EntityTier::Enrichment)
    }
}

/// The categories of data a sync run fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Artist,
    Album,
    Playlist,
    AlbumTrack,
    PlaylistTrack,
    SimilarAlbum,
    Lyrics,
}

impl EntityKind {
    pub const ALL: [EntityKind; 7] = [
        EntityKind::Artist,
        EntityKind::Album,
        EntityKind::Playlist,
        EntityKind::AlbumTrack,
        EntityKind::PlaylistTrack,
        EntityKind::SimilarAlbum,
        EntityKind::Lyrics,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Artist => "artist",
            EntityKind::Album => "album",
            EntityKind::Playlist => "playlist",
            EntityKind::AlbumTrack => "album_track",
            EntityKind::PlaylistTrack => "playlist_track",
            EntityKind::SimilarAlbum => "similar_album",
            EntityKind::Lyrics => "lyrics",
        }
    }

    pub fn tier(&self) -> EntityTier {
        match self {
            EntityKind::Artist | EntityKind::Album | EntityKind::Playlist => EntityTier::Basic,
            EntityKind::AlbumTrack | EntityKind::PlaylistTrack => EntityTier::Dependent,
            EntityKind::SimilarAlbum | EntityKind::Lyrics => EntityTier::Enrichment,
        }
    }

    /// Kind of record a dependent or enrichment kind hangs off.
    ///
    /// Lyrics hang off tracks, which are enumerated through `AlbumTrack`.
    pub fn parent_kind(&self) -> Option<EntityKind> {
        match self {
            EntityKind::AlbumTrack | EntityKind::SimilarAlbum => Some(EntityKind::Album),
            EntityKind::PlaylistTrack => Some(EntityKind::Playlist),
            EntityKind::Lyrics => Some(EntityKind::AlbumTrack),
            EntityKind::Artist | EntityKind::Album | EntityKind::Playlist => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| LibraryError::InvalidInput {
                field: "entity_kind".to_string(),
                message: format!("unknown entity kind '{}'", s),
            })
    }
}

// =============================================================================
// Records
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Artist {
    pub source_id: String,
    pub id: String,
    pub name: String,
    pub normalized_name: String,
    pub sort_name: Option<String>,
    pub image_url: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Artist {
    pub fn new(source_id: impl Into<String>, id: impl Into<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        let ts = now();
        Self {
            source_id: source_id.into(),
            id: id.into(),
            normalized_name: normalize(&name),
            name,
            sort_name: None,
            image_url: None,
            created_at: ts,
            updated_at: ts,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("Artist id cannot be empty".to_string());
        }
        if self.name.trim().is_empty() {
            return Err("Artist name cannot be empty".to_string());
        }
        Ok(())
    }
}

/// Album record. `artist_ids` is stored in `album_artists`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Album {
    pub source_id: String,
    pub id: String,
    pub name: String,
    pub normalized_name: String,
    pub year: Option<i32>,
    pub artwork_url: Option<String>,
    pub track_count: i64,
    pub duration_ms: i64,
    pub created_at: i64,
    pub updated_at: i64,
    #[sqlx(skip)]
    #[serde(default)]
    pub artist_ids: Vec<String>,
}

impl Album {
    pub fn new(source_id: impl Into<String>, id: impl Into<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        let ts = now();
        Self {
            source_id: source_id.into(),
            id: id.into(),
            normalized_name: normalize(&name),
            name,
            year: None,
            artwork_url: None,
            track_count: 0,
            duration_ms: 0,
            created_at: ts,
            updated_at: ts,
            artist_ids: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("Album id cannot be empty".to_string());
        }
        if self.name.trim().is_empty() {
            return Err("Album name cannot be empty".to_string());
        }
        if let Some(year) = self.year {
            if !(1000..=9999).contains(&year) {
                return Err(format!("Invalid year: {}", year));
            }
        }
        if self.track_count < 0 || self.duration_ms < 0 {
            return Err("Album counters cannot be negative".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Playlist {
    pub source_id: String,
    pub id: String,
    pub name: String,
    pub normalized_name: String,
    pub description: Option<String>,
    pub track_count: i64,
    pub duration_ms: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Playlist {
    pub fn new(source_id: impl Into<String>, id: impl Into<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        let ts = now();
        Self {
            source_id: source_id.into(),
            id: id.into(),
            normalized_name: normalize(&name),
            name,
            description: None,
            track_count: 0,
            duration_ms: 0,
            created_at: ts,
            updated_at: ts,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("Playlist id cannot be empty".to_string());
        }
        if self.name.trim().is_empty() {
            return Err("Playlist name cannot be empty".to_string());
        }
        Ok(())
    }
}

/// Track record. `artist_ids` is stored in `track_artists`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Track {
    pub source_id: String,
    pub id: String,
    pub title: String,
    pub normalized_title: String,
    pub album_id: Option<String>,
    pub track_number: Option<i32>,
    pub disc_number: i32,
    pub duration_ms: i64,
    pub genre: Option<String>,
    pub year: Option<i32>,
    pub created_at: i64,
    pub updated_at: i64,
    #[sqlx(skip)]
    #[serde(default)]
    pub artist_ids: Vec<String>,
}

impl Track {
    pub fn new(source_id: impl Into<String>, id: impl Into<String>, title: impl Into<String>) -> Self {
        let title = title.into();
        let ts = now();
        Self {
            source_id: source_id.into(),
            id: id.into(),
            normalized_title: normalize(&title),
            title,
            album_id: None,
            track_number: None,
            disc_number: 1,
            duration_ms: 0,
            genre: None,
            year: None,
            created_at: ts,
            updated_at: ts,
            artist_ids: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("Track id cannot be empty".to_string());
        }
        if self.title.trim().is_empty() {
            return Err("Track title cannot be empty".to_string());
        }
        if self.duration_ms < 0 {
            return Err("Track duration cannot be negative".to_string());
        }
        if self.disc_number < 1 {
            return Err(format!("Invalid disc number: {}", self.disc_number));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Lyrics {
    pub source_id: String,
    pub track_id: String,
    pub synced: bool,
    pub body: String,
    pub language: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Lyrics {
    pub fn new(source_id: impl Into<String>, track_id: impl Into<String>, body: impl Into<String>) -> Self {
        let ts = now();
        Self {
            source_id: source_id.into(),
            track_id: track_id.into(),
            synced: false,
            body: body.into(),
            language: None,
            created_at: ts,
            updated_at: ts,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.track_id.trim().is_empty() {
            return Err("Lyrics track id cannot be empty".to_string());
        }
        if self.body.trim().is_empty() {
            return Err("Lyrics body cannot be empty".to_string());
        }
        Ok(())
    }
}

// =============================================================================
// Sync cursors
// =============================================================================

/// Durable resume point for one paginated listing.
///
/// Keyed by `(source_id, kind, parent_id)`. Top-level kinds have no parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCursor {
    pub source_id: String,
    pub kind: EntityKind,
    pub parent_id: Option<String>,
    /// Next offset to fetch
    pub start_index: i64,
    pub page_size: i64,
    /// Set once a short or empty page was observed
    pub completed: bool,
    pub updated_at: i64,
}

impl SyncCursor {
    /// A fresh cursor positioned at offset zero.
    pub fn new(
        source_id: impl Into<String>,
        kind: EntityKind,
        parent_id: Option<String>,
        page_size: i64,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            kind,
            parent_id,
            start_index: 0,
            page_size,
            completed: false,
            updated_at: now(),
        }
    }

    /// Record a persisted page of `received` records fetched at `offset`.
    ///
    /// `start_index` never moves backwards.
    pub fn record_page(&mut self, offset: i64, received: i64) {
        self.start_index = self.start_index.max(offset + received);
        self.completed = received < self.page_size;
        self.updated_at = now();
    }

    /// Mark the listing exhausted at `offset` without moving past it.
    pub fn mark_completed(&mut self, offset: i64) {
        self.start_index = self.start_index.max(offset);
        self.completed = true;
        self.updated_at = now();
    }

    /// Rewind to offset zero so the next run fetches everything again.
    pub fn reset(&mut self) {
        self.start_index = 0;
        self.completed = false;
        self.updated_at = now();
    }
}
