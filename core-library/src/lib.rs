//! # Catalog Library Module
//!
//! Owns the local mirror of remote media catalogs and the repositories used
//! to read and write it.
//!
//! ## Overview
//!
//! This module manages:
//! - SQLite schema and embedded migrations
//! - Record models for artists, albums, playlists, tracks and lyrics
//! - Sync cursors that remember how far each paginated listing got
//! - Repository traits with SQLite implementations
//!
//! Every row is scoped by a `source_id` naming the remote library instance it
//! was fetched from. Record writes are idempotent upserts keyed by
//! `(source_id, id)`; relation writes replace the full set for a parent.

pub mod db;
pub mod error;
pub mod models;
pub mod repositories;

pub use db::{create_pool, create_test_pool, DatabaseConfig};
pub use error::{LibraryError, Result};
pub use models::{
    Album, Artist, EntityKind, EntityTier, Lyrics, Playlist, SyncCursor, Track,
};
pub use repositories::{
    AlbumRepository, ArtistRepository, CursorRepository, LyricsRepository, PlaylistRepository,
    SqliteAlbumRepository, SqliteArtistRepository, SqliteCursorRepository,
    SqliteLyricsRepository, SqlitePlaylistRepository, SqliteTrackRepository, TrackRepository,
};
