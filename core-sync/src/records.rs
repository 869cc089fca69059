//! Conversion of driver transfer types into catalog records.

use bridge_traits::catalog::{RemoteAlbum, RemoteArtist, RemoteLyrics, RemotePlaylist, RemoteTrack};
use core_library::{Album, Artist, Lyrics, Playlist, Track};

/// One page of records of a single kind, ready to be upserted together.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordBatch {
    Artists(Vec<Artist>),
    Albums(Vec<Album>),
    Playlists(Vec<Playlist>),
    Tracks(Vec<Track>),
}

impl RecordBatch {
    pub fn len(&self) -> usize {
        match self {
            RecordBatch::Artists(rows) => rows.len(),
            RecordBatch::Albums(rows) => rows.len(),
            RecordBatch::Playlists(rows) => rows.len(),
            RecordBatch::Tracks(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entity name used in invalidation events
    pub fn entity_name(&self) -> &'static str {
        match self {
            RecordBatch::Artists(_) => "artist",
            RecordBatch::Albums(_) => "album",
            RecordBatch::Playlists(_) => "playlist",
            RecordBatch::Tracks(_) => "track",
        }
    }
}

fn count(value: Option<u32>) -> i64 {
    value.map(i64::from).unwrap_or(0)
}

fn millis(value: Option<u64>) -> i64 {
    value
        .map(|ms| i64::try_from(ms).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

pub fn artist_record(source_id: &str, remote: RemoteArtist) -> Artist {
    let mut artist = Artist::new(source_id, remote.id, remote.name);
    artist.sort_name = remote.sort_name;
    artist.image_url = remote.image_url;
    artist
}

pub fn album_record(source_id: &str, remote: RemoteAlbum) -> Album {
    let mut album = Album::new(source_id, remote.id, remote.name);
    album.year = remote.year;
    album.artwork_url = remote.artwork_url;
    album.track_count = count(remote.track_count);
    album.duration_ms = millis(remote.duration_ms);
    album.artist_ids = remote.artist_ids;
    album
}

pub fn playlist_record(source_id: &str, remote: RemotePlaylist) -> Playlist {
    let mut playlist = Playlist::new(source_id, remote.id, remote.name);
    playlist.description = remote.description;
    playlist.track_count = count(remote.track_count);
    playlist.duration_ms = millis(remote.duration_ms);
    playlist
}

/// Convert a track. `album_id` overrides what the driver reported, which
/// pins tracks listed through an album to that album.
pub fn track_record(source_id: &str, remote: RemoteTrack, album_id: Option<&str>) -> Track {
    let mut track = Track::new(source_id, remote.id, remote.title);
    track.album_id = album_id.map(str::to_string).or(remote.album_id);
    track.track_number = remote.track_number.and_then(|n| i32::try_from(n).ok());
    track.disc_number = remote
        .disc_number
        .and_then(|n| i32::try_from(n).ok())
        .filter(|n| *n >= 1)
        .unwrap_or(1);
    track.duration_ms = millis(remote.duration_ms);
    track.genre = remote.genre;
    track.year = remote.year;
    track.artist_ids = remote.artist_ids;
    track
}

pub fn lyrics_record(source_id: &str, remote: RemoteLyrics) -> Lyrics {
    let mut lyrics = Lyrics::new(source_id, remote.track_id, remote.body);
    lyrics.synced = remote.synced;
    lyrics.language = remote.language;
    lyrics
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote_track(id: &str, album_id: Option<&str>) -> RemoteTrack {
        RemoteTrack {
            id: id.to_string(),
            title: format!("Track {}", id),
            album_id: album_id.map(str::to_string),
            artist_ids: vec!["ar-1".to_string()],
            track_number: Some(3),
            disc_number: Some(0),
            duration_ms: Some(215_000),
            genre: Some("Jazz".to_string()),
            year: Some(1959),
        }
    }

    #[test]
    fn test_album_counters_default_to_zero() {
        let album = album_record(
            "src",
            RemoteAlbum {
                id: "al-1".to_string(),
                name: "Kind of Blue".to_string(),
                artist_ids: vec!["ar-1".to_string()],
                year: Some(1959),
                artwork_url: None,
                track_count: None,
                duration_ms: None,
            },
        );

        assert_eq!(album.track_count, 0);
        assert_eq!(album.duration_ms, 0);
        assert_eq!(album.normalized_name, "kind of blue");
        assert_eq!(album.artist_ids, vec!["ar-1".to_string()]);
        assert!(album.validate().is_ok());
    }

    #[test]
    fn test_track_listed_through_album_is_pinned_to_it() {
        let track = track_record("src", remote_track("t-1", Some("other")), Some("al-1"));
        assert_eq!(track.album_id.as_deref(), Some("al-1"));

        let track = track_record("src", remote_track("t-2", Some("al-9")), None);
        assert_eq!(track.album_id.as_deref(), Some("al-9"));
    }

    #[test]
    fn test_invalid_disc_number_falls_back_to_one() {
        let track = track_record("src", remote_track("t-1", None), None);
        assert_eq!(track.disc_number, 1);
        assert_eq!(track.track_number, Some(3));
        assert!(track.validate().is_ok());
    }

    #[test]
    fn test_batch_len_and_name() {
        let batch = RecordBatch::Tracks(vec![track_record("src", remote_track("t-1", None), None)]);
        assert_eq!(batch.len(), 1);
        assert!(!batch.is_empty());
        assert_eq!(batch.entity_name(), "track");
        assert!(RecordBatch::Artists(Vec::new()).is_empty());
    }
}
