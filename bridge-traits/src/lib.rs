//! # Host Bridge Traits
//!
//! Contracts between the sync core and the code that talks to a remote media
//! server.
//!
//! ## Overview
//!
//! The core never performs HTTP calls itself. A host injects a
//! [`CatalogSource`](catalog::CatalogSource) implementation that knows how to
//! authenticate against a particular server, shape its responses into the
//! transfer types defined here, and retry transient failures with its own
//! backoff policy.
//!
//! ## Pagination contract
//!
//! Every listing call takes a [`PageWindow`](catalog::PageWindow). Returning
//! fewer records than `limit` (including zero) tells the caller that the
//! listing is exhausted. Returning exactly `limit` records means more may
//! follow.
//!
//! ## Error Handling
//!
//! All operations use [`BridgeError`](error::BridgeError). Implementations
//! should:
//!
//! - Map "resource gone" responses to `BridgeError::NotFound`
//! - Map everything else that is final for the call to `OperationFailed`
//! - Keep retries internal; an error returned to the core is treated as final
//!
//! ## Thread Safety
//!
//! `CatalogSource` requires `Send + Sync`. The sync engine calls a single
//! source from several tasks at once.

pub mod catalog;
pub mod error;

pub use catalog::{
    CatalogSource, PageWindow, RemoteAlbum, RemoteArtist, RemoteLyrics, RemotePlaylist,
    RemoteTrack,
};
pub use error::BridgeError;
