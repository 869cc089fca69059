//! Workspace entry crate.
//!
//! Host applications depend on `catalog-sync` to get the assembled
//! [`CoreService`] façade without wiring each workspace crate individually.
//! The individual crates stay reachable through the re-exported modules.

pub use core_service::{CoreError, CoreService, Result};

pub use core_service::{bridge_traits, core_library, core_runtime, core_sync};
