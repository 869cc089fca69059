//! # Core Runtime Module
//!
//! Foundational runtime infrastructure shared by the sync core crates:
//! - Logging and tracing setup
//! - Configuration with fail-fast validation
//! - Event bus for sync lifecycle and catalog invalidation events

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
