//! VoxNova - offline text-to-speech studio
//!
//! Enumerates the voices installed on the system, lets the user filter and
//! pick one, and drives the platform speech engine to either speak text aloud
//! or render it to an audio file. Synthesis always runs off the UI thread and
//! only one job may be in flight at a time.

pub mod catalog;
pub mod console;
pub mod error;
pub mod files;
pub mod jobs;
pub mod platform;
pub mod settings;
pub mod speech;

pub use error::{Result, VoxError};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_NAME: &str = "voxnova";
