//! Interactive console front-end
//!
//! Line-oriented stand-in for a GUI: every command the user types becomes a
//! [`Command`], and [`App`] owns all presentation state on the thread that
//! reads them.

pub mod app;
pub mod command;

pub use app::{App, EngineOpener, Flow};
pub use command::Command;
