//! Speech engine access
//!
//! A [`Backend`] wraps one platform speech engine; an [`Engine`] is the owned,
//! lock-guarded handle that catalog loading and synthesis jobs share.

pub mod backend;
pub mod backends;
pub mod engine;

pub use backend::{Backend, RawVoice, StopHandle};
pub use engine::{create_backend, BackendPreference, Engine};
