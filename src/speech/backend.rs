//! Speech backend abstraction
//!
//! Every platform engine implements [`Backend`]. All synthesis calls block
//! until the audio has been spoken or written, so callers must never invoke
//! them from the UI thread.

use crate::Result;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// A voice as reported by a backend, before any classification
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawVoice {
    /// Backend-specific identifier, unique within one enumeration
    pub id: String,

    /// Human-readable name, not necessarily unique
    pub name: String,

    /// Locale tag such as `en-us`, when the backend reports one
    pub language: Option<String>,

    /// Gender metadata exactly as the backend supplied it
    pub gender: Option<String>,
}

impl RawVoice {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            language: None,
            gender: None,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        let language = language.into();
        self.language = if language.trim().is_empty() {
            None
        } else {
            Some(language)
        };
        self
    }

    pub fn with_gender(mut self, gender: impl Into<String>) -> Self {
        self.gender = Some(gender.into());
        self
    }
}

/// Best-effort cancellation for a backend
///
/// Handles are taken once when the engine is opened, so they can be fired
/// while a worker thread holds the engine lock inside a blocking call.
#[derive(Clone)]
pub struct StopHandle(Arc<dyn Fn() + Send + Sync>);

impl StopHandle {
    pub fn new(stop: impl Fn() + Send + Sync + 'static) -> Self {
        Self(Arc::new(stop))
    }

    /// Handle for backends that cannot be interrupted
    pub fn noop() -> Self {
        Self::new(|| {})
    }

    /// Ask the backend to stop producing audio
    pub fn stop(&self) {
        (self.0)()
    }
}

impl fmt::Debug for StopHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StopHandle")
    }
}

/// Speech engine trait
///
/// Property setters return [`crate::VoxError::ConfigPropertyRejected`] when the
/// engine refuses a value; job runners treat that as non-fatal.
pub trait Backend: Send {
    /// Short backend name for logs and diagnostics
    fn name(&self) -> &'static str;

    /// Enumerate installed voices in the engine's own order
    fn list_voices(&mut self) -> Result<Vec<RawVoice>>;

    /// Set speaking rate in words per minute
    fn set_rate(&mut self, wpm: u16) -> Result<()>;

    /// Set volume, 0.0 to 1.0
    fn set_volume(&mut self, volume: f32) -> Result<()>;

    /// Select a voice by backend id
    fn set_voice(&mut self, id: &str) -> Result<()>;

    /// Id of the voice that will be used for the next utterance
    fn current_voice(&self) -> Option<String>;

    /// Speak text and block until it has finished (or was stopped)
    fn speak(&mut self, text: &str) -> Result<()>;

    /// Render text to an audio file and block until the file is written
    fn render_to_file(&mut self, text: &str, path: &Path) -> Result<()>;

    /// Cancellation handle usable from other threads
    fn stop_handle(&self) -> StopHandle;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_raw_voice_builders() {
        let voice = RawVoice::new("v1", "Zira")
            .with_language("en-US")
            .with_gender("female");
        assert_eq!(voice.language.as_deref(), Some("en-US"));
        assert_eq!(voice.gender.as_deref(), Some("female"));

        let blank = RawVoice::new("v2", "David").with_language("  ");
        assert_eq!(blank.language, None);
    }

    #[test]
    fn test_stop_handle_fires_closure() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let handle = StopHandle::new(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        let cloned = handle.clone();
        handle.stop();
        cloned.stop();
        assert_eq!(count.load(Ordering::SeqCst), 2);

        StopHandle::noop().stop();
    }
}
