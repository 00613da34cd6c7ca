//! Engine selection and the shared engine handle

use super::backends::{EspeakBackend, NativeBackend, SapiBackend, SayBackend};
use super::{Backend, RawVoice, StopHandle};
use crate::platform::PlatformFamily;
use crate::{Result, VoxError};
use log::info;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

/// Which engine the user asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendPreference {
    #[default]
    Auto,
    Native,
    Espeak,
    Say,
    Sapi,
}

impl BackendPreference {
    pub fn as_str(self) -> &'static str {
        match self {
            BackendPreference::Auto => "auto",
            BackendPreference::Native => "native",
            BackendPreference::Espeak => "espeak",
            BackendPreference::Say => "say",
            BackendPreference::Sapi => "sapi",
        }
    }

    /// Engines `Auto` tries on a platform, best first
    ///
    /// Command-line engines come first where they exist because they can
    /// render to file.
    pub fn candidates(platform: PlatformFamily) -> &'static [BackendPreference] {
        use BackendPreference::*;
        match platform {
            PlatformFamily::Linux => &[Espeak, Native],
            PlatformFamily::Wsl => &[Espeak, Sapi, Native],
            PlatformFamily::MacOs => &[Say, Native],
            PlatformFamily::Windows => &[Sapi, Native],
            PlatformFamily::Other => &[Native],
        }
    }
}

impl FromStr for BackendPreference {
    type Err = VoxError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(BackendPreference::Auto),
            "native" | "tts" => Ok(BackendPreference::Native),
            "espeak" | "espeak-ng" => Ok(BackendPreference::Espeak),
            "say" => Ok(BackendPreference::Say),
            "sapi" | "windows" => Ok(BackendPreference::Sapi),
            other => Err(VoxError::Config(format!("unknown backend '{}'", other))),
        }
    }
}

impl fmt::Display for BackendPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn open_one(preference: BackendPreference) -> Result<Box<dyn Backend>> {
    Ok(match preference {
        BackendPreference::Native => Box::new(NativeBackend::new()?),
        BackendPreference::Espeak => Box::new(EspeakBackend::new()?),
        BackendPreference::Say => Box::new(SayBackend::new()?),
        BackendPreference::Sapi => Box::new(SapiBackend::new()?),
        BackendPreference::Auto => return create_backend(BackendPreference::Auto),
    })
}

/// Create a speech backend
///
/// An explicit preference opens exactly that engine. `Auto` walks the
/// platform's candidates and returns the first that initializes, or
/// `EngineInitFailed` listing every attempt.
pub fn create_backend(preference: BackendPreference) -> Result<Box<dyn Backend>> {
    if preference != BackendPreference::Auto {
        info!("Opening {} backend", preference);
        return open_one(preference);
    }

    let platform = PlatformFamily::detect();
    info!("Detected platform family {:?}", platform);

    let mut failures = Vec::new();
    for &candidate in BackendPreference::candidates(platform) {
        info!("Trying {} backend...", candidate);
        match open_one(candidate) {
            Ok(backend) => {
                info!("✓ Successfully initialized {} backend", candidate);
                return Ok(backend);
            }
            Err(e) => {
                info!("✗ {} backend unavailable: {}", candidate, e);
                failures.push(format!("{}: {}", candidate, e));
            }
        }
    }

    Err(VoxError::EngineInitFailed(format!(
        "No speech backend available. Tried:\n  {}",
        failures.join("\n  ")
    )))
}

/// Owned handle to one speech engine
///
/// Cloning shares the same engine. Everything that drives the engine goes
/// through [`Engine::lock`], so a configure-then-synthesize sequence is never
/// interleaved with another thread's. The stop handle is held outside the
/// lock.
#[derive(Clone)]
pub struct Engine {
    backend: Arc<Mutex<Box<dyn Backend>>>,
    stop: StopHandle,
    name: &'static str,
}

impl Engine {
    pub fn new(backend: Box<dyn Backend>) -> Self {
        let stop = backend.stop_handle();
        let name = backend.name();
        Self {
            backend: Arc::new(Mutex::new(backend)),
            stop,
            name,
        }
    }

    /// Open the preferred engine
    pub fn open(preference: BackendPreference) -> Result<Self> {
        create_backend(preference).map(Self::new)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Exclusive access to the backend; blocks while a job holds it
    pub fn lock(&self) -> MutexGuard<'_, Box<dyn Backend>> {
        self.backend.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn list_voices(&self) -> Result<Vec<RawVoice>> {
        self.lock().list_voices()
    }

    pub fn current_voice(&self) -> Option<String> {
        self.lock().current_voice()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine").field("name", &self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preference_parsing() {
        assert_eq!("".parse::<BackendPreference>().unwrap(), BackendPreference::Auto);
        assert_eq!("Espeak-NG".parse::<BackendPreference>().unwrap(), BackendPreference::Espeak);
        assert_eq!("sapi".parse::<BackendPreference>().unwrap(), BackendPreference::Sapi);
        assert!("festival".parse::<BackendPreference>().is_err());
    }

    #[test]
    fn test_preference_round_trips_through_display() {
        for pref in [
            BackendPreference::Auto,
            BackendPreference::Native,
            BackendPreference::Espeak,
            BackendPreference::Say,
            BackendPreference::Sapi,
        ] {
            assert_eq!(pref.to_string().parse::<BackendPreference>().unwrap(), pref);
        }
    }

    #[test]
    fn test_candidates_never_empty() {
        for platform in [
            PlatformFamily::Linux,
            PlatformFamily::Wsl,
            PlatformFamily::MacOs,
            PlatformFamily::Windows,
            PlatformFamily::Other,
        ] {
            let candidates = BackendPreference::candidates(platform);
            assert!(!candidates.is_empty());
            assert!(!candidates.contains(&BackendPreference::Auto));
        }
    }

    #[test]
    fn test_create_backend_auto() {
        match create_backend(BackendPreference::Auto) {
            Ok(backend) => println!("✓ Created {} backend", backend.name()),
            Err(e) => println!("⚠ No backend available (may be expected): {}", e),
        }
    }
}
