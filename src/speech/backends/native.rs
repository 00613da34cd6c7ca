//! Native TTS backend using the tts crate
//!
//! This backend uses the `tts` crate which provides a unified interface to:
//! - Speech Dispatcher on Linux (via native bindings)
//! - AVFoundation on macOS/iOS (via native bindings)
//! - WinRT on Windows
//!
//! The crate only queues utterances, so [`Backend::speak`] polls
//! `is_speaking` to block until playback ends. File rendering is not offered
//! by any of these engines.

use crate::speech::{Backend, RawVoice, StopHandle};
use crate::{Result, VoxError};
use log::{debug, error, warn};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tts::{Features, Gender, Tts as TtsCrate};

/// Rate the engines' `normal_rate` roughly corresponds to
const NORMAL_WPM: f32 = 175.0;
const MIN_WPM: f32 = 80.0;
const MAX_WPM: f32 = 300.0;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long to wait for queued speech to actually start
const START_GRACE: Duration = Duration::from_millis(750);

pub struct NativeBackend {
    tts: TtsCrate,
    features: Features,
    cancelled: Arc<AtomicBool>,
    stop: StopHandle,
}

impl NativeBackend {
    /// Initialize the platform-appropriate TTS engine
    pub fn new() -> Result<Self> {
        debug!("Creating native TTS backend");

        let tts = TtsCrate::default()
            .map_err(|e| VoxError::EngineInitFailed(format!("Failed to initialize TTS: {}", e)))?;
        let features = tts.supported_features();

        let cancelled = Arc::new(AtomicBool::new(false));
        let stop = {
            let shared = Mutex::new(tts.clone());
            let cancelled = Arc::clone(&cancelled);
            StopHandle::new(move || {
                cancelled.store(true, Ordering::SeqCst);
                let mut tts = shared.lock().unwrap_or_else(|e| e.into_inner());
                if let Err(e) = tts.stop() {
                    debug!("Native stop failed: {}", e);
                }
            })
        };

        debug!("Native TTS backend created successfully");

        Ok(Self {
            tts,
            features,
            cancelled,
            stop,
        })
    }

    /// Map words per minute onto the engine's rate scale
    ///
    /// 80 wpm lands on `min`, 175 on `normal` and 300 on `max`, linear between.
    pub fn wpm_to_rate(wpm: u16, min: f32, normal: f32, max: f32) -> f32 {
        let wpm = (wpm as f32).clamp(MIN_WPM, MAX_WPM);
        if wpm <= NORMAL_WPM {
            min + (wpm - MIN_WPM) / (NORMAL_WPM - MIN_WPM) * (normal - min)
        } else {
            normal + (wpm - NORMAL_WPM) / (MAX_WPM - NORMAL_WPM) * (max - normal)
        }
    }

    /// Map 0.0-1.0 onto the engine's volume scale
    pub fn convert_volume(volume: f32, min: f32, max: f32) -> f32 {
        min + volume.clamp(0.0, 1.0) * (max - min)
    }

    fn rejected(property: &str, detail: impl ToString) -> VoxError {
        VoxError::ConfigPropertyRejected {
            property: property.to_string(),
            detail: detail.to_string(),
        }
    }

    /// Block until the queued utterance has played or was stopped
    fn wait_until_done(&self) -> Result<()> {
        if !self.features.is_speaking {
            warn!("Engine cannot report speaking state; not waiting for playback");
            return Ok(());
        }

        let queued_at = Instant::now();
        let mut started = false;
        loop {
            if self.cancelled.load(Ordering::SeqCst) {
                return Ok(());
            }

            let speaking = self
                .tts
                .is_speaking()
                .map_err(|e| VoxError::BackendRuntime(format!("Failed to query engine: {}", e)))?;

            if speaking {
                started = true;
            } else if started || queued_at.elapsed() > START_GRACE {
                return Ok(());
            }

            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl Backend for NativeBackend {
    fn name(&self) -> &'static str {
        "native"
    }

    fn list_voices(&mut self) -> Result<Vec<RawVoice>> {
        let voices = self
            .tts
            .voices()
            .map_err(|e| VoxError::BackendRuntime(format!("Failed to get voices: {}", e)))?;

        Ok(voices
            .iter()
            .map(|voice| {
                let mut raw =
                    RawVoice::new(voice.id(), voice.name()).with_language(voice.language().to_string());
                match voice.gender() {
                    Some(Gender::Male) => raw = raw.with_gender("male"),
                    Some(Gender::Female) => raw = raw.with_gender("female"),
                    None => {}
                }
                raw
            })
            .collect())
    }

    fn set_rate(&mut self, wpm: u16) -> Result<()> {
        if !self.features.rate {
            return Err(Self::rejected("rate", "rate control not supported on this platform"));
        }

        let rate = Self::wpm_to_rate(
            wpm,
            self.tts.min_rate(),
            self.tts.normal_rate(),
            self.tts.max_rate(),
        );
        debug!("Setting rate to {} ({} wpm)", rate, wpm);
        self.tts
            .set_rate(rate)
            .map_err(|e| Self::rejected("rate", e))?;
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) -> Result<()> {
        if !self.features.volume {
            return Err(Self::rejected("volume", "volume control not supported on this platform"));
        }

        let converted =
            Self::convert_volume(volume, self.tts.min_volume(), self.tts.max_volume());
        debug!("Setting volume to {}", converted);
        self.tts
            .set_volume(converted)
            .map_err(|e| Self::rejected("volume", e))?;
        Ok(())
    }

    fn set_voice(&mut self, id: &str) -> Result<()> {
        if !self.features.voice {
            return Err(Self::rejected("voice", "voice selection not supported on this platform"));
        }

        let voices = self.tts.voices().map_err(|e| Self::rejected("voice", e))?;
        match voices.iter().find(|v| v.id() == id) {
            Some(voice) => {
                debug!("Selecting voice: {}", voice.name());
                self.tts
                    .set_voice(voice)
                    .map_err(|e| Self::rejected("voice", e))
            }
            None => Err(Self::rejected("voice", format!("no voice with id '{}'", id))),
        }
    }

    fn current_voice(&self) -> Option<String> {
        if !self.features.get_voice {
            return None;
        }
        self.tts.voice().ok().flatten().map(|v| v.id())
    }

    fn speak(&mut self, text: &str) -> Result<()> {
        self.cancelled.store(false, Ordering::SeqCst);

        debug!("Speaking {} chars", text.len());
        self.tts.speak(text, true).map_err(|e| {
            error!("Failed to speak: {}", e);
            VoxError::BackendRuntime(format!("Speak failed: {}", e))
        })?;

        self.wait_until_done()
    }

    fn render_to_file(&mut self, _text: &str, path: &Path) -> Result<()> {
        Err(VoxError::BackendRuntime(format!(
            "the native engine cannot render to a file ({})",
            path.display()
        )))
    }

    fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_native_backend() {
        // May fail without speech-dispatcher or in CI without audio
        match NativeBackend::new() {
            Ok(backend) => println!("✓ Native TTS backend initialized: {}", backend.name()),
            Err(e) => println!("⚠ TTS initialization failed (may be expected in CI): {}", e),
        }
    }

    #[test]
    fn test_rate_conversion() {
        assert_eq!(NativeBackend::wpm_to_rate(80, 0.5, 1.0, 2.0), 0.5);
        assert_eq!(NativeBackend::wpm_to_rate(175, 0.5, 1.0, 2.0), 1.0);
        assert_eq!(NativeBackend::wpm_to_rate(300, 0.5, 1.0, 2.0), 2.0);
        assert_eq!(NativeBackend::wpm_to_rate(20, 0.5, 1.0, 2.0), 0.5);
        assert_eq!(NativeBackend::wpm_to_rate(1000, -100.0, 0.0, 100.0), 100.0);
    }

    #[test]
    fn test_volume_conversion() {
        assert_eq!(NativeBackend::convert_volume(0.0, 0.0, 1.0), 0.0);
        assert_eq!(NativeBackend::convert_volume(0.5, 0.0, 1.0), 0.5);
        assert_eq!(NativeBackend::convert_volume(1.0, -100.0, 100.0), 100.0);
    }

    #[test]
    fn test_render_not_supported() {
        if let Ok(mut backend) = NativeBackend::new() {
            let result = backend.render_to_file("hello", Path::new("out.wav"));
            assert!(matches!(result, Err(VoxError::BackendRuntime(_))));
        }
    }
}
