//! Synthesis requests

use crate::{Result, VoxError};
use log::debug;
use std::fmt;
use std::path::PathBuf;

pub const MIN_RATE_WPM: u16 = 80;
pub const MAX_RATE_WPM: u16 = 300;
pub const DEFAULT_RATE_WPM: u16 = 160;

/// Immutable description of one job's input
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    text: String,
    voice_id: Option<String>,
    rate_wpm: u16,
    volume: f32,
}

impl SynthesisRequest {
    /// Build a request, refusing blank text
    ///
    /// Rate is clamped to 80-300 wpm and volume to 0.0-1.0; a non-finite
    /// volume becomes full volume. An empty voice id means the engine default.
    pub fn new(
        text: impl Into<String>,
        voice_id: Option<String>,
        rate_wpm: u16,
        volume: f32,
    ) -> Result<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(VoxError::EmptyText);
        }

        let clamped_rate = rate_wpm.clamp(MIN_RATE_WPM, MAX_RATE_WPM);
        if clamped_rate != rate_wpm {
            debug!("Rate {} clamped to {}", rate_wpm, clamped_rate);
        }
        let volume = if volume.is_finite() {
            volume.clamp(0.0, 1.0)
        } else {
            1.0
        };

        Ok(Self {
            text,
            voice_id: voice_id.filter(|id| !id.trim().is_empty()),
            rate_wpm: clamped_rate,
            volume,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn voice_id(&self) -> Option<&str> {
        self.voice_id.as_deref()
    }

    pub fn rate_wpm(&self) -> u16 {
        self.rate_wpm
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }
}

/// What a job produces
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisMode {
    /// Play through the default audio device
    Speak,
    /// Write an audio file at the given path
    RenderToFile(PathBuf),
}

impl fmt::Display for SynthesisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SynthesisMode::Speak => f.write_str("speak"),
            SynthesisMode::RenderToFile(path) => write!(f, "render to {}", path.display()),
        }
    }
}
