//! espeak-ng backend
//!
//! Drives the `espeak-ng` command line. Works on any Linux with an audio
//! server, including WSL with WSLg, where PulseAudio is exposed at
//! /mnt/wslg/PulseServer. This is the only Linux engine that can render
//! straight to a WAV file.
//!
//! Dependencies:
//! - espeak-ng (install with: sudo apt install espeak-ng)

use super::process::ProcessSlot;
use crate::platform::is_wsl;
use crate::speech::{Backend, RawVoice, StopHandle};
use crate::{Result, VoxError};
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use std::process::{Command, Stdio};

/// One row of `espeak-ng --voices`:
/// `Pty Language Age/Gender VoiceName File Other Languages`
static VOICE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*\d+\s+(?P<lang>\S+)\s+\S*/(?P<gender>[MF-])\s+(?P<name>\S+)\s+\S+")
        .expect("voice line pattern is valid")
});

/// espeak-ng's accepted speed range in words per minute
const MIN_SPEED: u16 = 80;
const MAX_SPEED: u16 = 450;

pub struct EspeakBackend {
    /// Path to espeak-ng
    espeak_path: String,

    /// Running synthesis process, if any
    slot: ProcessSlot,

    /// Speed in words per minute
    speed: u16,

    /// Amplitude (0-200)
    amplitude: u8,

    /// Voice passed to `-v`
    voice: Option<String>,
}

impl EspeakBackend {
    /// Point PULSE_SERVER at WSLg when running under WSL
    ///
    /// Child processes inherit the variable.
    fn setup_pulseaudio() -> Result<()> {
        const WSLG_PULSE_PATH: &str = "/mnt/wslg/PulseServer";

        if std::env::var("PULSE_SERVER").is_ok() {
            debug!("PULSE_SERVER already set via environment");
            return Ok(());
        }

        if Path::new(WSLG_PULSE_PATH).exists() {
            info!("Auto-detected WSLG PulseAudio server at {}", WSLG_PULSE_PATH);
            std::env::set_var("PULSE_SERVER", WSLG_PULSE_PATH);
            return Ok(());
        }

        if is_wsl() {
            warn!("WSLG PulseAudio server not found at {}", WSLG_PULSE_PATH);
            warn!("Speaking aloud may fail; rendering to file still works");
        }

        Ok(())
    }

    /// Create a new espeak-ng backend
    pub fn new() -> Result<Self> {
        debug!("Creating espeak-ng backend");

        Self::setup_pulseaudio()?;
        let espeak_path = Self::find_espeak()?;
        debug!("Found espeak-ng at: {}", espeak_path);

        Ok(Self {
            espeak_path,
            slot: ProcessSlot::new(),
            speed: 175,
            amplitude: 100,
            voice: None,
        })
    }

    /// Find espeak-ng executable
    fn find_espeak() -> Result<String> {
        let paths = ["espeak-ng", "/usr/bin/espeak-ng", "/usr/local/bin/espeak-ng"];

        for path in paths {
            if let Ok(status) = Command::new(path)
                .arg("--version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
            {
                if status.success() {
                    return Ok(path.to_string());
                }
            }
        }

        Err(VoxError::EngineInitFailed(
            "espeak-ng not found. Install with: sudo apt install espeak-ng".to_string(),
        ))
    }

    /// Parse the table printed by `espeak-ng --voices`
    pub fn parse_voice_list(output: &str) -> Vec<RawVoice> {
        output
            .lines()
            .filter_map(|line| VOICE_LINE.captures(line))
            .map(|caps| {
                let lang = &caps["lang"];
                let mut voice =
                    RawVoice::new(lang, caps["name"].replace('_', " ")).with_language(lang);
                match &caps["gender"] {
                    "M" => voice = voice.with_gender("male"),
                    "F" => voice = voice.with_gender("female"),
                    _ => {}
                }
                voice
            })
            .collect()
    }

    /// Convert volume (0.0-1.0) to espeak amplitude (0-200)
    fn volume_to_amplitude(volume: f32) -> u8 {
        (volume.clamp(0.0, 1.0) * 200.0).round() as u8
    }

    /// Base command carrying the current voice settings; text comes on stdin
    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.espeak_path);
        if let Some(ref voice) = self.voice {
            cmd.arg("-v").arg(voice);
        }
        cmd.arg("-s").arg(self.speed.to_string());
        cmd.arg("-a").arg(self.amplitude.to_string());
        cmd.arg("--stdin");
        cmd
    }
}

impl Backend for EspeakBackend {
    fn name(&self) -> &'static str {
        "espeak"
    }

    fn list_voices(&mut self) -> Result<Vec<RawVoice>> {
        let mut cmd = Command::new(&self.espeak_path);
        cmd.arg("--voices");
        let output = ProcessSlot::capture(cmd)?;
        let voices = Self::parse_voice_list(&output);
        debug!("espeak-ng reported {} voices", voices.len());
        Ok(voices)
    }

    fn set_rate(&mut self, wpm: u16) -> Result<()> {
        if !(MIN_SPEED..=MAX_SPEED).contains(&wpm) {
            return Err(VoxError::ConfigPropertyRejected {
                property: "rate".to_string(),
                detail: format!("{} wpm is outside {}-{}", wpm, MIN_SPEED, MAX_SPEED),
            });
        }
        debug!("Setting speed to {}", wpm);
        self.speed = wpm;
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) -> Result<()> {
        self.amplitude = Self::volume_to_amplitude(volume);
        debug!("Setting amplitude to {}", self.amplitude);
        Ok(())
    }

    fn set_voice(&mut self, id: &str) -> Result<()> {
        if id.trim().is_empty() || id.starts_with('-') {
            return Err(VoxError::ConfigPropertyRejected {
                property: "voice".to_string(),
                detail: format!("invalid espeak voice '{}'", id),
            });
        }
        debug!("Setting voice to {}", id);
        self.voice = Some(id.to_string());
        Ok(())
    }

    fn current_voice(&self) -> Option<String> {
        self.voice.clone()
    }

    fn speak(&mut self, text: &str) -> Result<()> {
        debug!("Speaking {} chars", text.len());
        self.slot.run(self.command(), Some(text))
    }

    fn render_to_file(&mut self, text: &str, path: &Path) -> Result<()> {
        debug!("Rendering {} chars to {:?}", text.len(), path);
        let mut cmd = self.command();
        cmd.arg("-w").arg(path);
        self.slot.run(cmd, Some(text))
    }

    fn stop_handle(&self) -> StopHandle {
        self.slot.stop_handle()
    }
}

impl Drop for EspeakBackend {
    fn drop(&mut self) {
        debug!("Shutting down espeak-ng backend");
        self.slot.cancel();
    }
}
