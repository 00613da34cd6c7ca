//! macOS `say` backend
//!
//! Uses the `say` command that ships with every macOS install. Unlike the
//! AVFoundation bindings it can render to a file (AIFF by default, WAV when
//! the path asks for it).

use super::process::ProcessSlot;
use crate::speech::{Backend, RawVoice, StopHandle};
use crate::{Result, VoxError};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use std::process::{Command, Stdio};

/// One row of `say -v ?`: `Name   locale   # sample sentence`
static VOICE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<name>\S.*?)\s+(?P<lang>[A-Za-z]{2,3}[_-][A-Za-z0-9]+)\s+#")
        .expect("voice line pattern is valid")
});

pub struct SayBackend {
    slot: ProcessSlot,
    rate: u16,
    volume: f32,
    voice: Option<String>,
}

impl SayBackend {
    pub fn new() -> Result<Self> {
        debug!("Creating say backend");

        let available = Command::new("say")
            .arg("-v")
            .arg("?")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false);

        if !available {
            return Err(VoxError::EngineInitFailed(
                "the say command is not available".to_string(),
            ));
        }

        Ok(Self {
            slot: ProcessSlot::new(),
            rate: 175,
            volume: 1.0,
            voice: None,
        })
    }

    /// Parse the listing printed by `say -v ?`
    pub fn parse_voice_list(output: &str) -> Vec<RawVoice> {
        output
            .lines()
            .filter_map(|line| VOICE_LINE.captures(line))
            .map(|caps| {
                let name = caps["name"].trim();
                RawVoice::new(name, name).with_language(caps["lang"].replace('_', "-"))
            })
            .collect()
    }

    /// Text with the embedded volume command in front
    fn prepare_text(&self, text: &str) -> String {
        format!("[[volm {:.2}]] {}", self.volume, text)
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new("say");
        if let Some(ref voice) = self.voice {
            cmd.arg("-v").arg(voice);
        }
        cmd.arg("-r").arg(self.rate.to_string());
        cmd.arg("-f").arg("-");
        cmd
    }

    fn wants_wave(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("wav"))
            .unwrap_or(false)
    }
}

impl Backend for SayBackend {
    fn name(&self) -> &'static str {
        "say"
    }

    fn list_voices(&mut self) -> Result<Vec<RawVoice>> {
        let mut cmd = Command::new("say");
        cmd.arg("-v").arg("?");
        let output = ProcessSlot::capture(cmd)?;
        Ok(Self::parse_voice_list(&output))
    }

    fn set_rate(&mut self, wpm: u16) -> Result<()> {
        debug!("Setting rate to {}", wpm);
        self.rate = wpm;
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) -> Result<()> {
        self.volume = volume.clamp(0.0, 1.0);
        Ok(())
    }

    fn set_voice(&mut self, id: &str) -> Result<()> {
        if id.trim().is_empty() {
            return Err(VoxError::ConfigPropertyRejected {
                property: "voice".to_string(),
                detail: "empty voice name".to_string(),
            });
        }
        self.voice = Some(id.to_string());
        Ok(())
    }

    fn current_voice(&self) -> Option<String> {
        self.voice.clone()
    }

    fn speak(&mut self, text: &str) -> Result<()> {
        let text = self.prepare_text(text);
        self.slot.run(self.command(), Some(&text))
    }

    fn render_to_file(&mut self, text: &str, path: &Path) -> Result<()> {
        let text = self.prepare_text(text);
        let mut cmd = self.command();
        cmd.arg("-o").arg(path);
        if Self::wants_wave(path) {
            cmd.arg("--file-format=WAVE").arg("--data-format=LEI16@22050");
        }
        self.slot.run(cmd, Some(&text))
    }

    fn stop_handle(&self) -> StopHandle {
        self.slot.stop_handle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Alex                en_US    # Most people recognize me by my voice.
Bad News            en_US    # The light you see at the end of the tunnel is the headlamp of a fast approaching train.
Eddy (English (UK)) en_GB    # Hello! My name is Eddy.
";

    #[test]
    fn test_parse_voice_list() {
        let voices = SayBackend::parse_voice_list(SAMPLE);
        assert_eq!(voices.len(), 3);
        assert_eq!(voices[0].id, "Alex");
        assert_eq!(voices[0].language.as_deref(), Some("en-US"));
        assert_eq!(voices[1].name, "Bad News");
        assert_eq!(voices[2].name, "Eddy (English (UK))");
        assert_eq!(voices[2].language.as_deref(), Some("en-GB"));
    }

    #[test]
    fn test_wants_wave() {
        assert!(SayBackend::wants_wave(Path::new("out.WAV")));
        assert!(!SayBackend::wants_wave(Path::new("out.aiff")));
        assert!(!SayBackend::wants_wave(Path::new("out")));
    }
}
