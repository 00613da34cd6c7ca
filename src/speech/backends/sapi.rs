//! Windows SAPI backend (System.Speech.Synthesis)
//!
//! Runs a short PowerShell script per operation. Works natively on Windows
//! and from WSL through interop, where it is often the only engine with
//! good voices installed. Text travels on stdin so it never needs quoting.

use super::process::ProcessSlot;
use crate::platform::PlatformFamily;
use crate::speech::{Backend, RawVoice, StopHandle};
use crate::{Result, VoxError};
use log::debug;
use std::path::Path;
use std::process::{Command, Stdio};

/// Prints one `Id|Name|Culture|Gender` line per installed voice
const LIST_VOICES_SCRIPT: &str = r#"
Add-Type -AssemblyName System.Speech
$s = New-Object System.Speech.Synthesis.SpeechSynthesizer
foreach ($v in $s.GetInstalledVoices()) {
    $i = $v.VoiceInfo
    Write-Output ($i.Id + '|' + $i.Name + '|' + $i.Culture.Name + '|' + $i.Gender)
}
"#;

pub struct SapiBackend {
    /// Path to powershell.exe
    powershell_path: String,

    slot: ProcessSlot,

    /// SAPI rate (-10 to 10)
    rate: i8,

    /// SAPI volume (0-100)
    volume: u8,

    /// SAPI voice id
    voice: Option<String>,
}

impl SapiBackend {
    /// Create a new SAPI backend
    ///
    /// Verifies PowerShell is reachable and System.Speech loads.
    pub fn new() -> Result<Self> {
        debug!("Creating Windows SAPI backend");

        let powershell_path = Self::find_powershell()?;
        debug!("Found PowerShell at: {}", powershell_path);

        Self::test_sapi(&powershell_path)?;

        Ok(Self {
            powershell_path,
            slot: ProcessSlot::new(),
            rate: 0,
            volume: 100,
            voice: None,
        })
    }

    /// Find PowerShell executable (native or through WSL interop)
    fn find_powershell() -> Result<String> {
        let paths = [
            "powershell.exe",
            "/mnt/c/Windows/System32/WindowsPowerShell/v1.0/powershell.exe",
        ];

        for path in paths {
            if let Ok(status) = Command::new(path)
                .arg("-NoProfile")
                .arg("-Command")
                .arg("$PSVersionTable.PSVersion")
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
            "PowerShell not found. On WSL, interop may not be enabled.".to_string(),
        ))
    }

    /// Test that Windows SAPI is available
    fn test_sapi(powershell_path: &str) -> Result<()> {
        let output = Command::new(powershell_path)
            .arg("-NoProfile")
            .arg("-NonInteractive")
            .arg("-Command")
            .arg("Add-Type -AssemblyName System.Speech")
            .output()
            .map_err(|e| VoxError::EngineInitFailed(format!("Failed to test SAPI: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VoxError::EngineInitFailed(format!(
                "Windows SAPI not available: {}",
                stderr.trim()
            )));
        }

        debug!("Windows SAPI test successful");
        Ok(())
    }

    fn powershell(&self, script: &str) -> Command {
        let mut cmd = Command::new(&self.powershell_path);
        cmd.arg("-NoProfile")
            .arg("-NonInteractive")
            .arg("-Command")
            .arg(script);
        cmd
    }

    /// Parse `Id|Name|Culture|Gender` lines
    pub fn parse_voice_list(output: &str) -> Vec<RawVoice> {
        output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .filter_map(|line| {
                let mut fields = line.splitn(4, '|');
                let id = fields.next()?.trim();
                let name = fields.next()?.trim();
                let mut voice = RawVoice::new(id, name).with_language(fields.next().unwrap_or(""));
                if let Some(gender) = fields.next().map(str::trim).filter(|g| !g.is_empty()) {
                    voice = voice.with_gender(gender);
                }
                Some(voice)
            })
            .collect()
    }

    /// Convert words per minute to SAPI rate (-10 to 10, 0 is about 175 wpm)
    pub fn wpm_to_sapi_rate(wpm: u16) -> i8 {
        let steps = (wpm as f32 - 175.0) / 12.5;
        steps.round().clamp(-10.0, 10.0) as i8
    }

    /// Quote a string as a PowerShell single-quoted literal
    fn quote(value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    /// Path as Windows sees it; WSL paths go through `wslpath -w`
    fn windows_path(path: &Path) -> Result<String> {
        if PlatformFamily::detect() == PlatformFamily::Wsl {
            let mut cmd = Command::new("wslpath");
            cmd.arg("-w").arg(path);
            return Ok(ProcessSlot::capture(cmd)?.trim().to_string());
        }
        Ok(path.to_string_lossy().into_owned())
    }

    /// Build the synthesis script; `output` is a Windows path for file rendering
    fn synthesis_script(&self, output: Option<&str>) -> String {
        let mut script = String::from(
            "[Console]::InputEncoding = [System.Text.Encoding]::UTF8\n\
             Add-Type -AssemblyName System.Speech\n\
             $s = New-Object System.Speech.Synthesis.SpeechSynthesizer\n",
        );
        script.push_str(&format!("$s.Rate = {}\n", self.rate));
        script.push_str(&format!("$s.Volume = {}\n", self.volume));

        if let Some(ref id) = self.voice {
            script.push_str(&format!(
                "$v = $s.GetInstalledVoices() | Where-Object {{ $_.VoiceInfo.Id -eq {} }} | Select-Object -First 1\n\
                 if ($v) {{ $s.SelectVoice($v.VoiceInfo.Name) }}\n",
                Self::quote(id)
            ));
        }

        match output {
            Some(path) => {
                script.push_str(&format!("$s.SetOutputToWaveFile({})\n", Self::quote(path)))
            }
            None => script.push_str("$s.SetOutputToDefaultAudioDevice()\n"),
        }

        script.push_str("$s.Speak([Console]::In.ReadToEnd())\n$s.Dispose()\n");
        script
    }
}

impl Backend for SapiBackend {
    fn name(&self) -> &'static str {
        "sapi"
    }

    fn list_voices(&mut self) -> Result<Vec<RawVoice>> {
        let output = ProcessSlot::capture(self.powershell(LIST_VOICES_SCRIPT))?;
        Ok(Self::parse_voice_list(&output))
    }

    fn set_rate(&mut self, wpm: u16) -> Result<()> {
        self.rate = Self::wpm_to_sapi_rate(wpm);
        debug!("Setting SAPI rate to {} ({} wpm)", self.rate, wpm);
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) -> Result<()> {
        self.volume = (volume.clamp(0.0, 1.0) * 100.0).round() as u8;
        Ok(())
    }

    fn set_voice(&mut self, id: &str) -> Result<()> {
        if id.trim().is_empty() {
            return Err(VoxError::ConfigPropertyRejected {
                property: "voice".to_string(),
                detail: "empty voice id".to_string(),
            });
        }
        self.voice = Some(id.to_string());
        Ok(())
    }

    fn current_voice(&self) -> Option<String> {
        self.voice.clone()
    }

    fn speak(&mut self, text: &str) -> Result<()> {
        let cmd = self.powershell(&self.synthesis_script(None));
        self.slot.run(cmd, Some(text))
    }

    fn render_to_file(&mut self, text: &str, path: &Path) -> Result<()> {
        let target = Self::windows_path(path)?;
        let cmd = self.powershell(&self.synthesis_script(Some(&target)));
        self.slot.run(cmd, Some(text))
    }

    fn stop_handle(&self) -> StopHandle {
        self.slot.stop_handle()
    }
}

impl Drop for SapiBackend {
    fn drop(&mut self) {
        debug!("Shutting down Windows SAPI backend");
        self.slot.cancel();
    }
}
