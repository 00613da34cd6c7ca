//! Persistent user settings
//!
//! A flat record stored as INI in `~/.voxnova.cfg`. Settings are never
//! essential: a missing or damaged file yields defaults and a bad value
//! falls back to its default, with a warning in the log.

use crate::jobs::{DEFAULT_RATE_WPM, MAX_RATE_WPM, MIN_RATE_WPM};
use crate::speech::BackendPreference;
use crate::{Result, VoxError};
use ini::Ini;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

const CONFIG_FILE: &str = ".voxnova.cfg";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Speaking rate in words per minute (80-300)
    pub rate_wpm: u16,

    /// Volume percent (0-100)
    pub volume_percent: u8,

    /// Last selected voice id
    pub voice_id: Option<String>,

    /// Engine to open at startup
    pub backend: BackendPreference,

    pub dark_mode: bool,
    pub font_size: u8,

    /// Window geometry, opaque to everything but the front-end
    pub window_geometry: Option<String>,

    /// When a job is reported as slow
    pub still_working_after: Duration,

    /// How long to wait for the engine to list its voices
    pub catalog_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            rate_wpm: DEFAULT_RATE_WPM,
            volume_percent: 100,
            voice_id: None,
            backend: BackendPreference::Auto,
            dark_mode: false,
            font_size: 12,
            window_geometry: None,
            still_working_after: Duration::from_secs(10),
            catalog_timeout: Duration::from_secs(5),
        }
    }
}

/// Parse `section.key`, warning and returning `None` on a bad value
fn parse_key<T: FromStr>(ini: &Ini, section: &str, key: &str) -> Option<T> {
    let raw = ini.get_from(Some(section), key)?.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring invalid {}.{} = {:?}", section, key, raw);
            None
        }
    }
}

fn non_empty(ini: &Ini, section: &str, key: &str) -> Option<String> {
    ini.get_from(Some(section), key)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl Settings {
    /// Default settings file path (~/.voxnova.cfg)
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(CONFIG_FILE)
    }

    /// Load from the default path
    pub fn load() -> Self {
        Self::load_from(&Self::default_path())
    }

    /// Load from `path`, falling back to defaults on any problem
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            info!("Settings file {:?} not found, using defaults", path);
            return Self::default();
        }

        debug!("Loading settings from {:?}", path);
        match Ini::load_from_file(path) {
            Ok(ini) => Self::from_ini(&ini),
            Err(e) => {
                warn!("Failed to read settings {:?}: {}; using defaults", path, e);
                Self::default()
            }
        }
    }

    fn from_ini(ini: &Ini) -> Self {
        let defaults = Self::default();

        let rate_wpm = parse_key::<u16>(ini, "speech", "rate")
            .map(|r| r.clamp(MIN_RATE_WPM, MAX_RATE_WPM))
            .unwrap_or(defaults.rate_wpm);
        let volume_percent = parse_key::<u8>(ini, "speech", "volume")
            .map(|v| v.min(100))
            .unwrap_or(defaults.volume_percent);
        let backend = parse_key(ini, "speech", "backend").unwrap_or(defaults.backend);

        let font_size = parse_key::<u8>(ini, "ui", "font_size")
            .filter(|&s| s > 0)
            .unwrap_or(defaults.font_size);

        let still_working_after = parse_key::<u64>(ini, "jobs", "still_working_after")
            .map(Duration::from_secs)
            .unwrap_or(defaults.still_working_after);
        let catalog_timeout = parse_key::<u64>(ini, "jobs", "catalog_timeout")
            .filter(|&s| s > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.catalog_timeout);

        Self {
            rate_wpm,
            volume_percent,
            voice_id: non_empty(ini, "speech", "voice"),
            backend,
            dark_mode: parse_key(ini, "ui", "dark_mode").unwrap_or(defaults.dark_mode),
            font_size,
            window_geometry: non_empty(ini, "ui", "geometry"),
            still_working_after,
            catalog_timeout,
        }
    }

    fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();

        ini.with_section(Some("speech"))
            .set("rate", self.rate_wpm.to_string())
            .set("volume", self.volume_percent.to_string())
            .set("voice", self.voice_id.clone().unwrap_or_default())
            .set("backend", self.backend.as_str());

        ini.with_section(Some("ui"))
            .set("dark_mode", self.dark_mode.to_string())
            .set("font_size", self.font_size.to_string())
            .set("geometry", self.window_geometry.clone().unwrap_or_default());

        ini.with_section(Some("jobs"))
            .set("still_working_after", self.still_working_after.as_secs().to_string())
            .set("catalog_timeout", self.catalog_timeout.as_secs().to_string());

        ini
    }

    /// Save to the default path
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        debug!("Saving settings to {:?}", path);
        self.to_ini()
            .write_to_file(path)
            .map_err(|e| VoxError::Config(format!("Failed to save settings: {}", e)))
    }

    /// Volume as the 0.0-1.0 fraction engines take
    pub fn volume(&self) -> f32 {
        f32::from(self.volume_percent) / 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.rate_wpm, 160);
        assert_eq!(settings.volume_percent, 100);
        assert_eq!(settings.volume(), 1.0);
        assert_eq!(settings.backend, BackendPreference::Auto);
    }

    #[test]
    fn test_from_ini_clamps_and_ignores_bad_values() {
        let ini = Ini::load_from_str(
            "[speech]\nrate = 900\nvolume = loud\nbackend = espeak\nvoice = \n\
             [ui]\ndark_mode = true\nfont_size = 0\n",
        )
        .unwrap();
        let settings = Settings::from_ini(&ini);
        assert_eq!(settings.rate_wpm, MAX_RATE_WPM);
        assert_eq!(settings.volume_percent, 100);
        assert_eq!(settings.backend, BackendPreference::Espeak);
        assert_eq!(settings.voice_id, None);
        assert!(settings.dark_mode);
        assert_eq!(settings.font_size, 12);
    }
}
