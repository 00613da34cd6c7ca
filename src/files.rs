//! Text input and audio output paths

use crate::platform::PlatformFamily;
use crate::Result;
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Prefix of generated output file names
const OUTPUT_PREFIX: &str = "VoxNova";

/// Read a text file for the input buffer, replacing invalid UTF-8
pub fn load_text(path: &Path) -> Result<String> {
    let bytes = fs::read(path)?;
    debug!("Loaded {} bytes from {:?}", bytes.len(), path);
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Extension rendered audio gets on this platform
pub fn default_audio_extension() -> &'static str {
    PlatformFamily::detect().audio_extension()
}

/// `VoxNova_<unix seconds>.<ext>`
pub fn default_output_name(now: SystemTime) -> String {
    let secs = now
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("{}_{}.{}", OUTPUT_PREFIX, secs, default_audio_extension())
}

/// Append the default audio extension when `path` has none
pub fn with_audio_extension(path: &Path) -> PathBuf {
    if path.extension().is_some() {
        path.to_path_buf()
    } else {
        path.with_extension(default_audio_extension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn test_default_output_name() {
        let name = default_output_name(UNIX_EPOCH + Duration::from_secs(1_700_000_000));
        assert!(name.starts_with("VoxNova_1700000000."));
        assert!(name.ends_with(default_audio_extension()));
    }

    #[test]
    fn test_with_audio_extension() {
        let plain = with_audio_extension(Path::new("out/greeting"));
        assert_eq!(plain.extension().unwrap(), default_audio_extension());

        let kept = with_audio_extension(Path::new("greeting.wav"));
        assert_eq!(kept, PathBuf::from("greeting.wav"));
    }

    #[test]
    fn test_load_text_is_lossy() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"caf\xc3\xa9 \xff ok").unwrap();
        let text = load_text(file.path()).unwrap();
        assert!(text.starts_with("café"));
        assert!(text.ends_with("ok"));
    }

    #[test]
    fn test_load_text_missing_file() {
        assert!(load_text(Path::new("/definitely/not/here.txt")).is_err());
    }
}
