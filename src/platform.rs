//! Platform detection utilities
//!
//! Backend selection and the default audio file extension both depend on
//! which platform family we are running on.

use std::fs;

/// Broad platform families that matter for speech backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformFamily {
    Linux,
    /// Linux under Windows Subsystem for Linux; Windows SAPI is reachable
    Wsl,
    MacOs,
    Windows,
    Other,
}

impl PlatformFamily {
    /// Detect the family of the running process
    pub fn detect() -> Self {
        match std::env::consts::OS {
            "linux" if is_wsl() => PlatformFamily::Wsl,
            "linux" => PlatformFamily::Linux,
            "macos" => PlatformFamily::MacOs,
            "windows" => PlatformFamily::Windows,
            _ => PlatformFamily::Other,
        }
    }

    /// Extension the platform's engines natively write when rendering to file
    pub fn audio_extension(self) -> &'static str {
        match self {
            PlatformFamily::MacOs => "aiff",
            _ => "wav",
        }
    }
}

/// Detect if running in WSL (Windows Subsystem for Linux)
///
/// Checks for WSL-specific indicators in /proc/version and environment variables.
pub fn is_wsl() -> bool {
    if let Ok(contents) = fs::read_to_string("/proc/version") {
        let lower = contents.to_lowercase();
        if lower.contains("microsoft") || lower.contains("wsl") {
            return true;
        }
    }

    std::env::var("WSL_DISTRO_NAME").is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_does_not_panic() {
        let family = PlatformFamily::detect();
        if cfg!(target_os = "macos") {
            assert_eq!(family, PlatformFamily::MacOs);
        }
        if cfg!(target_os = "windows") {
            assert_eq!(family, PlatformFamily::Windows);
        }
    }

    #[test]
    fn test_audio_extension() {
        assert_eq!(PlatformFamily::MacOs.audio_extension(), "aiff");
        assert_eq!(PlatformFamily::Linux.audio_extension(), "wav");
        assert_eq!(PlatformFamily::Wsl.audio_extension(), "wav");
        assert_eq!(PlatformFamily::Windows.audio_extension(), "wav");
    }
}
