//! Platform-specific speech backends

// Native TTS backend using the tts crate (cross-platform)
pub mod native;

// espeak-ng command line (Linux, WSL)
pub mod espeak;

// macOS say command
pub mod say;

// Windows SAPI through PowerShell (Windows, WSL)
pub mod sapi;

mod process;

pub use espeak::EspeakBackend;
pub use native::NativeBackend;
pub use sapi::SapiBackend;
pub use say::SayBackend;
