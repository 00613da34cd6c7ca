//! Synthesis jobs
//!
//! A job turns one [`SynthesisRequest`] into speech or an audio file on a
//! worker thread. The [`JobRunner`] allows a single job in flight and hands
//! results back to whichever thread polls it, which is expected to be the
//! thread that owns the UI.

pub mod request;
pub mod runner;

pub use request::{SynthesisMode, SynthesisRequest, DEFAULT_RATE_WPM, MAX_RATE_WPM, MIN_RATE_WPM};
pub use runner::{Completion, JobRunner, JobState, RunnerEvent};
