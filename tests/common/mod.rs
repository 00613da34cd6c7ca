//! Scripted speech backend shared by the integration tests

#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use voxnova::speech::{Backend, Engine, RawVoice, StopHandle};
use voxnova::{Result, VoxError};

/// What the scripted backend should do
#[derive(Clone, Default)]
pub struct Script {
    pub voices: Vec<RawVoice>,
    /// How long speak/render take unless stopped
    pub takes: Duration,
    /// Bytes written by render; `None` writes no file at all
    pub render_bytes: Option<Vec<u8>>,
    pub fail_with: Option<String>,
    pub reject_rate: bool,
    pub panic_on_speak: bool,
}

impl Script {
    pub fn voices(voices: Vec<RawVoice>) -> Self {
        Self {
            voices,
            ..Self::default()
        }
    }
}

/// Every call the backend received, in order
pub type CallLog = Arc<Mutex<Vec<String>>>;

pub struct ScriptedBackend {
    script: Script,
    calls: CallLog,
    cancelled: Arc<AtomicBool>,
    voice: Option<String>,
}

impl ScriptedBackend {
    pub fn new(script: Script) -> (Self, CallLog) {
        let calls = CallLog::default();
        let backend = Self {
            script,
            calls: Arc::clone(&calls),
            cancelled: Arc::new(AtomicBool::new(false)),
            voice: None,
        };
        (backend, calls)
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    /// Pretend to synthesize for the scripted duration
    fn work(&self) -> Result<()> {
        self.cancelled.store(false, Ordering::SeqCst);
        let started = Instant::now();
        while started.elapsed() < self.script.takes && !self.cancelled.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(5));
        }
        match self.script.fail_with {
            Some(ref message) => Err(VoxError::BackendRuntime(message.clone())),
            None => Ok(()),
        }
    }
}

impl Backend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn list_voices(&mut self) -> Result<Vec<RawVoice>> {
        self.record("list".to_string());
        Ok(self.script.voices.clone())
    }

    fn set_rate(&mut self, wpm: u16) -> Result<()> {
        self.record(format!("rate:{}", wpm));
        if self.script.reject_rate {
            return Err(VoxError::ConfigPropertyRejected {
                property: "rate".to_string(),
                detail: "unsupported".to_string(),
            });
        }
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) -> Result<()> {
        self.record(format!("volume:{:.2}", volume));
        Ok(())
    }

    fn set_voice(&mut self, id: &str) -> Result<()> {
        self.record(format!("voice:{}", id));
        self.voice = Some(id.to_string());
        Ok(())
    }

    fn current_voice(&self) -> Option<String> {
        self.voice.clone()
    }

    fn speak(&mut self, text: &str) -> Result<()> {
        if self.script.panic_on_speak {
            panic!("scripted backend exploded");
        }
        self.record(format!("speak-start:{}", text));
        let result = self.work();
        self.record(format!("speak-end:{}", text));
        result
    }

    fn render_to_file(&mut self, text: &str, path: &Path) -> Result<()> {
        self.record(format!("render:{}", text));
        self.work()?;
        if let Some(ref bytes) = self.script.render_bytes {
            fs::write(path, bytes)?;
        }
        Ok(())
    }

    fn stop_handle(&self) -> StopHandle {
        let cancelled = Arc::clone(&self.cancelled);
        let calls = Arc::clone(&self.calls);
        StopHandle::new(move || {
            cancelled.store(true, Ordering::SeqCst);
            calls.lock().unwrap().push("stop".to_string());
        })
    }
}

/// Wait until `call` shows up in the log
pub fn wait_for_call(calls: &CallLog, call: &str, timeout: Duration) -> bool {
    let started = Instant::now();
    while started.elapsed() < timeout {
        if calls.lock().unwrap().iter().any(|c| c == call) {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

pub fn engine(script: Script) -> (Engine, CallLog) {
    let (backend, calls) = ScriptedBackend::new(script);
    (Engine::new(Box::new(backend)), calls)
}

pub fn zira_and_david() -> Vec<RawVoice> {
    vec![
        RawVoice::new("v1", "Zira").with_gender("female"),
        RawVoice::new("v2", "David").with_gender("male"),
    ]
}
