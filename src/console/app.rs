//! Console application state
//!
//! All presentation state lives here and is touched only by the thread that
//! owns the [`App`]. Synthesis runs on the job runner's workers; their
//! results come back through [`App::tick`].

use super::command::{Command, HELP};
use crate::catalog::{labels_or_no_match, load_catalog, Catalog, CatalogLoad, GenderFacet};
use crate::files;
use crate::jobs::{
    Completion, JobRunner, RunnerEvent, SynthesisMode, SynthesisRequest, MAX_RATE_WPM, MIN_RATE_WPM,
};
use crate::settings::Settings;
use crate::speech::Engine;
use crate::{Result, VoxError};
use log::{debug, info, warn};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

/// Opens a fresh engine; called on the catalog loader thread
pub type EngineOpener = Arc<dyn Fn() -> Result<Engine> + Send + Sync>;

/// Whether the main loop should keep going
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

#[derive(Serialize)]
struct Diagnostics<'a> {
    version: &'a str,
    engine: Option<&'a str>,
    voice_count: usize,
    selected_voice: Option<&'a str>,
    busy: bool,
    voices: Vec<&'a str>,
}

pub struct App<W: Write> {
    out: W,
    settings: Settings,
    opener: EngineOpener,
    engine: Option<Engine>,
    catalog: Catalog,
    query: String,
    facet: GenderFacet,
    text: String,
    runner: JobRunner,

    /// Busy indicator; set before a worker starts, cleared only when its
    /// completion has been handled here
    busy: bool,
}

impl<W: Write> App<W> {
    pub fn new(settings: Settings, opener: EngineOpener, out: W) -> Self {
        let runner = JobRunner::new().with_still_working_after(settings.still_working_after);
        Self {
            out,
            settings,
            opener,
            engine: None,
            catalog: Catalog::empty(),
            query: String::new(),
            facet: GenderFacet::Any,
            text: String::new(),
            runner,
            busy: false,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn selected_voice(&self) -> Option<&str> {
        self.settings.voice_id.as_deref()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    pub fn greet(&mut self) -> Result<()> {
        writeln!(self.out, "VoxNova {} - offline text to speech", crate::VERSION)?;
        writeln!(self.out, "Type 'help' for commands.")?;
        Ok(())
    }

    pub fn prompt(&mut self) -> Result<()> {
        write!(self.out, "{}", if self.busy { "(busy)> " } else { "> " })?;
        self.out.flush()?;
        Ok(())
    }

    /// Show an error without ending the session
    pub fn report(&mut self, error: &VoxError) -> Result<()> {
        writeln!(self.out, "Error: {}", error)?;
        Ok(())
    }

    /// Adopt the result of a catalog load
    ///
    /// The previous selection survives if its id is still present, else the
    /// first voice is selected.
    pub fn attach(&mut self, load: CatalogLoad) -> Result<()> {
        self.catalog = load.catalog_or_empty();
        self.engine = load.engine;

        if let Err(ref e) = load.result {
            writeln!(self.out, "No voices found: {}", e)?;
            if self.engine.is_some() {
                writeln!(self.out, "Speaking with the engine's default voice.")?;
            } else {
                writeln!(
                    self.out,
                    "Speech is unavailable. Install espeak-ng or speech-dispatcher, then 'rescan'."
                )?;
            }
        }

        // An empty catalog keeps the saved voice for the next rescan
        if !self.catalog.is_empty() {
            let previous = self.settings.voice_id.take();
            self.settings.voice_id = self
                .catalog
                .resolve_selection(previous.as_deref())
                .map(|v| v.id.clone());
        }

        if let Some(engine) = &self.engine {
            info!("Using {} engine with {} voices", engine.name(), self.catalog.len());
            writeln!(
                self.out,
                "{} engine ready, {} voices.",
                engine.name(),
                self.catalog.len()
            )?;
        }
        Ok(())
    }

    /// Reopen the engine and reload the voice list
    pub fn rescan(&mut self) -> Result<()> {
        if self.busy {
            writeln!(self.out, "Busy: stop the running job before rescanning.")?;
            return Ok(());
        }

        writeln!(self.out, "Scanning voices...")?;
        self.out.flush()?;
        // Drop our handle first so a reopened engine is not shared with it
        self.engine = None;
        let opener = Arc::clone(&self.opener);
        let load = load_catalog(move || opener(), self.settings.catalog_timeout);
        self.attach(load)
    }

    /// Deliver finished jobs and slow-job notices
    pub fn tick(&mut self) -> Result<()> {
        while let Some(event) = self.runner.poll() {
            self.on_event(event)?;
        }
        Ok(())
    }

    /// Detach the running job and report it; false when idle
    pub fn abandon_job(&mut self) -> Result<bool> {
        if !self.runner.abandon() {
            return Ok(false);
        }
        self.tick()?;
        Ok(true)
    }

    fn on_event(&mut self, event: RunnerEvent) -> Result<()> {
        match event {
            RunnerEvent::Completed(completion) => self.on_completion(completion),
            RunnerEvent::StillWorking { elapsed, .. } => {
                writeln!(
                    self.out,
                    "Still working ({}s). Type 'stop' or 'abandon' to give up.",
                    elapsed.as_secs()
                )?;
                Ok(())
            }
        }
    }

    fn on_completion(&mut self, completion: Completion) -> Result<()> {
        self.busy = false;
        for note in &completion.rejected {
            writeln!(self.out, "Note: {}", note)?;
        }
        if completion.success {
            writeln!(self.out, "✓ {}", completion.detail)?;
        } else {
            writeln!(self.out, "✗ Synthesis error: {}", completion.detail)?;
        }
        Ok(())
    }

    pub fn handle(&mut self, command: Command) -> Result<Flow> {
        debug!("Handling {:?}", command);
        match command {
            Command::Nothing => {}
            Command::Help => writeln!(self.out, "{}", HELP)?,
            Command::Voices(query) => {
                if let Some(query) = query {
                    self.query = query;
                } else {
                    self.query.clear();
                }
                self.list_voices()?;
            }
            Command::Gender(facet) => {
                self.facet = facet;
                self.list_voices()?;
            }
            Command::Use(choice) => self.select(&choice)?,
            Command::Rate(wpm) => {
                self.settings.rate_wpm = wpm.clamp(MIN_RATE_WPM, MAX_RATE_WPM);
                writeln!(self.out, "Rate: {} wpm", self.settings.rate_wpm)?;
            }
            Command::Volume(percent) => {
                self.settings.volume_percent = percent.min(100);
                writeln!(self.out, "Volume: {}%", self.settings.volume_percent)?;
            }
            Command::Text(text) => {
                self.text = text;
                writeln!(self.out, "Text set ({} chars).", self.text.chars().count())?;
            }
            Command::Load(path) => match files::load_text(&path) {
                Ok(text) => {
                    self.text = text;
                    writeln!(
                        self.out,
                        "Loaded {} chars from {}.",
                        self.text.chars().count(),
                        path.display()
                    )?;
                }
                Err(e) => writeln!(self.out, "Could not open {}: {}", path.display(), e)?,
            },
            Command::Say(text) => {
                if let Some(text) = text {
                    self.text = text;
                }
                self.start_job(SynthesisMode::Speak)?;
            }
            Command::Save(path) => {
                let path = match path {
                    Some(path) => files::with_audio_extension(&path),
                    None => PathBuf::from(files::default_output_name(SystemTime::now())),
                };
                self.start_job(SynthesisMode::RenderToFile(path))?;
            }
            Command::Stop => {
                if !self.runner.stop() {
                    writeln!(self.out, "Nothing is running.")?;
                }
                self.tick()?;
            }
            Command::Abandon => {
                if self.abandon_job()? {
                    // The stuck worker still holds the old engine
                    self.rescan()?;
                } else {
                    writeln!(self.out, "Nothing is running.")?;
                }
            }
            Command::Rescan => self.rescan()?,
            Command::Status => self.status()?,
            Command::Debug => self.debug_dump()?,
            Command::Quit => {
                self.shutdown()?;
                return Ok(Flow::Quit);
            }
        }
        Ok(Flow::Continue)
    }

    fn list_voices(&mut self) -> Result<()> {
        if self.catalog.is_empty() {
            writeln!(self.out, "No voices found.")?;
            return Ok(());
        }

        let matches = self.catalog.filter_voices(&self.query, self.facet);
        if matches.is_empty() {
            let labels = labels_or_no_match(&[]);
            writeln!(self.out, "  {}", labels[0])?;
            return Ok(());
        }

        let selected = self.settings.voice_id.as_deref();
        for (n, voice) in matches.iter().enumerate() {
            let marker = if Some(voice.id.as_str()) == selected { '*' } else { ' ' };
            writeln!(self.out, "{}{:3}. {}", marker, n + 1, voice.label)?;
        }
        Ok(())
    }

    /// Resolve a list number, exact label, or unique label fragment
    fn select(&mut self, choice: &str) -> Result<()> {
        let matches = self.catalog.filter_voices(&self.query, self.facet);

        let found = match choice.parse::<usize>() {
            Ok(n) if n >= 1 => matches.get(n - 1).copied(),
            _ => self.catalog.by_label(choice).or_else(|| {
                let needle = choice.to_lowercase();
                let mut hits = self
                    .catalog
                    .voices()
                    .iter()
                    .filter(|v| v.label.to_lowercase().contains(&needle));
                match (hits.next(), hits.next()) {
                    (Some(only), None) => Some(only),
                    _ => None,
                }
            }),
        };

        match found {
            Some(voice) => {
                let (id, label) = (voice.id.clone(), voice.label.clone());
                self.settings.voice_id = Some(id);
                writeln!(self.out, "Voice: {}", label)?;
            }
            None => writeln!(self.out, "No single voice matches '{}'.", choice)?,
        }
        Ok(())
    }

    fn start_job(&mut self, mode: SynthesisMode) -> Result<()> {
        if self.busy {
            writeln!(self.out, "Busy: a job is already running.")?;
            return Ok(());
        }

        let engine = match &self.engine {
            Some(engine) => engine.clone(),
            None => {
                writeln!(self.out, "No speech engine available. Try 'rescan'.")?;
                return Ok(());
            }
        };

        let request = match SynthesisRequest::new(
            self.text.clone(),
            self.settings.voice_id.clone(),
            self.settings.rate_wpm,
            self.settings.volume(),
        ) {
            Ok(request) => request,
            Err(VoxError::EmptyText) => {
                writeln!(self.out, "Please enter some text to synthesize.")?;
                return Ok(());
            }
            Err(e) => return self.report(&e),
        };

        self.busy = true;
        writeln!(self.out, "Synthesizing...")?;
        self.out.flush()?;

        if let Err(e) = self.runner.submit(&engine, request, mode) {
            self.busy = false;
            self.report(&e)?;
        }
        Ok(())
    }

    fn status(&mut self) -> Result<()> {
        let engine = self.engine.as_ref().map(|e| e.name()).unwrap_or("none");
        let voice = self
            .settings
            .voice_id
            .as_deref()
            .and_then(|id| self.catalog.get(id))
            .map(|v| v.label.clone())
            .unwrap_or_else(|| "default".to_string());

        writeln!(self.out, "Engine:  {} ({} voices)", engine, self.catalog.len())?;
        writeln!(self.out, "Voice:   {}", voice)?;
        writeln!(self.out, "Rate:    {} wpm", self.settings.rate_wpm)?;
        writeln!(self.out, "Volume:  {}%", self.settings.volume_percent)?;
        writeln!(self.out, "Filter:  '{}' / {:?}", self.query, self.facet)?;
        writeln!(self.out, "Text:    {} chars", self.text.chars().count())?;
        writeln!(
            self.out,
            "Theme:   {} / font {}",
            if self.settings.dark_mode { "dark" } else { "light" },
            self.settings.font_size
        )?;
        writeln!(self.out, "Job:     {}", if self.busy { "running" } else { "idle" })?;
        Ok(())
    }

    fn debug_dump(&mut self) -> Result<()> {
        let diagnostics = Diagnostics {
            version: crate::VERSION,
            engine: self.engine.as_ref().map(|e| e.name()),
            voice_count: self.catalog.len(),
            selected_voice: self.settings.voice_id.as_deref(),
            busy: self.busy,
            voices: self.catalog.voices().iter().map(|v| v.label.as_str()).collect(),
        };
        let json = serde_json::to_string_pretty(&diagnostics)?;
        writeln!(self.out, "{}", json)?;
        Ok(())
    }

    /// Stop any job and persist settings; a failed save is reported only
    pub fn shutdown(&mut self) -> Result<()> {
        if self.runner.stop() {
            self.tick()?;
        }
        if let Err(e) = self.settings.save() {
            warn!("{}", e);
            writeln!(self.out, "Warning: {}", e)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speech::{Backend, RawVoice, StopHandle};
    use std::path::Path;
    use std::time::Duration;

    struct QuietBackend;

    impl Backend for QuietBackend {
        fn name(&self) -> &'static str {
            "quiet"
        }
        fn list_voices(&mut self) -> Result<Vec<RawVoice>> {
            Ok(vec![
                RawVoice::new("v1", "Zira").with_gender("female"),
                RawVoice::new("v2", "David").with_gender("male"),
            ])
        }
        fn set_rate(&mut self, _wpm: u16) -> Result<()> {
            Ok(())
        }
        fn set_volume(&mut self, _volume: f32) -> Result<()> {
            Ok(())
        }
        fn set_voice(&mut self, _id: &str) -> Result<()> {
            Ok(())
        }
        fn current_voice(&self) -> Option<String> {
            None
        }
        fn speak(&mut self, text: &str) -> Result<()> {
            if text == "slow" {
                std::thread::sleep(Duration::from_millis(300));
            }
            Ok(())
        }
        fn render_to_file(&mut self, _text: &str, path: &Path) -> Result<()> {
            std::fs::write(path, b"RIFF")?;
            Ok(())
        }
        fn stop_handle(&self) -> StopHandle {
            StopHandle::noop()
        }
    }

    fn app() -> App<Vec<u8>> {
        let opener: EngineOpener = Arc::new(|| Ok(Engine::new(Box::new(QuietBackend))));
        let mut app = App::new(Settings::default(), Arc::clone(&opener), Vec::new());
        let load = load_catalog(move || opener(), Duration::from_secs(5));
        app.attach(load).unwrap();
        app
    }

    fn printed(app: &App<Vec<u8>>) -> String {
        String::from_utf8_lossy(app.output()).into_owned()
    }

    #[test]
    fn test_attach_selects_first_voice() {
        let app = app();
        assert_eq!(app.catalog().len(), 2);
        assert_eq!(app.selected_voice(), Some("v1"));
    }

    #[test]
    fn test_use_by_number_and_fragment() {
        let mut app = app();
        app.handle(Command::Use("2".into())).unwrap();
        assert_eq!(app.selected_voice(), Some("v2"));
        app.handle(Command::Use("zira".into())).unwrap();
        assert_eq!(app.selected_voice(), Some("v1"));
        app.handle(Command::Use("nobody".into())).unwrap();
        assert_eq!(app.selected_voice(), Some("v1"));
    }

    #[test]
    fn test_gender_filter_lists_matching_voices() {
        let mut app = app();
        app.handle(Command::Gender(GenderFacet::Male)).unwrap();
        let out = printed(&app);
        assert!(out.contains("David - Male - v2"));
        assert!(!out.contains("Zira - Female - v1"));
    }

    #[test]
    fn test_no_match_sentinel() {
        let mut app = app();
        app.handle(Command::Voices(Some("klingon".into()))).unwrap();
        assert!(printed(&app).contains(crate::catalog::NO_MATCH));
    }

    #[test]
    fn test_say_without_text_stays_idle() {
        let mut app = app();
        app.handle(Command::Say(None)).unwrap();
        assert!(!app.is_busy());
        assert!(printed(&app).contains("Please enter some text"));
    }

    #[test]
    fn test_say_completes_through_tick() {
        let mut app = app();
        app.handle(Command::Say(Some("Hello".into()))).unwrap();
        assert!(app.is_busy());

        for _ in 0..200 {
            app.tick().unwrap();
            if !app.is_busy() {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(!app.is_busy());
        assert!(printed(&app).contains("✓ Finished speaking"));
    }

    #[test]
    fn test_abandon_job_frees_the_ui() {
        let mut app = app();
        assert!(!app.abandon_job().unwrap());

        app.handle(Command::Say(Some("slow".into()))).unwrap();
        assert!(app.is_busy());
        assert!(app.abandon_job().unwrap());
        assert!(!app.is_busy());
        assert!(printed(&app).contains("abandoned"));
    }

    #[test]
    fn test_debug_dump_is_json() {
        let mut app = app();
        app.handle(Command::Debug).unwrap();
        let out = printed(&app);
        let start = out.find('{').unwrap();
        let value: serde_json::Value = serde_json::from_str(out[start..].trim()).unwrap();
        assert_eq!(value["voice_count"], 2);
        assert_eq!(value["engine"], "quiet");
    }
}
