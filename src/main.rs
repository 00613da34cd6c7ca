//! VoxNova main entry point
//!
//! The main thread owns the console UI. A helper thread reads stdin and
//! forwards lines over a channel, so the loop can wake every 100ms to
//! collect finished synthesis jobs even while the user is not typing.

use anyhow::Context;
use log::{debug, error, info, warn};
use std::io::{self, BufRead};
use std::process;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use voxnova::console::{App, Command, EngineOpener, Flow};
use voxnova::settings::Settings;
use voxnova::speech::Engine;

/// Longest the UI loop sleeps between polls of the job runner
const TICK: Duration = Duration::from_millis(100);

/// On end of input, a running job gets this many slow-job thresholds to
/// finish before it is abandoned
const SHUTDOWN_GRACE_FACTOR: u32 = 3;

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let debug_mode = args.iter().any(|arg| arg == "--debug" || arg == "-d");

    if debug_mode {
        // Debug mode: write to voxnova.log file
        use std::fs::OpenOptions;
        match OpenOptions::new()
            .create(true)
            .append(true)
            .open("voxnova.log")
        {
            Ok(log_file) => {
                env_logger::Builder::new()
                    .filter_level(log::LevelFilter::Debug)
                    .target(env_logger::Target::Pipe(Box::new(log_file)))
                    .init();
            }
            Err(e) => {
                eprintln!("Warning: Failed to open voxnova.log for debug logging: {}", e);
                eprintln!("Continuing without file logging...");
                env_logger::Builder::new()
                    .filter_level(log::LevelFilter::Warn)
                    .init();
            }
        }

        info!(
            "VoxNova version {} starting (debug mode, logging to voxnova.log)",
            voxnova::VERSION
        );
    } else {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Error)
            .init();
    }

    if let Err(e) = run() {
        error!("Fatal error: {:#}", e);
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

/// Forward stdin lines to the UI thread; the channel closes on EOF
fn spawn_stdin_reader() -> anyhow::Result<Receiver<String>> {
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        debug!("stdin closed: {}", e);
                        break;
                    }
                }
            }
        })
        .context("failed to start stdin reader")?;
    Ok(rx)
}

fn run() -> anyhow::Result<()> {
    let settings = Settings::load();
    info!("Settings loaded from {:?}", Settings::default_path());

    let preference = settings.backend;
    let opener: EngineOpener = Arc::new(move || Engine::open(preference));

    let mut app = App::new(settings, opener, io::stdout());
    app.greet()?;
    app.rescan().context("initial voice scan failed")?;
    app.prompt()?;

    let lines = spawn_stdin_reader()?;

    loop {
        app.tick()?;

        match lines.recv_timeout(TICK) {
            Ok(line) => {
                match Command::parse(&line) {
                    Ok(command) => {
                        if app.handle(command)? == Flow::Quit {
                            break;
                        }
                    }
                    Err(e) => app.report(&e)?,
                }
                app.prompt()?;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                info!("stdin closed, shutting down");
                // Piped input: let the last job finish, but not forever
                let grace = app.settings().still_working_after * SHUTDOWN_GRACE_FACTOR;
                let waiting = Instant::now();
                while app.is_busy() {
                    if waiting.elapsed() >= grace {
                        warn!("Job still running after {:?}, abandoning it", grace);
                        app.abandon_job()?;
                        break;
                    }
                    app.tick()?;
                    thread::sleep(TICK);
                }
                app.shutdown()?;
                break;
            }
        }
    }

    info!("VoxNova exiting");
    Ok(())
}
