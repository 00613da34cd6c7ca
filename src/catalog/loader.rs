//! Catalog loading off the UI thread
//!
//! Opening an engine can take seconds, or hang on a misconfigured system.
//! The work runs on its own thread and the caller waits a bounded time; a
//! loader that overruns is abandoned, not killed.

use super::Catalog;
use crate::speech::Engine;
use crate::{Result, VoxError};
use log::{info, warn};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

/// Outcome of a catalog load
#[derive(Debug)]
pub struct CatalogLoad {
    /// The opened engine; present even when it reported no voices, since it
    /// can still speak with its default voice
    pub engine: Option<Engine>,

    /// The catalog, or why there is none
    pub result: Result<Catalog>,
}

impl CatalogLoad {
    fn unavailable(reason: String) -> Self {
        Self {
            engine: None,
            result: Err(VoxError::BackendUnavailable(reason)),
        }
    }

    /// The loaded catalog, or an empty one on failure
    pub fn catalog_or_empty(&self) -> Catalog {
        self.result.as_ref().cloned().unwrap_or_default()
    }
}

/// Open an engine with `open` and enumerate its voices in the background
///
/// Waits at most `timeout`. Never fails outright: every problem is
/// reported as `BackendUnavailable` inside the returned [`CatalogLoad`].
pub fn load_catalog<F>(open: F, timeout: Duration) -> CatalogLoad
where
    F: FnOnce() -> Result<Engine> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();

    let spawned = thread::Builder::new()
        .name("catalog-loader".to_string())
        .spawn(move || {
            let load = match open() {
                Ok(engine) => {
                    let result = Catalog::load(&engine);
                    CatalogLoad {
                        engine: Some(engine),
                        result,
                    }
                }
                Err(e) => CatalogLoad::unavailable(e.to_string()),
            };
            let _ = tx.send(load);
        });

    if let Err(e) = spawned {
        return CatalogLoad::unavailable(format!("could not start loader thread: {}", e));
    }

    match rx.recv_timeout(timeout) {
        Ok(load) => {
            match load.result {
                Ok(ref catalog) => info!("Catalog loaded with {} voices", catalog.len()),
                Err(ref e) => warn!("Catalog unavailable: {}", e),
            }
            load
        }
        Err(RecvTimeoutError::Timeout) => {
            warn!("Speech engine did not answer within {:?}", timeout);
            CatalogLoad::unavailable(format!(
                "speech engine did not respond within {} seconds",
                timeout.as_secs_f32()
            ))
        }
        Err(RecvTimeoutError::Disconnected) => {
            CatalogLoad::unavailable("catalog loader exited unexpectedly".to_string())
        }
    }
}
