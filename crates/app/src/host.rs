//! Filesystem-backed collaborators for running a session headless.

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{unbounded, Sender};
use delve_core::{
    CategoryLoader, ContentCategory, DisplayCollaborator, DocumentResponder, FrameSource,
    FrameWaker, ItemResponder, LoadError, ManifestSource, Payload, SourceUnavailable,
    StaticManifest, TemplateLoader, WorldCollaborator,
};
use tracing::{debug, info, trace, warn};

/// Manifest JSON file. Each pipeline run reads it once in
/// [`ManifestSource::begin`], so edits show up on the next run or retry but
/// never halfway through one.
#[derive(Debug, Clone)]
pub struct ManifestFile {
    path: PathBuf,
    snapshot: Option<Result<StaticManifest, String>>,
}

impl ManifestFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            snapshot: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<StaticManifest, String> {
        let raw = std::fs::read_to_string(&self.path)
            .map_err(|err| format!("{}: {err}", self.path.display()))?;
        StaticManifest::from_json_str(&raw)
            .map_err(|err| format!("{}: {err}", self.path.display()))
    }
}

impl ManifestSource for ManifestFile {
    fn begin(&mut self) {
        self.snapshot = Some(self.read());
    }

    fn list(&self, category: ContentCategory) -> Result<Vec<String>, SourceUnavailable> {
        let fresh;
        let manifest = match &self.snapshot {
            Some(snapshot) => snapshot,
            None => {
                fresh = self.read();
                &fresh
            }
        };
        match manifest {
            Ok(manifest) => manifest.list(category),
            Err(reason) => Err(SourceUnavailable::new(category, reason.clone())),
        }
    }
}

/// Reads item bytes from under `root` on a worker thread. Decoding is left to
/// whoever consumes the payload.
#[derive(Debug, Clone)]
pub struct FileLoader {
    root: PathBuf,
}

impl FileLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl CategoryLoader for FileLoader {
    fn request(&mut self, path: &str, responder: ItemResponder) {
        let file = self.root.join(path);
        let path = path.to_string();
        thread::spawn(move || match std::fs::read(&file) {
            Ok(bytes) => {
                debug!(%path, len = bytes.len(), "read content file");
                responder.resolve(Payload::new(bytes));
            }
            Err(err) => responder.reject(LoadError::from_io(path, &err)),
        });
    }
}

/// Reads and parses the template document on a worker thread.
#[derive(Debug, Clone)]
pub struct JsonTemplateLoader {
    root: PathBuf,
}

impl JsonTemplateLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl TemplateLoader for JsonTemplateLoader {
    fn request(&mut self, path: &str, responder: DocumentResponder) {
        let file = self.root.join(path);
        let path = path.to_string();
        thread::spawn(move || {
            let result = std::fs::read(&file)
                .map_err(|err| LoadError::from_io(path.as_str(), &err))
                .and_then(|bytes| {
                    serde_json::from_slice(&bytes).map_err(|err| LoadError::Decode {
                        path: path.clone(),
                        reason: err.to_string(),
                    })
                });
            responder.complete(result);
        });
    }
}

/// Frame source paced by a timer thread. Each scheduled waker is woken one
/// interval after it was handed over.
#[derive(Debug)]
pub struct TimerFrameSource {
    wakers: Sender<FrameWaker>,
}

impl TimerFrameSource {
    pub fn new(interval: Duration) -> Self {
        let (wakers, pending) = unbounded::<FrameWaker>();
        thread::spawn(move || {
            for waker in pending {
                if !interval.is_zero() {
                    thread::sleep(interval);
                }
                waker.wake();
            }
        });
        Self { wakers }
    }
}

impl FrameSource for TimerFrameSource {
    fn schedule_next(&mut self, waker: FrameWaker) {
        if self.wakers.send(waker).is_err() {
            warn!("frame timer thread is gone, frame dropped");
        }
    }
}

/// World stand-in that tracks simulated time.
#[derive(Debug, Default)]
pub struct LogWorld {
    updates: u64,
    elapsed: f64,
}

impl LogWorld {
    pub fn updates(&self) -> u64 {
        self.updates
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }
}

impl WorldCollaborator for LogWorld {
    fn update(&mut self, elapsed: f64, delta: f64) {
        self.updates += 1;
        self.elapsed = elapsed;
        trace!(elapsed, delta, "world update");
    }
}

/// Display stand-in that counts frames and logs every `report_every` draws.
#[derive(Debug)]
pub struct LogDisplay {
    frames: u64,
    report_every: u64,
}

impl LogDisplay {
    pub fn new(report_every: u64) -> Self {
        Self {
            frames: 0,
            report_every: report_every.max(1),
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl DisplayCollaborator for LogDisplay {
    fn draw(&mut self) {
        self.frames += 1;
        if self.frames % self.report_every == 0 {
            info!(frames = self.frames, "drawn");
        }
    }

    fn refresh(&mut self) {
        debug!("viewport refreshed");
    }
}
