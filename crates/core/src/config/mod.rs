use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::Result;

/// Top-level configuration for a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub content: ContentConfig,
    pub frames: FrameConfig,
    pub loading: LoadingConfig,
}

impl RuntimeConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a JSON config file. Missing fields keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Pacing interval for the target frame rate. A zero rate means "as fast
    /// as possible".
    pub fn frame_interval(&self) -> Duration {
        match self.frames.target_fps {
            0 => Duration::ZERO,
            fps => Duration::from_secs_f64(1.0 / f64::from(fps)),
        }
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.content.root.join(&self.content.manifest)
    }
}

/// Where content lives on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    pub root: PathBuf,
    /// Manifest file, relative to `root`.
    pub manifest: PathBuf,
    /// Template document path handed to the template loader.
    pub template: String,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("static/contents"),
            manifest: PathBuf::from("manifest.json"),
            template: "world/gamedata.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    pub target_fps: u32,
    /// Finalize after this many ticks; run until stopped when absent.
    pub max_frames: Option<u64>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            target_fps: 60,
            max_frames: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadingConfig {
    /// How long a host waits for a stuck pipeline before giving up.
    pub timeout_ms: u64,
}

impl Default for LoadingConfig {
    fn default() -> Self {
        Self { timeout_ms: 10_000 }
    }
}

impl LoadingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
