//! Service configuration: JSON file, then `SCENECAST_*` environment overrides.

use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::{
    engine::ffmpeg::FfmpegOpts,
    foundation::error::{ScenecastError, ScenecastResult},
    notify::RetryPolicy,
};

/// Everything a render service needs besides the scenes themselves.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Concurrent jobs.
    pub workers: usize,
    /// Where rendered files are written.
    pub output_dir: PathBuf,
    /// Scratch directory for downloads.
    pub work_dir: PathBuf,
    /// Base directory for relative local sources.
    pub asset_root: Option<PathBuf>,
    /// Per-download timeout.
    pub fetch_timeout_secs: u64,
    /// Webhook retry policy.
    pub retry: RetryPolicy,
    /// Encoder settings.
    pub ffmpeg: FfmpegOpts,
    /// Log output.
    pub logging: LoggingConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`info`, `scenecast=debug,warn`, ...). `RUST_LOG` wins when set.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            json: false,
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            output_dir: PathBuf::from("out"),
            work_dir: std::env::temp_dir().join("scenecast"),
            asset_root: None,
            fetch_timeout_secs: 120,
            retry: RetryPolicy::default(),
            ffmpeg: FfmpegOpts::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Load a JSON config file; missing fields take their defaults.
    pub fn from_path(path: &Path) -> ScenecastResult<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config '{}'", path.display()))?;
        serde_json::from_str(&text).map_err(|e| {
            ScenecastError::serde(format!("config '{}': {e}", path.display()))
        })
    }

    /// Apply `SCENECAST_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> ScenecastResult<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_env_from(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> ScenecastResult<()> {
        if let Some(v) = lookup("SCENECAST_WORKERS") {
            self.workers = v.trim().parse().map_err(|_| {
                ScenecastError::validation(format!("SCENECAST_WORKERS must be an integer, got '{v}'"))
            })?;
        }
        if let Some(v) = lookup("SCENECAST_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("SCENECAST_WORK_DIR") {
            self.work_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("SCENECAST_LOG") {
            self.logging.level = v;
        }
        if let Some(v) = lookup("SCENECAST_FFMPEG") {
            self.ffmpeg.program = PathBuf::from(v);
        }
        Ok(())
    }

    /// Reject configurations the service cannot run with.
    pub fn validate(&self) -> ScenecastResult<()> {
        if self.workers == 0 {
            return Err(ScenecastError::validation("workers must be >= 1"));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(ScenecastError::validation("fetch_timeout_secs must be > 0"));
        }
        self.retry.validate()?;
        self.ffmpeg.validate()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/config/service.rs"]
mod tests;
