use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;

use crate::{
    assets::fetch::{AssetFetcher, CurlFetcher, DefaultFetcher, LocalFetcher},
    assets::probe::{FfprobeProbe, MediaProbe},
    assets::text::{ParleyMeasurer, TextMeasurer},
    compile::compiler::Compiler,
    config::ServiceConfig,
    engine::ffmpeg::FfmpegEngine,
    engine::{MediaEngine, RenderedArtifact},
    foundation::cancel::CancelToken,
    foundation::diagnostics::{Diagnostic, Diagnostics},
    foundation::error::{ScenecastError, ScenecastResult},
    notify::webhook::CurlWebhookSender,
    notify::{JobNotification, JobOutcome, NotificationSender, RetryPolicy, deliver_with_retry},
    scene::parse::parse_scene,
};

/// One submitted video job.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct JobRequest {
    /// Caller-chosen job id; also names the output file.
    pub id: String,
    /// Scene document.
    pub scene: serde_json::Value,
    /// Endpoint notified when the job ends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
}

impl JobRequest {
    /// One request per scene file, named after the file stem.
    ///
    /// A stem already taken (after output-name sanitizing) gets a `-{index}` suffix, so
    /// `a/x.json` and `b/x.json` never write the same output file.
    pub fn from_scene_files(
        paths: &[PathBuf],
        webhook_url: Option<&str>,
    ) -> ScenecastResult<Vec<Self>> {
        let mut taken = HashSet::new();
        let mut requests = Vec::with_capacity(paths.len());
        for (i, path) in paths.iter().enumerate() {
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| format!("job-{i}"));
            let mut id = stem.clone();
            let mut n = i;
            while !taken.insert(output_stem(&id)) {
                id = format!("{stem}-{n}");
                n += 1;
            }
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read scene '{}'", path.display()))?;
            let scene = serde_json::from_str(&text).map_err(|e| {
                ScenecastError::serde(format!("scene '{}': {e}", path.display()))
            })?;
            requests.push(Self {
                id,
                scene,
                webhook_url: webhook_url.map(str::to_owned),
            });
        }
        Ok(requests)
    }
}

/// What happened to the job's notification.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// No webhook was requested.
    Skipped,
    /// Delivered after `attempts` tries.
    Delivered {
        /// Attempts made, including the successful one.
        attempts: u32,
    },
    /// Every attempt failed.
    Failed {
        /// Final delivery error.
        error: String,
    },
}

/// Final record of one job.
#[derive(Clone, Debug, serde::Serialize)]
pub struct JobReport {
    /// Job id.
    pub id: String,
    /// Render result.
    pub outcome: JobOutcome,
    /// Recovered element-level problems.
    pub diagnostics: Vec<Diagnostic>,
    /// Notification result.
    pub delivery: DeliveryStatus,
}

impl JobReport {
    /// `true` when the artifact was rendered and, if requested, the caller was told.
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, JobOutcome::Succeeded { .. })
            && !matches!(self.delivery, DeliveryStatus::Failed { .. })
    }
}

/// External collaborators a runner drives.
#[derive(Clone)]
pub struct Collaborators {
    /// Source acquisition.
    pub fetcher: Arc<dyn AssetFetcher>,
    /// Native size/duration lookup.
    pub probe: Arc<dyn MediaProbe>,
    /// Glyph measurement.
    pub measurer: Arc<dyn TextMeasurer>,
    /// Media Codec Engine.
    pub engine: Arc<dyn MediaEngine>,
    /// Notification Sender.
    pub notifier: Arc<dyn NotificationSender>,
}

/// Runs jobs end to end: parse, compile, render, notify.
#[derive(Clone)]
pub struct JobRunner {
    parts: Collaborators,
    output_dir: PathBuf,
    retry: RetryPolicy,
}

impl JobRunner {
    /// Runner over explicit collaborators.
    pub fn new(parts: Collaborators, output_dir: impl Into<PathBuf>, retry: RetryPolicy) -> Self {
        Self {
            parts,
            output_dir: output_dir.into(),
            retry,
        }
    }

    /// Production runner: curl downloads, ffprobe, parley, ffmpeg and curl webhooks.
    pub fn from_config(cfg: &ServiceConfig) -> ScenecastResult<Self> {
        cfg.validate()?;
        let local = match &cfg.asset_root {
            Some(root) => LocalFetcher::with_root(root),
            None => LocalFetcher::new(),
        };
        let remote = CurlFetcher::new(&cfg.work_dir).with_timeout_secs(cfg.fetch_timeout_secs);
        let fetcher: Arc<dyn AssetFetcher> = Arc::new(DefaultFetcher::new(local, remote));
        let ffprobe = cfg.ffmpeg.program.with_file_name(ffprobe_name(&cfg.ffmpeg.program));
        let parts = Collaborators {
            fetcher: fetcher.clone(),
            probe: Arc::new(FfprobeProbe::new(ffprobe)),
            measurer: Arc::new(ParleyMeasurer),
            engine: Arc::new(FfmpegEngine::new(cfg.ffmpeg.clone(), fetcher)),
            notifier: Arc::new(CurlWebhookSender::new()),
        };
        Ok(Self::new(parts, &cfg.output_dir, cfg.retry.clone()))
    }

    /// Output file for job `id`.
    pub fn output_path(&self, id: &str) -> PathBuf {
        self.output_dir.join(format!("{}.mp4", output_stem(id)))
    }

    /// Run one job. Never fails: every outcome lands in the report, and a requested webhook
    /// receives exactly one notification.
    #[tracing::instrument(skip_all, fields(job = %request.id))]
    pub fn run(&self, request: &JobRequest, cancel: &CancelToken) -> JobReport {
        let mut diagnostics = Diagnostics::new();
        let outcome = match self.render(request, &mut diagnostics, cancel) {
            Ok(artifact) => {
                tracing::info!(path = %artifact.path.display(), "job rendered");
                JobOutcome::Succeeded { artifact }
            }
            Err(e) => {
                tracing::warn!(error = %e, "job failed");
                JobOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };

        let delivery = match &request.webhook_url {
            None => DeliveryStatus::Skipped,
            Some(url) => {
                let notification = JobNotification {
                    job_id: request.id.clone(),
                    endpoint: url.clone(),
                    outcome: outcome.clone(),
                };
                match deliver_with_retry(self.parts.notifier.as_ref(), &notification, &self.retry) {
                    Ok(attempts) => DeliveryStatus::Delivered { attempts },
                    Err(e) => {
                        tracing::error!(error = %e, "job notification lost");
                        DeliveryStatus::Failed {
                            error: e.to_string(),
                        }
                    }
                }
            }
        };

        JobReport {
            id: request.id.clone(),
            outcome,
            diagnostics: diagnostics.into_items(),
            delivery,
        }
    }

    fn render(
        &self,
        request: &JobRequest,
        diagnostics: &mut Diagnostics,
        cancel: &CancelToken,
    ) -> ScenecastResult<RenderedArtifact> {
        cancel.check()?;
        let scene = parse_scene(&request.scene, diagnostics)?;
        let plan = Compiler::new(
            self.parts.fetcher.as_ref(),
            self.parts.probe.as_ref(),
            self.parts.measurer.as_ref(),
        )
        .compile(&scene, diagnostics, cancel)?;
        cancel.check()?;
        // The plan (and every downloaded source it holds) is dropped once the engine returns.
        self.parts.engine.render(&plan, &self.output_path(&request.id))
    }
}

fn output_stem(id: &str) -> String {
    let stem: String = id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if stem.is_empty() { "job".to_owned() } else { stem }
}

fn ffprobe_name(ffmpeg: &Path) -> String {
    let name = ffmpeg
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match name.strip_prefix("ffmpeg") {
        Some(rest) => format!("ffprobe{rest}"),
        None => "ffprobe".to_owned(),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/job/runner.rs"]
mod tests;
