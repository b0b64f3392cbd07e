//! In-memory collaborators shared by unit tests.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::{
    assets::fetch::{AssetFetcher, FetchedAsset},
    assets::probe::{MediaInfo, MediaKind, MediaProbe},
    assets::text::{FontSource, TextMeasurer},
    compile::plan::RenderPlan,
    engine::{MediaEngine, RenderedArtifact},
    foundation::core::Size,
    foundation::error::{ScenecastError, ScenecastResult},
    notify::{JobNotification, NotificationSender},
};

static SCRATCH_SEQ: AtomicUsize = AtomicUsize::new(0);

/// Fresh directory under the system temp dir.
pub fn scratch_dir(tag: &str) -> PathBuf {
    let n = SCRATCH_SEQ.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir().join(format!(
        "scenecast-test-{}-{tag}-{n}",
        std::process::id()
    ));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Shell script standing in for `curl`: writes the requested URI into the `--output` file.
#[cfg(unix)]
pub fn fake_curl(dir: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt as _;

    let script = dir.join("fake-curl.sh");
    std::fs::write(
        &script,
        "#!/bin/sh\nout=\"\"\nuri=\"\"\nwhile [ $# -gt 0 ]; do\n  case \"$1\" in\n    --output) out=\"$2\"; shift ;;\n    --max-time) shift ;;\n    -*) ;;\n    *) uri=\"$1\" ;;\n  esac\n  shift\ndone\nprintf '%s' \"$uri\" > \"$out\"\n",
    )
    .unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
    script
}

/// Writes one temporary file per fetch, containing the URI.
pub struct StubFetcher {
    dir: PathBuf,
    failing: HashSet<String>,
    fetched: Mutex<Vec<String>>,
    seq: AtomicUsize,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self {
            dir: scratch_dir("fetch"),
            failing: HashSet::new(),
            fetched: Mutex::new(Vec::new()),
            seq: AtomicUsize::new(0),
        }
    }

    pub fn failing(mut self, uri: &str) -> Self {
        self.failing.insert(uri.to_owned());
        self
    }

    /// URIs fetched so far, in order.
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }

    /// Files currently present in the scratch directory.
    pub fn live_files(&self) -> usize {
        std::fs::read_dir(&self.dir).map(|d| d.count()).unwrap_or(0)
    }
}

impl AssetFetcher for StubFetcher {
    fn fetch(&self, uri: &str) -> ScenecastResult<FetchedAsset> {
        self.fetched.lock().unwrap().push(uri.to_owned());
        if self.failing.contains(uri) {
            return Err(ScenecastError::fetch(format!("stub refused '{uri}'")));
        }
        let n = self.seq.fetch_add(1, Ordering::Relaxed);
        let path = self.dir.join(format!("asset-{n}"));
        std::fs::write(&path, uri).unwrap();
        Ok(FetchedAsset::temporary(path))
    }
}

/// Answers probes from a per-URI table, recovering the URI from the stub file contents.
pub struct StubProbe {
    overrides: HashMap<String, MediaInfo>,
}

impl StubProbe {
    pub fn new() -> Self {
        Self {
            overrides: HashMap::new(),
        }
    }

    pub fn with(mut self, uri: &str, info: MediaInfo) -> Self {
        self.overrides.insert(uri.to_owned(), info);
        self
    }
}

impl MediaProbe for StubProbe {
    fn probe(&self, path: &Path, kind: MediaKind) -> ScenecastResult<MediaInfo> {
        let uri = std::fs::read_to_string(path)
            .map_err(|e| ScenecastError::fetch(format!("stub probe: {e}")))?;
        if uri.contains("corrupt") {
            return Err(ScenecastError::fetch("stub probe: unreadable media"));
        }
        if let Some(info) = self.overrides.get(&uri) {
            return Ok(*info);
        }
        Ok(match kind {
            MediaKind::Image => MediaInfo {
                width: 1920,
                height: 1080,
                duration: None,
                has_audio: false,
            },
            MediaKind::Video => MediaInfo {
                width: 1920,
                height: 1080,
                duration: Some(10.0),
                has_audio: true,
            },
            MediaKind::Audio => MediaInfo {
                width: 0,
                height: 0,
                duration: Some(30.0),
                has_audio: true,
            },
        })
    }
}

/// 10 px per character of the widest line, 20 px per line.
pub struct FixedMeasurer;

impl TextMeasurer for FixedMeasurer {
    fn measure(&self, text: &str, _font: FontSource<'_>, _size_px: f32) -> ScenecastResult<Size> {
        let lines: Vec<&str> = text.lines().collect();
        let widest = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
        Ok(Size::new(
            (widest * 10) as f64,
            (lines.len().max(1) * 20) as f64,
        ))
    }
}

/// Writes a small file per render and records which plans it saw.
pub struct RecordingEngine {
    fail: bool,
    rendered: Mutex<Vec<(Vec<String>, bool)>>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self {
            fail: false,
            rendered: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            rendered: Mutex::new(Vec::new()),
        }
    }

    /// Clip ids of every rendered plan, with whether all sources existed at render time.
    pub fn rendered(&self) -> Vec<(Vec<String>, bool)> {
        self.rendered.lock().unwrap().clone()
    }
}

impl MediaEngine for RecordingEngine {
    fn render(&self, plan: &RenderPlan, out: &Path) -> ScenecastResult<RenderedArtifact> {
        let ids = plan.clips.iter().map(|c| c.id.clone()).collect();
        let sources_live = plan.clips.iter().all(|c| match &c.source {
            crate::compile::plan::ClipSource::Image { source, .. }
            | crate::compile::plan::ClipSource::Video { source, .. } => source.path().exists(),
            crate::compile::plan::ClipSource::Text { .. } => true,
        }) && plan.audio.entries.iter().all(|a| a.source.path().exists());
        self.rendered.lock().unwrap().push((ids, sources_live));
        if self.fail {
            return Err(ScenecastError::render("stub engine failure"));
        }
        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(out, b"fake-mp4").unwrap();
        Ok(RenderedArtifact {
            path: out.to_path_buf(),
            size_bytes: 8,
        })
    }
}

/// Fails the first `n` attempts, then accepts.
pub struct RecordingNotifier {
    fail_first: usize,
    attempts: AtomicUsize,
    delivered: Mutex<Vec<JobNotification>>,
}

impl RecordingNotifier {
    pub fn failing_first(n: usize) -> Self {
        Self {
            fail_first: n,
            attempts: AtomicUsize::new(0),
            delivered: Mutex::new(Vec::new()),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn delivered(&self) -> Vec<JobNotification> {
        self.delivered.lock().unwrap().clone()
    }
}

impl NotificationSender for RecordingNotifier {
    fn send(&self, notification: &JobNotification) -> ScenecastResult<()> {
        let n = self.attempts.fetch_add(1, Ordering::SeqCst);
        if n < self.fail_first {
            return Err(ScenecastError::delivery(format!("stub receiver rejected attempt {}", n + 1)));
        }
        self.delivered.lock().unwrap().push(notification.clone());
        Ok(())
    }
}
