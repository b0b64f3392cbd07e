//! Media Codec Engine boundary.
//!
//! A [`MediaEngine`] receives a finished [`RenderPlan`] read-only and produces the encoded
//! artifact. [`ffmpeg::FfmpegEngine`] is the production adapter.

use std::path::{Path, PathBuf};

use crate::{compile::plan::RenderPlan, foundation::error::ScenecastResult};

pub(crate) mod ffmpeg;

/// Encoded output of one job.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct RenderedArtifact {
    /// Location of the encoded file.
    pub path: PathBuf,
    /// File size in bytes.
    pub size_bytes: u64,
}

/// Decodes, composites and encodes a plan into a video file.
pub trait MediaEngine: Send + Sync {
    /// Render `plan` to `out`.
    fn render(&self, plan: &RenderPlan, out: &Path) -> ScenecastResult<RenderedArtifact>;
}
