use std::path::Path;
use std::sync::Arc;

use crate::{
    animation::scale::ScaleTransform,
    assets::fetch::FetchedAsset,
    foundation::core::{Canvas, Fps, Geometry, TimeSpan},
    layout::solver::MediaLayout,
    scene::model::Fit,
    timeline::resolve::LoopPlan,
};

/// Fully resolved, ordered input for a [`MediaEngine`](crate::MediaEngine).
///
/// Produced by the compiler and only read afterwards. Holding the plan keeps every fetched
/// source alive; dropping it releases temporary downloads.
#[derive(Clone, Debug, serde::Serialize)]
pub struct RenderPlan {
    /// Output canvas.
    pub canvas: Canvas,
    /// Output frame rate.
    pub fps: Fps,
    /// Output length in seconds; always the scene duration.
    pub duration: f64,
    /// Visual clips in painter's order (first drawn first).
    pub clips: Vec<ClipDescriptor>,
    /// Audio entries, summed by the engine.
    pub audio: AudioMixPlan,
}

impl RenderPlan {
    /// Output window `[0, duration)`.
    pub fn window(&self) -> TimeSpan {
        TimeSpan::new(0.0, self.duration)
    }

    /// Look up a clip by element id.
    pub fn clip(&self, id: &str) -> Option<&ClipDescriptor> {
        self.clips.iter().find(|c| c.id == id)
    }

    /// `true` when there is nothing to draw; audio alone does not make a video.
    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }
}

/// Reference to a fetched source.
///
/// Cloning shares the underlying handle; the file lives as long as any clone.
#[derive(Clone, Debug, serde::Serialize)]
pub struct SourceRef {
    /// URI as written in the scene.
    pub uri: String,
    #[serde(rename = "path", serialize_with = "serialize_asset_path")]
    asset: Arc<FetchedAsset>,
}

fn serialize_asset_path<S: serde::Serializer>(
    asset: &Arc<FetchedAsset>,
    s: S,
) -> Result<S::Ok, S::Error> {
    s.collect_str(&asset.path().display())
}

impl SourceRef {
    /// Wrap a fetched asset.
    pub fn new(uri: impl Into<String>, asset: FetchedAsset) -> Self {
        Self {
            uri: uri.into(),
            asset: Arc::new(asset),
        }
    }

    /// Local path of the fetched source.
    pub fn path(&self) -> &Path {
        self.asset.path()
    }
}

/// Font a text clip is drawn with.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FontRef {
    /// Engine default font.
    Default,
    /// Family name resolved by the engine.
    Family(String),
    /// Font file URI; fetched again by the engine at render time.
    File(String),
}

/// What a clip draws.
#[derive(Clone, Debug, serde::Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClipSource {
    /// Still image or frame sequence.
    Image {
        /// Fetched source.
        source: SourceRef,
        /// Fit mode used for `layout`.
        fit: Fit,
        /// Scale/crop applied before placement.
        layout: MediaLayout,
        /// `true` for multi-frame sources (animated GIF).
        animated: bool,
    },
    /// Video stream.
    Video {
        /// Fetched source.
        source: SourceRef,
        /// Fit mode used for `layout`.
        fit: Fit,
        /// Scale/crop applied before placement.
        layout: MediaLayout,
    },
    /// Text run.
    Text {
        /// UTF-8 text.
        text: String,
        /// Font to draw with.
        font: FontRef,
        /// Font size in pixels.
        font_size_px: f32,
        /// Fill color as given in the scene.
        fill_color: String,
    },
}

impl ClipSource {
    /// Scene type tag of the clip.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Image { .. } => "image",
            Self::Video { .. } => "video",
            Self::Text { .. } => "text",
        }
    }
}

/// One fully resolved visual clip.
#[derive(Clone, Debug, serde::Serialize)]
pub struct ClipDescriptor {
    /// Element id.
    pub id: String,
    /// Stacking order.
    pub track: i64,
    /// Seconds from the start of the output.
    pub start_time: f64,
    /// Visible length in seconds.
    pub duration: f64,
    /// Playback rate of the source.
    pub speed: f64,
    /// Present when the source loops to fill the clip.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub looping: Option<LoopPlan>,
    /// Absolute on-canvas box.
    pub geometry: Geometry,
    /// Clip-local time → scale factor.
    pub transform: ScaleTransform,
    /// Media to draw.
    pub source: ClipSource,
}

impl ClipDescriptor {
    /// Output window covered by the clip.
    pub fn span(&self) -> TimeSpan {
        TimeSpan::new(self.start_time, self.start_time + self.duration)
    }

    /// Scale factor at output time `t`, or `None` when the clip is not visible.
    pub fn scale_at(&self, t: f64) -> Option<f64> {
        self.span()
            .contains(t)
            .then(|| self.transform.sample(t - self.start_time))
    }
}

/// Where an audio entry comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioOrigin {
    /// An `audio` element.
    Element,
    /// The soundtrack of a `video` element.
    VideoTrack,
}

/// One source in the audio mix.
#[derive(Clone, Debug, serde::Serialize)]
pub struct AudioMixEntry {
    /// Element id.
    pub id: String,
    /// Where the audio comes from.
    pub origin: AudioOrigin,
    /// Seconds from the start of the output.
    pub start_time: f64,
    /// Audible length in seconds.
    pub duration: f64,
    /// Linear gain (`1.0` = unity).
    pub volume_gain: f64,
    /// Playback rate.
    pub speed: f64,
    /// Hard trim of the source to `[0, trim]` seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trim: Option<f64>,
    /// Present when the source loops to fill the entry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub looping: Option<LoopPlan>,
    /// Fetched source.
    pub source: SourceRef,
}

/// Unordered set of audio entries; summed, never stacked.
#[derive(Clone, Debug, Default, serde::Serialize)]
pub struct AudioMixPlan {
    /// Entries in input order.
    pub entries: Vec<AudioMixEntry>,
}

#[cfg(test)]
#[path = "../../tests/unit/compile/plan.rs"]
mod tests;
