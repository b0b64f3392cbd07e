//! Scenecast resolves declarative JSON video scenes into render plans and encodes them.
//!
//! The pipeline is:
//!
//! - [`parse_scene`] validates a scene document into a typed [`Scene`], dropping malformed
//!   elements with a [`Diagnostic`] instead of failing the job
//! - [`Compiler`] resolves units, timing and animations for every element and assembles an
//!   ordered [`RenderPlan`]
//! - a [`MediaEngine`] (by default [`FfmpegEngine`]) turns the plan into a video file
//! - [`JobRunner`] drives the whole job and notifies the caller exactly once
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

pub(crate) mod animation;
pub(crate) mod assets;
pub(crate) mod compile;
/// Service configuration.
pub mod config;
pub(crate) mod engine;
pub(crate) mod job;
pub(crate) mod layout;
/// Tracing setup.
pub mod logging;
pub(crate) mod notify;
pub(crate) mod scene;
pub(crate) mod timeline;
pub(crate) mod units;

#[cfg(test)]
#[path = "../tests/unit/support.rs"]
mod test_support;

pub use crate::foundation::cancel::CancelToken;
pub use crate::foundation::core::{Canvas, Fps, Geometry, Rect, Size, TimeSpan};
pub use crate::foundation::diagnostics::{
    Diagnostic, DiagnosticKind, DiagnosticSink, Diagnostics, PathElem, TracingSink, format_path,
};
pub use crate::foundation::error::{ScenecastError, ScenecastResult};

pub use crate::animation::ease::Ease;
pub use crate::animation::scale::{ScaleAnimation, ScaleTransform};
pub use crate::assets::fetch::{
    AssetFetcher, CurlFetcher, DefaultFetcher, FetchedAsset, LocalFetcher,
};
pub use crate::assets::probe::{FfprobeProbe, MediaInfo, MediaKind, MediaProbe};
pub use crate::assets::text::{FontSource, ParleyMeasurer, TextMeasurer};
pub use crate::compile::compiler::Compiler;
pub use crate::compile::plan::{
    AudioMixEntry, AudioMixPlan, AudioOrigin, ClipDescriptor, ClipSource, FontRef, RenderPlan,
    SourceRef,
};
pub use crate::config::{LoggingConfig, ServiceConfig};
pub use crate::engine::ffmpeg::{
    FfmpegEngine, FfmpegInvocation, FfmpegOpts, build_invocation, is_ffmpeg_available,
};
pub use crate::engine::{MediaEngine, RenderedArtifact};
pub use crate::job::pool::{JobHandle, WorkerPool};
pub use crate::job::runner::{Collaborators, DeliveryStatus, JobReport, JobRequest, JobRunner};
pub use crate::layout::solver::{Crop, MediaLayout, ScaledSize};
pub use crate::notify::webhook::CurlWebhookSender;
pub use crate::notify::{
    JobNotification, JobOutcome, NotificationSender, RetryPolicy, deliver_with_retry,
};
pub use crate::scene::model::{
    AnimationDef, AudioElement, CompositionElement, Element, ElementCommon, Fit, ImageElement,
    Scene, TextElement, VideoElement, VisualProps,
};
pub use crate::scene::parse::{parse_scene, parse_scene_str};
pub use crate::timeline::resolve::{ClipTiming, LoopPlan, effective_duration, source_time};
pub use crate::units::resolve::{
    SizeExpr, Unit, parse_percentage, parse_unit, resolve_length, resolve_percent, resolve_vmin,
};
