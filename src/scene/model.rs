use serde::{Deserialize, Serialize};

use crate::{
    foundation::core::{Canvas, Fps},
    foundation::diagnostics::{PathElem, format_path},
    units::resolve::SizeExpr,
};

// ---------------------------------------------------------------------------------------------
// JSON boundary definitions. Field names follow the scene document.
// ---------------------------------------------------------------------------------------------

/// Scene header; elements are kept raw so each one can fail independently.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SceneDef {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) duration: f64,
    #[serde(default)]
    pub(crate) fps: Option<u32>,
    #[serde(default)]
    pub(crate) elements: Vec<serde_json::Value>,
}

/// Fields shared by every element type.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct CommonDef {
    #[serde(default)]
    pub(crate) track: i64,
    #[serde(default)]
    pub(crate) time: f64,
    #[serde(default)]
    pub(crate) duration: Option<f64>,
    #[serde(default)]
    pub(crate) animations: Vec<AnimationDef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct VisualDef {
    #[serde(default)]
    pub(crate) x: Option<SizeExpr>,
    #[serde(default)]
    pub(crate) y: Option<SizeExpr>,
    #[serde(default)]
    pub(crate) width: Option<SizeExpr>,
    #[serde(default)]
    pub(crate) height: Option<SizeExpr>,
    #[serde(default)]
    pub(crate) x_anchor: Option<SizeExpr>,
    #[serde(default)]
    pub(crate) y_anchor: Option<SizeExpr>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct MediaDef {
    #[serde(flatten)]
    pub(crate) common: CommonDef,
    #[serde(flatten)]
    pub(crate) visual: VisualDef,
    #[serde(default)]
    pub(crate) source: Option<String>,
    #[serde(default)]
    pub(crate) fit: Option<String>,
    #[serde(default)]
    pub(crate) repeat: bool,
    #[serde(default)]
    pub(crate) speed: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TextDef {
    #[serde(flatten)]
    pub(crate) common: CommonDef,
    #[serde(flatten)]
    pub(crate) visual: VisualDef,
    #[serde(default)]
    pub(crate) text: Option<String>,
    #[serde(default)]
    pub(crate) font_family: Option<String>,
    #[serde(default)]
    pub(crate) font_size: Option<SizeExpr>,
    #[serde(default)]
    pub(crate) fill_color: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AudioDef {
    #[serde(flatten)]
    pub(crate) common: CommonDef,
    #[serde(default)]
    pub(crate) source: Option<String>,
    #[serde(default)]
    pub(crate) volume: Option<SizeExpr>,
    #[serde(default)]
    pub(crate) repeat: bool,
    #[serde(default)]
    pub(crate) speed: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CompositionDef {
    #[serde(flatten)]
    pub(crate) common: CommonDef,
    #[serde(default)]
    pub(crate) elements: Vec<serde_json::Value>,
}

/// Raw animation entry. Validation happens when the scale transform is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationDef {
    /// Animation type; only `"scale"` is understood.
    #[serde(rename = "type")]
    pub kind: String,
    /// Window start in clip-local seconds.
    #[serde(default)]
    pub time: f64,
    /// Window length; absent spans the rest of the clip.
    #[serde(default)]
    pub duration: Option<f64>,
    /// Starting scale as a percentage string.
    #[serde(default = "identity_scale")]
    pub start_scale: String,
    /// Final scale as a percentage string.
    #[serde(default = "identity_scale")]
    pub end_scale: String,
    /// Easing name.
    #[serde(default)]
    pub easing: Option<String>,
}

fn identity_scale() -> String {
    "100%".to_owned()
}

// ---------------------------------------------------------------------------------------------
// Typed scene.
// ---------------------------------------------------------------------------------------------

/// A validated scene: one video job.
#[derive(Debug, Clone)]
pub struct Scene {
    /// Output canvas.
    pub canvas: Canvas,
    /// Total render duration in seconds (> 0).
    pub duration: f64,
    /// Output frame rate.
    pub fps: Fps,
    /// Surviving elements in input order; compositions still nest their children.
    pub elements: Vec<Element>,
}

impl Scene {
    /// Leaf elements in input order, with compositions replaced by their children.
    pub fn flattened(&self) -> Vec<&Element> {
        let mut out = Vec::with_capacity(self.elements.len());
        for el in &self.elements {
            match el {
                Element::Composition(c) => out.extend(c.elements.iter()),
                other => out.push(other),
            }
        }
        out
    }
}

/// Fields every element carries.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementCommon {
    /// Unique element id.
    pub id: String,
    /// Stacking/processing order; higher draws on top.
    pub track: i64,
    /// Start offset in seconds (>= 0).
    pub time: f64,
    /// Explicit duration; `None` fills the rest of the scene.
    pub duration: Option<f64>,
    /// Raw animation entries.
    pub animations: Vec<AnimationDef>,
    /// Where the element sits in the input document.
    pub origin: Vec<PathElem>,
}

impl ElementCommon {
    /// Origin formatted as `$.elements[3]`.
    pub fn origin_path(&self) -> String {
        format_path(&self.origin)
    }
}

/// Position and size inputs of a visual element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisualProps {
    /// Horizontal position.
    pub x: Option<SizeExpr>,
    /// Vertical position.
    pub y: Option<SizeExpr>,
    /// Target width.
    pub width: Option<SizeExpr>,
    /// Target height.
    pub height: Option<SizeExpr>,
    /// Horizontal anchor inside the element's own box (text only).
    pub x_anchor: Option<SizeExpr>,
    /// Vertical anchor inside the element's own box (text only).
    pub y_anchor: Option<SizeExpr>,
}

impl VisualProps {
    /// `true` when none of `x`, `y`, `width`, `height` was given.
    pub fn is_unplaced(&self) -> bool {
        self.x.is_none() && self.y.is_none() && self.width.is_none() && self.height.is_none()
    }
}

/// Policy for reconciling native aspect ratio with a requested box.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fit {
    /// Uniform scale to cover, overflow cropped symmetrically.
    #[default]
    Cover,
    /// Uniform scale to fit inside, no crop.
    Contain,
    /// Independent per-axis scale.
    Fill,
}

impl Fit {
    /// Parse a fit name; `None` for unknown values.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "cover" => Some(Self::Cover),
            "contain" => Some(Self::Contain),
            "fill" => Some(Self::Fill),
            _ => None,
        }
    }
}

/// Raster image (still or frame sequence).
#[derive(Debug, Clone, PartialEq)]
pub struct ImageElement {
    /// Shared fields.
    pub common: ElementCommon,
    /// Placement inputs.
    pub visual: VisualProps,
    /// Source URI.
    pub source: String,
    /// Fit mode.
    pub fit: Fit,
    /// Loop a frame sequence to fill the clip.
    pub repeat: bool,
    /// Raw playback rate.
    pub speed: Option<f64>,
}

/// Video clip.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoElement {
    /// Shared fields.
    pub common: ElementCommon,
    /// Placement inputs.
    pub visual: VisualProps,
    /// Source URI.
    pub source: String,
    /// Fit mode.
    pub fit: Fit,
    /// Loop the clip to fill its duration.
    pub repeat: bool,
    /// Raw playback rate.
    pub speed: Option<f64>,
}

/// Text run.
#[derive(Debug, Clone, PartialEq)]
pub struct TextElement {
    /// Shared fields.
    pub common: ElementCommon,
    /// Placement inputs (`width`/`height` are ignored).
    pub visual: VisualProps,
    /// UTF-8 text.
    pub text: String,
    /// Font family name or URL to a font file.
    pub font_family: Option<String>,
    /// Font size expression.
    pub font_size: Option<SizeExpr>,
    /// Fill color as given (name or hex).
    pub fill_color: String,
}

/// Audio track.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioElement {
    /// Shared fields.
    pub common: ElementCommon,
    /// Source URI.
    pub source: String,
    /// Raw volume (percentage).
    pub volume: Option<SizeExpr>,
    /// Loop the source to fill its duration.
    pub repeat: bool,
    /// Raw playback rate.
    pub speed: Option<f64>,
}

/// Container of one level of nested elements.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositionElement {
    /// Shared fields.
    pub common: ElementCommon,
    /// Children; never compositions themselves.
    pub elements: Vec<Element>,
}

/// Closed union of element types.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    /// See [`ImageElement`].
    Image(ImageElement),
    /// See [`VideoElement`].
    Video(VideoElement),
    /// See [`TextElement`].
    Text(TextElement),
    /// See [`AudioElement`].
    Audio(AudioElement),
    /// See [`CompositionElement`].
    Composition(CompositionElement),
}

impl Element {
    /// Shared fields.
    pub fn common(&self) -> &ElementCommon {
        match self {
            Self::Image(e) => &e.common,
            Self::Video(e) => &e.common,
            Self::Text(e) => &e.common,
            Self::Audio(e) => &e.common,
            Self::Composition(e) => &e.common,
        }
    }

    /// Element id.
    pub fn id(&self) -> &str {
        &self.common().id
    }

    /// Scene type tag.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Image(_) => "image",
            Self::Video(_) => "video",
            Self::Text(_) => "text",
            Self::Audio(_) => "audio",
            Self::Composition(_) => "composition",
        }
    }
}
