use crate::{
    foundation::core::Size,
    foundation::error::{ScenecastError, ScenecastResult},
};

/// Average glyph advance, in ems, used when no font file is available.
pub const APPROX_ADVANCE_EM: f64 = 0.6;

/// Line height, in ems, used when no font file is available.
pub const APPROX_LINE_HEIGHT_EM: f64 = 1.2;

/// Font used to measure a text run.
#[derive(Clone, Copy, Debug)]
pub enum FontSource<'a> {
    /// Raw TTF/OTF bytes.
    Bytes(&'a [u8]),
    /// A family name the renderer resolves itself.
    Family(&'a str),
    /// Renderer default font.
    Default,
}

/// Measures the natural (unwrapped) extent of a text run.
pub trait TextMeasurer: Send + Sync {
    /// Size of `text` rendered with `font` at `size_px`.
    fn measure(&self, text: &str, font: FontSource<'_>, size_px: f32) -> ScenecastResult<Size>;
}

/// Parley-backed measurer.
///
/// Font bytes are shaped for real; family names and the default font use a fixed per-glyph
/// metric since no system font collection is loaded.
#[derive(Clone, Copy, Debug, Default)]
pub struct ParleyMeasurer;

impl TextMeasurer for ParleyMeasurer {
    fn measure(&self, text: &str, font: FontSource<'_>, size_px: f32) -> ScenecastResult<Size> {
        if !size_px.is_finite() || size_px <= 0.0 {
            return Err(ScenecastError::validation(
                "text size_px must be finite and > 0",
            ));
        }
        match font {
            FontSource::Bytes(bytes) => TextLayoutEngine::new().measure(text, bytes, size_px),
            FontSource::Family(_) | FontSource::Default => Ok(approximate_extent(text, size_px)),
        }
    }
}

/// Fixed-metric text extent: widest line times the average advance, lines times line height.
pub fn approximate_extent(text: &str, size_px: f32) -> Size {
    let size = f64::from(size_px);
    let mut lines = 0usize;
    let mut widest = 0usize;
    for line in text.lines() {
        lines += 1;
        widest = widest.max(line.chars().count());
    }
    let lines = lines.max(1);
    Size::new(
        (widest as f64 * size * APPROX_ADVANCE_EM).max(1.0),
        lines as f64 * size * APPROX_LINE_HEIGHT_EM,
    )
}

/// Parley contexts for one measurement; dropped (with the registered font) afterwards.
struct TextLayoutEngine {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<()>,
}

impl TextLayoutEngine {
    fn new() -> Self {
        Self {
            font_ctx: parley::FontContext::default(),
            layout_ctx: parley::LayoutContext::new(),
        }
    }

    fn measure(&mut self, text: &str, font_bytes: &[u8], size_px: f32) -> ScenecastResult<Size> {
        let families = self
            .font_ctx
            .collection
            .register_fonts(parley::fontique::Blob::from(font_bytes.to_vec()), None);
        let family_id = families.first().map(|(id, _)| *id).ok_or_else(|| {
            ScenecastError::validation("no font families registered from font bytes")
        })?;
        let family_name = self
            .font_ctx
            .collection
            .family_name(family_id)
            .ok_or_else(|| ScenecastError::validation("registered font family has no name"))?
            .to_string();

        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(std::borrow::Cow::Owned(family_name)),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(size_px));

        let mut layout: parley::Layout<()> = builder.build(text);
        layout.break_all_lines(None);

        let mut w = 0.0f64;
        let mut h = 0.0f64;
        for line in layout.lines() {
            let m = line.metrics();
            w = w.max(f64::from(m.advance));
            h += f64::from(m.ascent + m.descent + m.leading);
        }
        Ok(Size::new(w.max(1.0), h.max(1.0)))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/text.rs"]
mod tests;
