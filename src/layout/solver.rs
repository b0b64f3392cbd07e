use crate::{
    foundation::core::{Canvas, Geometry, Rect, Size},
    foundation::diagnostics::{DiagnosticKind, ElementScope},
    scene::model::{Fit, VisualProps},
    units::resolve::{SizeExpr, resolve_length},
};

/// Font size applied when a text element omits `font_size`.
pub const DEFAULT_FONT_SIZE: &str = "8 vmin";

/// Anchor applied when a text element omits `x_anchor`/`y_anchor`.
pub const DEFAULT_ANCHOR: &str = "50%";

/// Integer pixel size of the source after fit scaling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub struct ScaledSize {
    /// Scaled width.
    pub width: u32,
    /// Scaled height.
    pub height: u32,
}

/// Window cut out of the scaled source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub struct Crop {
    /// Left offset into the scaled source.
    pub x: u32,
    /// Top offset into the scaled source.
    pub y: u32,
    /// Crop width.
    pub width: u32,
    /// Crop height.
    pub height: u32,
}

/// Resolved placement of an image or video.
///
/// The engine scales the source to `scaled`, applies `crop` when present and draws the result at
/// `geometry`; `geometry` always has the size of the cropped (or uncropped) scaled source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub struct MediaLayout {
    /// Final on-canvas box.
    pub geometry: Geometry,
    /// Source size after fit scaling.
    pub scaled: ScaledSize,
    /// Symmetric crop of the overflow (`cover` only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crop: Option<Crop>,
}

fn resolve_field(
    expr: Option<&SizeExpr>,
    field: &'static str,
    reference: u32,
    canvas: Canvas,
    scope: &mut ElementScope<'_>,
) -> Option<u32> {
    let expr = expr?;
    let resolved = resolve_length(expr, reference, canvas);
    if resolved.is_none() {
        scope.report(
            DiagnosticKind::UnitResolution,
            Some(field),
            format!("cannot resolve {expr:?}, using default"),
        );
    }
    resolved
}

fn fit_scale(native: Size, target: Size, fit: Fit) -> (Size, Option<Rect>) {
    let sx = target.width / native.width;
    let sy = target.height / native.height;
    match fit {
        Fit::Fill => (target, None),
        Fit::Contain => {
            let s = sx.min(sy);
            (Size::new(native.width * s, native.height * s), None)
        }
        Fit::Cover => {
            let s = sx.max(sy);
            let scaled = Size::new(native.width * s, native.height * s);
            let crop = Rect::from_center_size(scaled.to_rect().center(), target);
            (scaled, Some(crop))
        }
    }
}

fn to_px(v: f64) -> u32 {
    v.round().max(0.0) as u32
}

fn place_axis(pos: Option<u32>, extent: u32, canvas_extent: u32) -> u32 {
    let max = canvas_extent.saturating_sub(extent);
    match pos {
        Some(p) => p.min(max),
        None => max / 2,
    }
}

/// Resolve the box of an image or video.
///
/// `native` is the probed source size; when unknown the requested box is filled exactly.
pub fn layout_media(
    visual: &VisualProps,
    native: Option<Size>,
    fit: Fit,
    canvas: Canvas,
    scope: &mut ElementScope<'_>,
) -> MediaLayout {
    let native = native.filter(|n| n.width > 0.0 && n.height > 0.0);
    let canvas_size = canvas.size();

    if visual.is_unplaced() {
        return match native {
            Some(n) => finish(n, canvas_size, Fit::Cover, None, None, canvas),
            None => MediaLayout {
                geometry: Geometry::full(canvas),
                scaled: ScaledSize {
                    width: canvas.width,
                    height: canvas.height,
                },
                crop: None,
            },
        };
    }

    let w = resolve_field(visual.width.as_ref(), "width", canvas.width, canvas, scope);
    let h = resolve_field(visual.height.as_ref(), "height", canvas.height, canvas, scope);
    let x = resolve_field(visual.x.as_ref(), "x", canvas.width, canvas, scope);
    let y = resolve_field(visual.y.as_ref(), "y", canvas.height, canvas, scope);

    let target = match (w, h, native) {
        (Some(w), Some(h), _) => Size::new(f64::from(w), f64::from(h)),
        (Some(w), None, Some(n)) => Size::new(f64::from(w), f64::from(w) * n.height / n.width),
        (None, Some(h), Some(n)) => Size::new(f64::from(h) * n.width / n.height, f64::from(h)),
        (Some(w), None, None) => Size::new(f64::from(w), canvas_size.height),
        (None, Some(h), None) => Size::new(canvas_size.width, f64::from(h)),
        (None, None, Some(n)) => {
            // Native size, shrunk uniformly when it does not fit the canvas.
            let s = (canvas_size.width / n.width)
                .min(canvas_size.height / n.height)
                .min(1.0);
            Size::new(n.width * s, n.height * s)
        }
        (None, None, None) => canvas_size,
    };
    let target = Size::new(
        target.width.min(canvas_size.width),
        target.height.min(canvas_size.height),
    );
    if target.width < 1.0 || target.height < 1.0 {
        scope.report(
            DiagnosticKind::UnitResolution,
            None,
            "requested box has zero area",
        );
        return MediaLayout {
            geometry: Geometry::default(),
            scaled: ScaledSize {
                width: 0,
                height: 0,
            },
            crop: None,
        };
    }

    match native {
        Some(n) => finish(n, target, fit, x, y, canvas),
        None => {
            let scaled = ScaledSize {
                width: to_px(target.width),
                height: to_px(target.height),
            };
            MediaLayout {
                geometry: Geometry {
                    x: place_axis(x, scaled.width, canvas.width),
                    y: place_axis(y, scaled.height, canvas.height),
                    width: scaled.width,
                    height: scaled.height,
                },
                scaled,
                crop: None,
            }
        }
    }
}

fn finish(
    native: Size,
    target: Size,
    fit: Fit,
    x: Option<u32>,
    y: Option<u32>,
    canvas: Canvas,
) -> MediaLayout {
    let (scaled, crop) = fit_scale(native, target, fit);
    let scaled = ScaledSize {
        width: to_px(scaled.width).max(1),
        height: to_px(scaled.height).max(1),
    };
    let crop = crop
        .map(|r| {
            let width = to_px(r.width()).min(scaled.width);
            let height = to_px(r.height()).min(scaled.height);
            Crop {
                x: (scaled.width - width) / 2,
                y: (scaled.height - height) / 2,
                width,
                height,
            }
        })
        .filter(|c| c.width != scaled.width || c.height != scaled.height);
    let (bw, bh) = match crop {
        Some(c) => (c.width, c.height),
        None => (scaled.width, scaled.height),
    };
    let bw = bw.min(canvas.width);
    let bh = bh.min(canvas.height);
    MediaLayout {
        geometry: Geometry {
            x: place_axis(x, bw, canvas.width),
            y: place_axis(y, bh, canvas.height),
            width: bw,
            height: bh,
        },
        scaled,
        crop,
    }
}

/// Resolve a text element's font size in pixels.
///
/// Percentages are relative to the canvas height; unresolvable values fall back to
/// [`DEFAULT_FONT_SIZE`].
pub fn resolve_font_size(expr: Option<&SizeExpr>, canvas: Canvas, scope: &mut ElementScope<'_>) -> f32 {
    let fallback = || {
        resolve_length(&SizeExpr::text(DEFAULT_FONT_SIZE), canvas.height, canvas).unwrap_or(1)
    };
    let px = match expr {
        None => fallback(),
        Some(e) => match resolve_length(e, canvas.height, canvas) {
            Some(px) if px > 0 => px,
            _ => {
                scope.report(
                    DiagnosticKind::UnitResolution,
                    Some("font_size"),
                    format!("cannot resolve {e:?}, using {DEFAULT_FONT_SIZE}"),
                );
                fallback()
            }
        },
    };
    px.max(1) as f32
}

fn resolve_anchor(
    expr: Option<&SizeExpr>,
    field: &'static str,
    extent: u32,
    canvas: Canvas,
    scope: &mut ElementScope<'_>,
) -> u32 {
    let default_anchor = SizeExpr::text(DEFAULT_ANCHOR);
    resolve_field(Some(expr.unwrap_or(&default_anchor)), field, extent, canvas, scope)
        .or_else(|| resolve_length(&default_anchor, extent, canvas))
        .unwrap_or(0)
}

/// Place a text box of `natural` size (the measured glyph extent).
///
/// `(x, y)` is the canvas point the anchor lands on; anchors resolve against the box itself.
pub fn layout_text(
    visual: &VisualProps,
    natural: Size,
    canvas: Canvas,
    scope: &mut ElementScope<'_>,
) -> Geometry {
    let width = (natural.width.ceil().max(0.0) as u32).min(canvas.width);
    let height = (natural.height.ceil().max(0.0) as u32).min(canvas.height);

    let ax = resolve_anchor(visual.x_anchor.as_ref(), "x_anchor", width, canvas, scope);
    let ay = resolve_anchor(visual.y_anchor.as_ref(), "y_anchor", height, canvas, scope);

    let x = resolve_field(visual.x.as_ref(), "x", canvas.width, canvas, scope)
        .map(|x| x.saturating_sub(ax));
    let y = resolve_field(visual.y.as_ref(), "y", canvas.height, canvas, scope)
        .map(|y| y.saturating_sub(ay));

    Geometry {
        x: place_axis(x, width, canvas.width),
        y: place_axis(y, height, canvas.height),
        width,
        height,
    }
}

#[cfg(test)]
#[path = "../../tests/unit/layout/solver.rs"]
mod tests;
