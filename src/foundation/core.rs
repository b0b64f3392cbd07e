use crate::foundation::error::{ScenecastError, ScenecastResult};

pub use kurbo::{Rect, Size};

/// Output canvas dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Canvas {
    /// Build a canvas, rejecting zero-sized axes.
    pub fn new(width: u32, height: u32) -> ScenecastResult<Self> {
        if width == 0 || height == 0 {
            return Err(ScenecastError::validation(
                "canvas width/height must be > 0",
            ));
        }
        Ok(Self { width, height })
    }

    /// The smaller canvas dimension; the reference for `vmin` units.
    pub fn min_dimension(self) -> u32 {
        self.width.min(self.height)
    }

    /// Canvas size as an `f64` [`Size`].
    pub fn size(self) -> Size {
        Size::new(f64::from(self.width), f64::from(self.height))
    }
}

/// Frames per second as a rational.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    /// Numerator.
    pub num: u32,
    /// Denominator, always > 0.
    pub den: u32,
}

impl Fps {
    /// Scene default when `fps` is omitted.
    pub const DEFAULT: Fps = Fps { num: 30, den: 1 };

    /// Build a frame rate, rejecting zero numerator or denominator.
    pub fn new(num: u32, den: u32) -> ScenecastResult<Self> {
        if den == 0 {
            return Err(ScenecastError::validation("fps den must be > 0"));
        }
        if num == 0 {
            return Err(ScenecastError::validation("fps must be > 0"));
        }
        Ok(Self { num, den })
    }

    /// Frames per second as a float.
    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Duration of one frame in seconds.
    pub fn frame_duration_secs(self) -> f64 {
        f64::from(self.den) / f64::from(self.num)
    }
}

/// Resolved absolute box in canvas pixels.
///
/// Always satisfies `x + width <= canvas.width` and `y + height <= canvas.height` whenever the box
/// fits on the canvas at all.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Geometry {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Box width.
    pub width: u32,
    /// Box height.
    pub height: u32,
}

impl Geometry {
    /// Geometry covering the whole canvas.
    pub fn full(canvas: Canvas) -> Self {
        Self {
            x: 0,
            y: 0,
            width: canvas.width,
            height: canvas.height,
        }
    }

    /// Box as an `f64` [`Rect`].
    pub fn to_rect(self) -> Rect {
        Rect::new(
            f64::from(self.x),
            f64::from(self.y),
            f64::from(self.x) + f64::from(self.width),
            f64::from(self.y) + f64::from(self.height),
        )
    }

    /// Center point of the box.
    pub fn center(self) -> kurbo::Point {
        self.to_rect().center()
    }
}

/// Half-open time window `[start, end)` in seconds.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TimeSpan {
    /// Inclusive start.
    pub start: f64,
    /// Exclusive end.
    pub end: f64,
}

impl TimeSpan {
    /// Build a span, flooring negative lengths to an empty span at `start`.
    pub fn new(start: f64, end: f64) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    /// Span length in seconds.
    pub fn duration(self) -> f64 {
        (self.end - self.start).max(0.0)
    }

    /// `true` when the span has zero length.
    pub fn is_empty(self) -> bool {
        self.duration() <= 0.0
    }

    /// `true` when `t` lies in `[start, end)`.
    pub fn contains(self, t: f64) -> bool {
        self.start <= t && t < self.end
    }

    /// Clip this span to `bounds`, returning `None` when they do not overlap.
    pub fn intersect(self, bounds: TimeSpan) -> Option<TimeSpan> {
        let start = self.start.max(bounds.start);
        let end = self.end.min(bounds.end);
        if start >= end {
            return None;
        }
        Some(TimeSpan { start, end })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
