use crate::{
    foundation::core::TimeSpan,
    foundation::diagnostics::{DiagnosticKind, ElementScope},
    scene::model::ElementCommon,
    units::resolve::{SizeExpr, Unit, parse_unit},
};

/// How a repeating source is tiled to fill its clip.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct LoopPlan {
    /// Natural length of one pass over the source, in source seconds.
    pub natural_duration: f64,
    /// Number of passes needed; the last one is truncated.
    pub loops: u32,
}

impl LoopPlan {
    /// Tile a source of `natural_duration` over `clip_duration` render seconds at `speed`.
    pub fn new(natural_duration: f64, clip_duration: f64, speed: f64) -> Self {
        let consumed = clip_duration * speed;
        let loops = (consumed / natural_duration).ceil().max(1.0);
        Self {
            natural_duration,
            loops: loops.min(f64::from(u32::MAX)) as u32,
        }
    }
}

/// Resolved placement of an element on the output timeline.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct ClipTiming {
    /// Seconds from the start of the output.
    pub start_time: f64,
    /// Visible length, already truncated to the scene window.
    pub duration: f64,
    /// Playback rate (> 0).
    pub speed: f64,
    /// Present when the source loops to fill `duration`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub looping: Option<LoopPlan>,
}

impl ClipTiming {
    /// Output window covered by the clip.
    pub fn span(&self) -> TimeSpan {
        TimeSpan::new(self.start_time, self.start_time + self.duration)
    }

    /// Source time shown at clip-local render time `t`.
    pub fn source_time(&self, t: f64) -> f64 {
        match self.looping {
            Some(l) => source_time(t, self.speed, l.natural_duration),
            None => t * self.speed,
        }
    }
}

/// `element.duration` if present, else the rest of the scene; never negative.
pub fn effective_duration(time: f64, duration: Option<f64>, scene_duration: f64) -> f64 {
    duration.unwrap_or(scene_duration - time).max(0.0)
}

/// Map render time to source time: `(t * speed) mod natural_duration`.
pub fn source_time(t: f64, speed: f64, natural_duration: f64) -> f64 {
    if natural_duration <= 0.0 {
        return 0.0;
    }
    (t * speed).rem_euclid(natural_duration)
}

/// Validate a raw playback rate; invalid values fall back to `1.0`.
pub fn resolve_speed(raw: Option<f64>, scope: &mut ElementScope<'_>) -> f64 {
    match raw {
        None => 1.0,
        Some(s) if s.is_finite() && s > 0.0 => s,
        Some(s) => {
            scope.report(
                DiagnosticKind::Timeline,
                Some("speed"),
                format!("speed must be finite and > 0, got {s}; using 1"),
            );
            1.0
        }
    }
}

/// Parse `volume` as a linear gain.
///
/// `"N%"`, bare numbers and bare numeric strings are all percentages. Values above 100% amplify. Invalid or negative
/// values fall back to unity gain.
pub fn resolve_gain(volume: Option<&SizeExpr>, scope: &mut ElementScope<'_>) -> f64 {
    let Some(expr) = volume else {
        return 1.0;
    };
    let pct = match expr {
        SizeExpr::Number(n) => Some(*n).filter(|n| n.is_finite()),
        SizeExpr::Text(s) => match parse_unit(s) {
            Some(Unit::Percent(n) | Unit::Px(n)) => Some(n),
            _ => None,
        },
    };
    match pct {
        Some(p) if p >= 0.0 => p / 100.0,
        _ => {
            scope.report(
                DiagnosticKind::Timeline,
                Some("volume"),
                format!("invalid volume {expr:?}; using unity gain"),
            );
            1.0
        }
    }
}

/// Timeline inputs of one element.
#[derive(Clone, Copy, Debug)]
pub struct TimingInput {
    /// Loop the source to fill the clip.
    pub repeat: bool,
    /// Validated playback rate.
    pub speed: f64,
    /// Natural source length, when the source has one.
    pub natural_duration: Option<f64>,
}

/// Place an element on the output timeline.
///
/// Returns `None` (with a `Timeline` diagnostic) when the element is never visible inside
/// `[0, scene_duration)`. A non-repeating source stops when it runs out.
pub fn resolve_timing(
    common: &ElementCommon,
    input: TimingInput,
    scene_duration: f64,
    scope: &mut ElementScope<'_>,
) -> Option<ClipTiming> {
    let natural = input.natural_duration.filter(|n| n.is_finite() && *n > 0.0);
    let mut duration = effective_duration(common.time, common.duration, scene_duration);
    if !input.repeat
        && let Some(n) = natural
    {
        duration = duration.min(n / input.speed);
    }

    let requested = TimeSpan::new(common.time, common.time + duration);
    let Some(visible) = requested.intersect(TimeSpan::new(0.0, scene_duration)) else {
        scope.report(
            DiagnosticKind::Timeline,
            None,
            format!(
                "clip [{:.3}, {:.3}) is never visible in a {scene_duration:.3}s scene; dropped",
                requested.start, requested.end
            ),
        );
        return None;
    };

    let looping = match (input.repeat, natural) {
        (true, Some(n)) => Some(LoopPlan::new(n, visible.duration(), input.speed)),
        _ => None,
    };
    Some(ClipTiming {
        start_time: visible.start,
        duration: visible.duration(),
        speed: input.speed,
        looping,
    })
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/resolve.rs"]
mod tests;
