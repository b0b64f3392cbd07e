use crate::{
    animation::ease::Ease,
    foundation::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink, PathElem},
    scene::model::AnimationDef,
    units::resolve::parse_percentage,
};

/// One `scale` animation window, in clip-local seconds.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct ScaleAnimation {
    /// Window start.
    pub time: f64,
    /// Window length; `0` makes a step at `time`.
    pub duration: f64,
    /// Scale factor before and at `time` (`1.0` = identity).
    pub start_scale: f64,
    /// Scale factor at and after `time + duration`.
    pub end_scale: f64,
    /// Progress curve.
    pub ease: Ease,
}

impl ScaleAnimation {
    /// Sample the scale factor at clip-local time `t`.
    pub fn sample(&self, t: f64) -> f64 {
        if t <= self.time {
            return self.start_scale;
        }
        if t >= self.time + self.duration {
            return self.end_scale;
        }
        let progress = self.ease.apply((t - self.time) / self.duration);
        self.start_scale + (self.end_scale - self.start_scale) * progress
    }

    /// Clip-local time at which the window ends.
    pub fn end_time(&self) -> f64 {
        self.time + self.duration
    }
}

/// Time → scale function attached to a clip.
///
/// Windows are kept sorted by start time. At time `t` the latest window that has started
/// governs; before the first window the first window's `start_scale` holds. Sampling is pure
/// and may happen in any order.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize)]
pub struct ScaleTransform {
    animations: Vec<ScaleAnimation>,
}

impl ScaleTransform {
    /// Identity transform (no animation).
    pub fn identity() -> Self {
        Self::default()
    }

    /// Build from windows in any order; ties keep input order.
    pub fn new(mut animations: Vec<ScaleAnimation>) -> Self {
        animations.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { animations }
    }

    /// `true` when no window is attached.
    pub fn is_identity(&self) -> bool {
        self.animations.is_empty()
    }

    /// Windows in start-time order.
    pub fn animations(&self) -> &[ScaleAnimation] {
        &self.animations
    }

    /// Sample the scale factor at clip-local time `t`.
    pub fn sample(&self, t: f64) -> f64 {
        let Some(first) = self.animations.first() else {
            return 1.0;
        };
        let active = self
            .animations
            .iter()
            .rev()
            .find(|a| a.time < t)
            .unwrap_or(first);
        active.sample(t)
    }
}

/// Build the clip's scale transform from raw animation entries.
///
/// Entries that cannot be honoured are skipped with an `Animation` diagnostic; the element
/// itself is never dropped because of an animation. `clip_duration` is the window length used
/// when an entry omits `duration`.
pub fn build_scale_transform(
    defs: &[AnimationDef],
    clip_duration: f64,
    element_id: &str,
    path: &[PathElem],
    sink: &mut dyn DiagnosticSink,
) -> ScaleTransform {
    let mut out = Vec::with_capacity(defs.len());
    for (i, def) in defs.iter().enumerate() {
        let mut at = path.to_vec();
        at.extend([PathElem::Field("animations"), PathElem::Index(i)]);
        let mut report = |msg: String| {
            sink.record(Diagnostic::at(
                DiagnosticKind::Animation,
                Some(element_id),
                &at,
                msg,
            ));
        };

        if def.kind != "scale" {
            report(format!("unsupported animation type '{}', ignored", def.kind));
            continue;
        }
        if !def.time.is_finite() || def.time < 0.0 {
            report("animation time must be finite and >= 0, ignored".to_owned());
            continue;
        }
        let duration = def.duration.unwrap_or((clip_duration - def.time).max(0.0));
        if !duration.is_finite() || duration < 0.0 {
            report("animation duration must be finite and >= 0, ignored".to_owned());
            continue;
        }
        let (Some(start), Some(end)) = (
            parse_percentage(&def.start_scale),
            parse_percentage(&def.end_scale),
        ) else {
            report(format!(
                "start_scale/end_scale must be percentages, got '{}'/'{}', ignored",
                def.start_scale, def.end_scale
            ));
            continue;
        };
        if start < 0.0 || end < 0.0 {
            report("negative scale clamped to 0%".to_owned());
        }
        let ease = match def.easing.as_deref() {
            None => Ease::Linear,
            Some(name) => Ease::parse(name).unwrap_or_else(|| {
                report(format!("unknown easing '{name}', using linear"));
                Ease::Linear
            }),
        };

        out.push(ScaleAnimation {
            time: def.time,
            duration,
            start_scale: start.max(0.0) / 100.0,
            end_scale: end.max(0.0) / 100.0,
            ease,
        });
    }
    ScaleTransform::new(out)
}

#[cfg(test)]
#[path = "../../tests/unit/animation/scale.rs"]
mod tests;
