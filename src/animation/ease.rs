/// Easing curve applied to normalized animation progress.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Ease {
    /// Identity.
    #[default]
    Linear,
    /// `t²`.
    QuadraticIn,
    /// `1 − (1 − t)²`.
    QuadraticOut,
    /// Quadratic ease-in-out.
    QuadraticInOut,
    /// `t³`.
    CubicIn,
    /// `1 − (1 − t)³`.
    CubicOut,
    /// Cubic ease-in-out.
    CubicInOut,
}

impl Ease {
    /// Parse a scene easing name (`"linear"`, `"quadratic-out"`, ...).
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name.trim().to_ascii_lowercase().as_str() {
            "linear" => Self::Linear,
            "quadratic-in" => Self::QuadraticIn,
            "quadratic-out" => Self::QuadraticOut,
            "quadratic-in-out" => Self::QuadraticInOut,
            "cubic-in" => Self::CubicIn,
            "cubic-out" => Self::CubicOut,
            "cubic-in-out" => Self::CubicInOut,
            _ => return None,
        })
    }

    /// Apply the curve; input is clamped to `[0, 1]`.
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::QuadraticIn => t * t,
            Self::QuadraticOut => 1.0 - (1.0 - t) * (1.0 - t),
            Self::QuadraticInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - ((-2.0 * t + 2.0).powi(2) / 2.0)
                }
            }
            Self::CubicIn => t * t * t,
            Self::CubicOut => 1.0 - (1.0 - t).powi(3),
            Self::CubicInOut => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - ((-2.0 * t + 2.0).powi(3) / 2.0)
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/animation/ease.rs"]
mod tests;
