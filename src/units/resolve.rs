use crate::foundation::core::Canvas;

/// Raw size/position value as it appears in scene JSON: a number or a unit string.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum SizeExpr {
    /// Absolute pixels.
    Number(f64),
    /// `"N%"`, `"N vmin"` or a numeric string.
    Text(String),
}

impl SizeExpr {
    /// Shorthand for a unit string.
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }
}

impl From<f64> for SizeExpr {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for SizeExpr {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

/// Parsed unit string, before scaling.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Unit {
    /// Absolute pixels.
    Px(f64),
    /// Percent of the reference axis.
    Percent(f64),
    /// Percent of the smaller canvas dimension.
    Vmin(f64),
}

/// Parse `"N%"`, `"N vmin"` or `"N"` (suffixes case-insensitive, whitespace trimmed).
///
/// Returns `None` for anything else, including non-finite numbers.
pub fn parse_unit(s: &str) -> Option<Unit> {
    let s = s.trim().to_ascii_lowercase();
    if let Some(n) = s.strip_suffix('%') {
        return parse_finite(n).map(Unit::Percent);
    }
    if let Some(n) = s.strip_suffix("vmin") {
        return parse_finite(n).map(Unit::Vmin);
    }
    parse_finite(&s).map(Unit::Px)
}

/// Parse the numeric part of a `"N%"` string without clamping.
///
/// Used for gains and scale factors, which are allowed to exceed 100%.
pub fn parse_percentage(s: &str) -> Option<f64> {
    match parse_unit(s)? {
        Unit::Percent(n) => Some(n),
        _ => None,
    }
}

fn parse_finite(n: &str) -> Option<f64> {
    let v = n.trim().parse::<f64>().ok()?;
    v.is_finite().then_some(v)
}

/// Resolve `"N%"` against `reference`: `round(clamp(N, 0, 100) / 100 * reference)`.
pub fn resolve_percent(s: &str, reference: u32) -> Option<u32> {
    match parse_unit(s)? {
        Unit::Percent(n) => Some(scale_percent(n, reference)),
        _ => None,
    }
}

/// Resolve `"N vmin"` against the smaller canvas dimension.
///
/// The element's own reference axis is deliberately not involved, even when resolving a width
/// or height; existing scene files rely on this.
pub fn resolve_vmin(s: &str, canvas: Canvas) -> Option<u32> {
    match parse_unit(s)? {
        Unit::Vmin(n) => Some(scale_percent(n, canvas.min_dimension())),
        _ => None,
    }
}

/// Resolve any size/position expression to whole pixels.
///
/// `reference` is the axis the value is measured along (canvas width for `x`/`width`, canvas
/// height for `y`/`height`). `None` tells the caller to apply its positional default.
pub fn resolve_length(expr: &SizeExpr, reference: u32, canvas: Canvas) -> Option<u32> {
    let unit = match expr {
        SizeExpr::Number(n) if n.is_finite() => Unit::Px(*n),
        SizeExpr::Number(_) => return None,
        SizeExpr::Text(s) => parse_unit(s)?,
    };
    Some(match unit {
        Unit::Px(px) => clamp_px(px, reference),
        Unit::Percent(n) => scale_percent(n, reference),
        Unit::Vmin(n) => scale_percent(n, canvas.min_dimension()),
    })
}

fn scale_percent(n: f64, reference: u32) -> u32 {
    let pct = n.clamp(0.0, 100.0);
    (pct / 100.0 * f64::from(reference)).round() as u32
}

fn clamp_px(px: f64, reference: u32) -> u32 {
    px.clamp(0.0, f64::from(reference)).trunc() as u32
}

#[cfg(test)]
#[path = "../../tests/unit/units/resolve.rs"]
mod tests;
