use std::collections::HashSet;

use serde::Deserialize as _;

use crate::{
    foundation::core::{Canvas, Fps},
    foundation::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink, PathElem},
    foundation::error::{ScenecastError, ScenecastResult},
    scene::model::{
        AudioDef, AudioElement, CommonDef, CompositionDef, CompositionElement, Element,
        ElementCommon, Fit, ImageElement, MediaDef, Scene, SceneDef, TextDef, TextElement,
        VideoElement, VisualDef, VisualProps,
    },
};

/// Default text color when `fill_color` is omitted.
pub const DEFAULT_FILL_COLOR: &str = "white";

/// Parse a scene from JSON text.
pub fn parse_scene_str(json: &str, sink: &mut dyn DiagnosticSink) -> ScenecastResult<Scene> {
    let value: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| ScenecastError::serde(format!("scene is not valid JSON: {e}")))?;
    parse_scene(&value, sink)
}

/// Parse and validate a scene document.
///
/// Scene-level problems (bad canvas, duration or fps) fail the job. Element-level problems drop
/// only the offending element and are reported to `sink`. If no element survives, the job fails
/// with [`ScenecastError::NoRenderableContent`].
#[tracing::instrument(skip_all)]
pub fn parse_scene(value: &serde_json::Value, sink: &mut dyn DiagnosticSink) -> ScenecastResult<Scene> {
    let def = SceneDef::deserialize(value)
        .map_err(|e| ScenecastError::validation(format!("invalid scene: {e}")))?;

    let canvas = Canvas::new(def.width, def.height)?;
    if !def.duration.is_finite() || def.duration <= 0.0 {
        return Err(ScenecastError::validation(
            "scene duration must be finite and > 0",
        ));
    }
    let fps = match def.fps {
        Some(n) => Fps::new(n, 1)?,
        None => Fps::DEFAULT,
    };

    let mut seen = HashSet::<String>::new();
    let mut elements = Vec::with_capacity(def.elements.len());
    for (i, raw) in def.elements.iter().enumerate() {
        let path = vec![PathElem::Field("elements"), PathElem::Index(i)];
        if let Some(el) = parse_element(raw, path, 0, &mut seen, sink) {
            elements.push(el);
        }
    }

    let scene = Scene {
        canvas,
        duration: def.duration,
        fps,
        elements,
    };
    if scene.flattened().is_empty() {
        return Err(ScenecastError::no_renderable_content(
            "scene has no valid elements",
        ));
    }
    tracing::debug!(
        elements = scene.elements.len(),
        width = canvas.width,
        height = canvas.height,
        duration = scene.duration,
        "scene parsed"
    );
    Ok(scene)
}

fn parse_element(
    raw: &serde_json::Value,
    path: Vec<PathElem>,
    depth: usize,
    seen: &mut HashSet<String>,
    sink: &mut dyn DiagnosticSink,
) -> Option<Element> {
    if !raw.is_object() {
        reject(sink, None, &path, "element must be a JSON object");
        return None;
    }
    let id = match raw.get("id").and_then(|v| v.as_str()).map(str::trim) {
        Some(id) if !id.is_empty() => id.to_owned(),
        _ => {
            reject(sink, None, &path, "missing required field 'id'");
            return None;
        }
    };
    let Some(kind) = raw.get("type").and_then(|v| v.as_str()) else {
        reject(sink, Some(&id), &path, "missing required field 'type'");
        return None;
    };
    if seen.contains(&id) {
        reject(sink, Some(&id), &path, format!("duplicate element id '{id}'"));
        return None;
    }

    let parsed = match kind {
        "image" | "video" => parse_media(kind, raw, &id, &path, sink),
        "text" => parse_text(raw, &id, &path, sink),
        "audio" => parse_audio(raw, &id, &path),
        "composition" if depth > 0 => Err("nested compositions are not supported".to_owned()),
        "composition" => {
            // Children must be registered after the container so a child cannot reuse its id.
            seen.insert(id.clone());
            let result = parse_composition(raw, &id, &path, seen, sink);
            if result.is_err() {
                seen.remove(&id);
            }
            result
        }
        other => Err(format!("unknown element type '{other}'")),
    };

    match parsed {
        Ok(el) => {
            seen.insert(id);
            Some(el)
        }
        Err(msg) => {
            reject(sink, Some(&id), &path, msg);
            None
        }
    }
}

fn reject(sink: &mut dyn DiagnosticSink, id: Option<&str>, path: &[PathElem], msg: impl Into<String>) {
    sink.record(Diagnostic::at(
        DiagnosticKind::Validation,
        id,
        path,
        format!("{}; element dropped", msg.into()),
    ));
}

fn common_from(def: CommonDef, id: &str, path: &[PathElem]) -> Result<ElementCommon, String> {
    if !def.time.is_finite() || def.time < 0.0 {
        return Err("time must be finite and >= 0".to_owned());
    }
    if let Some(d) = def.duration
        && (!d.is_finite() || d < 0.0)
    {
        return Err("duration must be finite and >= 0".to_owned());
    }
    Ok(ElementCommon {
        id: id.to_owned(),
        track: def.track,
        time: def.time,
        duration: def.duration,
        animations: def.animations,
        origin: path.to_vec(),
    })
}

fn visual_from(def: VisualDef) -> VisualProps {
    VisualProps {
        x: def.x,
        y: def.y,
        width: def.width,
        height: def.height,
        x_anchor: def.x_anchor,
        y_anchor: def.y_anchor,
    }
}

fn required(value: Option<String>, field: &str) -> Result<String, String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(format!("missing required field '{field}'")),
    }
}

fn parse_media(
    kind: &str,
    raw: &serde_json::Value,
    id: &str,
    path: &[PathElem],
    sink: &mut dyn DiagnosticSink,
) -> Result<Element, String> {
    let def = MediaDef::deserialize(raw).map_err(|e| format!("invalid {kind} element: {e}"))?;
    let source = required(def.source, "source")?;
    let common = common_from(def.common, id, path)?;
    let fit = match def.fit.as_deref() {
        None => Fit::Cover,
        Some(name) => Fit::parse(name).unwrap_or_else(|| {
            let mut at = path.to_vec();
            at.push(PathElem::Field("fit"));
            sink.record(Diagnostic::at(
                DiagnosticKind::Validation,
                Some(id),
                &at,
                format!("unknown fit '{name}', using cover"),
            ));
            Fit::Cover
        }),
    };
    let visual = visual_from(def.visual);
    Ok(if kind == "image" {
        Element::Image(ImageElement {
            common,
            visual,
            source,
            fit,
            repeat: def.repeat,
            speed: def.speed,
        })
    } else {
        Element::Video(VideoElement {
            common,
            visual,
            source,
            fit,
            repeat: def.repeat,
            speed: def.speed,
        })
    })
}

fn parse_text(
    raw: &serde_json::Value,
    id: &str,
    path: &[PathElem],
    sink: &mut dyn DiagnosticSink,
) -> Result<Element, String> {
    let def = TextDef::deserialize(raw).map_err(|e| format!("invalid text element: {e}"))?;
    let text = required(def.text, "text")?;
    let common = common_from(def.common, id, path)?;
    if def.visual.width.is_some() || def.visual.height.is_some() {
        sink.record(Diagnostic::at(
            DiagnosticKind::Validation,
            Some(id),
            path,
            "width/height are ignored for text; the box is sized to the glyphs",
        ));
    }
    Ok(Element::Text(TextElement {
        common,
        visual: visual_from(def.visual),
        text,
        font_family: def.font_family.filter(|f| !f.trim().is_empty()),
        font_size: def.font_size,
        fill_color: def
            .fill_color
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_FILL_COLOR.to_owned()),
    }))
}

fn parse_audio(raw: &serde_json::Value, id: &str, path: &[PathElem]) -> Result<Element, String> {
    let def = AudioDef::deserialize(raw).map_err(|e| format!("invalid audio element: {e}"))?;
    let source = required(def.source, "source")?;
    Ok(Element::Audio(AudioElement {
        common: common_from(def.common, id, path)?,
        source,
        volume: def.volume,
        repeat: def.repeat,
        speed: def.speed,
    }))
}

fn parse_composition(
    raw: &serde_json::Value,
    id: &str,
    path: &[PathElem],
    seen: &mut HashSet<String>,
    sink: &mut dyn DiagnosticSink,
) -> Result<Element, String> {
    let def = CompositionDef::deserialize(raw)
        .map_err(|e| format!("invalid composition element: {e}"))?;
    let ignored = [
        ("track", def.common.track != 0),
        ("time", def.common.time != 0.0),
        ("duration", def.common.duration.is_some()),
        ("animations", !def.common.animations.is_empty()),
    ];
    for (field, set) in ignored {
        if set {
            let mut field_path = path.to_vec();
            field_path.push(PathElem::Field(field));
            sink.record(Diagnostic::at(
                DiagnosticKind::Validation,
                Some(id),
                &field_path,
                format!("composition '{field}' is ignored; children keep their own"),
            ));
        }
    }
    let common = common_from(def.common, id, path)?;
    let mut children = Vec::with_capacity(def.elements.len());
    for (j, child) in def.elements.iter().enumerate() {
        let mut child_path = path.to_vec();
        child_path.extend([PathElem::Field("elements"), PathElem::Index(j)]);
        if let Some(el) = parse_element(child, child_path, 1, seen, sink) {
            children.push(el);
        }
    }
    Ok(Element::Composition(CompositionElement {
        common,
        elements: children,
    }))
}

#[cfg(test)]
#[path = "../../tests/unit/scene/parse.rs"]
mod tests;
