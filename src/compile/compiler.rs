use crate::{
    animation::scale::build_scale_transform,
    assets::fetch::{AssetFetcher, FetchedAsset, is_remote},
    assets::probe::{MediaInfo, MediaKind, MediaProbe},
    assets::text::{FontSource, TextMeasurer, approximate_extent},
    compile::plan::{
        AudioMixEntry, AudioMixPlan, AudioOrigin, ClipDescriptor, ClipSource, FontRef, RenderPlan,
        SourceRef,
    },
    foundation::cancel::CancelToken,
    foundation::core::{Canvas, Geometry, Size},
    foundation::diagnostics::{DiagnosticKind, DiagnosticSink, ElementScope},
    foundation::error::{ScenecastError, ScenecastResult},
    layout::solver::{layout_media, layout_text, resolve_font_size},
    scene::model::{AudioElement, Element, ElementCommon, Scene, TextElement},
    timeline::resolve::{ClipTiming, TimingInput, resolve_gain, resolve_speed, resolve_timing},
};

const FONT_EXTENSIONS: [&str; 5] = [".ttf", ".otf", ".ttc", ".woff", ".woff2"];

/// `true` when `font_family` names a font file rather than a family.
pub fn is_font_file(font_family: &str) -> bool {
    let lower = font_family.trim().to_ascii_lowercase();
    is_remote(&lower)
        || lower.starts_with("file://")
        || FONT_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Composition orchestrator: turns a validated [`Scene`] into a [`RenderPlan`].
///
/// Elements are resolved one at a time in input order; every per-element resource (a measured
/// font, probe results) is released before the next element starts. The final clip order is a
/// stable sort on `(track, start_time)`.
pub struct Compiler<'a> {
    fetcher: &'a dyn AssetFetcher,
    probe: &'a dyn MediaProbe,
    measurer: &'a dyn TextMeasurer,
}

struct TextResolution {
    font: FontRef,
    font_size_px: f32,
    natural: Size,
}

enum Resolved {
    Clip(ClipDescriptor, Option<AudioMixEntry>),
    Audio(AudioMixEntry),
}

impl<'a> Compiler<'a> {
    /// Build a compiler over the given collaborators.
    pub fn new(
        fetcher: &'a dyn AssetFetcher,
        probe: &'a dyn MediaProbe,
        measurer: &'a dyn TextMeasurer,
    ) -> Self {
        Self {
            fetcher,
            probe,
            measurer,
        }
    }

    /// Resolve `scene` into a plan.
    ///
    /// Element-level problems become diagnostics. Fails with `NoRenderableContent` when no visual
    /// clip survives and with `Cancelled` when `cancel` fires; a partial plan is never returned.
    #[tracing::instrument(skip_all, fields(elements = scene.elements.len()))]
    pub fn compile(
        &self,
        scene: &Scene,
        sink: &mut dyn DiagnosticSink,
        cancel: &CancelToken,
    ) -> ScenecastResult<RenderPlan> {
        let mut clips = Vec::new();
        let mut audio = AudioMixPlan::default();

        for element in scene.flattened() {
            cancel.check()?;
            let common = element.common();
            let mut scope = ElementScope::new(&common.id, &common.origin, &mut *sink);
            match self.resolve_element(element, scene, &mut scope) {
                Some(Resolved::Clip(clip, track_audio)) => {
                    tracing::debug!(id = %clip.id, kind = clip.source.type_name(), "clip resolved");
                    clips.push(clip);
                    audio.entries.extend(track_audio);
                }
                Some(Resolved::Audio(entry)) => {
                    tracing::debug!(id = %entry.id, "audio resolved");
                    audio.entries.push(entry);
                }
                None => tracing::debug!(id = %common.id, "element dropped"),
            }
        }
        cancel.check()?;

        if clips.is_empty() {
            return Err(ScenecastError::no_renderable_content(format!(
                "no visual clip survived resolution ({} audio entries alone cannot make a video)",
                audio.entries.len()
            )));
        }

        // Stable: equal keys keep input order.
        clips.sort_by(|a, b| {
            a.track
                .cmp(&b.track)
                .then_with(|| a.start_time.total_cmp(&b.start_time))
        });

        tracing::info!(
            clips = clips.len(),
            audio = audio.entries.len(),
            duration = scene.duration,
            "render plan compiled"
        );
        Ok(RenderPlan {
            canvas: scene.canvas,
            fps: scene.fps,
            duration: scene.duration,
            clips,
            audio,
        })
    }

    fn resolve_element(
        &self,
        element: &Element,
        scene: &Scene,
        scope: &mut ElementScope<'_>,
    ) -> Option<Resolved> {
        match element {
            Element::Image(img) => {
                let speed = resolve_speed(img.speed, scope);
                let (asset, info) =
                    self.acquire(&img.source, MediaKind::Image, &img.common, speed, scene, scope)?;
                let timing = self.timing(&img.common, img.repeat, speed, info.duration, scene, scope)?;
                let layout = layout_media(
                    &img.visual,
                    native_size(&info),
                    img.fit,
                    scene.canvas,
                    scope,
                );
                let source = ClipSource::Image {
                    source: SourceRef::new(&img.source, asset),
                    fit: img.fit,
                    layout,
                    animated: info.duration.is_some(),
                };
                let clip = clip_descriptor(&img.common, timing, layout.geometry, source, scope)?;
                Some(Resolved::Clip(clip, None))
            }
            Element::Video(vid) => {
                let speed = resolve_speed(vid.speed, scope);
                let (asset, info) =
                    self.acquire(&vid.source, MediaKind::Video, &vid.common, speed, scene, scope)?;
                let timing = self.timing(&vid.common, vid.repeat, speed, info.duration, scene, scope)?;
                let layout = layout_media(
                    &vid.visual,
                    native_size(&info),
                    vid.fit,
                    scene.canvas,
                    scope,
                );
                let source = SourceRef::new(&vid.source, asset);
                let track_audio = info.has_audio.then(|| AudioMixEntry {
                    id: vid.common.id.clone(),
                    origin: AudioOrigin::VideoTrack,
                    start_time: timing.start_time,
                    duration: timing.duration,
                    volume_gain: 1.0,
                    speed: timing.speed,
                    trim: None,
                    looping: timing.looping,
                    source: source.clone(),
                });
                let clip = clip_descriptor(
                    &vid.common,
                    timing,
                    layout.geometry,
                    ClipSource::Video {
                        source,
                        fit: vid.fit,
                        layout,
                    },
                    scope,
                )?;
                Some(Resolved::Clip(clip, track_audio))
            }
            Element::Text(text) => {
                let timing = self.timing(&text.common, false, 1.0, None, scene, scope)?;
                let measured = self.resolve_text(text, scene.canvas, scope);
                let geometry = layout_text(&text.visual, measured.natural, scene.canvas, scope);
                let source = ClipSource::Text {
                    text: text.text.clone(),
                    font: measured.font,
                    font_size_px: measured.font_size_px,
                    fill_color: text.fill_color.clone(),
                };
                let clip = clip_descriptor(&text.common, timing, geometry, source, scope)?;
                Some(Resolved::Clip(clip, None))
            }
            Element::Audio(aud) => self.resolve_audio(aud, scene, scope).map(Resolved::Audio),
            Element::Composition(_) => None,
        }
    }

    /// Visibility pre-check, fetch and probe of a media source.
    fn acquire(
        &self,
        uri: &str,
        kind: MediaKind,
        common: &ElementCommon,
        speed: f64,
        scene: &Scene,
        scope: &mut ElementScope<'_>,
    ) -> Option<(FetchedAsset, MediaInfo)> {
        // Skip the download for elements that can never be seen.
        self.timing(common, true, speed, None, scene, scope)?;
        let asset = self.fetch(uri, "source", scope)?;
        match self.probe.probe(asset.path(), kind) {
            Ok(info) => Some((asset, info)),
            Err(e) => {
                scope.report(
                    DiagnosticKind::Fetch,
                    Some("source"),
                    format!("cannot read '{uri}': {e}; element dropped"),
                );
                None
            }
        }
    }

    fn fetch(
        &self,
        uri: &str,
        field: &'static str,
        scope: &mut ElementScope<'_>,
    ) -> Option<FetchedAsset> {
        match self.fetcher.fetch(uri) {
            Ok(asset) => Some(asset),
            Err(e) => {
                scope.report(
                    DiagnosticKind::Fetch,
                    Some(field),
                    format!("cannot fetch '{uri}': {e}"),
                );
                None
            }
        }
    }

    fn timing(
        &self,
        common: &ElementCommon,
        repeat: bool,
        speed: f64,
        natural_duration: Option<f64>,
        scene: &Scene,
        scope: &mut ElementScope<'_>,
    ) -> Option<ClipTiming> {
        resolve_timing(
            common,
            TimingInput {
                repeat,
                speed,
                natural_duration,
            },
            scene.duration,
            scope,
        )
    }

    /// Measure a text run. A font file is fetched, measured and released before returning.
    fn resolve_text(
        &self,
        text: &TextElement,
        canvas: Canvas,
        scope: &mut ElementScope<'_>,
    ) -> TextResolution {
        let font_size_px = resolve_font_size(text.font_size.as_ref(), canvas, scope);

        let (font, measured) = match text.font_family.as_deref() {
            None => (
                FontRef::Default,
                self.measurer.measure(&text.text, FontSource::Default, font_size_px),
            ),
            Some(family) if is_font_file(family) => match self.fetch(family, "font_family", scope) {
                Some(font_file) => {
                    let measured = std::fs::read(font_file.path())
                        .map_err(|e| ScenecastError::fetch(format!("read font: {e}")))
                        .and_then(|bytes| {
                            self.measurer
                                .measure(&text.text, FontSource::Bytes(&bytes), font_size_px)
                        });
                    // Released here, before the descriptor exists.
                    drop(font_file);
                    (FontRef::File(family.to_owned()), measured)
                }
                None => (
                    FontRef::Default,
                    self.measurer.measure(&text.text, FontSource::Default, font_size_px),
                ),
            },
            Some(family) => (
                FontRef::Family(family.to_owned()),
                self.measurer
                    .measure(&text.text, FontSource::Family(family), font_size_px),
            ),
        };

        let natural = measured.unwrap_or_else(|e| {
            scope.report(
                DiagnosticKind::Validation,
                Some("font_family"),
                format!("text measurement failed: {e}; using approximate metrics"),
            );
            approximate_extent(&text.text, font_size_px)
        });

        TextResolution {
            font,
            font_size_px,
            natural,
        }
    }

    fn resolve_audio(
        &self,
        aud: &AudioElement,
        scene: &Scene,
        scope: &mut ElementScope<'_>,
    ) -> Option<AudioMixEntry> {
        let speed = resolve_speed(aud.speed, scope);
        let volume_gain = resolve_gain(aud.volume.as_ref(), scope);
        let (asset, info) =
            self.acquire(&aud.source, MediaKind::Audio, &aud.common, speed, scene, scope)?;
        let timing = self.timing(&aud.common, aud.repeat, speed, info.duration, scene, scope)?;
        Some(AudioMixEntry {
            id: aud.common.id.clone(),
            origin: AudioOrigin::Element,
            start_time: timing.start_time,
            duration: timing.duration,
            volume_gain,
            speed: timing.speed,
            trim: aud.common.duration,
            looping: timing.looping,
            source: SourceRef::new(&aud.source, asset),
        })
    }
}

fn native_size(info: &MediaInfo) -> Option<Size> {
    (info.width > 0 && info.height > 0)
        .then(|| Size::new(f64::from(info.width), f64::from(info.height)))
}

fn clip_descriptor(
    common: &ElementCommon,
    timing: ClipTiming,
    geometry: Geometry,
    source: ClipSource,
    scope: &mut ElementScope<'_>,
) -> Option<ClipDescriptor> {
    if geometry.width == 0 || geometry.height == 0 {
        scope.report(
            DiagnosticKind::Validation,
            None,
            "element resolves to an empty box; element dropped",
        );
        return None;
    }
    let transform = build_scale_transform(
        &common.animations,
        timing.duration,
        &common.id,
        common.origin.as_slice(),
        &mut *scope.sink,
    );
    Some(ClipDescriptor {
        id: common.id.clone(),
        track: common.track,
        start_time: timing.start_time,
        duration: timing.duration,
        speed: timing.speed,
        looping: timing.looping,
        geometry,
        transform,
        source,
    })
}

#[cfg(test)]
#[path = "../../tests/unit/compile/compiler.rs"]
mod tests;
