use std::collections::HashMap;
use std::ffi::OsString;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;

use crate::{
    animation::ease::Ease,
    animation::scale::{ScaleAnimation, ScaleTransform},
    assets::fetch::{AssetFetcher, FetchedAsset},
    compile::plan::{AudioMixEntry, ClipDescriptor, ClipSource, FontRef, RenderPlan},
    engine::{MediaEngine, RenderedArtifact},
    foundation::error::{ScenecastError, ScenecastResult},
};

/// Encoder settings for the ffmpeg adapter.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct FfmpegOpts {
    /// ffmpeg binary.
    pub program: PathBuf,
    /// Video codec (`-c:v`).
    pub video_codec: String,
    /// Audio codec (`-c:a`).
    pub audio_codec: String,
    /// Output pixel format.
    pub pix_fmt: String,
    /// Encoder preset, when the codec has one.
    pub preset: Option<String>,
    /// Constant rate factor.
    pub crf: Option<u8>,
    /// Canvas background color.
    pub background: String,
    /// Font file used for text without a font of its own.
    pub default_font_file: Option<PathBuf>,
    /// Replace an existing output file.
    pub overwrite: bool,
}

impl Default for FfmpegOpts {
    fn default() -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
            video_codec: "libx264".to_owned(),
            audio_codec: "aac".to_owned(),
            pix_fmt: "yuv420p".to_owned(),
            preset: None,
            crf: None,
            background: "black".to_owned(),
            default_font_file: None,
            overwrite: true,
        }
    }
}

impl FfmpegOpts {
    /// Reject settings ffmpeg could never accept.
    pub fn validate(&self) -> ScenecastResult<()> {
        if self.program.as_os_str().is_empty() {
            return Err(ScenecastError::validation("ffmpeg program must not be empty"));
        }
        if self.video_codec.trim().is_empty() || self.audio_codec.trim().is_empty() {
            return Err(ScenecastError::validation("ffmpeg codecs must not be empty"));
        }
        if let Some(crf) = self.crf
            && crf > 63
        {
            return Err(ScenecastError::validation("ffmpeg crf must be <= 63"));
        }
        Ok(())
    }
}

/// `true` when `program -version` runs successfully.
pub fn is_ffmpeg_available(program: &Path) -> bool {
    Command::new(program)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Create the parent directory of `path` if needed.
pub fn ensure_parent_dir(path: &Path) -> ScenecastResult<()> {
    if let Some(parent) = path.parent() {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// A complete ffmpeg command line for one plan.
#[derive(Clone, Debug)]
pub struct FfmpegInvocation {
    /// Arguments after the program name.
    pub args: Vec<OsString>,
    /// The `-filter_complex` graph, also present in `args`.
    pub filter_graph: String,
}

impl FfmpegInvocation {
    /// Arguments joined with spaces, for logs and tests.
    pub fn command_line(&self) -> String {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Format seconds without trailing zeros (`1.5`, `3`, `0.033333`).
fn secs(v: f64) -> String {
    let s = format!("{v:.6}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s.is_empty() || s == "-" {
        "0".to_owned()
    } else {
        s.to_owned()
    }
}

/// Escape a value for a drawtext option inside a filtergraph.
fn escape_filter_value(s: &str) -> String {
    let mut level1 = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | ':' | '\'' | '%') {
            level1.push('\\');
        }
        level1.push(c);
    }
    let mut level2 = String::with_capacity(level1.len());
    for c in level1.chars() {
        if matches!(c, '\\' | '\'' | '[' | ']' | ',' | ';') {
            level2.push('\\');
        }
        level2.push(c);
    }
    level2
}

fn ease_expr(ease: Ease, p: &str) -> String {
    match ease {
        Ease::Linear => p.to_owned(),
        Ease::QuadraticIn => format!("{p}*{p}"),
        Ease::QuadraticOut => format!("(1-(1-{p})*(1-{p}))"),
        Ease::QuadraticInOut => {
            format!("if(lt({p},0.5),2*{p}*{p},1-2*(1-{p})*(1-{p}))")
        }
        Ease::CubicIn => format!("{p}*{p}*{p}"),
        Ease::CubicOut => format!("(1-pow(1-{p},3))"),
        Ease::CubicInOut => format!("if(lt({p},0.5),4*{p}*{p}*{p},1-4*pow(1-{p},3))"),
    }
}

fn window_expr(a: &ScaleAnimation) -> String {
    let (s, e) = (secs(a.start_scale), secs(a.end_scale));
    let t0 = secs(a.time);
    let t1 = secs(a.end_time());
    if a.duration <= 0.0 {
        return format!("if(lte(t,{t0}),{s},{e})");
    }
    let p = format!("((t-{t0})/{})", secs(a.duration));
    format!(
        "if(lte(t,{t0}),{s},if(gte(t,{t1}),{e},{s}+({e}-{s})*{}))",
        ease_expr(a.ease, &p)
    )
}

/// ffmpeg expression in `t` (clip-local seconds) equal to [`ScaleTransform::sample`].
pub fn scale_expr(transform: &ScaleTransform) -> String {
    let mut windows = transform.animations().iter();
    let Some(first) = windows.next() else {
        return "1".to_owned();
    };
    let mut expr = window_expr(first);
    for a in windows {
        expr = format!("if(gt(t,{}),{},{expr})", secs(a.time), window_expr(a));
    }
    expr
}

/// Split a playback rate into `atempo` factors inside its supported `[0.5, 2]` range.
fn atempo_chain(speed: f64) -> Vec<f64> {
    let mut out = Vec::new();
    let mut rest = speed;
    while rest > 2.0 {
        out.push(2.0);
        rest /= 2.0;
    }
    while rest < 0.5 {
        out.push(0.5);
        rest /= 0.5;
    }
    if (rest - 1.0).abs() > 1e-9 || out.is_empty() {
        out.push(rest);
    }
    out
}

struct GraphBuilder<'a> {
    plan: &'a RenderPlan,
    opts: &'a FfmpegOpts,
    fonts: &'a HashMap<String, PathBuf>,
    args: Vec<OsString>,
    graph: Vec<String>,
    next_input: usize,
}

impl GraphBuilder<'_> {
    fn rate(&self) -> String {
        format!("{}/{}", self.plan.fps.num, self.plan.fps.den)
    }

    fn push_args<I, S>(&mut self, args: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
    }

    fn add_input(&mut self, pre: Vec<String>, path: &Path) -> usize {
        self.push_args(pre);
        self.push_args(["-i".to_owned()]);
        self.args.push(path.as_os_str().to_owned());
        let idx = self.next_input;
        self.next_input += 1;
        idx
    }

    fn base(&mut self) {
        let c = self.plan.canvas;
        let src = format!(
            "color=c={}:s={}x{}:r={}",
            self.opts.background,
            c.width,
            c.height,
            self.rate()
        );
        self.push_args([
            "-f".to_owned(),
            "lavfi".to_owned(),
            "-t".to_owned(),
            secs(self.plan.duration),
            "-i".to_owned(),
            src,
        ]);
        self.next_input = 1;
    }

    /// Per-clip chain ending in `[c{i}]`, drawn with its top-left at the clip geometry.
    fn clip_chain(&mut self, i: usize, clip: &ClipDescriptor) -> String {
        let g = clip.geometry;
        let source_secs = secs(clip.duration * clip.speed);
        let mut filters: Vec<String> = Vec::new();

        let head = match &clip.source {
            ClipSource::Image {
                source,
                layout,
                animated,
                ..
            } => {
                let mut pre = if !*animated {
                    vec![
                        "-loop".to_owned(),
                        "1".to_owned(),
                        "-framerate".to_owned(),
                        self.rate(),
                    ]
                } else if clip.looping.is_some() {
                    vec!["-ignore_loop".to_owned(), "0".to_owned()]
                } else {
                    Vec::new()
                };
                pre.extend(["-t".to_owned(), source_secs]);
                let idx = self.add_input(pre, source.path());
                filters.push(format!("setpts=(PTS-STARTPTS)/{}", secs(clip.speed)));
                filters.push(format!("scale={}:{}", layout.scaled.width, layout.scaled.height));
                if let Some(c) = layout.crop {
                    filters.push(format!("crop={}:{}:{}:{}", c.width, c.height, c.x, c.y));
                }
                format!("[{idx}:v]")
            }
            ClipSource::Video { source, layout, .. } => {
                let mut pre = Vec::new();
                if clip.looping.is_some() {
                    pre.extend(["-stream_loop".to_owned(), "-1".to_owned()]);
                }
                pre.extend(["-t".to_owned(), source_secs]);
                let idx = self.add_input(pre, source.path());
                filters.push(format!("setpts=(PTS-STARTPTS)/{}", secs(clip.speed)));
                filters.push(format!("fps={}", self.rate()));
                filters.push(format!("scale={}:{}", layout.scaled.width, layout.scaled.height));
                if let Some(c) = layout.crop {
                    filters.push(format!("crop={}:{}:{}:{}", c.width, c.height, c.x, c.y));
                }
                format!("[{idx}:v]")
            }
            ClipSource::Text {
                text,
                font,
                font_size_px,
                fill_color,
            } => {
                let mut draw = format!(
                    "drawtext=text={}:fontsize={}:fontcolor={}:x=0:y=0",
                    escape_filter_value(text),
                    secs(f64::from(*font_size_px)),
                    escape_filter_value(fill_color)
                );
                let font_file = match font {
                    FontRef::File(uri) => self.fonts.get(uri).cloned(),
                    FontRef::Family(_) | FontRef::Default => None,
                }
                .or_else(|| self.opts.default_font_file.clone());
                match (font, font_file) {
                    (_, Some(path)) => {
                        let _ = write!(
                            draw,
                            ":fontfile={}",
                            escape_filter_value(&path.to_string_lossy())
                        );
                    }
                    (FontRef::Family(name), None) => {
                        let _ = write!(draw, ":font={}", escape_filter_value(name));
                    }
                    _ => {}
                }
                format!(
                    "color=c=black@0.0:s={}x{}:r={}:d={},format=rgba,{draw}",
                    g.width,
                    g.height,
                    self.rate(),
                    secs(clip.duration)
                )
            }
        };

        filters.push("format=rgba".to_owned());
        if !clip.transform.is_identity() {
            let e = scale_expr(&clip.transform);
            filters.push(format!(
                "scale=w='max(2,trunc({w}*({e})/2)*2)':h='max(2,trunc({h}*({e})/2)*2)':eval=frame",
                w = g.width,
                h = g.height
            ));
        }
        filters.push(format!("setpts=PTS+{}/TB", secs(clip.start_time)));

        let chain = if head.starts_with('[') {
            format!("{head}{}[c{i}]", filters.join(","))
        } else {
            format!("{head},{}[c{i}]", filters.join(","))
        };
        self.graph.push(chain);
        format!("[c{i}]")
    }

    fn overlay(&mut self, i: usize, prev: &str, clip_label: &str, clip: &ClipDescriptor) -> String {
        let g = clip.geometry;
        let (x, y) = if clip.transform.is_identity() {
            (g.x.to_string(), g.y.to_string())
        } else {
            let c = g.center();
            (
                format!("{}-overlay_w/2", secs(c.x)),
                format!("{}-overlay_h/2", secs(c.y)),
            )
        };
        let span = clip.span();
        let out = format!("[v{i}]");
        self.graph.push(format!(
            "{prev}{clip_label}overlay=x={x}:y={y}:eof_action=pass:enable='between(t,{},{})'{out}",
            secs(span.start),
            secs(span.end)
        ));
        out
    }

    fn audio_chain(&mut self, j: usize, entry: &AudioMixEntry) -> String {
        let mut pre = Vec::new();
        if entry.looping.is_some() {
            pre.extend(["-stream_loop".to_owned(), "-1".to_owned()]);
        }
        let idx = self.add_input(pre, entry.source.path());

        let mut filters = Vec::new();
        if let Some(trim) = entry.trim {
            filters.push(format!("atrim=end={}", secs(trim)));
        }
        filters.push("asetpts=PTS-STARTPTS".to_owned());
        for factor in atempo_chain(entry.speed) {
            if (factor - 1.0).abs() > 1e-9 {
                filters.push(format!("atempo={}", secs(factor)));
            }
        }
        filters.push(format!("volume={}", secs(entry.volume_gain)));
        filters.push(format!("atrim=end={}", secs(entry.duration)));
        let delay_ms = (entry.start_time * 1000.0).round() as u64;
        filters.push(format!("adelay={delay_ms}:all=1"));

        let label = format!("[a{j}]");
        self.graph
            .push(format!("[{idx}:a]{}{label}", filters.join(",")));
        label
    }
}

/// Compile `plan` into one ffmpeg command writing to `out`.
///
/// `fonts` maps font URIs to local files; text whose font is missing there falls back to the
/// configured default font. Pure: nothing is spawned or written.
pub fn build_invocation(
    plan: &RenderPlan,
    out: &Path,
    opts: &FfmpegOpts,
    fonts: &HashMap<String, PathBuf>,
) -> ScenecastResult<FfmpegInvocation> {
    if plan.is_empty() {
        return Err(ScenecastError::no_renderable_content(
            "render plan has no visual clips",
        ));
    }
    let mut b = GraphBuilder {
        plan,
        opts,
        fonts,
        args: Vec::new(),
        graph: Vec::new(),
        next_input: 0,
    };
    b.push_args([
        if opts.overwrite { "-y" } else { "-n" },
        "-hide_banner",
        "-loglevel",
        "error",
    ]);
    b.base();

    let mut prev = "[0:v]".to_owned();
    for (i, clip) in plan.clips.iter().enumerate() {
        let label = b.clip_chain(i, clip);
        prev = b.overlay(i, &prev, &label, clip);
    }
    b.graph.push(format!("{prev}null[vout]"));

    let mut audio_labels = Vec::new();
    for (j, entry) in plan.audio.entries.iter().enumerate() {
        audio_labels.push(b.audio_chain(j, entry));
    }
    let has_audio = !audio_labels.is_empty();
    if has_audio {
        b.graph.push(format!(
            "{}amix=inputs={}:duration=longest:normalize=0[aout]",
            audio_labels.concat(),
            audio_labels.len()
        ));
    }

    let filter_graph = b.graph.join(";");
    let mut args = b.args;
    args.extend(
        ["-filter_complex", filter_graph.as_str(), "-map", "[vout]"]
            .into_iter()
            .map(OsString::from),
    );
    if has_audio {
        args.extend(["-map", "[aout]", "-c:a", opts.audio_codec.as_str()].map(OsString::from));
    }
    args.extend(
        [
            "-c:v",
            opts.video_codec.as_str(),
            "-pix_fmt",
            opts.pix_fmt.as_str(),
        ]
        .map(OsString::from),
    );
    if let Some(preset) = &opts.preset {
        args.extend(["-preset", preset.as_str()].map(OsString::from));
    }
    if let Some(crf) = opts.crf {
        args.push("-crf".into());
        args.push(crf.to_string().into());
    }
    args.push("-r".into());
    args.push(format!("{}/{}", plan.fps.num, plan.fps.den).into());
    args.push("-t".into());
    args.push(secs(plan.duration).into());
    args.extend(["-movflags", "+faststart"].map(OsString::from));
    args.push(out.as_os_str().to_owned());

    Ok(FfmpegInvocation { args, filter_graph })
}

/// Production [`MediaEngine`]: one `ffmpeg` process per plan.
pub struct FfmpegEngine {
    opts: FfmpegOpts,
    fetcher: Arc<dyn AssetFetcher>,
}

impl FfmpegEngine {
    /// Engine using `fetcher` to re-acquire font files at render time.
    pub fn new(opts: FfmpegOpts, fetcher: Arc<dyn AssetFetcher>) -> Self {
        Self { opts, fetcher }
    }

    /// Encoder settings.
    pub fn opts(&self) -> &FfmpegOpts {
        &self.opts
    }

    fn fetch_fonts(&self, plan: &RenderPlan) -> (HashMap<String, PathBuf>, Vec<FetchedAsset>) {
        let mut paths = HashMap::new();
        let mut held = Vec::new();
        for clip in &plan.clips {
            let ClipSource::Text {
                font: FontRef::File(uri),
                ..
            } = &clip.source
            else {
                continue;
            };
            if paths.contains_key(uri) {
                continue;
            }
            match self.fetcher.fetch(uri) {
                Ok(asset) => {
                    paths.insert(uri.clone(), asset.path().to_path_buf());
                    held.push(asset);
                }
                Err(e) => {
                    tracing::warn!(clip = %clip.id, font = %uri, error = %e, "font unavailable, using default");
                }
            }
        }
        (paths, held)
    }
}

impl MediaEngine for FfmpegEngine {
    #[tracing::instrument(skip(self, plan, out), fields(out = %out.display(), clips = plan.clips.len()))]
    fn render(&self, plan: &RenderPlan, out: &Path) -> ScenecastResult<RenderedArtifact> {
        ensure_parent_dir(out)?;
        if !self.opts.overwrite && out.exists() {
            return Err(ScenecastError::render(format!(
                "output file '{}' already exists",
                out.display()
            )));
        }

        // Font files stay on disk until ffmpeg exits.
        let (fonts, _held) = self.fetch_fonts(plan);
        let invocation = build_invocation(plan, out, &self.opts, &fonts)?;
        tracing::debug!(graph = %invocation.filter_graph, "spawning ffmpeg");

        let output = Command::new(&self.opts.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| {
                ScenecastError::render(format!(
                    "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
                ))
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ScenecastError::render(format!(
                "ffmpeg exited with status {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let size_bytes = std::fs::metadata(out)
            .map_err(|e| {
                ScenecastError::render(format!("ffmpeg produced no file at '{}': {e}", out.display()))
            })?
            .len();
        tracing::info!(size_bytes, "render finished");
        Ok(RenderedArtifact {
            path: out.to_path_buf(),
            size_bytes,
        })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/engine/ffmpeg.rs"]
mod tests;
