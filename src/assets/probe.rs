use std::path::{Path, PathBuf};

use image::AnimationDecoder as _;

use crate::foundation::error::{ScenecastError, ScenecastResult};

/// What kind of stream a source is expected to carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
    /// Still image or animated frame sequence (GIF).
    Image,
    /// Video with optional audio.
    Video,
    /// Audio only.
    Audio,
}

/// Native properties of a fetched source.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct MediaInfo {
    /// Pixel width; `0` for audio.
    pub width: u32,
    /// Pixel height; `0` for audio.
    pub height: u32,
    /// Natural duration in seconds; `None` for stills.
    pub duration: Option<f64>,
    /// Whether the source carries an audio stream.
    pub has_audio: bool,
}

/// Reads native dimensions and durations from fetched sources.
pub trait MediaProbe: Send + Sync {
    /// Inspect `path`, expecting a source of `kind`.
    fn probe(&self, path: &Path, kind: MediaKind) -> ScenecastResult<MediaInfo>;
}

/// Probes images in-process with `image` and everything else with `ffprobe`.
#[derive(Clone, Debug)]
pub struct FfprobeProbe {
    ffprobe: PathBuf,
}

impl Default for FfprobeProbe {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

impl FfprobeProbe {
    /// Use the given `ffprobe` binary.
    pub fn new(ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffprobe: ffprobe.into(),
        }
    }
}

impl MediaProbe for FfprobeProbe {
    fn probe(&self, path: &Path, kind: MediaKind) -> ScenecastResult<MediaInfo> {
        match kind {
            MediaKind::Image => probe_image(path),
            MediaKind::Video | MediaKind::Audio => {
                let info = probe_stream(&self.ffprobe, path)?;
                if kind == MediaKind::Video && (info.width == 0 || info.height == 0) {
                    return Err(ScenecastError::fetch(format!(
                        "no video stream found in '{}'",
                        path.display()
                    )));
                }
                Ok(info)
            }
        }
    }
}

/// Dimensions of an image; animated GIFs also report the sum of their frame delays.
pub fn probe_image(path: &Path) -> ScenecastResult<MediaInfo> {
    let reader = image::ImageReader::open(path)
        .and_then(|r| r.with_guessed_format())
        .map_err(|e| ScenecastError::fetch(format!("open image '{}': {e}", path.display())))?;
    let format = reader.format();
    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| ScenecastError::fetch(format!("decode image '{}': {e}", path.display())))?;

    let duration = if format == Some(image::ImageFormat::Gif) {
        gif_duration(path)?
    } else {
        None
    };
    Ok(MediaInfo {
        width,
        height,
        duration,
        has_audio: false,
    })
}

fn gif_duration(path: &Path) -> ScenecastResult<Option<f64>> {
    let file = std::fs::File::open(path)
        .map_err(|e| ScenecastError::fetch(format!("open gif '{}': {e}", path.display())))?;
    let decoder = image::codecs::gif::GifDecoder::new(std::io::BufReader::new(file))
        .map_err(|e| ScenecastError::fetch(format!("decode gif '{}': {e}", path.display())))?;

    let mut frames = 0usize;
    let mut total_ms = 0.0f64;
    for frame in decoder.into_frames() {
        let frame =
            frame.map_err(|e| ScenecastError::fetch(format!("gif frame '{}': {e}", path.display())))?;
        let (num, den) = frame.delay().numer_denom_ms();
        if den > 0 {
            total_ms += f64::from(num) / f64::from(den);
        }
        frames += 1;
    }
    if frames <= 1 || total_ms <= 0.0 {
        return Ok(None);
    }
    Ok(Some(total_ms / 1000.0))
}

fn probe_stream(ffprobe: &Path, path: &Path) -> ScenecastResult<MediaInfo> {
    #[derive(serde::Deserialize)]
    struct ProbeStream {
        codec_type: Option<String>,
        width: Option<u32>,
        height: Option<u32>,
        duration: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeFormat {
        duration: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeOut {
        #[serde(default)]
        streams: Vec<ProbeStream>,
        format: Option<ProbeFormat>,
    }

    let out = std::process::Command::new(ffprobe)
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(path)
        .output()
        .map_err(|e| ScenecastError::fetch(format!("failed to run ffprobe: {e}")))?;
    if !out.status.success() {
        return Err(ScenecastError::fetch(format!(
            "ffprobe failed for '{}': {}",
            path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let parsed: ProbeOut = serde_json::from_slice(&out.stdout)
        .map_err(|e| ScenecastError::fetch(format!("ffprobe json parse failed: {e}")))?;
    let video = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"));
    let audio = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("audio"));

    let duration = parsed
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .or_else(|| video.or(audio).and_then(|s| s.duration.as_deref()))
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0);
    if video.is_none() && audio.is_none() {
        return Err(ScenecastError::fetch(format!(
            "no audio or video stream in '{}'",
            path.display()
        )));
    }

    Ok(MediaInfo {
        width: video.and_then(|s| s.width).unwrap_or(0),
        height: video.and_then(|s| s.height).unwrap_or(0),
        duration,
        has_audio: audio.is_some(),
    })
}

#[cfg(test)]
#[path = "../../tests/unit/assets/probe.rs"]
mod tests;
