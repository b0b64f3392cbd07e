use super::*;
use crate::assets::probe::MediaInfo;
use crate::compile::compiler::Compiler;
use crate::foundation::cancel::CancelToken;
use crate::foundation::diagnostics::Diagnostics;
use crate::scene::parse::parse_scene;
use crate::test_support::{FixedMeasurer, StubFetcher, StubProbe};
use serde_json::json;

fn plan_for(scene: serde_json::Value, probe: StubProbe) -> RenderPlan {
    let mut sink = Diagnostics::new();
    let scene = parse_scene(&scene, &mut sink).unwrap();
    let fetcher = StubFetcher::new();
    Compiler::new(&fetcher, &probe, &FixedMeasurer)
        .compile(&scene, &mut sink, &CancelToken::new())
        .unwrap()
}

fn invocation(plan: &RenderPlan) -> FfmpegInvocation {
    build_invocation(
        plan,
        Path::new("/tmp/out.mp4"),
        &FfmpegOpts::default(),
        &HashMap::new(),
    )
    .unwrap()
}

#[test]
fn cover_image_is_scaled_cropped_and_overlaid_for_its_window() {
    let plan = plan_for(
        json!({
            "width": 640, "height": 360, "duration": 5,
            "elements": [{"id": "bg", "type": "image", "source": "square.png", "time": 1, "duration": 2}]
        }),
        StubProbe::new().with(
            "square.png",
            MediaInfo { width: 1000, height: 1000, duration: None, has_audio: false },
        ),
    );
    let inv = invocation(&plan);
    let g = &inv.filter_graph;
    assert!(g.starts_with("[1:v]setpts=(PTS-STARTPTS)/1,scale=640:640,crop=640:360:0:140,format=rgba"));
    assert!(g.contains("overlay=x=0:y=0:eof_action=pass:enable='between(t,1,3)'[v0]"));
    assert!(g.ends_with("[v0]null[vout]"));

    let cmd = inv.command_line();
    assert!(cmd.contains("-f lavfi -t 5 -i color=c=black:s=640x360:r=30/1"));
    assert!(cmd.contains("-loop 1 -framerate 30/1 -t 2 -i"));
    assert!(cmd.contains("-map [vout]"));
    assert!(!cmd.contains("[aout]"));
    assert!(cmd.contains("-c:v libx264 -pix_fmt yuv420p"));
    assert!(cmd.ends_with("-movflags +faststart /tmp/out.mp4"));
}

#[test]
fn overlays_follow_plan_order() {
    let plan = plan_for(
        json!({
            "width": 320, "height": 180, "duration": 4,
            "elements": [
                {"id": "top", "type": "image", "source": "a.png", "track": 1},
                {"id": "bottom", "type": "image", "source": "b.png", "track": 0}
            ]
        }),
        StubProbe::new(),
    );
    let g = invocation(&plan).filter_graph;
    let first = g.find("[0:v][c0]overlay").unwrap();
    let second = g.find("[v0][c1]overlay").unwrap();
    assert!(first < second);
    assert_eq!(plan.clips[0].id, "bottom");
}

#[test]
fn text_is_drawn_on_a_transparent_box_with_escaping() {
    let plan = plan_for(
        json!({
            "width": 640, "height": 360, "duration": 5,
            "elements": [{"id": "t", "type": "text", "text": "It's 50%: ok", "fill_color": "#ff0000"}]
        }),
        StubProbe::new(),
    );
    let g = invocation(&plan).filter_graph;
    assert!(g.starts_with("color=c=black@0.0:s=120x20:r=30/1:d=5,format=rgba,drawtext=text="));
    assert!(g.contains(r"It\\\'s 50\\%\\: ok"));
    assert!(g.contains("fontcolor=#ff0000"));
    assert!(!g.contains("fontfile="));
}

#[test]
fn font_files_and_family_names_reach_drawtext() {
    let plan = plan_for(
        json!({
            "width": 640, "height": 360, "duration": 5,
            "elements": [
                {"id": "a", "type": "text", "text": "A", "font_family": "https://fonts.example.com/Inter.ttf"},
                {"id": "b", "type": "text", "text": "B", "font_family": "Inter"}
            ]
        }),
        StubProbe::new(),
    );
    let mut fonts = HashMap::new();
    fonts.insert(
        "https://fonts.example.com/Inter.ttf".to_owned(),
        PathBuf::from("/tmp/inter.ttf"),
    );
    let inv = build_invocation(&plan, Path::new("/tmp/o.mp4"), &FfmpegOpts::default(), &fonts)
        .unwrap();
    assert!(inv.filter_graph.contains(r"fontfile=/tmp/inter.ttf"));
    assert!(inv.filter_graph.contains("font=Inter"));
}

#[test]
fn looping_video_loops_its_input_and_contributes_audio() {
    let plan = plan_for(
        json!({
            "width": 640, "height": 360, "duration": 8,
            "elements": [{"id": "v", "type": "video", "source": "clip.mp4", "repeat": true, "speed": 2}]
        }),
        StubProbe::new().with(
            "clip.mp4",
            MediaInfo { width: 640, height: 360, duration: Some(3.0), has_audio: true },
        ),
    );
    let inv = invocation(&plan);
    let cmd = inv.command_line();
    assert!(cmd.contains("-stream_loop -1 -t 16 -i"));
    assert!(inv.filter_graph.contains("setpts=(PTS-STARTPTS)/2"));
    assert!(inv.filter_graph.contains("atempo=2,volume=1,atrim=end=8,adelay=0:all=1[a0]"));
    assert!(inv.filter_graph.contains("[a0]amix=inputs=1:duration=longest:normalize=0[aout]"));
    assert!(cmd.contains("-map [aout] -c:a aac"));
}

#[test]
fn audio_entries_are_trimmed_delayed_and_mixed() {
    let plan = plan_for(
        json!({
            "width": 640, "height": 360, "duration": 10,
            "elements": [
                {"id": "bg", "type": "image", "source": "bg.png"},
                {"id": "music", "type": "audio", "source": "music.mp3", "volume": "50%", "time": 1.5, "duration": 4},
                {"id": "vo", "type": "audio", "source": "vo.mp3", "time": 2}
            ]
        }),
        StubProbe::new(),
    );
    let g = invocation(&plan).filter_graph;
    assert!(g.contains("atrim=end=4,asetpts=PTS-STARTPTS,volume=0.5,atrim=end=4,adelay=1500:all=1[a0]"));
    assert!(g.contains("adelay=2000:all=1[a1]"));
    assert!(g.contains("[a0][a1]amix=inputs=2:duration=longest:normalize=0[aout]"));
}

#[test]
fn plan_with_only_audio_is_refused() {
    let mut plan = plan_for(
        json!({
            "width": 320, "height": 180, "duration": 4,
            "elements": [
                {"id": "bg", "type": "image", "source": "bg.png"},
                {"id": "music", "type": "audio", "source": "music.mp3"}
            ]
        }),
        StubProbe::new(),
    );
    plan.clips.clear();
    assert!(plan.is_empty());
    let res = build_invocation(&plan, Path::new("/tmp/out.mp4"), &FfmpegOpts::default(), &HashMap::new());
    assert!(matches!(res, Err(ScenecastError::NoRenderableContent(_))));
}

#[test]
fn animated_scale_becomes_a_per_frame_expression() {
    let plan = plan_for(
        json!({
            "width": 640, "height": 360, "duration": 5,
            "elements": [{
                "id": "t", "type": "text", "text": "Zoom",
                "animations": [{"type": "scale", "time": 0, "duration": 2, "start_scale": "100%", "end_scale": "150%", "easing": "quadratic-in"}]
            }]
        }),
        StubProbe::new(),
    );
    let g = invocation(&plan).filter_graph;
    assert!(g.contains(
        "if(lte(t,0),1,if(gte(t,2),1.5,1+(1.5-1)*((t-0)/2)*((t-0)/2)))"
    ));
    assert!(g.contains(":eval=frame"));
    assert!(g.contains("overlay=x=320-overlay_w/2:y=180-overlay_h/2"));
}

#[test]
fn scale_expression_prefers_latest_started_window() {
    let t = ScaleTransform::new(vec![
        ScaleAnimation { time: 0.0, duration: 1.0, start_scale: 1.0, end_scale: 2.0, ease: Ease::Linear },
        ScaleAnimation { time: 3.0, duration: 0.0, start_scale: 2.0, end_scale: 0.5, ease: Ease::Linear },
    ]);
    assert_eq!(
        scale_expr(&t),
        "if(gt(t,3),if(lte(t,3),2,0.5),if(lte(t,0),1,if(gte(t,1),2,1+(2-1)*((t-0)/1))))"
    );
    assert_eq!(scale_expr(&ScaleTransform::identity()), "1");
}

#[test]
fn atempo_factors_stay_in_range() {
    assert_eq!(atempo_chain(1.0), vec![1.0]);
    assert_eq!(atempo_chain(5.0), vec![2.0, 2.0, 1.25]);
    assert_eq!(atempo_chain(0.25), vec![0.5, 0.5]);
}

#[test]
fn seconds_are_formatted_compactly() {
    assert_eq!(secs(3.0), "3");
    assert_eq!(secs(1.5), "1.5");
    assert_eq!(secs(1.0 / 3.0), "0.333333");
    assert_eq!(secs(0.0), "0");
}

#[test]
fn encoder_options_are_forwarded() {
    let plan = plan_for(
        json!({"width": 64, "height": 64, "duration": 1,
               "elements": [{"id": "a", "type": "image", "source": "a.png"}]}),
        StubProbe::new(),
    );
    let opts = FfmpegOpts {
        preset: Some("veryfast".to_owned()),
        crf: Some(23),
        overwrite: false,
        ..FfmpegOpts::default()
    };
    let cmd = build_invocation(&plan, Path::new("/tmp/x.mp4"), &opts, &HashMap::new())
        .unwrap()
        .command_line();
    assert!(cmd.starts_with("-n -hide_banner -loglevel error"));
    assert!(cmd.contains("-preset veryfast -crf 23"));
    assert!(opts.validate().is_ok());
    assert!(FfmpegOpts { crf: Some(99), ..FfmpegOpts::default() }.validate().is_err());
}

#[test]
fn missing_ffmpeg_is_a_render_error() {
    let plan = plan_for(
        json!({"width": 64, "height": 64, "duration": 1,
               "elements": [{"id": "a", "type": "image", "source": "a.png"}]}),
        StubProbe::new(),
    );
    let engine = FfmpegEngine::new(
        FfmpegOpts {
            program: PathBuf::from("/definitely/not/ffmpeg"),
            ..FfmpegOpts::default()
        },
        Arc::new(StubFetcher::new()),
    );
    let out = crate::test_support::scratch_dir("ffmpeg").join("out.mp4");
    let err = engine.render(&plan, &out).unwrap_err();
    assert!(matches!(err, ScenecastError::Render(_)));
    assert!(err.to_string().contains("failed to spawn ffmpeg"));
    assert!(!is_ffmpeg_available(Path::new("/definitely/not/ffmpeg")));
}
