use super::*;
use crate::foundation::error::ScenecastError;
use crate::test_support::{
    FixedMeasurer, RecordingEngine, RecordingNotifier, StubFetcher, StubProbe, scratch_dir,
};
use serde_json::json;

struct Harness {
    runner: JobRunner,
    fetcher: Arc<StubFetcher>,
    engine: Arc<RecordingEngine>,
    notifier: Arc<RecordingNotifier>,
}

fn harness(engine: RecordingEngine, notifier: RecordingNotifier) -> Harness {
    let fetcher = Arc::new(StubFetcher::new());
    let engine = Arc::new(engine);
    let notifier = Arc::new(notifier);
    let parts = Collaborators {
        fetcher: fetcher.clone(),
        probe: Arc::new(StubProbe::new()),
        measurer: Arc::new(FixedMeasurer),
        engine: engine.clone(),
        notifier: notifier.clone(),
    };
    Harness {
        runner: JobRunner::new(parts, scratch_dir("jobs"), RetryPolicy::immediate(3)),
        fetcher,
        engine,
        notifier,
    }
}

fn request(id: &str, elements: serde_json::Value) -> JobRequest {
    JobRequest {
        id: id.to_owned(),
        scene: json!({"width": 640, "height": 360, "duration": 5, "elements": elements}),
        webhook_url: Some("https://hooks.example.com/done".to_owned()),
    }
}

#[test]
fn successful_job_renders_and_notifies_once() {
    let h = harness(RecordingEngine::new(), RecordingNotifier::failing_first(0));
    let req = request(
        "job-1",
        json!([
            {"id": "bg", "type": "image", "source": "bg.png"},
            {"id": "bad", "type": "sticker"}
        ]),
    );
    let report = h.runner.run(&req, &CancelToken::new());

    assert!(report.is_success());
    assert_eq!(report.diagnostics.len(), 1);
    let JobOutcome::Succeeded { artifact } = &report.outcome else {
        panic!("expected success, got {:?}", report.outcome);
    };
    assert!(artifact.path.ends_with("job-1.mp4"));
    assert!(artifact.path.exists());

    let rendered = h.engine.rendered();
    assert_eq!(rendered.len(), 1);
    assert_eq!(rendered[0].0, ["bg"]);
    assert!(rendered[0].1, "sources must exist while the engine runs");
    // Downloads are released once the job is over.
    assert_eq!(h.fetcher.live_files(), 0);

    let delivered = h.notifier.delivered();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].job_id, "job-1");
    assert_eq!(report.delivery, DeliveryStatus::Delivered { attempts: 1 });
}

#[test]
fn job_without_renderable_content_reports_failure_to_the_caller() {
    let h = harness(RecordingEngine::new(), RecordingNotifier::failing_first(0));
    let req = request("job-2", json!([{"id": "x", "type": "image"}]));
    let report = h.runner.run(&req, &CancelToken::new());

    assert!(!report.is_success());
    let JobOutcome::Failed { error } = &report.outcome else {
        panic!("expected failure");
    };
    assert!(error.starts_with("no renderable content"));
    assert!(h.engine.rendered().is_empty());
    let delivered = h.notifier.delivered();
    assert_eq!(delivered.len(), 1);
    assert!(matches!(delivered[0].outcome, JobOutcome::Failed { .. }));
}

#[test]
fn engine_failure_is_reported_not_swallowed() {
    let h = harness(RecordingEngine::failing(), RecordingNotifier::failing_first(0));
    let req = request("job-3", json!([{"id": "bg", "type": "image", "source": "bg.png"}]));
    let report = h.runner.run(&req, &CancelToken::new());
    let JobOutcome::Failed { error } = &report.outcome else {
        panic!("expected failure");
    };
    assert!(error.starts_with("render error"));
    assert_eq!(h.notifier.delivered().len(), 1);
}

#[test]
fn webhook_recovering_on_third_attempt_still_succeeds() {
    let h = harness(RecordingEngine::new(), RecordingNotifier::failing_first(2));
    let req = request("job-4", json!([{"id": "bg", "type": "image", "source": "bg.png"}]));
    let report = h.runner.run(&req, &CancelToken::new());
    assert!(report.is_success());
    assert_eq!(report.delivery, DeliveryStatus::Delivered { attempts: 3 });
    assert_eq!(h.notifier.attempts(), 3);
}

#[test]
fn exhausted_webhook_marks_the_job_failed_for_delivery() {
    let h = harness(RecordingEngine::new(), RecordingNotifier::failing_first(5));
    let req = request("job-5", json!([{"id": "bg", "type": "image", "source": "bg.png"}]));
    let report = h.runner.run(&req, &CancelToken::new());
    assert!(matches!(report.outcome, JobOutcome::Succeeded { .. }));
    assert!(matches!(report.delivery, DeliveryStatus::Failed { .. }));
    assert!(!report.is_success());
    assert_eq!(h.notifier.attempts(), 3);
}

#[test]
fn cancelled_job_is_never_rendered_but_is_notified() {
    let h = harness(RecordingEngine::new(), RecordingNotifier::failing_first(0));
    let cancel = CancelToken::new();
    cancel.cancel();
    let req = request("job-6", json!([{"id": "bg", "type": "image", "source": "bg.png"}]));
    let report = h.runner.run(&req, &cancel);
    let JobOutcome::Failed { error } = &report.outcome else {
        panic!("expected failure");
    };
    assert_eq!(error, &ScenecastError::Cancelled.to_string());
    assert!(h.engine.rendered().is_empty());
    assert_eq!(h.notifier.delivered().len(), 1);
}

#[test]
fn no_webhook_means_no_delivery() {
    let h = harness(RecordingEngine::new(), RecordingNotifier::failing_first(0));
    let mut req = request("job-7", json!([{"id": "t", "type": "text", "text": "hi"}]));
    req.webhook_url = None;
    let report = h.runner.run(&req, &CancelToken::new());
    assert_eq!(report.delivery, DeliveryStatus::Skipped);
    assert_eq!(h.notifier.attempts(), 0);
}

#[test]
fn output_names_are_sanitized() {
    let h = harness(RecordingEngine::new(), RecordingNotifier::failing_first(0));
    let path = h.runner.output_path("../etc/passwd");
    assert_eq!(path.file_name().unwrap(), "___etc_passwd.mp4");
    assert!(h.runner.output_path("").ends_with("job.mp4"));
}

#[test]
fn ffprobe_sits_next_to_ffmpeg() {
    assert_eq!(ffprobe_name(Path::new("/opt/bin/ffmpeg")), "ffprobe");
    assert_eq!(ffprobe_name(Path::new("ffmpeg-7")), "ffprobe-7");
    assert_eq!(ffprobe_name(Path::new("avconv")), "ffprobe");
}

#[test]
fn request_deserializes_with_optional_webhook() {
    let req: JobRequest =
        serde_json::from_value(json!({"id": "a", "scene": {"width": 1}})).unwrap();
    assert!(req.webhook_url.is_none());
}

#[test]
fn scene_files_with_the_same_stem_get_distinct_outputs() {
    let dir = scratch_dir("scene-files");
    let scene = r#"{"width": 320, "height": 180, "duration": 2, "elements": []}"#;
    let mut paths = Vec::new();
    for sub in ["a", "b", "c"] {
        std::fs::create_dir_all(dir.join(sub)).unwrap();
        let p = dir.join(sub).join("x.json");
        std::fs::write(&p, scene).unwrap();
        paths.push(p);
    }
    let other = dir.join("a").join("x y.json");
    std::fs::write(&other, scene).unwrap();
    paths.push(other);

    let requests = JobRequest::from_scene_files(&paths, Some("https://hooks.example.com/done")).unwrap();
    let ids: Vec<_> = requests.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, ["x", "x-1", "x-2", "x y"]);
    assert!(requests.iter().all(|r| r.webhook_url.as_deref() == Some("https://hooks.example.com/done")));
    assert_eq!(requests[1].scene["width"], 320);

    let h = harness(RecordingEngine::new(), RecordingNotifier::failing_first(0));
    let outputs: std::collections::HashSet<_> =
        requests.iter().map(|r| h.runner.output_path(&r.id)).collect();
    assert_eq!(outputs.len(), requests.len());
}

#[test]
fn unreadable_scene_file_is_an_error() {
    let dir = scratch_dir("scene-files-bad");
    let bad = dir.join("bad.json");
    std::fs::write(&bad, "{not json").unwrap();
    assert!(matches!(
        JobRequest::from_scene_files(&[bad], None),
        Err(ScenecastError::Serde(_))
    ));
    assert!(JobRequest::from_scene_files(&[dir.join("missing.json")], None).is_err());
}
