use super::*;
use crate::engine::RenderedArtifact;

fn strings(args: &[OsString]) -> Vec<String> {
    args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
}

#[test]
fn success_uploads_video_as_multipart() {
    let n = JobNotification {
        job_id: "job-1".to_owned(),
        endpoint: "https://hooks.example.com/done".to_owned(),
        outcome: JobOutcome::Succeeded {
            artifact: RenderedArtifact {
                path: PathBuf::from("/tmp/out/job-1.mp4"),
                size_bytes: 42,
            },
        },
    };
    let args = strings(&CurlWebhookSender::new().curl_args(&n).unwrap());
    assert!(args.windows(2).any(|w| w == ["--form", "video=@/tmp/out/job-1.mp4"]));
    assert!(args.windows(2).any(|w| w == ["--form-string", "job_id=job-1"]));
    assert!(args.contains(&"--fail".to_owned()));
    assert_eq!(args.last().unwrap(), "https://hooks.example.com/done");
}

#[test]
fn failure_posts_json_body() {
    let n = JobNotification {
        job_id: "job-2".to_owned(),
        endpoint: "https://hooks.example.com/done".to_owned(),
        outcome: JobOutcome::Failed {
            error: "no renderable content: nothing left".to_owned(),
        },
    };
    let args = strings(&CurlWebhookSender::new().curl_args(&n).unwrap());
    let idx = args.iter().position(|a| a == "--data-binary").unwrap();
    let body: serde_json::Value = serde_json::from_str(&args[idx + 1]).unwrap();
    assert_eq!(body["status"], "failed");
    assert_eq!(body["job_id"], "job-2");
    assert_eq!(body["error"], "no renderable content: nothing left");
    assert!(args.contains(&"Content-Type: application/json".to_owned()));
}

#[test]
fn missing_curl_is_a_delivery_error() {
    let n = JobNotification {
        job_id: "job-3".to_owned(),
        endpoint: "https://hooks.example.com/done".to_owned(),
        outcome: JobOutcome::Failed {
            error: "x".to_owned(),
        },
    };
    let sender = CurlWebhookSender::new().with_program("/definitely/not/curl");
    assert!(matches!(sender.send(&n), Err(ScenecastError::Delivery(_))));
}
