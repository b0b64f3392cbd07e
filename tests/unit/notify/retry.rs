use super::*;
use crate::test_support::RecordingNotifier;

fn failed(job: &str) -> JobNotification {
    JobNotification {
        job_id: job.to_owned(),
        endpoint: "https://hooks.example.com/done".to_owned(),
        outcome: JobOutcome::Failed {
            error: "render error: boom".to_owned(),
        },
    }
}

#[test]
fn receiver_failing_twice_then_succeeding_takes_three_attempts() {
    let notifier = RecordingNotifier::failing_first(2);
    let attempts = deliver_with_retry(&notifier, &failed("job-1"), &RetryPolicy::immediate(3)).unwrap();
    assert_eq!(attempts, 3);
    assert_eq!(notifier.attempts(), 3);
    assert_eq!(notifier.delivered().len(), 1);
}

#[test]
fn exhausted_retries_surface_as_delivery_error() {
    let notifier = RecordingNotifier::failing_first(10);
    let err = deliver_with_retry(&notifier, &failed("job-2"), &RetryPolicy::immediate(3)).unwrap_err();
    assert!(matches!(err, ScenecastError::Delivery(_)));
    assert!(err.to_string().contains("3 attempts"));
    assert_eq!(notifier.attempts(), 3);
    assert!(notifier.delivered().is_empty());
}

#[test]
fn first_success_stops_retrying() {
    let notifier = RecordingNotifier::failing_first(0);
    assert_eq!(
        deliver_with_retry(&notifier, &failed("job-3"), &RetryPolicy::default()).unwrap(),
        1
    );
}

#[test]
fn backoff_grows_exponentially() {
    let policy = RetryPolicy::default();
    assert_eq!(policy.backoff(1), Duration::from_millis(500));
    assert_eq!(policy.backoff(2), Duration::from_millis(1000));
    assert_eq!(policy.backoff(3), Duration::from_millis(2000));
    assert_eq!(RetryPolicy::immediate(3).backoff(2), Duration::ZERO);
}

#[test]
fn zero_attempts_is_invalid() {
    assert!(RetryPolicy::immediate(0).validate().is_err());
    assert!(RetryPolicy::default().validate().is_ok());
}

#[test]
fn outcome_serializes_with_status_tag() {
    let v = serde_json::to_value(failed("job-4")).unwrap();
    assert_eq!(v["outcome"]["status"], "failed");
    assert_eq!(v["job_id"], "job-4");
}
