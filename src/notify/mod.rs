//! Notification Sender boundary: tells the caller how a job ended.

use std::time::Duration;

use crate::{
    engine::RenderedArtifact,
    foundation::error::{ScenecastError, ScenecastResult},
};

pub(crate) mod webhook;

/// How a job ended, as reported to the caller.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    /// The artifact was rendered.
    Succeeded {
        /// Rendered file.
        artifact: RenderedArtifact,
    },
    /// The job failed before producing an artifact.
    Failed {
        /// Human-readable error.
        error: String,
    },
}

/// One message to a caller-supplied endpoint.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct JobNotification {
    /// Job the message is about.
    pub job_id: String,
    /// Where to deliver it.
    pub endpoint: String,
    /// Result of the job.
    pub outcome: JobOutcome,
}

/// Delivers a single notification attempt.
pub trait NotificationSender: Send + Sync {
    /// Try once; any error counts as a failed attempt.
    fn send(&self, notification: &JobNotification) -> ScenecastResult<()>;
}

/// Attempts and exponential backoff for delivery.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first.
    pub max_attempts: u32,
    /// Wait before the second attempt.
    pub initial_backoff_ms: u64,
    /// Backoff growth per attempt.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 500,
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Policy without waits between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff_ms: 0,
            multiplier: 1.0,
        }
    }

    /// Reject policies that could never deliver.
    pub fn validate(&self) -> ScenecastResult<()> {
        if self.max_attempts == 0 {
            return Err(ScenecastError::validation("retry max_attempts must be > 0"));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(ScenecastError::validation(
                "retry multiplier must be finite and >= 1",
            ));
        }
        Ok(())
    }

    /// Wait after failed attempt number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let ms = self.initial_backoff_ms as f64 * self.multiplier.powi(exp);
        Duration::from_millis(ms.min(u64::MAX as f64) as u64)
    }
}

/// Deliver `notification`, retrying per `policy`.
///
/// Returns the number of attempts made. After the last failed attempt the final error is
/// wrapped in `Delivery`.
#[tracing::instrument(skip_all, fields(job = %notification.job_id, endpoint = %notification.endpoint))]
pub fn deliver_with_retry(
    sender: &dyn NotificationSender,
    notification: &JobNotification,
    policy: &RetryPolicy,
) -> ScenecastResult<u32> {
    let max = policy.max_attempts.max(1);
    let mut last = String::new();
    for attempt in 1..=max {
        match sender.send(notification) {
            Ok(()) => {
                tracing::info!(attempt, "notification delivered");
                return Ok(attempt);
            }
            Err(e) => {
                tracing::warn!(attempt, error = %e, "notification attempt failed");
                last = e.to_string();
                if attempt < max {
                    std::thread::sleep(policy.backoff(attempt));
                }
            }
        }
    }
    Err(ScenecastError::delivery(format!(
        "gave up after {max} attempts: {last}"
    )))
}

#[cfg(test)]
#[path = "../../tests/unit/notify/retry.rs"]
mod tests;
