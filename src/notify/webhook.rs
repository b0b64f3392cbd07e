use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use crate::{
    foundation::error::{ScenecastError, ScenecastResult},
    notify::{JobNotification, JobOutcome, NotificationSender},
};

/// Posts notifications with the `curl` binary.
///
/// Success uploads the artifact as a multipart `video` field alongside `job_id`; failure posts a
/// JSON body `{"job_id", "status": "failed", "error"}`. Any non-2xx response fails the attempt.
#[derive(Clone, Debug)]
pub struct CurlWebhookSender {
    program: PathBuf,
    timeout_secs: u64,
}

impl Default for CurlWebhookSender {
    fn default() -> Self {
        Self {
            program: PathBuf::from("curl"),
            timeout_secs: 300,
        }
    }
}

impl CurlWebhookSender {
    /// Sender using `curl` from `PATH`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific curl binary.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Per-request timeout.
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Arguments for one delivery attempt.
    pub fn curl_args(&self, notification: &JobNotification) -> ScenecastResult<Vec<OsString>> {
        let mut args: Vec<OsString> = ["--fail", "--silent", "--show-error", "--max-time"]
            .map(OsString::from)
            .into();
        args.push(self.timeout_secs.to_string().into());
        match &notification.outcome {
            JobOutcome::Succeeded { artifact } => {
                let mut video = OsString::from("video=@");
                video.push(artifact.path.as_os_str());
                args.extend([
                    OsString::from("--form"),
                    video,
                    OsString::from("--form-string"),
                    OsString::from(format!("job_id={}", notification.job_id)),
                ]);
            }
            JobOutcome::Failed { error } => {
                let body = serde_json::json!({
                    "job_id": notification.job_id,
                    "status": "failed",
                    "error": error,
                });
                let body = serde_json::to_string(&body)
                    .map_err(|e| ScenecastError::serde(e.to_string()))?;
                args.extend(
                    [
                        "--header",
                        "Content-Type: application/json",
                        "--data-binary",
                        body.as_str(),
                    ]
                    .map(OsString::from),
                );
            }
        }
        args.push(OsString::from(&notification.endpoint));
        Ok(args)
    }
}

impl NotificationSender for CurlWebhookSender {
    fn send(&self, notification: &JobNotification) -> ScenecastResult<()> {
        let args = self.curl_args(notification)?;
        let out = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| ScenecastError::delivery(format!("failed to run curl: {e}")))?;
        if !out.status.success() {
            return Err(ScenecastError::delivery(format!(
                "webhook '{}' rejected ({}): {}",
                notification.endpoint,
                out.status,
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/notify/webhook.rs"]
mod tests;
