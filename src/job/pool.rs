use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};

use crate::{
    foundation::cancel::CancelToken,
    foundation::error::{ScenecastError, ScenecastResult},
    job::runner::{JobReport, JobRequest, JobRunner},
};

/// Fixed-size pool running one job per worker thread.
pub struct WorkerPool {
    pool: rayon::ThreadPool,
    runner: Arc<JobRunner>,
}

/// Handle to a submitted job.
pub struct JobHandle {
    id: String,
    cancel: CancelToken,
    result: Receiver<JobReport>,
}

impl JobHandle {
    /// Job id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Ask the job to stop at its next element boundary.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Block until the job finishes.
    pub fn wait(self) -> ScenecastResult<JobReport> {
        self.result.recv().map_err(|_| {
            ScenecastError::render(format!("worker for job '{}' exited without a report", self.id))
        })
    }
}

impl WorkerPool {
    /// Pool of `workers` threads over `runner`.
    pub fn new(workers: usize, runner: JobRunner) -> ScenecastResult<Self> {
        Ok(Self {
            pool: build_thread_pool(workers)?,
            runner: Arc::new(runner),
        })
    }

    /// Number of worker threads.
    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Queue `request`; it starts as soon as a worker is free.
    pub fn submit(&self, request: JobRequest) -> JobHandle {
        let (tx, rx) = mpsc::channel();
        let cancel = CancelToken::new();
        let id = request.id.clone();
        let runner = Arc::clone(&self.runner);
        let token = cancel.clone();
        self.pool.spawn(move || {
            let report = runner.run(&request, &token);
            // The handle may have been dropped; the report is then discarded.
            let _ = tx.send(report);
        });
        JobHandle {
            id,
            cancel,
            result: rx,
        }
    }

    /// Run every request and collect reports in submission order.
    pub fn run_all(&self, requests: Vec<JobRequest>) -> Vec<ScenecastResult<JobReport>> {
        let handles: Vec<_> = requests.into_iter().map(|r| self.submit(r)).collect();
        handles.into_iter().map(JobHandle::wait).collect()
    }
}

fn build_thread_pool(workers: usize) -> ScenecastResult<rayon::ThreadPool> {
    if workers == 0 {
        return Err(ScenecastError::validation("worker pool size must be >= 1"));
    }
    rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("scenecast-worker-{i}"))
        .build()
        .map_err(|e| ScenecastError::validation(format!("failed to build worker pool: {e}")))
}

#[cfg(test)]
#[path = "../../tests/unit/job/pool.rs"]
mod tests;
