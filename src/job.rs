//! One OS thread per job, with a guaranteed terminal event.

use crate::event::{ProgressSink, Reporter};
use crate::key::WorkerKey;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Error returned by a job that stopped because its token was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

impl fmt::Display for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("cancelled")
    }
}

impl std::error::Error for Cancelled {}

/// What a job body gets to report with.
#[derive(Debug, Clone)]
pub struct JobContext {
    reporter: Arc<Reporter>,
    cancel: CancelToken,
}

impl JobContext {
    pub fn new(reporter: Arc<Reporter>, cancel: CancelToken) -> Self {
        Self { reporter, cancel }
    }

    pub fn key(&self) -> &WorkerKey {
        self.reporter.key()
    }

    pub fn reporter(&self) -> Arc<Reporter> {
        Arc::clone(&self.reporter)
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Call between units of work.
    pub fn checkpoint(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Cancelled.into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    Done,
    Failed { reason: String },
    Cancelled,
}

pub struct JobHandle {
    key: WorkerKey,
    cancel: CancelToken,
    thread: JoinHandle<JobOutcome>,
}

impl JobHandle {
    pub fn key(&self) -> &WorkerKey {
        &self.key
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    pub fn join(self) -> JobOutcome {
        match self.thread.join() {
            Ok(outcome) => outcome,
            Err(_) => JobOutcome::Failed {
                reason: "job worker panicked".into(),
            },
        }
    }
}

// Emits Failed if the job body unwinds before a terminal event went out.
struct TerminalGuard {
    reporter: Arc<Reporter>,
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if self.reporter.is_terminated() {
            return;
        }
        let reason = if std::thread::panicking() {
            "job worker panicked"
        } else {
            "job worker exited without a terminal event"
        };
        warn!(key = %self.reporter.key(), "{reason}");
        self.reporter.failed(reason);
    }
}

/// Starts jobs, each on its own thread, all reporting into one sink.
#[derive(Clone)]
pub struct Dispatcher {
    sink: Arc<dyn ProgressSink>,
}

impl Dispatcher {
    pub fn new(sink: Arc<dyn ProgressSink>) -> Self {
        Self { sink }
    }

    pub fn spawn<F>(&self, key: WorkerKey, body: F) -> Result<JobHandle>
    where
        F: FnOnce(&JobContext) -> Result<()> + Send + 'static,
    {
        let cancel = CancelToken::new();
        let reporter = Arc::new(Reporter::new(key.clone(), Arc::clone(&self.sink)));
        let ctx = JobContext::new(reporter, cancel.clone());

        let thread = std::thread::Builder::new()
            .name(format!("job {key}"))
            .spawn(move || run_job(ctx, body))
            .with_context(|| format!("spawning job thread: {key}"))?;

        Ok(JobHandle { key, cancel, thread })
    }
}

fn run_job<F>(ctx: JobContext, body: F) -> JobOutcome
where
    F: FnOnce(&JobContext) -> Result<()>,
{
    let reporter = ctx.reporter();
    let _guard = TerminalGuard {
        reporter: Arc::clone(&reporter),
    };

    info!(key = %ctx.key(), "job started");
    reporter.progress(0.0);

    match body(&ctx) {
        Ok(()) => {
            reporter.done();
            info!(key = %ctx.key(), "job done");
            JobOutcome::Done
        }
        Err(err) if err.downcast_ref::<Cancelled>().is_some() => {
            reporter.failed("cancelled");
            info!(key = %ctx.key(), "job cancelled");
            JobOutcome::Cancelled
        }
        Err(err) => {
            let reason = format!("{err:#}");
            warn!(key = %ctx.key(), "job failed: {reason}");
            if !reporter.failed(&reason) {
                debug!(key = %ctx.key(), "terminal event already sent");
            }
            JobOutcome::Failed { reason }
        }
    }
}
