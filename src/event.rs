//! Normalized progress events and the producer side of the event channel.
//!
//! Every adapter, whatever raw signal it watches, ends up calling the same
//! [`ProgressSink`] methods. The production sink forwards into a
//! `crossbeam-channel` drained by the registry on the consumer thread.

use crate::key::WorkerKey;
use crossbeam_channel::{Receiver, Sender};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Progress { key: WorkerKey, percent: f64 },
    Relabel { key: WorkerKey, label: String },
    Done { key: WorkerKey },
    Failed { key: WorkerKey, reason: String },
}

impl ProgressEvent {
    pub fn key(&self) -> &WorkerKey {
        match self {
            ProgressEvent::Progress { key, .. }
            | ProgressEvent::Relabel { key, .. }
            | ProgressEvent::Done { key }
            | ProgressEvent::Failed { key, .. } => key,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressEvent::Done { .. } | ProgressEvent::Failed { .. })
    }
}

pub type EventTx = Sender<ProgressEvent>;
pub type EventRx = Receiver<ProgressEvent>;

pub fn channel() -> (EventTx, EventRx) {
    crossbeam_channel::unbounded()
}

/// Receiver of normalized progress events.
pub trait ProgressSink: Send + Sync {
    fn progress(&self, key: &WorkerKey, percent: f64);
    fn relabel(&self, key: &WorkerKey, label: &str);
    fn done(&self, key: &WorkerKey);
    fn failed(&self, key: &WorkerKey, reason: &str) {
        let _ = reason;
        self.done(key);
    }
}

#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: EventTx,
}

impl ChannelSink {
    pub fn new(tx: EventTx) -> Self {
        Self { tx }
    }

    fn send(&self, event: ProgressEvent) {
        // The consumer may already be gone during shutdown.
        if self.tx.send(event).is_err() {
            debug!("progress channel closed; dropping event");
        }
    }
}

impl ProgressSink for ChannelSink {
    fn progress(&self, key: &WorkerKey, percent: f64) {
        self.send(ProgressEvent::Progress {
            key: key.clone(),
            percent,
        });
    }

    fn relabel(&self, key: &WorkerKey, label: &str) {
        self.send(ProgressEvent::Relabel {
            key: key.clone(),
            label: label.to_string(),
        });
    }

    fn done(&self, key: &WorkerKey) {
        self.send(ProgressEvent::Done { key: key.clone() });
    }

    fn failed(&self, key: &WorkerKey, reason: &str) {
        self.send(ProgressEvent::Failed {
            key: key.clone(),
            reason: reason.to_string(),
        });
    }
}

/// Per-job handle onto a sink, bound to one key.
///
/// At most one terminal event leaves a reporter; later `done`/`failed` calls
/// and any progress after termination are dropped.
pub struct Reporter {
    key: WorkerKey,
    sink: Arc<dyn ProgressSink>,
    terminated: AtomicBool,
}

impl Reporter {
    pub fn new(key: WorkerKey, sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            key,
            sink,
            terminated: AtomicBool::new(false),
        }
    }

    pub fn key(&self) -> &WorkerKey {
        &self.key
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }

    pub fn progress(&self, percent: f64) {
        if !self.is_terminated() {
            self.sink.progress(&self.key, percent);
        }
    }

    pub fn relabel(&self, label: &str) {
        if !self.is_terminated() {
            self.sink.relabel(&self.key, label);
        }
    }

    /// Returns false when a terminal event was already sent.
    pub fn done(&self) -> bool {
        if self.terminated.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.sink.done(&self.key);
        true
    }

    pub fn failed(&self, reason: &str) -> bool {
        if self.terminated.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.sink.failed(&self.key, reason);
        true
    }
}

impl std::fmt::Debug for Reporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reporter")
            .field("key", &self.key)
            .field("terminated", &self.is_terminated())
            .finish()
    }
}
