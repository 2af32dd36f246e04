//! Progress scraped from `tracing` records.
//!
//! A [`LogRouter`] sits in the subscriber stack for the whole process. A job
//! attaches a [`LogPatternAdapter`] for one log target scope; from then on,
//! records in that scope emitted on the job's own thread go to the adapter
//! until the returned [`LogAttachment`] is dropped.

use super::Tracker;
use crate::event::Reporter;
use crate::markers::MarkerSet;
use crate::state::ProgressState;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::thread::ThreadId;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

#[derive(Debug)]
pub struct LogPatternAdapter {
    tracker: Tracker,
    markers: MarkerSet,
}

impl LogPatternAdapter {
    pub fn new(reporter: Arc<Reporter>, markers: MarkerSet, total_units: u64) -> Self {
        Self {
            tracker: Tracker::new(reporter, total_units),
            markers,
        }
    }

    /// Feeds one rendered log message. Unrecognized text is ignored.
    pub fn on_message(&mut self, msg: &str) {
        if let Some(hit) = self.markers.match_message(msg) {
            self.tracker.apply(hit);
        }
    }

    pub fn state(&self) -> &ProgressState {
        self.tracker.state()
    }
}

struct Route {
    id: u64,
    thread: ThreadId,
    scope: String,
    adapter: Arc<Mutex<LogPatternAdapter>>,
}

impl Route {
    fn covers(&self, target: &str) -> bool {
        target == self.scope
            || target
                .strip_prefix(self.scope.as_str())
                .is_some_and(|rest| rest.starts_with("::"))
    }
}

#[derive(Default)]
struct RouterInner {
    next_id: AtomicU64,
    routes: Mutex<Vec<Route>>,
}

/// Subscriber layer forwarding scoped records to attached adapters.
#[derive(Clone, Default)]
pub struct LogRouter {
    inner: Arc<RouterInner>,
}

impl LogRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches `adapter` to records under `scope` emitted on the calling thread.
    pub fn attach(&self, scope: &str, adapter: LogPatternAdapter) -> LogAttachment {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let adapter = Arc::new(Mutex::new(adapter));
        self.routes().push(Route {
            id,
            thread: std::thread::current().id(),
            scope: scope.to_string(),
            adapter: Arc::clone(&adapter),
        });
        LogAttachment {
            id,
            router: self.clone(),
            adapter,
        }
    }

    pub fn attached(&self) -> usize {
        self.routes().len()
    }

    fn detach(&self, id: u64) {
        self.routes().retain(|r| r.id != id);
    }

    fn routes(&self) -> MutexGuard<'_, Vec<Route>> {
        self.inner.routes.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn targets_for(&self, target: &str) -> Vec<Arc<Mutex<LogPatternAdapter>>> {
        let thread = std::thread::current().id();
        self.routes()
            .iter()
            .filter(|r| r.thread == thread && r.covers(target))
            .map(|r| Arc::clone(&r.adapter))
            .collect()
    }
}

impl fmt::Debug for LogRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogRouter")
            .field("attached", &self.attached())
            .finish()
    }
}

impl<S: Subscriber> Layer<S> for LogRouter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        // Collect outside the lock: adapters emit events of their own.
        let targets = self.targets_for(event.metadata().target());
        if targets.is_empty() {
            return;
        }
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        let Some(msg) = visitor.message else {
            return;
        };
        for adapter in targets {
            // Only the owning thread routes here, so a held lock means we are
            // inside this adapter's own logging; skip rather than deadlock.
            match adapter.try_lock() {
                Ok(mut a) => a.on_message(&msg),
                Err(TryLockError::Poisoned(e)) => e.into_inner().on_message(&msg),
                Err(TryLockError::WouldBlock) => {}
            }
        }
    }
}

/// Guard returned by [`LogRouter::attach`]; detaches on drop.
pub struct LogAttachment {
    id: u64,
    router: LogRouter,
    adapter: Arc<Mutex<LogPatternAdapter>>,
}

impl LogAttachment {
    pub fn state(&self) -> ProgressState {
        self.adapter
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .state()
            .clone()
    }
}

impl Drop for LogAttachment {
    fn drop(&mut self) {
        self.router.detach(self.id);
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: Option<String>,
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{value:?}"));
        }
    }
}
