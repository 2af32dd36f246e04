//! Translate raw progress signals into [`crate::event::ProgressEvent`]s.
//!
//! - [`log`]: scrapes `tracing` records emitted during an in-process call.
//! - [`stream`]: scrapes a child process's stderr as it arrives.
//! - [`callback`]: explicit progress-bar handles called by the job itself.

pub mod callback;
pub mod log;
pub mod stream;

use crate::event::Reporter;
use crate::markers::MarkerHit;
use crate::state::ProgressState;
use std::sync::Arc;
use tracing::trace;

pub use callback::{PhaseBar, PhaseBars};
pub use log::{LogAttachment, LogPatternAdapter, LogRouter};
pub use stream::StreamAdapter;

/// A job's progress state together with where its events go.
#[derive(Debug)]
pub struct Tracker {
    state: ProgressState,
    reporter: Arc<Reporter>,
}

impl Tracker {
    pub fn new(reporter: Arc<Reporter>, total_units: u64) -> Self {
        Self {
            state: ProgressState::new(total_units),
            reporter,
        }
    }

    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    pub fn reporter(&self) -> &Arc<Reporter> {
        &self.reporter
    }

    pub fn apply(&mut self, hit: MarkerHit) {
        trace!(key = %self.reporter.key(), ?hit, "marker");
        match hit {
            MarkerHit::Unit => self.increment(1),
            MarkerHit::Phase(label) => self.enter_phase(&label),
            MarkerHit::Total(n) => {
                self.state.set_total(n);
                self.report_percent();
            }
        }
    }

    pub fn increment(&mut self, n: u64) {
        self.state.increment(n);
        self.report_percent();
    }

    pub fn enter_phase(&mut self, label: &str) {
        self.state.enter_phase(label);
        self.reporter.relabel(label);
        self.report_percent();
    }

    /// Starts a fresh unit count with a new label and total.
    pub fn restart(&mut self, label: &str, total_units: u64) {
        self.state.set_label(label);
        self.state.set_total(total_units);
        self.state.reset();
        self.reporter.relabel(label);
        self.report_percent();
    }

    pub fn state_mut(&mut self) -> &mut ProgressState {
        &mut self.state
    }

    fn report_percent(&self) {
        if self.state.has_total() {
            self.reporter.progress(self.state.percent());
        }
    }
}
