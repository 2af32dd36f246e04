//! Explicit progress-bar handles for jobs that can call back directly.
//!
//! A job opens one [`PhaseBar`] per phase of work. Opening relabels the
//! entry, `update` advances it, and closing the configured terminal phase
//! retires it.

use super::Tracker;
use crate::event::Reporter;
use crate::state::{Phase, ProgressState};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug)]
pub struct PhaseBars {
    tracker: Tracker,
    terminal_phase: String,
}

impl PhaseBars {
    pub fn new(reporter: Arc<Reporter>, terminal_phase: &str) -> Self {
        Self {
            tracker: Tracker::new(reporter, 0),
            terminal_phase: terminal_phase.to_string(),
        }
    }

    /// Opens the handle for one phase with `total` units of work.
    pub fn open(&mut self, desc: &str, total: u64) -> PhaseBar<'_> {
        debug!(key = %self.tracker.reporter().key(), desc, total, "phase opened");
        self.tracker.restart(desc, total);
        let terminal = desc.eq_ignore_ascii_case(&self.terminal_phase);
        PhaseBar {
            bars: self,
            terminal,
            aborted: false,
        }
    }

    pub fn state(&self) -> &ProgressState {
        self.tracker.state()
    }
}

pub struct PhaseBar<'a> {
    bars: &'a mut PhaseBars,
    terminal: bool,
    aborted: bool,
}

impl PhaseBar<'_> {
    pub fn update(&mut self, n: u64) {
        self.bars.tracker.increment(n);
    }

    pub fn percent(&self) -> f64 {
        self.bars.tracker.state().percent()
    }

    /// Closes without retiring the entry; the job reports its own failure.
    pub fn abort(mut self) {
        self.aborted = true;
    }
}

impl Drop for PhaseBar<'_> {
    fn drop(&mut self) {
        if !self.terminal || self.aborted || std::thread::panicking() {
            return;
        }
        self.bars.tracker.state_mut().finish(Phase::Done);
        self.bars.tracker.reporter().done();
    }
}
