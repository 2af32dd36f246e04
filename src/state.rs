use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Running,
    Postprocessing,
    Done,
    Failed,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Done | Phase::Failed)
    }
}

/// Counters for one job. Owned by that job's adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressState {
    current_unit: u64,
    total_units: u64,
    percent: f64,
    label: String,
    phase: Phase,
}

impl ProgressState {
    pub fn new(total_units: u64) -> Self {
        Self {
            current_unit: 0,
            total_units,
            percent: 0.0,
            label: String::new(),
            phase: Phase::Running,
        }
    }

    pub fn reset(&mut self) {
        self.current_unit = 0;
        self.recompute();
    }

    pub fn increment(&mut self, n: u64) {
        self.current_unit = self.current_unit.saturating_add(n);
        self.recompute();
    }

    pub fn set_total(&mut self, n: u64) {
        self.total_units = n;
        self.recompute();
    }

    pub fn percent(&self) -> f64 {
        self.percent
    }

    pub fn current_unit(&self) -> u64 {
        self.current_unit
    }

    pub fn total_units(&self) -> u64 {
        self.total_units
    }

    pub fn has_total(&self) -> bool {
        self.total_units > 0
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    /// Switches to a named phase and restarts the unit count.
    pub fn enter_phase(&mut self, label: impl Into<String>) {
        if self.phase.is_terminal() {
            return;
        }
        self.label = label.into();
        self.phase = Phase::Postprocessing;
        self.reset();
    }

    pub fn finish(&mut self, phase: Phase) {
        if phase.is_terminal() {
            self.phase = phase;
        }
    }

    // Zero total means unknown: keep the last percent.
    fn recompute(&mut self) {
        if self.total_units == 0 {
            return;
        }
        let pct = self.current_unit as f64 / self.total_units as f64 * 100.0;
        self.percent = pct.clamp(0.0, 100.0);
    }
}

impl Default for ProgressState {
    fn default() -> Self {
        Self::new(0)
    }
}
