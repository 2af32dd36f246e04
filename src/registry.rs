//! Progress entries keyed by worker, in creation order.
//!
//! The registry is the only consumer of [`ProgressEvent`]s and lives on one
//! thread; producers reach it through the event channel. Nothing here fails:
//! unknown keys on `on_done` are ignored and unknown keys on `on_relabel`
//! get an entry created for them.

use crate::event::{EventRx, ProgressEvent};
use crate::key::WorkerKey;
use serde::Serialize;
use tracing::debug;

/// Cells reserved beside each label for the bar and margins.
pub const DEFAULT_CHROME: usize = 35;

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEntry {
    key: WorkerKey,
    label: String,
    percent: f64,
    max_label_width: usize,
}

impl ProgressEntry {
    fn new(key: WorkerKey, max_label_width: usize) -> Self {
        let label = format!("{} {}:", key.operation(), key.display_name());
        Self {
            key,
            label,
            percent: 0.0,
            max_label_width,
        }
    }

    pub fn key(&self) -> &WorkerKey {
        &self.key
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn percent(&self) -> f64 {
        self.percent
    }

    pub fn max_label_width(&self) -> usize {
        self.max_label_width
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EntrySnapshot {
    pub key: String,
    pub operation: String,
    pub file: String,
    pub label: String,
    pub percent: f64,
}

#[derive(Debug)]
pub struct Registry {
    entries: Vec<ProgressEntry>,
    visible: bool,
    chrome: usize,
    label_width: usize,
}

impl Registry {
    pub fn new(chrome: usize) -> Self {
        Self {
            entries: Vec::new(),
            visible: false,
            chrome,
            label_width: usize::MAX,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &ProgressEntry> {
        self.entries.iter()
    }

    pub fn get(&self, key: &WorkerKey) -> Option<&ProgressEntry> {
        self.entries.iter().find(|e| &e.key == key)
    }

    pub fn label_width(&self) -> usize {
        self.label_width
    }

    fn index_of(&self, key: &WorkerKey) -> Option<usize> {
        self.entries.iter().position(|e| &e.key == key)
    }

    pub fn on_progress(&mut self, key: &WorkerKey, percent: f64) {
        let idx = match self.index_of(key) {
            Some(i) => i,
            None => {
                debug!(key = %key, "progress entry created");
                self.entries
                    .push(ProgressEntry::new(key.clone(), self.label_width));
                self.entries.len() - 1
            }
        };
        self.visible = true;
        self.entries[idx].percent = if percent.is_finite() {
            percent.clamp(0.0, 100.0)
        } else {
            0.0
        };
    }

    pub fn on_relabel(&mut self, key: &WorkerKey, label_prefix: &str) {
        if self.index_of(key).is_none() {
            self.on_progress(key, 0.0);
        }
        if let Some(i) = self.index_of(key) {
            let entry = &mut self.entries[i];
            entry.label = format!("{label_prefix} {}:", entry.key.display_name());
        }
    }

    pub fn on_done(&mut self, key: &WorkerKey) {
        if let Some(i) = self.index_of(key) {
            self.entries.remove(i);
            debug!(key = %key, "progress entry retired");
        }
        if self.entries.is_empty() {
            self.visible = false;
        }
    }

    pub fn on_failed(&mut self, key: &WorkerKey, reason: &str) {
        debug!(key = %key, "retiring failed entry: {reason}");
        self.on_done(key);
    }

    /// Recomputes the label width from the host's new width.
    pub fn on_resize(&mut self, host_width: usize) {
        self.label_width = host_width.saturating_sub(self.chrome);
        for e in &mut self.entries {
            e.max_label_width = self.label_width;
        }
    }

    pub fn apply(&mut self, event: ProgressEvent) {
        match event {
            ProgressEvent::Progress { key, percent } => self.on_progress(&key, percent),
            ProgressEvent::Relabel { key, label } => self.on_relabel(&key, &label),
            ProgressEvent::Done { key } => self.on_done(&key),
            ProgressEvent::Failed { key, reason } => self.on_failed(&key, &reason),
        }
    }

    /// Applies every event already queued on `rx` without blocking.
    pub fn pump(&mut self, rx: &EventRx) -> usize {
        let mut n = 0;
        while let Ok(event) = rx.try_recv() {
            self.apply(event);
            n += 1;
        }
        n
    }

    pub fn snapshot(&self) -> Vec<EntrySnapshot> {
        self.entries
            .iter()
            .map(|e| EntrySnapshot {
                key: e.key.to_string(),
                operation: e.key.operation().to_string(),
                file: e.key.display_name().to_string(),
                label: e.label.clone(),
                percent: e.percent,
            })
            .collect()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(DEFAULT_CHROME)
    }
}
