//! Progress scraped from a child process's stderr.
//!
//! Tools that stream a binary payload on stdout write their progress
//! messages to stderr. Data arrives in arbitrary chunks, so lines are
//! reassembled here and a marker only counts when it ends a line: right
//! before `\n`/`\r`, or at the end of the chunk received so far.

use super::Tracker;
use crate::engine::process::{POLL_INTERVAL, kill, wait_cancellable};
use crate::event::Reporter;
use crate::job::{CancelToken, Cancelled};
use crate::markers::MarkerSet;
use crate::state::ProgressState;
use anyhow::{Context, Result, anyhow};
use crossbeam_channel::RecvTimeoutError;
use std::io::Read;
use std::process::{Child, ExitStatus};
use std::sync::Arc;
use tracing::{debug, trace};

const READ_CHUNK: usize = 4096;
const MAX_PENDING: usize = 64 * 1024;

#[derive(Debug)]
pub struct StreamAdapter {
    tracker: Tracker,
    markers: MarkerSet,
    pending: Vec<u8>,
    // Offset in `pending` of a marker already counted at end of chunk.
    tail_hit: Option<usize>,
}

impl StreamAdapter {
    pub fn new(reporter: Arc<Reporter>, markers: MarkerSet, total_units: u64) -> Self {
        Self {
            tracker: Tracker::new(reporter, total_units),
            markers,
            pending: Vec::new(),
            tail_hit: None,
        }
    }

    pub fn state(&self) -> &ProgressState {
        self.tracker.state()
    }

    /// Feeds one chunk of raw stderr.
    pub fn feed(&mut self, chunk: &[u8]) {
        for &b in chunk {
            if b == b'\n' || b == b'\r' {
                self.end_line();
            } else {
                self.pending.push(b);
            }
        }

        if self.pending.len() > MAX_PENDING {
            let excess = self.pending.len() - MAX_PENDING;
            self.pending.drain(..excess);
            self.tail_hit = self
                .tail_hit
                .and_then(|start| start.checked_sub(excess));
        }

        if self.pending.is_empty() {
            return;
        }
        if let Some(start) = self.match_pending() {
            self.tail_hit = Some(start);
        }
    }

    /// Flushes a trailing unterminated line at end of stream.
    pub fn finish(&mut self) {
        self.end_line();
    }

    fn end_line(&mut self) {
        if !self.pending.is_empty() {
            trace!(line = %String::from_utf8_lossy(&self.pending), "stderr");
            self.match_pending();
        }
        self.pending.clear();
        self.tail_hit = None;
    }

    // Applies a marker ending `pending` unless it is the one already counted.
    fn match_pending(&mut self) -> Option<usize> {
        let line = String::from_utf8_lossy(&self.pending);
        let (start, hit) = self.markers.match_line_end_at(&line)?;
        if self.tail_hit == Some(start) {
            return None;
        }
        self.tracker.apply(hit);
        Some(start)
    }

    /// Reads `child`'s stderr until it closes, then waits for exit.
    ///
    /// Kills the child and returns [`Cancelled`] if `cancel` fires.
    pub fn drive(&mut self, mut child: Child, cancel: &CancelToken) -> Result<ExitStatus> {
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow!("child stderr is not piped"))?;
        if let Some(mut stdout) = child.stdout.take() {
            std::thread::spawn(move || std::io::copy(&mut stdout, &mut std::io::sink()));
        }

        let (tx, rx) = crossbeam_channel::unbounded::<Vec<u8>>();
        let reader = std::thread::spawn(move || -> std::io::Result<()> {
            let mut buf = [0u8; READ_CHUNK];
            loop {
                let n = stderr.read(&mut buf)?;
                if n == 0 || tx.send(buf[..n].to_vec()).is_err() {
                    return Ok(());
                }
            }
        });

        loop {
            if cancel.is_cancelled() {
                debug!(pid = child.id(), "cancelling child");
                kill(&mut child);
                return Err(Cancelled.into());
            }
            match rx.recv_timeout(POLL_INTERVAL) {
                Ok(chunk) => self.feed(&chunk),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        self.finish();

        match reader.join() {
            Ok(res) => res.with_context(|| "reading child stderr")?,
            Err(_) => return Err(anyhow!("stderr reader thread panicked")),
        }
        wait_cancellable(&mut child, cancel)
    }
}
