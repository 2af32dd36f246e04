use crate::job::{CancelToken, Cancelled};
use anyhow::{Context, Result, anyhow};
use std::io::{Read, Write};
use std::process::{Child, Command, ExitStatus, Output, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Runs `cmd` to completion, feeding `stdin` and capturing both output streams.
pub fn run_capture(cmd: &mut Command, stdin: Option<&[u8]>, timeout: Duration) -> Result<Output> {
    debug!("run {:?} timeout={:?}", cmd.get_program(), timeout);
    cmd.stdin(if stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    });
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning {:?}", cmd.get_program()))?;

    // Fed from its own thread: a child may fill stdout before reading all of
    // stdin, and only the wait loop drains stdout.
    let writer = match stdin {
        Some(bytes) => {
            let mut pipe = child.stdin.take().ok_or_else(|| anyhow!("no stdin"))?;
            let bytes = bytes.to_vec();
            Some(std::thread::spawn(move || {
                // A child that exits early closes its end; the exit status reports why.
                if let Err(err) = pipe.write_all(&bytes) {
                    debug!("writing child stdin: {err}");
                }
            }))
        }
        None => None,
    };

    let out = wait_with_timeout(&mut child, timeout);
    if let Some(writer) = writer {
        if writer.join().is_err() {
            warn!("stdin writer thread panicked");
        }
    }
    out
}

pub fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<Output> {
    // Drain pipes while waiting so a chatty child can't deadlock on a full
    // stdout/stderr buffer.
    let stdout_reader = child.stdout.take();
    let stderr_reader = child.stderr.take();

    let stdout_thread = std::thread::spawn(move || -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut out) = stdout_reader {
            out.read_to_end(&mut buf).with_context(|| "read stdout")?;
        }
        Ok(buf)
    });

    let stderr_thread = std::thread::spawn(move || -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut err) = stderr_reader {
            err.read_to_end(&mut buf).with_context(|| "read stderr")?;
        }
        Ok(buf)
    });

    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait().with_context(|| "try_wait")? {
            let stdout = stdout_thread
                .join()
                .map_err(|_| anyhow!("stdout reader thread panicked"))??;
            let stderr = stderr_thread
                .join()
                .map_err(|_| anyhow!("stderr reader thread panicked"))??;
            return Ok(Output {
                status,
                stdout,
                stderr,
            });
        }

        if start.elapsed() > timeout {
            warn!("process timed out after {:?}", timeout);
            let _ = child.kill();
            child.wait().with_context(|| "wait after kill")?;
            let stderr = stderr_thread
                .join()
                .map_err(|_| anyhow!("stderr reader thread panicked"))??;
            let _ = stdout_thread.join();
            return Err(anyhow!(
                "process exceeded timeout ({:?}); stderr: {}",
                timeout,
                String::from_utf8_lossy(&stderr)
            ));
        }

        std::thread::sleep(POLL_INTERVAL);
    }
}

/// Waits for `child`, killing it if `cancel` fires first.
pub fn wait_cancellable(child: &mut Child, cancel: &CancelToken) -> Result<ExitStatus> {
    loop {
        if let Some(status) = child.try_wait().with_context(|| "try_wait")? {
            return Ok(status);
        }
        if cancel.is_cancelled() {
            kill(child);
            return Err(Cancelled.into());
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

pub fn kill(child: &mut Child) {
    if let Err(err) = child.kill() {
        debug!("kill child {}: {err}", child.id());
    }
    let _ = child.wait();
}
