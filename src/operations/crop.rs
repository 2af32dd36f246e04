use super::OpEnv;
use crate::adapters::PhaseBars;
use crate::engine::{Tool, process::wait_cancellable};
use crate::job::JobContext;
use crate::probe::probe_pdf;
use crate::util::output_path;
use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tracing::{info, warn};

/// Crops `input` with briss.
///
/// In automatic mode briss writes the cropped file and the job tracks it;
/// otherwise briss opens interactively and the job ends at launch.
///
/// briss prints nothing while it works, so the crop phase bar stays at 0%
/// until it exits and then advances by every page at once.
pub fn run(env: &OpEnv, input: &Path, ctx: &JobContext) -> Result<Option<PathBuf>> {
    let crop = &env.cfg.crop;
    if !crop.automatic {
        info!("Launching briss for {}", input.display());
        env.engine
            .command(Tool::Briss)
            .arg(input)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| "launching briss")?;
        return Ok(None);
    }

    let pages = match probe_pdf(&env.cfg, env.engine.as_ref(), input) {
        Ok(probe) => probe.page_count,
        Err(err) => {
            warn!("page count unknown for {}: {err:#}", input.display());
            1
        }
    };
    let output = output_path(&env.cfg.output, input, &env.cfg.output.crop_suffix, "pdf")?;

    info!("Cropping {}", input.display());
    let mut bars = PhaseBars::new(ctx.reporter(), &crop.terminal_phase);
    let mut bar = bars.open(&crop.phase_label, pages);

    let spawned = env
        .engine
        .command(Tool::Briss)
        .arg("-s")
        .arg(input)
        .arg("-d")
        .arg(&output)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn();
    let mut child = match spawned {
        Ok(child) => child,
        Err(err) => {
            bar.abort();
            return Err(anyhow::Error::new(err).context("spawning briss"));
        }
    };

    match wait_cancellable(&mut child, ctx.cancel_token()) {
        Ok(status) if status.success() => {
            bar.update(pages);
            drop(bar);
            info!("Crop complete. Output: {}", output.display());
            Ok(Some(output))
        }
        Ok(status) => {
            bar.abort();
            Err(anyhow!("briss failed with {status}"))
        }
        Err(err) => {
            bar.abort();
            Err(err)
        }
    }
}
