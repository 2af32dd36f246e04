use super::OpEnv;
use crate::adapters::StreamAdapter;
use crate::engine::Tool;
use crate::job::JobContext;
use crate::markers::MarkerSet;
use crate::probe::probe_pdf;
use crate::util::output_path;
use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tracing::{info, warn};

/// OCRs `input` with `ocrmypdf`, tracking its stderr. Returns the output path.
pub fn run(env: &OpEnv, input: &Path, ctx: &JobContext) -> Result<PathBuf> {
    let total = match probe_pdf(&env.cfg, env.engine.as_ref(), input) {
        Ok(probe) => probe.page_count,
        Err(err) => {
            warn!("page count unknown for {}: {err:#}", input.display());
            0
        }
    };
    let markers = MarkerSet::compile(&env.cfg.ocr.markers)?;
    let output = output_path(&env.cfg.output, input, &env.cfg.output.ocr_suffix, "pdf")?;

    info!("OCRing {} ({total} pages)", input.display());
    let mut cmd = env.engine.command(Tool::Ocrmypdf);
    cmd.args(&env.cfg.ocr.args)
        .arg(input)
        .arg(&output)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());
    let child = cmd
        .spawn()
        .with_context(|| format!("spawning ocrmypdf for {}", input.display()))?;

    let mut adapter = StreamAdapter::new(ctx.reporter(), markers, total);
    let status = adapter.drive(child, ctx.cancel_token())?;
    if !status.success() {
        return Err(anyhow!("ocrmypdf failed with {status}"));
    }

    info!("OCR complete. Output: {}", output.display());
    Ok(output)
}
