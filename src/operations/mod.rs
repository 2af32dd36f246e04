pub mod crop;
pub mod ocr;
pub mod tts;

use crate::adapters::LogRouter;
use crate::config::Config;
use crate::engine::Engine;
use crate::job::{Dispatcher, JobHandle};
use crate::key::{OperationKind, key_for};
use crate::util::has_extension;
use anyhow::{Result, anyhow};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Everything an operation needs, shared by all jobs.
#[derive(Clone)]
pub struct OpEnv {
    pub cfg: Arc<Config>,
    pub engine: Arc<dyn Engine>,
    pub router: LogRouter,
}

pub fn validate_input(kind: OperationKind, input: &Path) -> Result<()> {
    let ok = match kind {
        OperationKind::Ocr | OperationKind::Crop => has_extension(input, &["pdf"]),
        OperationKind::Tts => has_extension(input, &["pdf", "txt"]),
    };
    if !ok {
        return Err(anyhow!(
            "cannot {kind}: unsupported file type: {}",
            input.display()
        ));
    }
    if !input.exists() {
        return Err(anyhow!("input does not exist: {}", input.display()));
    }
    Ok(())
}

/// Validates `input` and starts the matching job on `dispatcher`.
pub fn start(
    dispatcher: &Dispatcher,
    env: &OpEnv,
    kind: OperationKind,
    input: &Path,
) -> Result<JobHandle> {
    validate_input(kind, input)?;
    let key = key_for(kind, input);
    let env = env.clone();
    let input: PathBuf = input.to_path_buf();
    dispatcher.spawn(key, move |ctx| match kind {
        OperationKind::Ocr => ocr::run(&env, &input, ctx).map(|_| ()),
        OperationKind::Crop => crop::run(&env, &input, ctx).map(|_| ()),
        OperationKind::Tts => tts::run(&env, &input, ctx).map(|_| ()),
    })
}
