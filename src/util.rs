use crate::config::Output;
use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;

pub fn ensure_dir(p: &Path) -> Result<()> {
    std::fs::create_dir_all(p).with_context(|| format!("create_dir_all {}", p.display()))
}

pub fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

/// `dir/stem{suffix}.{ext}`, where dir is `out.out_dir` or the input's directory.
pub fn output_path(out: &Output, input: &Path, suffix: &str, ext: &str) -> Result<PathBuf> {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| anyhow!("input has no file name: {}", input.display()))?;
    let dir = if out.out_dir.is_empty() {
        input.parent().map(Path::to_path_buf).unwrap_or_default()
    } else {
        let dir = expand_tilde(&out.out_dir);
        ensure_dir(&dir)?;
        dir
    };
    Ok(dir.join(format!("{stem}{suffix}.{ext}")))
}

pub fn has_extension(path: &Path, exts: &[&str]) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|e| exts.iter().any(|x| e.eq_ignore_ascii_case(x)))
        .unwrap_or(false)
}
