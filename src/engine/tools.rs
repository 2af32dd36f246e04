use super::{Engine, Tool, ToolDiag, process::run_capture};
use crate::config::Config;
use crate::util::expand_tilde;
use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tracing::{debug, warn};

const VERSION_TIMEOUT: Duration = Duration::from_secs(10);
const NO_ARGS: &[String] = &[];

/// Engine backed by the command-line tools named in `[tools]`.
pub struct ToolEngine {
    cfg: Config,
    timeout: Duration,
}

impl ToolEngine {
    pub fn new(cfg: &Config) -> Result<Self> {
        if cfg.tools.tts_command.is_empty() {
            return Err(anyhow!("tools.tts_command is empty"));
        }
        Ok(Self {
            cfg: cfg.clone(),
            timeout: Duration::from_secs(cfg.limits.tool_timeout_seconds.max(1)),
        })
    }

    /// Program and base args for `tool`.
    fn argv(&self, tool: Tool) -> (PathBuf, &[String]) {
        let t = &self.cfg.tools;
        match tool {
            Tool::Ocrmypdf => (expand_tilde(&t.ocrmypdf), NO_ARGS),
            Tool::Briss => (expand_tilde(&t.briss), NO_ARGS),
            Tool::Pdfinfo => (expand_tilde(&t.pdfinfo), NO_ARGS),
            Tool::Pdftotext => (expand_tilde(&t.pdftotext), NO_ARGS),
            Tool::Tts => match t.tts_command.split_first() {
                Some((exe, rest)) => (expand_tilde(exe), rest),
                None => (PathBuf::from("espeak-ng"), NO_ARGS),
            },
        }
    }

    fn check(&self, tool: Tool) -> ToolDiag {
        let (exe, _) = self.argv(tool);
        let command = exe.display().to_string();
        let mut cmd = Command::new(&exe);
        cmd.arg("--version");
        match run_capture(&mut cmd, None, VERSION_TIMEOUT) {
            // briss and some TTS engines print their version on stderr.
            Ok(out) => {
                let text = if out.stdout.is_empty() {
                    String::from_utf8_lossy(&out.stderr).into_owned()
                } else {
                    String::from_utf8_lossy(&out.stdout).into_owned()
                };
                ToolDiag {
                    tool,
                    command,
                    ok: true,
                    version: text.lines().next().map(|l| l.trim().to_string()),
                    error: None,
                }
            }
            Err(err) => ToolDiag {
                tool,
                command,
                ok: false,
                version: None,
                error: Some(format!("{err:#}")),
            },
        }
    }
}

impl Engine for ToolEngine {
    fn doctor(&self) -> Vec<ToolDiag> {
        Tool::ALL.iter().map(|&t| self.check(t)).collect()
    }

    fn command(&self, tool: Tool) -> Command {
        let (exe, args) = self.argv(tool);
        let mut cmd = Command::new(exe);
        cmd.args(args);
        cmd
    }

    fn page_count(&self, input: &Path) -> Result<u64> {
        let mut cmd = self.command(Tool::Pdfinfo);
        cmd.arg(input);
        let out = run_capture(&mut cmd, None, self.timeout)
            .with_context(|| format!("pdfinfo {}", input.display()))?;
        if !out.status.success() {
            return Err(anyhow!(
                "pdfinfo failed: {}\n{}",
                input.display(),
                String::from_utf8_lossy(&out.stderr).trim()
            ));
        }
        parse_pdfinfo_pages(&String::from_utf8_lossy(&out.stdout))
            .ok_or_else(|| anyhow!("pdfinfo reported no page count: {}", input.display()))
    }

    fn extract_text(&self, input: &Path) -> Result<String> {
        let mut cmd = self.command(Tool::Pdftotext);
        cmd.arg("-enc").arg("UTF-8").arg(input).arg("-");
        let out = run_capture(&mut cmd, None, self.timeout)
            .with_context(|| format!("pdftotext {}", input.display()))?;
        if !out.status.success() {
            return Err(anyhow!(
                "pdftotext failed: {}\n{}",
                input.display(),
                String::from_utf8_lossy(&out.stderr).trim()
            ));
        }
        Ok(String::from_utf8_lossy(&out.stdout).into_owned())
    }

    fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let mut cmd = self.command(Tool::Tts);
        let out = run_capture(&mut cmd, Some(text.as_bytes()), self.timeout)
            .with_context(|| "running tts_command")?;
        if !out.status.success() {
            return Err(anyhow!(
                "tts_command failed with {}: {}",
                out.status,
                String::from_utf8_lossy(&out.stderr).trim()
            ));
        }
        if !out.stderr.is_empty() {
            debug!("tts stderr: {}", String::from_utf8_lossy(&out.stderr).trim());
        }
        if out.stdout.is_empty() {
            warn!("tts_command produced no audio for a {}-byte part", text.len());
        }
        Ok(out.stdout)
    }
}

/// Extracts `Pages:` from `pdfinfo` output.
pub fn parse_pdfinfo_pages(stdout: &str) -> Option<u64> {
    stdout.lines().find_map(|line| {
        let rest = line.strip_prefix("Pages:")?;
        rest.trim().parse().ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pages_line() {
        let out = "Title:          scan\nPages:          12\nEncrypted:      no\n";
        assert_eq!(parse_pdfinfo_pages(out), Some(12));
        assert_eq!(parse_pdfinfo_pages("Title: x\n"), None);
    }
}
