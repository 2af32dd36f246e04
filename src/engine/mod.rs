pub mod process;
pub mod tools;
pub mod types;

use anyhow::Result;
use std::path::Path;
use std::process::Command;

pub use types::{Tool, ToolDiag};

/// External tools the operations delegate to.
pub trait Engine: Send + Sync {
    fn doctor(&self) -> Vec<ToolDiag>;
    /// A ready-to-configure command for `tool` with its configured base args.
    fn command(&self, tool: Tool) -> Command;
    fn page_count(&self, input: &Path) -> Result<u64>;
    fn extract_text(&self, input: &Path) -> Result<String>;
    /// Synthesizes one text part, returning the audio bytes.
    fn synthesize(&self, text: &str) -> Result<Vec<u8>>;
}
