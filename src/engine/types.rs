use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    Ocrmypdf,
    Briss,
    Pdfinfo,
    Pdftotext,
    Tts,
}

impl Tool {
    pub const ALL: [Tool; 5] = [
        Tool::Ocrmypdf,
        Tool::Briss,
        Tool::Pdfinfo,
        Tool::Pdftotext,
        Tool::Tts,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Tool::Ocrmypdf => "ocrmypdf",
            Tool::Briss => "briss",
            Tool::Pdfinfo => "pdfinfo",
            Tool::Pdftotext => "pdftotext",
            Tool::Tts => "tts",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDiag {
    pub tool: Tool,
    pub command: String,
    pub ok: bool,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}
