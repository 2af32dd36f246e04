use crate::registry::DEFAULT_CHROME;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub panel: Panel,
    #[serde(default)]
    pub limits: Limits,
    #[serde(default)]
    pub tools: Tools,
    #[serde(default)]
    pub ocr: Ocr,
    #[serde(default)]
    pub crop: Crop,
    #[serde(default)]
    pub tts: Tts,
    #[serde(default)]
    pub output: Output,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: false,
            file_path: "".into(),
        }
    }
}

/// Terminal progress panel geometry, in character cells.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Panel {
    pub width: usize,
    pub height: usize,
    pub chrome: usize,
    pub redraw_ms: u64,
}
impl Default for Panel {
    fn default() -> Self {
        Self {
            width: 80,
            height: 20,
            chrome: DEFAULT_CHROME,
            redraw_ms: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Limits {
    pub max_input_file_bytes: u64,
    pub tool_timeout_seconds: u64,
}
impl Default for Limits {
    fn default() -> Self {
        Self {
            max_input_file_bytes: 2 * 1024 * 1024 * 1024,
            tool_timeout_seconds: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tools {
    pub ocrmypdf: String,
    pub briss: String,
    pub pdfinfo: String,
    pub pdftotext: String,
    pub tts_command: Vec<String>,
}
impl Default for Tools {
    fn default() -> Self {
        Self {
            ocrmypdf: "ocrmypdf".into(),
            briss: "briss".into(),
            pdfinfo: "pdfinfo".into(),
            pdftotext: "pdftotext".into(),
            tts_command: vec!["espeak-ng".into(), "--stdout".into()],
        }
    }
}

/// Marker patterns for one operation. See [`crate::markers::MarkerSet`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarkerConfig {
    #[serde(default)]
    pub unit: Vec<String>,
    #[serde(default)]
    pub phases: Vec<PhaseMarker>,
    #[serde(default)]
    pub total: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseMarker {
    pub pattern: String,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ocr {
    pub args: Vec<String>,
    #[serde(default)]
    pub markers: MarkerConfig,
}
impl Default for Ocr {
    fn default() -> Self {
        Self {
            args: vec!["--force-ocr".into()],
            markers: MarkerConfig {
                unit: vec!["Grafting".into()],
                phases: vec![PhaseMarker {
                    pattern: "Postprocessing\\.\\.\\.".into(),
                    label: "OCR Postprocessing".into(),
                }],
                total: vec![],
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Crop {
    pub automatic: bool,
    pub phase_label: String,
    pub terminal_phase: String,
}
impl Default for Crop {
    fn default() -> Self {
        Self {
            automatic: true,
            phase_label: "Cropping".into(),
            terminal_phase: "Cropping".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tts {
    pub max_part_chars: usize,
    pub extension: String,
    #[serde(default)]
    pub markers: MarkerConfig,
}
impl Default for Tts {
    fn default() -> Self {
        Self {
            max_part_chars: 100,
            extension: "wav".into(),
            markers: MarkerConfig {
                unit: vec!["part-\\d+ created".into()],
                phases: vec![],
                total: vec!["text_parts: (\\d+)".into()],
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Output {
    /// Empty means next to the input file.
    pub out_dir: String,
    pub ocr_suffix: String,
    pub crop_suffix: String,
    pub tts_suffix: String,
}
impl Default for Output {
    fn default() -> Self {
        Self {
            out_dir: "".into(),
            ocr_suffix: "_ocr".into(),
            crop_suffix: "_crop".into(),
            tts_suffix: "_tts".into(),
        }
    }
}
