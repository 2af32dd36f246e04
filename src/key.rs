use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Separator between the operation kind and the target inside a key.
pub const KEY_DELIMITER: char = '_';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    Ocr,
    Crop,
    Tts,
}

impl OperationKind {
    pub const ALL: [OperationKind; 3] = [OperationKind::Ocr, OperationKind::Crop, OperationKind::Tts];

    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::Ocr => "OCR",
            OperationKind::Crop => "CROP",
            OperationKind::Tts => "TTS",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one running job: `"{operation}_{target}"`.
///
/// The operation part never contains the delimiter, so splitting on the first
/// delimiter recovers both halves even when the target path contains `_`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerKey(String);

impl WorkerKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn operation(&self) -> &str {
        split_key(self).0
    }

    pub fn target(&self) -> &str {
        split_key(self).1
    }

    /// File name of the target, used for entry labels.
    pub fn display_name(&self) -> &str {
        let target = self.target();
        Path::new(target)
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or(target)
    }
}

impl fmt::Display for WorkerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn make_key(operation: &str, target: &str) -> WorkerKey {
    WorkerKey(format!("{operation}{KEY_DELIMITER}{target}"))
}

pub fn key_for(operation: OperationKind, target: &Path) -> WorkerKey {
    make_key(operation.as_str(), &target.display().to_string())
}

pub fn split_key(key: &WorkerKey) -> (&str, &str) {
    key.0
        .split_once(KEY_DELIMITER)
        .unwrap_or((key.0.as_str(), ""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_is_file_name() {
        let key = make_key("OCR", "/tmp/scans/book_one.pdf");
        assert_eq!(key.display_name(), "book_one.pdf");
        assert_eq!(key.operation(), "OCR");
        assert_eq!(key.target(), "/tmp/scans/book_one.pdf");
    }

    #[test]
    fn bare_target_displays_as_is() {
        let key = make_key("TTS", "notes.txt");
        assert_eq!(key.display_name(), "notes.txt");
    }
}
