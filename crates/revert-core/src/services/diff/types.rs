use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// 差分の最小単位
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "text", rename_all = "lowercase")]
pub enum DiffOp {
    Equal(String),
    Insert(String),
    Delete(String),
}

impl DiffOp {
    pub fn text(&self) -> &str {
        match self {
            DiffOp::Equal(text) | DiffOp::Insert(text) | DiffOp::Delete(text) => text,
        }
    }

    pub fn is_edit(&self) -> bool {
        !matches!(self, DiffOp::Equal(_))
    }
}

/// Reconstructs the old text from a diff (Equal + Delete spans).
pub fn old_text(ops: &[DiffOp]) -> String {
    ops.iter()
        .filter(|op| !matches!(op, DiffOp::Insert(_)))
        .map(DiffOp::text)
        .collect()
}

/// Reconstructs the new text from a diff (Equal + Insert spans).
pub fn new_text(ops: &[DiffOp]) -> String {
    ops.iter()
        .filter(|op| !matches!(op, DiffOp::Delete(_)))
        .map(DiffOp::text)
        .collect()
}

/// Byte range in the old document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextRange {
    pub start: usize,
    pub end: usize,
}

impl TextRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// 元のドキュメント座標で表現された置換
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextEdit {
    pub range: TextRange,
    pub replacement: String,
}

/// Unified diff text describing how to turn one text into another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TextPatch(String);

impl TextPatch {
    pub(crate) fn from_unified(text: String) -> Self {
        Self(text)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Parsing is deferred until the patch is applied.
impl From<String> for TextPatch {
    fn from(text: String) -> Self {
        Self::from_unified(text)
    }
}

impl fmt::Display for TextPatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error)]
pub enum DiffError {
    #[error("Failed to parse patch: {0}")]
    PatchParse(String),
    #[error("Failed to apply patch: {0}")]
    PatchApply(String),
    #[error("Invalid text edit: {0}")]
    InvalidEdit(String),
}
