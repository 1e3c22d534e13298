use super::line_diff::push_span;
use super::types::{DiffError, DiffOp, TextEdit, TextRange};
use similar::{Algorithm, ChangeTag, TextDiff};
#[cfg(not(target_arch = "wasm32"))]
use std::time::Duration;

/// Upper bound for the character diff; past it the diff gets coarser, never wrong.
#[cfg(not(target_arch = "wasm32"))]
const CHAR_DIFF_TIMEOUT: Duration = Duration::from_secs(2);

pub fn compute_char_diff(old: &str, new: &str) -> Vec<DiffOp> {
    let mut config = TextDiff::configure();
    config.algorithm(Algorithm::Myers);
    // std の Instant は wasm32-unknown-unknown では使えない
    #[cfg(not(target_arch = "wasm32"))]
    config.timeout(CHAR_DIFF_TIMEOUT);
    let diff = config.diff_chars(old, new);

    let mut ops = Vec::new();
    for change in diff.iter_all_changes() {
        let value = change.value().to_string();
        let op = match change.tag() {
            ChangeTag::Equal => DiffOp::Equal(value),
            ChangeTag::Insert => DiffOp::Insert(value),
            ChangeTag::Delete => DiffOp::Delete(value),
        };
        push_span(&mut ops, op);
    }
    ops
}

/// Minimal edits in old-text byte offsets, valid for an editor that applies
/// all of them against the original document.
pub fn compute_precise_text_edits(old: &str, new: &str) -> Vec<TextEdit> {
    let mut edits = Vec::new();
    let mut cursor = 0;

    for op in compute_char_diff(old, new) {
        match op {
            DiffOp::Equal(text) => cursor += text.len(),
            DiffOp::Insert(text) => edits.push(TextEdit {
                range: TextRange::new(cursor, cursor),
                replacement: text,
            }),
            DiffOp::Delete(text) => {
                edits.push(TextEdit {
                    range: TextRange::new(cursor, cursor + text.len()),
                    replacement: String::new(),
                });
                cursor += text.len();
            }
        }
    }

    edits
}

/// Applies edits expressed in original-document coordinates.
pub fn apply_text_edits(old: &str, edits: &[TextEdit]) -> Result<String, DiffError> {
    let mut result = String::with_capacity(old.len());
    let mut cursor = 0;

    for edit in edits {
        let TextRange { start, end } = edit.range;
        if start > end || end > old.len() {
            return Err(DiffError::InvalidEdit(format!(
                "range {}..{} is outside of a document of {} bytes",
                start,
                end,
                old.len()
            )));
        }
        if start < cursor {
            return Err(DiffError::InvalidEdit(format!(
                "range {}..{} overlaps or precedes the previous edit ending at {}",
                start, end, cursor
            )));
        }
        if !old.is_char_boundary(start) || !old.is_char_boundary(end) {
            return Err(DiffError::InvalidEdit(format!(
                "range {}..{} does not fall on character boundaries",
                start, end
            )));
        }
        result.push_str(&old[cursor..start]);
        result.push_str(&edit.replacement);
        cursor = end;
    }

    result.push_str(&old[cursor..]);
    Ok(result)
}
