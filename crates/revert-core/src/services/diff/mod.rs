mod line_diff;
mod patch;
mod text_edits;
pub mod types;

pub use line_diff::{cleanup_semantic, compute_line_diff};
pub use patch::{apply_patch, create_inverse_patch, create_patch};
pub use text_edits::{apply_text_edits, compute_char_diff, compute_precise_text_edits};
pub use types::{new_text, old_text, DiffError, DiffOp, TextEdit, TextPatch, TextRange};
