use super::types::{DiffError, TextPatch};

pub fn create_patch(old: &str, new: &str) -> TextPatch {
    TextPatch::from_unified(diffy::create_patch(old, new).to_string())
}

/// Patch that turns `new` back into `old`.
pub fn create_inverse_patch(old: &str, new: &str) -> TextPatch {
    create_patch(new, old)
}

/// Applies a patch; fails when `content` does not carry the context the patch
/// was generated against. Callers are expected to have a fallback.
pub fn apply_patch(content: &str, patch: &TextPatch) -> Result<String, DiffError> {
    let parsed = diffy::Patch::from_str(patch.as_str())
        .map_err(|e| DiffError::PatchParse(e.to_string()))?;
    diffy::apply(content, &parsed).map_err(|e| DiffError::PatchApply(e.to_string()))
}
