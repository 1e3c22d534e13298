use anyhow::Context;
use revert_core::services::diff::{self, TextPatch};
use revert_core::services::summary::ChangeSummarizer;
use wasm_bindgen::JsValue;
use wasm_bindgen::prelude::wasm_bindgen;

fn to_js_error(e: anyhow::Error) -> JsValue {
    JsValue::from_str(format!("{:#}", e).as_str())
}

#[wasm_bindgen]
pub fn init() {
    console_error_panic_hook::set_once();
    tracing_wasm::try_set_as_global_default()
        .unwrap_or_else(|e| tracing::warn!("failed to set tracing: {}", e));
}

/// 旧テキストから新テキストへの最小編集を JSON 配列で返す
#[wasm_bindgen]
pub fn compute_text_edits(old_text: &str, new_text: &str) -> Result<String, JsValue> {
    text_edits_json(old_text, new_text).map_err(to_js_error)
}

#[wasm_bindgen]
pub fn summarize_change(
    old_text: &str,
    new_text: &str,
    file_path: &str,
    large_change_threshold: Option<usize>,
) -> Result<String, JsValue> {
    summary_json(old_text, new_text, file_path, large_change_threshold).map_err(to_js_error)
}

#[wasm_bindgen]
pub fn create_inverse_patch(old_text: &str, new_text: &str) -> String {
    diff::create_inverse_patch(old_text, new_text).to_string()
}

#[wasm_bindgen]
pub fn apply_patch(content: &str, patch: &str) -> Result<String, JsValue> {
    apply_patch_text(content, patch).map_err(to_js_error)
}

fn text_edits_json(old_text: &str, new_text: &str) -> anyhow::Result<String> {
    let edits = diff::compute_precise_text_edits(old_text, new_text);
    tracing::debug!("computed {} text edits", edits.len());
    serde_json::to_string(&edits).context("Failed to serialize text edits")
}

fn summary_json(
    old_text: &str,
    new_text: &str,
    file_path: &str,
    large_change_threshold: Option<usize>,
) -> anyhow::Result<String> {
    let summary = ChangeSummarizer::new(large_change_threshold)
        .generate_change_summary(old_text, new_text, file_path);
    serde_json::to_string(&summary).context("Failed to serialize change summary")
}

fn apply_patch_text(content: &str, patch: &str) -> anyhow::Result<String> {
    let patch = TextPatch::from(patch.to_string());
    Ok(diff::apply_patch(content, &patch)?)
}
