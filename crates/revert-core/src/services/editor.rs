use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Mutex;

use crate::services::diff::{apply_text_edits, TextEdit};

/// 開いているドキュメントへ編集を適用するエディタ側の窓口。
/// 編集は元のドキュメントの座標で表現され、昇順で重ならない
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EditorSurface: Debug + Send + Sync {
    async fn apply_edits(&self, file_path: &str, edits: &[TextEdit]) -> Result<()>;
}

/// Editor surface backed by in-memory documents, for headless hosts.
#[derive(Debug, Default)]
pub struct InMemoryEditor {
    documents: Mutex<HashMap<String, String>>,
}

impl InMemoryEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self, file_path: &str, content: &str) -> Result<()> {
        let mut documents = self
            .documents
            .lock()
            .map_err(|_| anyhow::anyhow!("document store poisoned"))?;
        documents.insert(file_path.to_string(), content.to_string());
        Ok(())
    }

    pub fn content(&self, file_path: &str) -> Option<String> {
        self.documents
            .lock()
            .ok()
            .and_then(|documents| documents.get(file_path).cloned())
    }
}

#[async_trait]
impl EditorSurface for InMemoryEditor {
    async fn apply_edits(&self, file_path: &str, edits: &[TextEdit]) -> Result<()> {
        let mut documents = self
            .documents
            .lock()
            .map_err(|_| anyhow::anyhow!("document store poisoned"))?;
        let document = documents.entry(file_path.to_string()).or_default();
        *document = apply_text_edits(document, edits)?;
        Ok(())
    }
}
