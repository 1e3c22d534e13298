use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::services::change_log::{ChangeLogManager, FileChangeEntry};
use crate::services::diff::compute_precise_text_edits;
use crate::services::editor::EditorSurface;
use crate::services::fs::{DeleteOptions, FileSystem, LocalFileSystem};
use crate::services::generator::ContentGenerator;
use crate::services::revert::{RevertBatchResult, RevertService};
use crate::services::summary::{ChangeSummarizer, ContentAnalyzer};
use crate::shared::settings::ChangeTrackingSettings;

/// ファイル編集を記録し、プラン単位で元に戻せるようにする
#[derive(Debug)]
pub struct ChangeTracker {
    fs: Arc<dyn FileSystem>,
    editor: Option<Arc<dyn EditorSurface>>,
    log: ChangeLogManager,
    revert_service: RevertService,
    settings: ChangeTrackingSettings,
}

impl ChangeTracker {
    pub fn new(fs: Arc<dyn FileSystem>, settings: ChangeTrackingSettings) -> Self {
        let log = ChangeLogManager::new(
            ChangeSummarizer::new(Some(settings.large_change_threshold)),
            settings.max_completed_plans,
        );
        let revert_service = RevertService::new(Arc::clone(&fs), settings.use_trash);
        Self {
            fs,
            editor: None,
            log,
            revert_service,
            settings,
        }
    }

    /// ローカルのワークスペースを対象にする
    pub fn for_workspace(workspace_path: impl Into<PathBuf>, settings: ChangeTrackingSettings) -> Self {
        let fs = LocalFileSystem::new(workspace_path, &settings.trash_dir);
        Self::new(Arc::new(fs), settings)
    }

    pub fn set_editor_surface(&mut self, editor: Arc<dyn EditorSurface>) {
        self.editor = Some(editor);
    }

    pub fn set_content_analyzer(&mut self, analyzer: Arc<dyn ContentAnalyzer>) {
        let summarizer = ChangeSummarizer::new(Some(self.settings.large_change_threshold))
            .with_analyzer(analyzer);
        self.log.set_summarizer(summarizer);
    }

    pub fn settings(&self) -> &ChangeTrackingSettings {
        &self.settings
    }

    pub fn change_log(&self) -> &ChangeLogManager {
        &self.log
    }

    pub fn change_log_mut(&mut self) -> &mut ChangeLogManager {
        &mut self.log
    }

    async fn read_existing(&self, file_path: &str) -> Result<Option<String>> {
        match self.fs.read(file_path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn record(&mut self, file_path: &str, previous: Option<&str>, content: &str) -> FileChangeEntry {
        match previous {
            Some(previous) => self.log.record_modified(file_path, previous, content),
            None => self.log.record_created(file_path, content),
        }
        .clone()
    }

    /// 生成器に新しい内容を作らせ、エディタとディスクに反映して記録する。
    /// 内容が変わらなかった場合は何も記録しない
    pub async fn apply_generated_edit(
        &mut self,
        file_path: &str,
        instruction: &str,
        generator: &dyn ContentGenerator,
    ) -> Result<Option<FileChangeEntry>> {
        let previous = self.read_existing(file_path).await?;
        let base = previous.as_deref().unwrap_or_default();
        let new_content = generator
            .generate(file_path, instruction, base)
            .await
            .with_context(|| format!("Failed to generate content for {}", file_path))?;

        if previous.as_deref() == Some(new_content.as_str()) {
            tracing::debug!("{} unchanged by generator", file_path);
            return Ok(None);
        }

        if let Some(editor) = &self.editor {
            let edits = compute_precise_text_edits(base, &new_content);
            editor
                .apply_edits(file_path, &edits)
                .await
                .with_context(|| format!("Failed to apply edits to {}", file_path))?;
        }

        self.fs.write(file_path, &new_content).await?;
        Ok(Some(self.record(file_path, previous.as_deref(), &new_content)))
    }

    pub async fn write_file(
        &mut self,
        file_path: &str,
        content: &str,
    ) -> Result<Option<FileChangeEntry>> {
        let previous = self.read_existing(file_path).await?;
        if previous.as_deref() == Some(content) {
            return Ok(None);
        }
        self.fs.write(file_path, content).await?;
        Ok(Some(self.record(file_path, previous.as_deref(), content)))
    }

    pub async fn delete_file(&mut self, file_path: &str) -> Result<FileChangeEntry> {
        let previous = self.read_existing(file_path).await?;
        self.fs
            .delete(file_path, DeleteOptions::to_trash(self.settings.use_trash))
            .await
            .with_context(|| format!("Failed to delete {}", file_path))?;
        Ok(self
            .log
            .record_deleted(file_path, previous.as_deref())
            .clone())
    }

    /// プラン成功時に呼ぶ
    pub fn complete_plan(&mut self, summary: Option<String>) -> Option<Uuid> {
        self.log.save_changes_as_last_completed_plan(summary)
    }

    /// プランのキャンセル・失敗時に呼ぶ
    pub fn cancel_plan(&mut self) {
        self.log.clear();
    }

    /// 最後に完了したプランを取り出して元に戻す。
    /// 元に戻した操作は現在のログに記録される
    pub async fn revert_last_plan(
        &mut self,
        cancel: &CancellationToken,
    ) -> Option<RevertBatchResult> {
        let change_set = self.log.pop_last_completed_plan_changes()?;
        tracing::info!(
            "reverting plan {} ({} changes)",
            change_set.id,
            change_set.changes.len()
        );
        let batch = self
            .revert_service
            .revert_changes(&change_set.changes, &mut self.log, cancel)
            .await;
        Some(batch)
    }

    /// まだ保存されていない変更を元に戻す
    pub async fn revert_current_changes(&mut self, cancel: &CancellationToken) -> RevertBatchResult {
        let changes = self.log.take_changes();
        self.revert_service
            .revert_changes(&changes, &mut self.log, cancel)
            .await
    }
}
