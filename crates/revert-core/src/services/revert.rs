use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::services::change_log::{
    ChangeLogManager, ChangeType, FileChange, FileChangeEntry, RestoreSource,
};
use crate::services::diff::apply_patch;
use crate::services::fs::{DeleteOptions, FileKind, FileSystem, FsError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RevertAction {
    DeletedFile,
    RestoredContent,
    RecreatedFile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SkipReason {
    /// 作成されたファイルがすでに存在しない
    AlreadyAbsent,
    /// 現在の内容がすでに復元後の内容と一致している
    AlreadyReverted,
    PathIsDirectory,
    /// 削除されたファイルのパスに別のファイルが存在する
    PathOccupied,
    NoContentAvailable,
    UnrecognizedChangeType,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::AlreadyAbsent => write!(f, "file is already absent"),
            SkipReason::AlreadyReverted => write!(f, "file already has its original content"),
            SkipReason::PathIsDirectory => write!(f, "path is a directory"),
            SkipReason::PathOccupied => write!(f, "a file already exists at this path"),
            SkipReason::NoContentAvailable => write!(f, "no content available to restore"),
            SkipReason::UnrecognizedChangeType => write!(f, "unrecognized change type"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "camelCase")]
pub enum RevertOutcome {
    Reverted(RevertAction),
    Skipped(SkipReason),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryRevertResult {
    pub file_path: String,
    pub change_type: ChangeType,
    pub timestamp: i64,
    pub outcome: RevertOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevertBatchResult {
    /// 処理した順（記録の逆順）
    pub results: Vec<EntryRevertResult>,
    pub cancelled: bool,
}

impl RevertBatchResult {
    pub fn reverted_count(&self) -> usize {
        self.count(|outcome| matches!(outcome, RevertOutcome::Reverted(_)))
    }

    pub fn skipped_count(&self) -> usize {
        self.count(|outcome| matches!(outcome, RevertOutcome::Skipped(_)))
    }

    pub fn failed_count(&self) -> usize {
        self.count(|outcome| matches!(outcome, RevertOutcome::Failed(_)))
    }

    pub fn has_failures(&self) -> bool {
        self.failed_count() > 0
    }

    fn count(&self, predicate: impl Fn(&RevertOutcome) -> bool) -> usize {
        self.results.iter().filter(|r| predicate(&r.outcome)).count()
    }
}

/// 記録された変更を新しいものから順に元に戻す
#[derive(Debug, Clone)]
pub struct RevertService {
    fs: Arc<dyn FileSystem>,
    use_trash: bool,
}

impl RevertService {
    pub fn new(fs: Arc<dyn FileSystem>, use_trash: bool) -> Self {
        Self { fs, use_trash }
    }

    /// Entries are processed one at a time in reverse order. A failed entry
    /// never stops the batch; cancellation is checked before each entry and
    /// leaves already reverted entries in place.
    pub async fn revert_changes(
        &self,
        changes: &[FileChangeEntry],
        log: &mut ChangeLogManager,
        cancel: &CancellationToken,
    ) -> RevertBatchResult {
        let mut batch = RevertBatchResult::default();

        for entry in changes.iter().rev() {
            if cancel.is_cancelled() {
                tracing::info!(
                    "revert cancelled with {} of {} entries processed",
                    batch.results.len(),
                    changes.len()
                );
                batch.cancelled = true;
                break;
            }

            let outcome = match self.revert_entry(entry, log).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!("failed to revert {}: {}", entry.file_path, e);
                    RevertOutcome::Failed(e.to_string())
                }
            };
            match &outcome {
                RevertOutcome::Reverted(action) => {
                    tracing::info!("reverted {} ({:?})", entry.file_path, action)
                }
                RevertOutcome::Skipped(reason) => {
                    tracing::debug!("skipped {}: {}", entry.file_path, reason)
                }
                RevertOutcome::Failed(_) => {}
            }

            batch.results.push(EntryRevertResult {
                file_path: entry.file_path.clone(),
                change_type: entry.change_type(),
                timestamp: entry.timestamp,
                outcome,
            });
        }

        batch
    }

    async fn revert_entry(
        &self,
        entry: &FileChangeEntry,
        log: &mut ChangeLogManager,
    ) -> Result<RevertOutcome, FsError> {
        let path = entry.file_path.as_str();
        match &entry.change {
            FileChange::Created { .. } => self.revert_created(path, log).await,
            FileChange::Modified { restore, .. } => self.revert_modified(path, restore, log).await,
            FileChange::Deleted { original_content } => {
                self.revert_deleted(path, original_content.as_deref(), log)
                    .await
            }
            FileChange::Unknown => {
                tracing::warn!("skipping {}: unrecognized change type", path);
                Ok(RevertOutcome::Skipped(SkipReason::UnrecognizedChangeType))
            }
        }
    }

    async fn revert_created(
        &self,
        path: &str,
        log: &mut ChangeLogManager,
    ) -> Result<RevertOutcome, FsError> {
        match self.fs.stat(path).await? {
            FileKind::NotFound => return Ok(RevertOutcome::Skipped(SkipReason::AlreadyAbsent)),
            FileKind::Directory => {
                tracing::warn!("not deleting {}: created path is now a directory", path);
                return Ok(RevertOutcome::Skipped(SkipReason::PathIsDirectory));
            }
            FileKind::File => {}
        }

        // 監査ログ用に削除前の内容を読んでおく（読めなくても削除は続ける）
        let current = match self.fs.read(path).await {
            Ok(content) => Some(content),
            Err(e) if e.is_not_found() => {
                return Ok(RevertOutcome::Skipped(SkipReason::AlreadyAbsent))
            }
            Err(e) => {
                tracing::debug!("could not read {} before deleting it: {}", path, e);
                None
            }
        };

        match self
            .fs
            .delete(path, DeleteOptions::to_trash(self.use_trash))
            .await
        {
            Ok(()) => {}
            Err(FsError::NotFound(_)) => {
                return Ok(RevertOutcome::Skipped(SkipReason::AlreadyAbsent))
            }
            Err(FsError::IsDirectory(_)) => {
                return Ok(RevertOutcome::Skipped(SkipReason::PathIsDirectory))
            }
            Err(e) => return Err(e),
        }

        log.record_deleted(path, current.as_deref());
        Ok(RevertOutcome::Reverted(RevertAction::DeletedFile))
    }

    async fn revert_modified(
        &self,
        path: &str,
        restore: &RestoreSource,
        log: &mut ChangeLogManager,
    ) -> Result<RevertOutcome, FsError> {
        match self.fs.stat(path).await? {
            FileKind::NotFound => {
                let Some(snapshot) = restore.snapshot() else {
                    tracing::warn!("cannot restore missing file {}: no snapshot recorded", path);
                    return Ok(RevertOutcome::Skipped(SkipReason::NoContentAvailable));
                };
                self.fs.write(path, snapshot).await?;
                log.record_created(path, snapshot);
                return Ok(RevertOutcome::Reverted(RevertAction::RecreatedFile));
            }
            FileKind::Directory => {
                tracing::warn!("not restoring {}: path is now a directory", path);
                return Ok(RevertOutcome::Skipped(SkipReason::PathIsDirectory));
            }
            FileKind::File => {}
        }

        let current = self.fs.read(path).await?;
        let restored = match restore {
            RestoreSource::FullSnapshot { content, .. } => content.clone(),
            RestoreSource::PatchAgainst { inverse_patch } => {
                match apply_patch(&current, inverse_patch) {
                    Ok(restored) => restored,
                    Err(e) => {
                        tracing::warn!("inverse patch for {} no longer applies: {}", path, e);
                        return Ok(RevertOutcome::Skipped(SkipReason::NoContentAvailable));
                    }
                }
            }
        };

        if restored == current {
            return Ok(RevertOutcome::Skipped(SkipReason::AlreadyReverted));
        }

        self.fs.write(path, &restored).await?;
        log.record_modified(path, &current, &restored);
        Ok(RevertOutcome::Reverted(RevertAction::RestoredContent))
    }

    async fn revert_deleted(
        &self,
        path: &str,
        original_content: Option<&str>,
        log: &mut ChangeLogManager,
    ) -> Result<RevertOutcome, FsError> {
        let Some(original_content) = original_content else {
            tracing::warn!("cannot recreate {}: original content was not recorded", path);
            return Ok(RevertOutcome::Skipped(SkipReason::NoContentAvailable));
        };

        if self.fs.stat(path).await? != FileKind::NotFound {
            tracing::warn!("not recreating {}: something already exists there", path);
            return Ok(RevertOutcome::Skipped(SkipReason::PathOccupied));
        }

        self.fs.write(path, original_content).await?;
        log.record_created(path, original_content);
        Ok(RevertOutcome::Reverted(RevertAction::RecreatedFile))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fs::MockFileSystem;
    use pretty_assertions::assert_eq;

    fn io_error(path: &str) -> FsError {
        FsError::Io {
            path: path.to_string(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        }
    }

    fn logged(entries: &[(&str, &str)]) -> Vec<FileChangeEntry> {
        let mut log = ChangeLogManager::default();
        for &(path, content) in entries {
            log.record_deleted(path, Some(content));
        }
        log.changes().to_vec()
    }

    #[tokio::test]
    async fn test_io_failure_does_not_abort_batch() {
        let changes = logged(&[("first.txt", "1\n"), ("second.txt", "2\n")]);

        let mut fs = MockFileSystem::new();
        fs.expect_stat().returning(|_| Ok(FileKind::NotFound));
        fs.expect_write().returning(|path, _| {
            if path == "second.txt" {
                Err(io_error(path))
            } else {
                Ok(())
            }
        });

        let service = RevertService::new(Arc::new(fs), false);
        let mut log = ChangeLogManager::default();
        let batch = service
            .revert_changes(&changes, &mut log, &CancellationToken::new())
            .await;

        assert!(!batch.cancelled);
        assert_eq!(batch.results.len(), 2);
        assert_eq!(batch.results[0].file_path, "second.txt");
        assert!(matches!(batch.results[0].outcome, RevertOutcome::Failed(_)));
        assert_eq!(
            batch.results[1].outcome,
            RevertOutcome::Reverted(RevertAction::RecreatedFile)
        );
        assert_eq!(batch.failed_count(), 1);
        assert_eq!(batch.reverted_count(), 1);

        // 失敗したエントリは記録されない
        assert_eq!(log.changes().len(), 1);
        assert_eq!(log.changes()[0].file_path, "first.txt");
        assert_eq!(log.changes()[0].change_type(), ChangeType::Created);
    }

    #[tokio::test]
    async fn test_created_directory_is_never_deleted() {
        let mut log = ChangeLogManager::default();
        log.record_created("generated", "x\n");
        let changes = log.changes().to_vec();

        let mut fs = MockFileSystem::new();
        fs.expect_stat().returning(|_| Ok(FileKind::Directory));
        fs.expect_delete().never();

        let service = RevertService::new(Arc::new(fs), true);
        let batch = service
            .revert_changes(&changes, &mut log, &CancellationToken::new())
            .await;
        assert_eq!(
            batch.results[0].outcome,
            RevertOutcome::Skipped(SkipReason::PathIsDirectory)
        );
    }

    #[tokio::test]
    async fn test_cancellation_is_checked_between_entries() {
        let changes = logged(&[("a.txt", "a\n"), ("b.txt", "b\n"), ("c.txt", "c\n")]);
        let cancel = CancellationToken::new();

        let mut fs = MockFileSystem::new();
        fs.expect_stat().returning(|_| Ok(FileKind::NotFound));
        let token = cancel.clone();
        fs.expect_write().times(1).returning(move |_, _| {
            token.cancel();
            Ok(())
        });

        let service = RevertService::new(Arc::new(fs), false);
        let mut log = ChangeLogManager::default();
        let batch = service.revert_changes(&changes, &mut log, &cancel).await;

        assert!(batch.cancelled);
        assert_eq!(batch.results.len(), 1);
        assert_eq!(batch.results[0].file_path, "c.txt");
        // 完了済みの復元は取り消さない
        assert_eq!(log.changes().len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let changes = logged(&[("a.txt", "a\n")]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut fs = MockFileSystem::new();
        fs.expect_stat().never();

        let service = RevertService::new(Arc::new(fs), false);
        let mut log = ChangeLogManager::default();
        let batch = service.revert_changes(&changes, &mut log, &cancel).await;
        assert!(batch.cancelled);
        assert!(batch.results.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_change_type_is_skipped() {
        let entry: FileChangeEntry = serde_json::from_str(
            r#"{"filePath":"a.ts","changeType":"renamed","summary":"moved"}"#,
        )
        .unwrap();

        let mut fs = MockFileSystem::new();
        fs.expect_stat().never();

        let service = RevertService::new(Arc::new(fs), false);
        let mut log = ChangeLogManager::default();
        let batch = service
            .revert_changes(&[entry], &mut log, &CancellationToken::new())
            .await;
        assert_eq!(
            batch.results[0].outcome,
            RevertOutcome::Skipped(SkipReason::UnrecognizedChangeType)
        );
        assert!(log.changes().is_empty());
    }
}
