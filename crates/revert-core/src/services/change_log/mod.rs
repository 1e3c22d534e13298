mod types;

pub use types::*;

use anyhow::{Context, Result};
use chrono::Utc;
use uuid::Uuid;

use crate::services::diff::create_inverse_patch;
use crate::services::summary::ChangeSummarizer;

/// 現在のプランの変更ログと、完了済みプランのスタックを管理する
#[derive(Debug, Clone, Default)]
pub struct ChangeLogManager {
    changes: Vec<FileChangeEntry>,
    completed_plans: Vec<RevertibleChangeSet>,
    summarizer: ChangeSummarizer,
    max_completed_plans: Option<usize>,
    last_timestamp: i64,
}

impl ChangeLogManager {
    pub fn new(summarizer: ChangeSummarizer, max_completed_plans: Option<usize>) -> Self {
        Self {
            changes: Vec::new(),
            completed_plans: Vec::new(),
            summarizer,
            max_completed_plans,
            last_timestamp: 0,
        }
    }

    pub fn summarizer(&self) -> &ChangeSummarizer {
        &self.summarizer
    }

    pub fn set_summarizer(&mut self, summarizer: ChangeSummarizer) {
        self.summarizer = summarizer;
    }

    /// 現在のログ（まだプランとして保存されていない変更）
    pub fn changes(&self) -> &[FileChangeEntry] {
        &self.changes
    }

    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    /// Timestamps are strictly increasing even when the clock does not advance.
    fn next_timestamp(&mut self) -> i64 {
        let now = Utc::now().timestamp_millis();
        self.last_timestamp = now.max(self.last_timestamp + 1);
        self.last_timestamp
    }

    /// 変更を記録する。重複排除やマージは行わない
    pub fn log_change(&mut self, mut entry: FileChangeEntry) -> &FileChangeEntry {
        match &mut entry.change {
            FileChange::Created { .. } => {
                // ディレクトリに見えるパスは元に戻す際の再帰削除につながるので末尾の区切り文字を落とす
                let normalized = entry.file_path.trim_end_matches(['/', '\\']);
                if normalized.len() != entry.file_path.len() {
                    tracing::warn!(
                        "created path {:?} had a trailing separator, logging {:?}",
                        entry.file_path,
                        normalized
                    );
                    entry.file_path = normalized.to_string();
                }
            }
            FileChange::Modified {
                restore:
                    RestoreSource::FullSnapshot {
                        content,
                        inverse_patch,
                    },
                new_content: Some(new_content),
            } if inverse_patch.is_none() => {
                *inverse_patch = Some(create_inverse_patch(content, new_content));
            }
            _ => {}
        }

        entry.timestamp = self.next_timestamp();
        tracing::debug!(
            "logged {} change for {} at {}",
            entry.change_type(),
            entry.file_path,
            entry.timestamp
        );
        self.changes.push(entry);
        &self.changes[self.changes.len() - 1]
    }

    pub fn record_created(&mut self, file_path: &str, content: &str) -> &FileChangeEntry {
        let summary = self.summarizer.generate_change_summary("", content, file_path);
        self.log_change(FileChangeEntry::new(
            file_path,
            FileChange::Created {
                content: Some(content.to_string()),
            },
            summary,
        ))
    }

    pub fn record_modified(
        &mut self,
        file_path: &str,
        original_content: &str,
        new_content: &str,
    ) -> &FileChangeEntry {
        let summary =
            self.summarizer
                .generate_change_summary(original_content, new_content, file_path);
        self.log_change(FileChangeEntry::new(
            file_path,
            FileChange::Modified {
                restore: RestoreSource::FullSnapshot {
                    content: original_content.to_string(),
                    inverse_patch: None,
                },
                new_content: Some(new_content.to_string()),
            },
            summary,
        ))
    }

    pub fn record_deleted(
        &mut self,
        file_path: &str,
        original_content: Option<&str>,
    ) -> &FileChangeEntry {
        let summary = self.summarizer.generate_change_summary(
            original_content.unwrap_or_default(),
            "",
            file_path,
        );
        self.log_change(FileChangeEntry::new(
            file_path,
            FileChange::Deleted {
                original_content: original_content.map(str::to_string),
            },
            summary,
        ))
    }

    /// キャンセル時などに現在のログを破棄する
    pub fn clear(&mut self) {
        if !self.changes.is_empty() {
            tracing::debug!("discarding {} logged changes", self.changes.len());
        }
        self.changes.clear();
    }

    /// Moves the active log out, leaving it empty.
    pub fn take_changes(&mut self) -> Vec<FileChangeEntry> {
        std::mem::take(&mut self.changes)
    }

    /// 現在のログを完了済みプランとして保存し、ログを空にする
    pub fn save_changes_as_last_completed_plan(&mut self, summary: Option<String>) -> Option<Uuid> {
        if self.changes.is_empty() {
            return None;
        }

        let change_set = RevertibleChangeSet {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            changes: std::mem::take(&mut self.changes),
            summary,
        };
        let id = change_set.id;
        tracing::info!(
            "saved plan {} with {} changes",
            id,
            change_set.changes.len()
        );
        self.completed_plans.push(change_set);

        if let Some(max) = self.max_completed_plans {
            while self.completed_plans.len() > max {
                let dropped = self.completed_plans.remove(0);
                tracing::debug!("dropping oldest completed plan {}", dropped.id);
            }
        }

        Some(id)
    }

    pub fn get_last_completed_plan_changes(&self) -> Option<&RevertibleChangeSet> {
        self.completed_plans.last()
    }

    pub fn get_completed_plan_change_sets(&self) -> &[RevertibleChangeSet] {
        &self.completed_plans
    }

    pub fn pop_last_completed_plan_changes(&mut self) -> Option<RevertibleChangeSet> {
        self.completed_plans.pop()
    }

    pub fn clear_all_completed_plan_changes(&mut self) {
        self.completed_plans.clear();
    }

    pub fn export_changes_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.changes).context("Failed to serialize change log")
    }
}
