use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::services::diff::TextPatch;
use crate::services::summary::ChangeSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Created,
    Modified,
    Deleted,
    Unknown,
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeType::Created => write!(f, "created"),
            ChangeType::Modified => write!(f, "modified"),
            ChangeType::Deleted => write!(f, "deleted"),
            ChangeType::Unknown => write!(f, "unknown"),
        }
    }
}

/// Modified エントリを元に戻すための情報。少なくともどちらか一方は必ず存在する
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum RestoreSource {
    FullSnapshot {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        inverse_patch: Option<TextPatch>,
    },
    PatchAgainst {
        inverse_patch: TextPatch,
    },
}

impl RestoreSource {
    pub fn snapshot(&self) -> Option<&str> {
        match self {
            RestoreSource::FullSnapshot { content, .. } => Some(content),
            RestoreSource::PatchAgainst { .. } => None,
        }
    }

    pub fn inverse_patch(&self) -> Option<&TextPatch> {
        match self {
            RestoreSource::FullSnapshot { inverse_patch, .. } => inverse_patch.as_ref(),
            RestoreSource::PatchAgainst { inverse_patch } => Some(inverse_patch),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "changeType", rename_all = "lowercase")]
pub enum FileChange {
    Created {
        #[serde(default)]
        content: Option<String>,
    },
    Modified {
        restore: RestoreSource,
        #[serde(default, rename = "newContent")]
        new_content: Option<String>,
    },
    Deleted {
        #[serde(default, rename = "originalContent")]
        original_content: Option<String>,
    },
    /// 未知の変更種別（新しいバージョンが書いたログ）
    #[serde(other)]
    Unknown,
}

impl FileChange {
    pub fn change_type(&self) -> ChangeType {
        match self {
            FileChange::Created { .. } => ChangeType::Created,
            FileChange::Modified { .. } => ChangeType::Modified,
            FileChange::Deleted { .. } => ChangeType::Deleted,
            FileChange::Unknown => ChangeType::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileChangeEntry {
    pub file_path: String,
    #[serde(flatten)]
    pub change: FileChange,
    pub summary: String,
    #[serde(default)]
    pub added_lines: Vec<String>,
    #[serde(default)]
    pub removed_lines: Vec<String>,
    #[serde(default)]
    pub diff_content: String,
    #[serde(default)]
    pub timestamp: i64,
}

impl FileChangeEntry {
    /// The timestamp is assigned when the entry is logged.
    pub fn new(file_path: impl Into<String>, change: FileChange, summary: ChangeSummary) -> Self {
        Self {
            file_path: file_path.into(),
            change,
            summary: summary.summary,
            added_lines: summary.added_lines,
            removed_lines: summary.removed_lines,
            diff_content: summary.formatted_diff,
            timestamp: 0,
        }
    }

    pub fn change_type(&self) -> ChangeType {
        self.change.change_type()
    }
}

/// 完了したプランの変更をまとめたもの。作成後は変更しない
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevertibleChangeSet {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub changes: Vec<FileChangeEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}
