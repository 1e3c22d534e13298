use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::services::summary::DEFAULT_LARGE_CHANGE_THRESHOLD;

pub const DEFAULT_TRASH_DIR: &str = ".revert-trash";

/// 変更追跡の設定。ファイルに無い項目はデフォルト値を使う
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChangeTrackingSettings {
    /// これを超える行数の変更はエンティティ解析を省略する
    pub large_change_threshold: usize,
    pub use_trash: bool,
    /// ワークスペースからの相対パス
    pub trash_dir: PathBuf,
    pub max_completed_plans: Option<usize>,
}

impl Default for ChangeTrackingSettings {
    fn default() -> Self {
        Self {
            large_change_threshold: DEFAULT_LARGE_CHANGE_THRESHOLD,
            use_trash: true,
            trash_dir: PathBuf::from(DEFAULT_TRASH_DIR),
            max_completed_plans: None,
        }
    }
}

impl ChangeTrackingSettings {
    /// 設定ファイルを読み込む。存在しない場合はデフォルト値で作成する
    pub async fn load(path: &Path) -> Result<Self> {
        let missing = match fs::metadata(path).await {
            Ok(_) => false,
            Err(e) if e.kind() == ErrorKind::NotFound => true,
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to access settings at {}", path.display()))
            }
        };
        if missing {
            let settings = Self::default();
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).await?;
            }
            fs::write(path, serde_json::to_string_pretty(&settings)?)
                .await
                .with_context(|| format!("Failed to write settings to {}", path.display()))?;
            tracing::debug!("created default settings at {}", path.display());
            return Ok(settings);
        }

        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid settings file {}", path.display()))
    }
}
