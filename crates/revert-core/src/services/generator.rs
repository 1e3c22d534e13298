use anyhow::Result;
use async_trait::async_trait;
use std::fmt::Debug;

/// 指示と現在の内容から新しいファイル内容を生成する外部コンポーネント
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentGenerator: Debug + Send + Sync {
    async fn generate(
        &self,
        file_path: &str,
        instruction: &str,
        current_content: &str,
    ) -> Result<String>;
}
