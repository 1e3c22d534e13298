use async_trait::async_trait;
use chrono::Utc;
use std::fmt::Debug;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    File,
    Directory,
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteOptions {
    pub to_trash: bool,
    pub recursive: bool,
}

impl DeleteOptions {
    pub fn to_trash(to_trash: bool) -> Self {
        Self {
            to_trash,
            recursive: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum FsError {
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("Refusing to delete directory: {0}")]
    IsDirectory(String),
    #[error("Path is outside the workspace: {0}")]
    OutsideWorkspace(String),
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl FsError {
    fn from_io(path: &str, source: std::io::Error) -> Self {
        if source.kind() == ErrorKind::NotFound {
            FsError::NotFound(path.to_string())
        } else {
            FsError::Io {
                path: path.to_string(),
                source,
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, FsError::NotFound(_))
    }
}

/// ワークスペース相対パスで操作するファイルシステム
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FileSystem: Debug + Send + Sync {
    async fn read(&self, path: &str) -> Result<String, FsError>;
    async fn write(&self, path: &str, content: &str) -> Result<(), FsError>;
    async fn delete(&self, path: &str, options: DeleteOptions) -> Result<(), FsError>;
    async fn stat(&self, path: &str) -> Result<FileKind, FsError>;
}

/// tokio::fs を使ったローカル実装
#[derive(Debug, Clone)]
pub struct LocalFileSystem {
    root: PathBuf,
    trash_dir: PathBuf,
}

impl LocalFileSystem {
    pub fn new(root: impl Into<PathBuf>, trash_dir: impl AsRef<Path>) -> Self {
        let root = root.into();
        let trash_dir = root.join(trash_dir);
        Self { root, trash_dir }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn trash_dir(&self) -> &Path {
        &self.trash_dir
    }

    /// 絶対パスと `..` を含むパスは拒否する
    fn resolve(&self, path: &str) -> Result<PathBuf, FsError> {
        let relative = Path::new(path);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(FsError::OutsideWorkspace(path.to_string()));
        }
        Ok(self.root.join(relative))
    }

    async fn move_to_trash(&self, path: &str, full_path: &Path) -> Result<(), FsError> {
        fs::create_dir_all(&self.trash_dir)
            .await
            .map_err(|e| FsError::from_io(path, e))?;

        let file_name = full_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());
        // 同名ファイルが同じミリ秒に削除されても上書きしない
        let target = self.trash_dir.join(format!(
            "{}-{}-{}",
            Utc::now().format("%Y%m%d%H%M%S%3f"),
            Uuid::new_v4().simple(),
            file_name
        ));

        if let Err(e) = fs::rename(full_path, &target).await {
            if e.kind() == ErrorKind::NotFound {
                return Err(FsError::NotFound(path.to_string()));
            }
            // 別デバイスなどで rename できない場合はコピーしてから削除する
            tracing::debug!("rename to trash failed for {}: {}, copying instead", path, e);
            fs::copy(full_path, &target)
                .await
                .map_err(|e| FsError::from_io(path, e))?;
            fs::remove_file(full_path)
                .await
                .map_err(|e| FsError::from_io(path, e))?;
        }
        Ok(())
    }
}

#[async_trait]
impl FileSystem for LocalFileSystem {
    async fn read(&self, path: &str) -> Result<String, FsError> {
        fs::read_to_string(self.resolve(path)?)
            .await
            .map_err(|e| FsError::from_io(path, e))
    }

    async fn write(&self, path: &str, content: &str) -> Result<(), FsError> {
        let full_path = self.resolve(path)?;
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| FsError::from_io(path, e))?;
        }
        fs::write(&full_path, content)
            .await
            .map_err(|e| FsError::from_io(path, e))
    }

    async fn delete(&self, path: &str, options: DeleteOptions) -> Result<(), FsError> {
        let full_path = self.resolve(path)?;
        let metadata = fs::symlink_metadata(&full_path)
            .await
            .map_err(|e| FsError::from_io(path, e))?;
        if metadata.is_dir() {
            if options.recursive {
                tracing::warn!("recursive delete requested for {}, refusing", path);
            }
            return Err(FsError::IsDirectory(path.to_string()));
        }

        if options.to_trash {
            self.move_to_trash(path, &full_path).await
        } else {
            fs::remove_file(&full_path)
                .await
                .map_err(|e| FsError::from_io(path, e))
        }
    }

    async fn stat(&self, path: &str) -> Result<FileKind, FsError> {
        match fs::metadata(self.resolve(path)?).await {
            Ok(metadata) if metadata.is_dir() => Ok(FileKind::Directory),
            Ok(_) => Ok(FileKind::File),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(FileKind::NotFound),
            Err(e) => Err(FsError::from_io(path, e)),
        }
    }
}
