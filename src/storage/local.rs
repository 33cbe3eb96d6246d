use super::{ByteSink, ByteStream, EntryHandle, EntryKind, FileMeta, Store};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio_util::io::ReaderStream;

/// 本地文件系统存储
///
/// locator 为相对 base_path 的路径，统一使用 / 分隔
pub struct LocalStore {
    base_path: PathBuf,
    name: String,
}

impl LocalStore {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let base_path = path.as_ref().to_path_buf();
        if !base_path.exists() {
            std::fs::create_dir_all(&base_path)?;
        }
        let name = format!("local:{}", base_path.display());
        Ok(Self { base_path, name })
    }

    fn resolve_path(&self, locator: &str) -> PathBuf {
        let locator = locator.trim_start_matches('/');
        if locator.is_empty() {
            self.base_path.clone()
        } else {
            self.base_path.join(locator)
        }
    }

    fn child_locator(parent: &EntryHandle, name: &str) -> String {
        let parent_locator = parent.locator().trim_end_matches('/');
        if parent_locator.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", parent_locator, name)
        }
    }

    fn mtime_millis(metadata: &std::fs::Metadata) -> Result<i64> {
        let modified = metadata.modified()?;
        let millis = modified
            .duration_since(std::time::UNIX_EPOCH)?
            .as_millis() as i64;
        Ok(millis)
    }
}

#[async_trait]
impl Store for LocalStore {
    async fn root(&self) -> Result<EntryHandle> {
        let name = self
            .base_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("")
            .to_string();
        Ok(EntryHandle::new("", name, EntryKind::Dir))
    }

    async fn list_children(&self, dir: &EntryHandle) -> Result<Vec<EntryHandle>> {
        let full_path = self.resolve_path(dir.locator());
        let mut entries = fs::read_dir(&full_path)
            .await
            .with_context(|| format!("failed to list directory {}", full_path.display()))?;

        let mut children = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .with_context(|| format!("failed to read entry under {}", full_path.display()))?
        {
            let name = entry
                .file_name()
                .to_str()
                .map(str::to_string)
                .with_context(|| format!("non-UTF8 entry name under {}", full_path.display()))?;
            let file_type = entry.file_type().await?;
            // 符号链接不在同步范围内
            if file_type.is_symlink() {
                continue;
            }
            let kind = if file_type.is_dir() {
                EntryKind::Dir
            } else {
                EntryKind::File
            };
            children.push(EntryHandle::new(Self::child_locator(dir, &name), name, kind));
        }
        Ok(children)
    }

    async fn file_meta(&self, file: &EntryHandle) -> Result<FileMeta> {
        let metadata = fs::metadata(self.resolve_path(file.locator())).await?;
        Ok(FileMeta {
            size: metadata.len(),
            mtime: Self::mtime_millis(&metadata)?,
        })
    }

    async fn open_reader(&self, file: &EntryHandle) -> Result<ByteStream> {
        let file = fs::File::open(self.resolve_path(file.locator())).await?;
        Ok(Box::pin(ReaderStream::new(file)))
    }

    async fn create_file(&self, parent: &EntryHandle, name: &str) -> Result<EntryHandle> {
        let locator = Self::child_locator(parent, name);
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .open(self.resolve_path(&locator))
            .await?;
        Ok(EntryHandle::new(locator, name, EntryKind::File))
    }

    async fn open_writer(&self, file: &EntryHandle) -> Result<ByteSink> {
        let writer = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(self.resolve_path(file.locator()))
            .await?;
        Ok(Box::pin(writer))
    }

    async fn create_dir(&self, parent: &EntryHandle, name: &str) -> Result<EntryHandle> {
        let locator = Self::child_locator(parent, name);
        let full_path = self.resolve_path(&locator);
        if !full_path.exists() {
            fs::create_dir(&full_path).await?;
        }
        Ok(EntryHandle::new(locator, name, EntryKind::Dir))
    }

    async fn remove_entry(&self, parent: &EntryHandle, name: &str, recursive: bool) -> Result<()> {
        let full_path = self.resolve_path(&Self::child_locator(parent, name));
        if !full_path.exists() {
            return Ok(());
        }
        if full_path.is_dir() {
            if recursive {
                fs::remove_dir_all(&full_path).await?;
            } else {
                fs::remove_dir(&full_path).await?;
            }
        } else {
            fs::remove_file(&full_path).await?;
        }
        Ok(())
    }

    async fn exists(&self, parent: &EntryHandle, name: &str) -> Result<bool> {
        let full_path = self.resolve_path(&Self::child_locator(parent, name));
        Ok(fs::try_exists(&full_path).await?)
    }

    fn is_ancestor(&self, a: &EntryHandle, b: &EntryHandle) -> bool {
        if a.locator().is_empty() {
            return !b.locator().is_empty();
        }
        b.locator()
            .strip_prefix(a.locator())
            .map(|rest| rest.starts_with('/'))
            .unwrap_or(false)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
