//! 目录扫描器：递归枚举单侧目录树，生成带聚合统计的扫描树

use crate::core::errors::ScanError;
use crate::storage::{EntryHandle, EntryKind, Store};
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

/// 扫描实体 id
pub type EntityId = Uuid;

/// 目录子树的聚合统计
///
/// 不变式：等于全部直接子项贡献之和（目录子项贡献自身加其子树）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanDirStats {
    pub files_count: u64,
    pub dirs_count: u64,
    pub size: u64,
}

/// 文件实体
#[derive(Debug)]
pub struct FileEntity {
    pub id: EntityId,
    pub name: String,
    pub path: String,
    pub handle: EntryHandle,
    pub size: u64,
    /// 修改时间，毫秒时间戳
    pub mtime: i64,
}

/// 目录实体
#[derive(Debug)]
pub struct DirEntity {
    pub id: EntityId,
    pub name: String,
    pub path: String,
    pub handle: EntryHandle,
    pub children: Vec<ScanEntry>,
    pub stats: ScanDirStats,
}

/// 扫描树节点
#[derive(Debug, Clone)]
pub enum ScanEntry {
    File(Arc<FileEntity>),
    Dir(Arc<DirEntity>),
}

impl ScanEntry {
    pub fn id(&self) -> EntityId {
        match self {
            ScanEntry::File(f) => f.id,
            ScanEntry::Dir(d) => d.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ScanEntry::File(f) => &f.name,
            ScanEntry::Dir(d) => &d.name,
        }
    }

    pub fn kind(&self) -> EntryKind {
        match self {
            ScanEntry::File(_) => EntryKind::File,
            ScanEntry::Dir(_) => EntryKind::Dir,
        }
    }
}

/// 目录扫描器
pub struct DirScanner {
    store: Arc<dyn Store>,
    is_case_sensitive: bool,
    cancel: CancellationToken,
}

impl DirScanner {
    pub fn new(store: Arc<dyn Store>, is_case_sensitive: bool, cancel: CancellationToken) -> Self {
        Self {
            store,
            is_case_sensitive,
            cancel,
        }
    }

    /// 从存储根开始扫描，返回完整扫描树
    ///
    /// 任一子项失败则整侧失败，不保留部分子树
    pub async fn scan_root(&self) -> Result<Arc<DirEntity>, ScanError> {
        let root = self
            .store
            .root()
            .await
            .map_err(|e| ScanError::DirEntries {
                path: "/".to_string(),
                source: e,
            })?;

        info!("开始扫描存储: {}", self.store.name());
        let dir = self.scan_dir(root, "/".to_string()).await?;
        info!(
            "扫描完成: {} 共 {} 个文件, {} 个目录, {} 字节",
            self.store.name(),
            dir.stats.files_count,
            dir.stats.dirs_count,
            dir.stats.size
        );
        Ok(Arc::new(dir))
    }

    fn scan_dir<'a>(
        &'a self,
        handle: EntryHandle,
        path: String,
    ) -> Pin<Box<dyn Future<Output = Result<DirEntity, ScanError>> + Send + 'a>> {
        Box::pin(async move {
            if self.cancel.is_cancelled() {
                return Err(ScanError::Cancelled);
            }

            let entries =
                self.store
                    .list_children(&handle)
                    .await
                    .map_err(|e| ScanError::DirEntries {
                        path: path.clone(),
                        source: e,
                    })?;

            // 大小写不敏感模式下检测归一化重名
            let mut folded_names: Option<HashSet<String>> =
                (!self.is_case_sensitive).then(HashSet::new);

            let mut children = Vec::with_capacity(entries.len());
            let mut stats = ScanDirStats::default();

            for entry in entries {
                if self.cancel.is_cancelled() {
                    return Err(ScanError::Cancelled);
                }

                if let Some(seen) = folded_names.as_mut() {
                    if !seen.insert(entry.name().to_lowercase()) {
                        return Err(ScanError::CaseSensitivity {
                            path: path.clone(),
                            name: entry.name().to_string(),
                        });
                    }
                }

                let child_path = join_path(&path, entry.name());
                match entry.kind() {
                    EntryKind::File => {
                        let meta = self.store.file_meta(&entry).await.map_err(|e| {
                            ScanError::FileRead {
                                path: child_path.clone(),
                                source: e,
                            }
                        })?;
                        stats.files_count += 1;
                        stats.size += meta.size;
                        let name = entry.name().to_string();
                        children.push(ScanEntry::File(Arc::new(FileEntity {
                            id: Uuid::new_v4(),
                            name,
                            path: child_path,
                            handle: entry,
                            size: meta.size,
                            mtime: meta.mtime,
                        })));
                    }
                    EntryKind::Dir => {
                        let dir = self.scan_dir(entry, child_path).await?;
                        stats.dirs_count += 1 + dir.stats.dirs_count;
                        stats.files_count += dir.stats.files_count;
                        stats.size += dir.stats.size;
                        children.push(ScanEntry::Dir(Arc::new(dir)));
                    }
                }
            }

            debug!("目录扫描完成: {} ({} 个直接子项)", path, children.len());
            Ok(DirEntity {
                id: Uuid::new_v4(),
                name: handle.name().to_string(),
                path,
                handle,
                children,
                stats,
            })
        })
    }
}

pub(crate) fn join_path(parent: &str, name: &str) -> String {
    if parent.ends_with('/') {
        format!("{parent}{name}")
    } else {
        format!("{parent}/{name}")
    }
}
