//! 同步会话：左右两侧与一次备份流程的显式生命周期
//!
//! 新扫描替换该侧扫描树并废弃 diff 结果，新 diff 替换事务树，
//! 交换两侧废弃全部派生状态

use crate::config::SyncOptions;
use crate::core::diff;
use crate::core::errors::{ScanError, SyncError};
use crate::core::scanner::{DirEntity, DirScanner, ScanDirStats};
use crate::core::scheduler::{Scheduler, SyncReport};
use crate::core::transaction::{DiffTotals, NodeStatusSnapshot, TransactionId};
use crate::core::tree::TransactionTree;
use crate::storage::Store;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// 同步方向的一侧
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncSide {
    Left,
    Right,
}

/// 一次备份会话
pub struct SyncSession {
    options: SyncOptions,
    left_store: Arc<dyn Store>,
    right_store: Arc<dyn Store>,
    left_root: Option<Arc<DirEntity>>,
    right_root: Option<Arc<DirEntity>>,
    tree: Option<TransactionTree>,
    cancel: CancellationToken,
}

impl SyncSession {
    pub fn new(
        left_store: Arc<dyn Store>,
        right_store: Arc<dyn Store>,
        options: SyncOptions,
    ) -> Self {
        Self {
            options,
            left_store,
            right_store,
            left_root: None,
            right_root: None,
            tree: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    pub fn tree(&self) -> Option<&TransactionTree> {
        self.tree.as_ref()
    }

    pub fn scan_stats(&self, side: SyncSide) -> Option<ScanDirStats> {
        match side {
            SyncSide::Left => self.left_root.as_ref().map(|d| d.stats),
            SyncSide::Right => self.right_root.as_ref().map(|d| d.stats),
        }
    }

    /// 根目录的三类 diff 汇总
    pub fn root_totals(&self) -> Option<DiffTotals> {
        self.tree.as_ref().map(|t| t.root_totals())
    }

    /// 按节点 id 订阅状态快照
    pub fn subscribe(&self, id: TransactionId) -> Option<watch::Receiver<NodeStatusSnapshot>> {
        self.tree.as_ref()?.subscribe(id)
    }

    /// 触发取消：作用于当前在途的扫描与同步
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// 当前取消令牌（供外层接线，比如信号处理）
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// 扫描一侧；成功后替换该侧扫描树并废弃已有 diff 结果
    pub async fn scan_side(&mut self, side: SyncSide) -> Result<ScanDirStats, ScanError> {
        self.reset_cancel();
        let store = match side {
            SyncSide::Left => self.left_store.clone(),
            SyncSide::Right => self.right_store.clone(),
        };
        let scanner = DirScanner::new(store, self.options.is_case_sensitive, self.cancel.clone());
        let root = scanner.scan_root().await?;
        let stats = root.stats;
        match side {
            SyncSide::Left => self.left_root = Some(root),
            SyncSide::Right => self.right_root = Some(root),
        }
        self.tree = None;
        Ok(stats)
    }

    /// 并发扫描两侧
    pub async fn scan_both(&mut self) -> Result<(ScanDirStats, ScanDirStats), ScanError> {
        self.reset_cancel();
        let left_scanner = DirScanner::new(
            self.left_store.clone(),
            self.options.is_case_sensitive,
            self.cancel.clone(),
        );
        let right_scanner = DirScanner::new(
            self.right_store.clone(),
            self.options.is_case_sensitive,
            self.cancel.clone(),
        );

        let (left, right) = tokio::join!(left_scanner.scan_root(), right_scanner.scan_root());
        let left = left?;
        let right = right?;

        let stats = (left.stats, right.stats);
        self.left_root = Some(left);
        self.right_root = Some(right);
        self.tree = None;
        Ok(stats)
    }

    /// 对比两侧扫描树，生成新的事务树
    pub fn diff(&mut self) -> Result<&TransactionTree, SyncError> {
        let (Some(left), Some(right)) = (self.left_root.clone(), self.right_root.clone()) else {
            return Err(SyncError::NotScanned);
        };
        let tree = diff::diff(left, right, &self.options)?;
        info!("diff 完成: 共 {} 个事务", tree.len());
        Ok(self.tree.insert(tree))
    }

    /// 启动同步调度并等待其完成
    pub async fn start_sync(&mut self) -> Result<SyncReport, SyncError> {
        self.reset_cancel();
        let Some(tree) = self.tree.as_mut() else {
            return Err(SyncError::NotDiffed);
        };
        let scheduler = Scheduler::new(
            self.left_store.clone(),
            self.right_store.clone(),
            &self.options,
            self.cancel.clone(),
        );
        scheduler.run(tree).await
    }

    /// 交换左右两侧；扫描树随之互换，事务树废弃
    pub fn swap_sides(&mut self) {
        std::mem::swap(&mut self.left_store, &mut self.right_store);
        std::mem::swap(&mut self.left_root, &mut self.right_root);
        self.tree = None;
        info!("已交换左右两侧");
    }

    /// 上一轮被取消后换新令牌，避免新一轮操作立即失败
    fn reset_cancel(&mut self) {
        if self.cancel.is_cancelled() {
            self.cancel = CancellationToken::new();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::ScanError;
    use crate::core::transaction::{SyncAction, SyncStatus};
    use crate::storage::{ByteStream, EntryHandle, FileMeta, LocalStore};
    use anyhow::Result as AnyResult;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::path::Path;
    use std::time::Duration;

    fn options() -> SyncOptions {
        SyncOptions {
            is_case_sensitive: false,
            buffer_copy_max_size: 0,
            number_transactions_max: 0,
        }
    }

    fn write_tree(base: &Path, entries: &[(&str, Option<&[u8]>)]) {
        for (path, content) in entries {
            let full = base.join(path);
            match content {
                Some(data) => {
                    if let Some(parent) = full.parent() {
                        std::fs::create_dir_all(parent).unwrap();
                    }
                    std::fs::write(full, data).unwrap();
                }
                None => std::fs::create_dir_all(full).unwrap(),
            }
        }
    }

    fn session_over(
        left: &Path,
        right: &Path,
        options: SyncOptions,
    ) -> SyncSession {
        SyncSession::new(
            Arc::new(LocalStore::new(left).unwrap()),
            Arc::new(LocalStore::new(right).unwrap()),
            options,
        )
    }

    #[tokio::test]
    async fn test_full_backup_round_trip() {
        let base = tempfile::tempdir().unwrap();
        let left = base.path().join("left");
        let right = base.path().join("right");

        // 左侧：嵌套目录与文件；右侧：多余文件、过期文件与同名异类条目
        write_tree(
            &left,
            &[
                ("a.txt", Some(b"left contents")),
                ("dir1/b.txt", Some(b"nested")),
                ("dir1/dir11/c.txt", Some(b"deep")),
                ("emptyDir", None),
                ("clash", Some(b"file on the left")),
            ],
        );
        write_tree(
            &right,
            &[
                ("stale.txt", Some(b"should be deleted")),
                ("a.txt", Some(b"old!")),
                ("clash/inner.txt", Some(b"dir on the right")),
            ],
        );

        let mut session = session_over(&left, &right, options());
        let (left_stats, right_stats) = session.scan_both().await.unwrap();
        assert_eq!(left_stats.files_count, 4);
        assert_eq!(left_stats.dirs_count, 3);
        assert_eq!(right_stats.files_count, 3);

        session.diff().unwrap();
        let totals = session.root_totals().unwrap();
        // a.txt 大小不同被覆盖，其余左侧条目复制
        assert_eq!(totals.copy.files_count, 4);
        assert_eq!(totals.delete.files_count, 3);

        let report = session.start_sync().await.unwrap();
        assert_eq!(report.failed, 0);
        assert_eq!(report.files_copied, 4);
        assert_eq!(report.entries_deleted, 2);
        assert!(!report.cancelled);

        assert_eq!(std::fs::read(right.join("a.txt")).unwrap(), b"left contents");
        assert_eq!(std::fs::read(right.join("dir1/b.txt")).unwrap(), b"nested");
        assert_eq!(
            std::fs::read(right.join("dir1/dir11/c.txt")).unwrap(),
            b"deep"
        );
        assert!(right.join("emptyDir").is_dir());
        // 类型冲突：右侧同名目录先删，左侧文件后建
        assert!(right.join("clash").is_file());
        assert_eq!(std::fs::read(right.join("clash")).unwrap(), b"file on the left");
        assert!(!right.join("stale.txt").exists());
    }

    #[tokio::test]
    async fn test_identical_sides_have_nothing_to_sync() {
        let base = tempfile::tempdir().unwrap();
        let left = base.path().join("left");
        let right = base.path().join("right");

        write_tree(&left, &[("a.txt", Some(b"same")), ("dir/b.txt", Some(b"same2"))]);
        // 右侧随后写入：mtime 不早于左侧，大小一致
        write_tree(&right, &[("a.txt", Some(b"same")), ("dir/b.txt", Some(b"same2"))]);

        let mut session = session_over(&left, &right, options());
        session.scan_both().await.unwrap();
        session.diff().unwrap();

        match session.start_sync().await {
            Err(SyncError::NothingToSync) => {}
            other => panic!("expected NothingToSync, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_serialized_admission_with_count_budget() {
        let base = tempfile::tempdir().unwrap();
        let left = base.path().join("left");
        let right = base.path().join("right");

        write_tree(
            &left,
            &[
                ("f1", Some(&[1u8; 1024][..])),
                ("f2", Some(&[2u8; 1024][..])),
                ("f3", Some(&[3u8; 1024][..])),
                ("f4", Some(&[4u8; 1024][..])),
            ],
        );
        std::fs::create_dir_all(&right).unwrap();

        let mut session = session_over(
            &left,
            &right,
            SyncOptions {
                is_case_sensitive: false,
                buffer_copy_max_size: 0,
                number_transactions_max: 1,
            },
        );
        session.scan_both().await.unwrap();
        session.diff().unwrap();
        let report = session.start_sync().await.unwrap();

        assert_eq!(report.files_copied, 4);
        assert_eq!(report.bytes_copied, 4096);
        assert_eq!(report.failed, 0);
        for name in ["f1", "f2", "f3", "f4"] {
            assert_eq!(std::fs::read(right.join(name)).unwrap().len(), 1024);
        }
    }

    #[tokio::test]
    async fn test_scan_failure_blocks_diff() {
        let base = tempfile::tempdir().unwrap();
        let left = base.path().join("left");
        let right = base.path().join("right");
        write_tree(&left, &[("readme", Some(b"x")), ("README", Some(b"y"))]);
        std::fs::create_dir_all(&right).unwrap();

        let mut session = session_over(&left, &right, options());
        match session.scan_both().await {
            Err(ScanError::CaseSensitivity { .. }) => {}
            other => panic!("expected CaseSensitivity, got {other:?}"),
        }
        match session.diff() {
            Err(SyncError::NotScanned) => {}
            other => panic!("expected NotScanned, got {:?}", other.map(|t| t.len())),
        }
    }

    #[tokio::test]
    async fn test_swap_sides_discards_tree() {
        let base = tempfile::tempdir().unwrap();
        let left = base.path().join("left");
        let right = base.path().join("right");
        write_tree(&left, &[("only-left", Some(b"z"))]);
        std::fs::create_dir_all(&right).unwrap();

        let mut session = session_over(&left, &right, options());
        session.scan_both().await.unwrap();
        session.diff().unwrap();
        assert!(session.tree().is_some());

        session.swap_sides();
        assert!(session.tree().is_none());

        // 交换后原左侧文件成了待删除的右侧条目
        session.diff().unwrap();
        let totals = session.root_totals().unwrap();
        assert_eq!(totals.delete.files_count, 1);
        assert_eq!(totals.copy.files_count, 0);
    }

    /// 读取被节流的存储：复制会持续到取消信号到来
    struct ThrottledStore {
        inner: LocalStore,
    }

    #[async_trait]
    impl crate::storage::Store for ThrottledStore {
        async fn root(&self) -> AnyResult<EntryHandle> {
            self.inner.root().await
        }

        async fn list_children(&self, dir: &EntryHandle) -> AnyResult<Vec<EntryHandle>> {
            self.inner.list_children(dir).await
        }

        async fn file_meta(&self, file: &EntryHandle) -> AnyResult<FileMeta> {
            self.inner.file_meta(file).await
        }

        async fn open_reader(&self, _file: &EntryHandle) -> AnyResult<ByteStream> {
            // 每 20ms 吐出一个块，总时长远超测试中的取消时点
            let stream = futures::stream::unfold(0u32, |i| async move {
                if i >= 500 {
                    return None;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
                Some((Ok(Bytes::from_static(&[7u8; 256])), i + 1))
            });
            Ok(Box::pin(stream))
        }

        async fn create_file(
            &self,
            parent: &EntryHandle,
            name: &str,
        ) -> AnyResult<EntryHandle> {
            self.inner.create_file(parent, name).await
        }

        async fn open_writer(&self, file: &EntryHandle) -> AnyResult<crate::storage::ByteSink> {
            self.inner.open_writer(file).await
        }

        async fn create_dir(&self, parent: &EntryHandle, name: &str) -> AnyResult<EntryHandle> {
            self.inner.create_dir(parent, name).await
        }

        async fn remove_entry(
            &self,
            parent: &EntryHandle,
            name: &str,
            recursive: bool,
        ) -> AnyResult<()> {
            self.inner.remove_entry(parent, name, recursive).await
        }

        async fn exists(&self, parent: &EntryHandle, name: &str) -> AnyResult<bool> {
            self.inner.exists(parent, name).await
        }

        fn is_ancestor(&self, a: &EntryHandle, b: &EntryHandle) -> bool {
            self.inner.is_ancestor(a, b)
        }

        fn name(&self) -> &str {
            "throttled"
        }
    }

    #[tokio::test]
    async fn test_cancel_mid_copy_cleans_partial_destination() {
        let base = tempfile::tempdir().unwrap();
        let left = base.path().join("left");
        let right = base.path().join("right");
        write_tree(&left, &[("big.bin", Some(&[9u8; 4096][..]))]);
        std::fs::create_dir_all(&right).unwrap();

        let left_store = Arc::new(ThrottledStore {
            inner: LocalStore::new(&left).unwrap(),
        });
        let right_store = Arc::new(LocalStore::new(&right).unwrap());
        let mut session = SyncSession::new(left_store, right_store, options());

        session.scan_both().await.unwrap();
        session.diff().unwrap();

        let copy_id = session
            .tree()
            .unwrap()
            .nodes()
            .find(|n| n.name() == "big.bin" && n.action() == SyncAction::CopyLeft)
            .unwrap()
            .id();

        let cancel = session.cancel_token();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            cancel.cancel();
        });

        let report = session.start_sync().await.unwrap();
        assert!(report.cancelled);
        assert_eq!(report.failed, 1);
        assert_eq!(report.files_copied, 0);

        // 目标创建后被取消：未完成副本已删除，节点带清理消息进入 ERROR
        assert!(!right.join("big.bin").exists());
        let node_snapshot = session
            .tree()
            .unwrap()
            .node(copy_id)
            .unwrap()
            .snapshot();
        assert_eq!(node_snapshot.status, SyncStatus::Error);
        let error = node_snapshot.error.unwrap();
        assert!(error.error_msg.contains("取消"));
        assert!(error.cleanup_msg.contains("已删除"));
    }
}
