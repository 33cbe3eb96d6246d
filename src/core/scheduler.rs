//! 调度器：在并发数与并发复制字节双预算下驱动事务树执行

use crate::config::SyncOptions;
use crate::core::errors::{SyncError, TransactionErrorInfo};
use crate::core::queue::TransactionQueue;
use crate::core::transaction::{
    now_millis, SchedulerEvent, SyncAction, SyncStatus, TransactionId, TransactionJob,
};
use crate::core::tree::TransactionTree;
use crate::storage::{EntryKind, Store};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 一次同步的执行汇总
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub started_at: i64,
    pub finished_at: i64,
    pub files_copied: u32,
    pub dirs_created: u32,
    pub entries_deleted: u32,
    pub failed: u32,
    pub bytes_copied: u64,
    pub cancelled: bool,
}

/// 当前缓冲（已准入、在途的事务集合）
struct BufferState {
    running: usize,
    running_bytes: u64,
    inflight: HashMap<TransactionId, u64>,
}

/// 事务调度器
pub struct Scheduler {
    left_store: Arc<dyn Store>,
    right_store: Arc<dyn Store>,
    max_transactions: usize,
    max_copy_bytes: u64,
    cancel: CancellationToken,
}

impl Scheduler {
    pub fn new(
        left_store: Arc<dyn Store>,
        right_store: Arc<dyn Store>,
        options: &SyncOptions,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            left_store,
            right_store,
            max_transactions: options.number_transactions_max,
            max_copy_bytes: options.buffer_copy_max_size,
            cancel,
        }
    }

    /// 执行整棵事务树
    pub async fn run(&self, tree: &mut TransactionTree) -> Result<SyncReport, SyncError> {
        let root = tree.root_id();
        if !tree.needs_sync(root) {
            return Err(SyncError::NothingToSync);
        }

        info!(
            "开始同步: 预算并发 {} 个事务 / {} 复制字节 (0 表示不限)",
            self.max_transactions, self.max_copy_bytes
        );

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut queue = TransactionQueue::new();
        let mut buffer = BufferState {
            running: 0,
            running_bytes: 0,
            inflight: HashMap::new(),
        };
        let mut report = SyncReport {
            started_at: now_millis(),
            finished_at: 0,
            files_copied: 0,
            dirs_created: 0,
            entries_deleted: 0,
            failed: 0,
            bytes_copied: 0,
            cancelled: false,
        };

        // 根事务是合成的 EQUAL 目录对，从它开始排队；
        // 其空操作完成后子事务才会入队
        queue.enqueue(root);
        self.fill_buffer(tree, &mut queue, &mut buffer, &tx);

        while !buffer.inflight.is_empty() {
            let Some(event) = rx.recv().await else {
                break;
            };
            match event {
                SchedulerEvent::Cascade {
                    id,
                    status,
                    timestamp,
                    msg,
                    error,
                } => {
                    tree.set_status_recursive(id, status, timestamp, &msg, error.as_ref());
                }
                SchedulerEvent::DirCreated { id, handle } => {
                    tree.bind_children_right_parent(id, &handle);
                }
                SchedulerEvent::Done { id, outcome } => {
                    self.complete(tree, id, outcome, &mut queue, &mut buffer, &mut report);
                    self.fill_buffer(tree, &mut queue, &mut buffer, &tx);
                }
            }
        }

        report.finished_at = now_millis();
        report.cancelled = self.cancel.is_cancelled();
        info!(
            "同步结束: 复制 {} 个文件 ({} 字节), 新建 {} 个目录, 删除 {} 个条目, 失败 {}",
            report.files_copied,
            report.bytes_copied,
            report.dirs_created,
            report.entries_deleted,
            report.failed
        );
        Ok(report)
    }

    /// 准入判定：空缓冲必准入以保证前进性，否则两个维度都需满足
    fn admits(&self, buffer: &BufferState, cost: u64) -> bool {
        if buffer.running == 0 {
            return true;
        }
        let count_ok = self.max_transactions == 0 || buffer.running < self.max_transactions;
        let bytes_ok =
            self.max_copy_bytes == 0 || buffer.running_bytes + cost <= self.max_copy_bytes;
        count_ok && bytes_ok
    }

    /// 反复取队头尝试准入，预算不足即停
    ///
    /// 取消后仍照常准入：事务在首个步骤前观察到取消信号并立即以
    /// 取消为由失败，依赖解除与子事务放行因此保持统一路径
    fn fill_buffer(
        &self,
        tree: &mut TransactionTree,
        queue: &mut TransactionQueue,
        buffer: &mut BufferState,
        tx: &mpsc::UnboundedSender<SchedulerEvent>,
    ) {
        while let Some(head) = queue.peek() {
            let cost = tree
                .node(head)
                .map(|n| n.cfg().copy_cost())
                .unwrap_or(0);
            if !self.admits(buffer, cost) {
                return;
            }
            queue.dequeue();
            buffer.running += 1;
            buffer.running_bytes += cost;
            buffer.inflight.insert(head, cost);
            self.start_transaction(tree, head, tx);
        }
    }

    fn start_transaction(
        &self,
        tree: &mut TransactionTree,
        id: TransactionId,
        tx: &mpsc::UnboundedSender<SchedulerEvent>,
    ) {
        let Some(node) = tree.node(id) else {
            return;
        };
        let job = TransactionJob {
            id,
            name: node.name().to_string(),
            cfg: node.cfg().clone(),
            right_parent: node.right_parent().cloned(),
            left_store: self.left_store.clone(),
            right_store: self.right_store.clone(),
            cancel: self.cancel.clone(),
            events: tx.clone(),
        };
        debug!("准入事务: {:?} '{}'", job.cfg.action(), job.name);

        // EQUAL 节点保持 NotRequired，不进入 WIP
        if node.status() != SyncStatus::NotRequired {
            tree.apply_status(id, SyncStatus::Wip, now_millis(), "事务开始执行", None);
        }
        tokio::spawn(job.run());
    }

    /// 事务完成：释放预算、落状态、解除依赖者并放行子事务
    ///
    /// 成功与失败对预算释放和解除依赖一视同仁
    fn complete(
        &self,
        tree: &mut TransactionTree,
        id: TransactionId,
        outcome: Result<i64, TransactionErrorInfo>,
        queue: &mut TransactionQueue,
        buffer: &mut BufferState,
        report: &mut SyncReport,
    ) {
        let cost = buffer.inflight.remove(&id).unwrap_or(0);
        buffer.running = buffer.running.saturating_sub(1);
        buffer.running_bytes = buffer.running_bytes.saturating_sub(cost);

        let (action, kind) = tree
            .node(id)
            .map(|n| (n.action(), n.kind()))
            .unwrap_or((SyncAction::Equal, EntryKind::Dir));

        match outcome {
            Ok(timestamp) => {
                // EQUAL 节点（含根）保持 NotRequired
                let not_required = tree
                    .node(id)
                    .map(|n| n.status() == SyncStatus::NotRequired)
                    .unwrap_or(true);
                if !not_required {
                    tree.apply_status(id, SyncStatus::Success, timestamp, "ok", None);
                }
                match (action, kind) {
                    (SyncAction::CopyLeft, EntryKind::File)
                    | (SyncAction::Overwrite, EntryKind::File) => {
                        report.files_copied += 1;
                        report.bytes_copied += cost;
                    }
                    (SyncAction::CopyLeft, EntryKind::Dir) => report.dirs_created += 1,
                    (SyncAction::DeleteRight, _) => report.entries_deleted += 1,
                    _ => {}
                }
            }
            Err(info) => {
                report.failed += 1;
                warn!(
                    "事务失败: '{}' {}",
                    tree.node(id).map(|n| n.path()).unwrap_or(""),
                    info.error_msg
                );
                let msg = info.error_msg.clone();
                tree.apply_status(id, SyncStatus::Error, now_millis(), &msg, Some(info));
            }
        }

        // 依赖该事务的事务解除阻塞并重新入队
        for dependant in tree.take_dependants(id) {
            if tree.needs_sync(dependant) {
                queue.enqueue(dependant);
            }
        }

        // 非 DELETERIGHT 的目录完成后目标目录已就绪，其子事务方可入队
        if kind == EntryKind::Dir && action != SyncAction::DeleteRight {
            self.enqueue_children(tree, id, queue);
        }
    }

    fn enqueue_children(
        &self,
        tree: &TransactionTree,
        id: TransactionId,
        queue: &mut TransactionQueue,
    ) {
        for child in tree.children_of(id) {
            if tree.needs_sync(*child) && !tree.has_dependency(*child) {
                queue.enqueue(*child);
            }
        }
    }
}
