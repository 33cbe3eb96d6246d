//! 同步事务：动作配置、状态机与执行协议

use crate::core::errors::TransactionErrorInfo;
use crate::core::scanner::{DirEntity, FileEntity};
use crate::storage::{EntryHandle, EntryKind, Store};
use chrono::Utc;
use futures::StreamExt;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

/// 事务 id
pub type TransactionId = Uuid;

/// 无需清理时的统一提示
pub(crate) const CLEANUP_NOT_REQUIRED: &str = "无需清理";
/// 取消时的操作消息
pub(crate) const CANCELLED_MSG: &str = "备份已取消";

pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// 同步动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncAction {
    /// 两侧一致，无需操作
    Equal,
    /// 两侧同名文件但大小或时间不符，左侧覆盖右侧
    Overwrite,
    /// 仅左侧存在，复制到右侧
    CopyLeft,
    /// 仅右侧存在，从右侧删除
    DeleteRight,
}

/// 事务状态
///
/// Mixed 仅出现在聚合视图中，离散状态不会取到
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncStatus {
    NotRequired,
    Init,
    Wip,
    Error,
    Mixed,
    Success,
}

impl SyncStatus {
    /// 聚合规则：全相同取其值；剔除 NotRequired 后仍多值时，
    /// 最小值不高于 Wip 则为 Wip，否则为 Mixed
    pub fn aggregate<I: IntoIterator<Item = SyncStatus>>(values: I) -> SyncStatus {
        let set: std::collections::BTreeSet<SyncStatus> = values.into_iter().collect();
        if set.len() == 1 {
            if let Some(&only) = set.iter().next() {
                return only;
            }
        }

        let remaining: std::collections::BTreeSet<SyncStatus> = set
            .into_iter()
            .filter(|s| *s != SyncStatus::NotRequired)
            .collect();

        match remaining.len() {
            0 => SyncStatus::NotRequired,
            1 => remaining
                .into_iter()
                .next()
                .unwrap_or(SyncStatus::NotRequired),
            _ => match remaining.iter().next() {
                Some(&min) if min <= SyncStatus::Wip => SyncStatus::Wip,
                _ => SyncStatus::Mixed,
            },
        }
    }
}

/// 一个实体的 diff 决策，携带动作所要求的实体引用
#[derive(Debug, Clone)]
pub enum SyncCfg {
    EqualFile {
        left: Arc<FileEntity>,
        right: Arc<FileEntity>,
    },
    EqualDir {
        left: Arc<DirEntity>,
        right: Arc<DirEntity>,
    },
    Overwrite {
        left: Arc<FileEntity>,
        right: Arc<FileEntity>,
    },
    CopyLeftFile {
        left: Arc<FileEntity>,
    },
    CopyLeftDir {
        left: Arc<DirEntity>,
    },
    DeleteRightFile {
        right: Arc<FileEntity>,
    },
    DeleteRightDir {
        right: Arc<DirEntity>,
    },
}

impl SyncCfg {
    pub fn action(&self) -> SyncAction {
        match self {
            SyncCfg::EqualFile { .. } | SyncCfg::EqualDir { .. } => SyncAction::Equal,
            SyncCfg::Overwrite { .. } => SyncAction::Overwrite,
            SyncCfg::CopyLeftFile { .. } | SyncCfg::CopyLeftDir { .. } => SyncAction::CopyLeft,
            SyncCfg::DeleteRightFile { .. } | SyncCfg::DeleteRightDir { .. } => {
                SyncAction::DeleteRight
            }
        }
    }

    pub fn kind(&self) -> EntryKind {
        match self {
            SyncCfg::EqualFile { .. }
            | SyncCfg::Overwrite { .. }
            | SyncCfg::CopyLeftFile { .. }
            | SyncCfg::DeleteRightFile { .. } => EntryKind::File,
            _ => EntryKind::Dir,
        }
    }

    /// 展示名：有左侧取左侧名，否则取右侧名
    pub fn entity_name(&self) -> &str {
        match self {
            SyncCfg::EqualFile { left, .. }
            | SyncCfg::Overwrite { left, .. }
            | SyncCfg::CopyLeftFile { left } => &left.name,
            SyncCfg::EqualDir { left, .. } | SyncCfg::CopyLeftDir { left } => &left.name,
            SyncCfg::DeleteRightFile { right } => &right.name,
            SyncCfg::DeleteRightDir { right } => &right.name,
        }
    }

    pub fn entity_path(&self) -> &str {
        match self {
            SyncCfg::EqualFile { left, .. }
            | SyncCfg::Overwrite { left, .. }
            | SyncCfg::CopyLeftFile { left } => &left.path,
            SyncCfg::EqualDir { left, .. } | SyncCfg::CopyLeftDir { left } => &left.path,
            SyncCfg::DeleteRightFile { right } => &right.path,
            SyncCfg::DeleteRightDir { right } => &right.path,
        }
    }

    /// 并发字节预算的边际成本：复制类文件事务取左侧文件大小
    pub fn copy_cost(&self) -> u64 {
        match self {
            SyncCfg::Overwrite { left, .. } | SyncCfg::CopyLeftFile { left } => left.size,
            _ => 0,
        }
    }
}

/// 单动作统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionStats {
    pub size_left: u64,
    pub size_right: u64,
    pub files_count: u64,
    pub dirs_count: u64,
}

impl ActionStats {
    fn add(&mut self, other: &ActionStats) {
        self.size_left += other.size_left;
        self.size_right += other.size_right;
        self.files_count += other.files_count;
        self.dirs_count += other.dirs_count;
    }
}

/// 目录事务按动作累计的 diff 统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffStats {
    pub equal: ActionStats,
    pub overwrite: ActionStats,
    pub copy_left: ActionStats,
    pub delete_right: ActionStats,
}

impl DiffStats {
    pub fn by_action(&self, action: SyncAction) -> &ActionStats {
        match action {
            SyncAction::Equal => &self.equal,
            SyncAction::Overwrite => &self.overwrite,
            SyncAction::CopyLeft => &self.copy_left,
            SyncAction::DeleteRight => &self.delete_right,
        }
    }

    pub(crate) fn by_action_mut(&mut self, action: SyncAction) -> &mut ActionStats {
        match action {
            SyncAction::Equal => &mut self.equal,
            SyncAction::Overwrite => &mut self.overwrite,
            SyncAction::CopyLeft => &mut self.copy_left,
            SyncAction::DeleteRight => &mut self.delete_right,
        }
    }

    pub(crate) fn merge(&mut self, other: &DiffStats) {
        self.equal.add(&other.equal);
        self.overwrite.add(&other.overwrite);
        self.copy_left.add(&other.copy_left);
        self.delete_right.add(&other.delete_right);
    }

    /// 按复制/删除/相等三类汇总
    pub fn totals(&self) -> DiffTotals {
        DiffTotals {
            copy: TotalStats {
                size: self.copy_left.size_left + self.overwrite.size_left,
                files_count: self.copy_left.files_count + self.overwrite.files_count,
                dirs_count: self.copy_left.dirs_count + self.overwrite.dirs_count,
            },
            delete: TotalStats {
                size: self.delete_right.size_right + self.overwrite.size_right,
                files_count: self.delete_right.files_count + self.overwrite.files_count,
                dirs_count: self.delete_right.dirs_count + self.overwrite.dirs_count,
            },
            equal: TotalStats {
                size: self.equal.size_left,
                files_count: self.equal.files_count,
                dirs_count: self.equal.dirs_count,
            },
        }
    }
}

/// 汇总口径
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalStats {
    pub size: u64,
    pub files_count: u64,
    pub dirs_count: u64,
}

/// 根目录的三类汇总
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffTotals {
    pub copy: TotalStats,
    pub delete: TotalStats,
    pub equal: TotalStats,
}

/// 状态变更日志条目
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusLogEntry {
    pub status: SyncStatus,
    pub timestamp: i64,
    pub msg: String,
}

/// 节点状态快照，对外订阅的载荷
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStatusSnapshot {
    pub status: SyncStatus,
    pub status_timestamp: i64,
    /// 仅子级的聚合
    pub children_aggr: SyncStatus,
    /// 自身与子级的聚合
    pub aggr: SyncStatus,
    pub error: Option<TransactionErrorInfo>,
}

/// 事务节点
///
/// 文件与目录共用同一结构，目录特有字段对文件节点保持空值
#[derive(Debug)]
pub struct TransactionNode {
    pub(crate) id: TransactionId,
    pub(crate) parent: Option<TransactionId>,
    pub(crate) cfg: SyncCfg,
    pub(crate) status: SyncStatus,
    pub(crate) status_timestamp: i64,
    pub(crate) error: Option<TransactionErrorInfo>,
    /// 右侧父目录句柄，COPYLEFT 目录的后代在父目录创建后才会补齐
    pub(crate) right_parent: Option<EntryHandle>,
    pub(crate) status_log: Vec<StatusLogEntry>,
    pub(crate) children: Vec<TransactionId>,
    /// 需要同步的直接子级及其最近一次聚合状态
    pub(crate) children_to_sync: HashMap<TransactionId, SyncStatus>,
    pub(crate) children_aggr: SyncStatus,
    pub(crate) aggr: SyncStatus,
    pub(crate) diff_stats: DiffStats,
    watch_tx: watch::Sender<NodeStatusSnapshot>,
}

impl TransactionNode {
    pub(crate) fn new(
        id: TransactionId,
        cfg: SyncCfg,
        parent: Option<TransactionId>,
        right_parent: Option<EntryHandle>,
    ) -> Self {
        let status = if cfg.action() == SyncAction::Equal {
            SyncStatus::NotRequired
        } else {
            SyncStatus::Init
        };
        let status_timestamp = now_millis();
        let (watch_tx, _) = watch::channel(NodeStatusSnapshot {
            status,
            status_timestamp,
            children_aggr: SyncStatus::NotRequired,
            aggr: status,
            error: None,
        });
        Self {
            id,
            parent,
            cfg,
            status,
            status_timestamp,
            error: None,
            right_parent,
            status_log: Vec::new(),
            children: Vec::new(),
            children_to_sync: HashMap::new(),
            children_aggr: SyncStatus::NotRequired,
            aggr: status,
            diff_stats: DiffStats::default(),
            watch_tx,
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn parent(&self) -> Option<TransactionId> {
        self.parent
    }

    pub fn cfg(&self) -> &SyncCfg {
        &self.cfg
    }

    pub fn action(&self) -> SyncAction {
        self.cfg.action()
    }

    pub fn kind(&self) -> EntryKind {
        self.cfg.kind()
    }

    pub fn name(&self) -> &str {
        self.cfg.entity_name()
    }

    pub fn path(&self) -> &str {
        self.cfg.entity_path()
    }

    pub fn status(&self) -> SyncStatus {
        self.status
    }

    pub fn status_timestamp(&self) -> i64 {
        self.status_timestamp
    }

    pub fn error(&self) -> Option<&TransactionErrorInfo> {
        self.error.as_ref()
    }

    pub fn right_parent(&self) -> Option<&EntryHandle> {
        self.right_parent.as_ref()
    }

    pub fn children(&self) -> &[TransactionId] {
        &self.children
    }

    pub fn children_aggr(&self) -> SyncStatus {
        self.children_aggr
    }

    pub fn aggr(&self) -> SyncStatus {
        self.aggr
    }

    pub fn diff_stats(&self) -> &DiffStats {
        &self.diff_stats
    }

    pub fn status_log(&self) -> &[StatusLogEntry] {
        &self.status_log
    }

    /// 动作非 EQUAL，或目录存在需要同步的子级
    pub fn requires_sync(&self) -> bool {
        self.cfg.action() != SyncAction::Equal || !self.children_to_sync.is_empty()
    }

    pub fn subscribe(&self) -> watch::Receiver<NodeStatusSnapshot> {
        self.watch_tx.subscribe()
    }

    pub(crate) fn set_status(
        &mut self,
        status: SyncStatus,
        timestamp: i64,
        msg: &str,
        error: Option<TransactionErrorInfo>,
    ) {
        self.status = status;
        self.status_timestamp = timestamp;
        if status == SyncStatus::Error {
            self.error = Some(error.unwrap_or_else(|| TransactionErrorInfo {
                error_msg: "未捕获的错误".to_string(),
                cleanup_msg: "清理结果未知".to_string(),
            }));
        }
        self.status_log.push(StatusLogEntry {
            status,
            timestamp,
            msg: msg.to_string(),
        });
        self.publish();
    }

    /// 仅在缺失时绑定右侧父目录句柄
    pub(crate) fn bind_right_parent(&mut self, handle: EntryHandle) {
        if self.right_parent.is_none() {
            self.right_parent = Some(handle);
        }
    }

    /// 子级装配完成后计算初始聚合
    pub(crate) fn finalize_aggr(&mut self) {
        self.children_aggr = if self.children_to_sync.is_empty() {
            SyncStatus::NotRequired
        } else {
            SyncStatus::aggregate(self.children_to_sync.values().copied())
        };
        self.aggr = SyncStatus::aggregate(
            std::iter::once(self.status).chain(self.children_to_sync.values().copied()),
        );
        self.publish();
    }

    pub(crate) fn publish(&self) {
        self.watch_tx.send_replace(self.snapshot());
    }

    pub fn snapshot(&self) -> NodeStatusSnapshot {
        NodeStatusSnapshot {
            status: self.status,
            status_timestamp: self.status_timestamp,
            children_aggr: self.children_aggr,
            aggr: self.aggr,
            error: self.error.clone(),
        }
    }
}

/// 事务执行结果：成功携带完成时间戳
pub(crate) type TransactionOutcome = Result<i64, TransactionErrorInfo>;

/// 事务任务发给调度循环的消息
#[derive(Debug)]
pub(crate) enum SchedulerEvent {
    /// 目录递归删除对后代的级联状态标记
    Cascade {
        id: TransactionId,
        status: SyncStatus,
        timestamp: i64,
        msg: String,
        error: Option<TransactionErrorInfo>,
    },
    /// COPYLEFT 目录已创建，其子事务可绑定右侧父句柄
    DirCreated {
        id: TransactionId,
        handle: EntryHandle,
    },
    /// 事务完成（成功或失败）
    Done {
        id: TransactionId,
        outcome: TransactionOutcome,
    },
}

/// 准入时从节点提取的执行快照，任务独立持有句柄与配置
pub(crate) struct TransactionJob {
    pub id: TransactionId,
    pub name: String,
    pub cfg: SyncCfg,
    pub right_parent: Option<EntryHandle>,
    pub left_store: Arc<dyn Store>,
    pub right_store: Arc<dyn Store>,
    pub cancel: CancellationToken,
    pub events: mpsc::UnboundedSender<SchedulerEvent>,
}

impl TransactionJob {
    /// 执行事务协议，结束时上报 Done 事件
    ///
    /// 每个步骤执行前都检查取消信号
    pub(crate) async fn run(self) {
        let outcome = match &self.cfg {
            SyncCfg::CopyLeftFile { left } => self.copy_left_file(left.clone()).await,
            SyncCfg::Overwrite { left, right } => {
                self.overwrite_file(left.clone(), right.clone()).await
            }
            SyncCfg::DeleteRightFile { right } => self.delete_right_file(right.clone()).await,
            SyncCfg::CopyLeftDir { .. } => self.copy_left_dir().await,
            SyncCfg::DeleteRightDir { right } => self.delete_right_dir(right.clone()).await,
            // EQUAL 节点（含合成根）的空操作，只提供统一的启动/完成挂点
            SyncCfg::EqualFile { .. } | SyncCfg::EqualDir { .. } => self.noop().await,
        };
        let _ = self.events.send(SchedulerEvent::Done {
            id: self.id,
            outcome,
        });
    }

    fn err(&self, error_msg: impl Into<String>, cleanup_msg: impl Into<String>) -> TransactionErrorInfo {
        TransactionErrorInfo {
            error_msg: error_msg.into(),
            cleanup_msg: cleanup_msg.into(),
        }
    }

    fn check_cancel(&self) -> Result<(), TransactionErrorInfo> {
        if self.cancel.is_cancelled() {
            Err(self.err(CANCELLED_MSG, CLEANUP_NOT_REQUIRED))
        } else {
            Ok(())
        }
    }

    /// 复制左侧文件到右侧：创建目标、打开可写槽、流式写入、回读时间戳
    ///
    /// 目标创建成功后的任何失败都要删除未完成的副本
    async fn copy_left_file(&self, left: Arc<FileEntity>) -> TransactionOutcome {
        let Some(parent) = self.right_parent.clone() else {
            return Err(self.err("右侧父目录句柄缺失", CLEANUP_NOT_REQUIRED));
        };

        self.check_cancel()?;
        let dest = match self.right_store.create_file(&parent, &self.name).await {
            Ok(handle) => handle,
            Err(e) => {
                return Err(self.err(format!("创建目标文件失败: {e:#}"), CLEANUP_NOT_REQUIRED))
            }
        };

        match self.copy_into(&left, &dest).await {
            Ok(()) => match self.right_store.file_meta(&dest).await {
                Ok(meta) => Ok(meta.mtime),
                Err(e) => {
                    let cleanup = self.cleanup_dest(&parent).await;
                    Err(self.err(format!("回读目标文件元数据失败: {e:#}"), cleanup))
                }
            },
            Err(op_msg) => {
                let cleanup = self.cleanup_dest(&parent).await;
                Err(self.err(op_msg, cleanup))
            }
        }
    }

    /// 覆盖右侧既有文件，失败后无需清理
    async fn overwrite_file(
        &self,
        left: Arc<FileEntity>,
        right: Arc<FileEntity>,
    ) -> TransactionOutcome {
        match self.copy_into(&left, &right.handle).await {
            Ok(()) => match self.right_store.file_meta(&right.handle).await {
                Ok(meta) => Ok(meta.mtime),
                Err(e) => Err(self.err(
                    format!("回读目标文件元数据失败: {e:#}"),
                    CLEANUP_NOT_REQUIRED,
                )),
            },
            Err(op_msg) => Err(self.err(op_msg, CLEANUP_NOT_REQUIRED)),
        }
    }

    async fn delete_right_file(&self, right: Arc<FileEntity>) -> TransactionOutcome {
        let Some(parent) = self.right_parent.clone() else {
            return Err(self.err("右侧父目录句柄缺失", CLEANUP_NOT_REQUIRED));
        };
        self.check_cancel()?;
        match self
            .right_store
            .remove_entry(&parent, &right.name, false)
            .await
        {
            Ok(()) => Ok(now_millis()),
            Err(e) => Err(self.err(format!("删除目标文件失败: {e:#}"), CLEANUP_NOT_REQUIRED)),
        }
    }

    /// 创建目标目录并广播新句柄，后代事务据此绑定右侧父目录
    async fn copy_left_dir(&self) -> TransactionOutcome {
        let Some(parent) = self.right_parent.clone() else {
            return Err(self.err("右侧父目录句柄缺失", CLEANUP_NOT_REQUIRED));
        };
        self.check_cancel()?;
        match self.right_store.create_dir(&parent, &self.name).await {
            Ok(handle) => {
                let _ = self.events.send(SchedulerEvent::DirCreated {
                    id: self.id,
                    handle,
                });
                Ok(now_millis())
            }
            Err(e) => Err(self.err(format!("创建目标目录失败: {e:#}"), CLEANUP_NOT_REQUIRED)),
        }
    }

    /// 递归删除右侧目录
    ///
    /// 先标记后代 WIP，预检目录仍存在（remove 对缺失条目不报错），
    /// 删除成功后标记后代 SUCCESS，失败则统一标记 ERROR
    async fn delete_right_dir(&self, right: Arc<DirEntity>) -> TransactionOutcome {
        let Some(parent) = self.right_parent.clone() else {
            return Err(self.err("右侧父目录句柄缺失", CLEANUP_NOT_REQUIRED));
        };
        self.check_cancel()?;

        let side_effect_msg = format!("随目录 '{}' 的递归删除一并处理", self.name);
        let _ = self.events.send(SchedulerEvent::Cascade {
            id: self.id,
            status: SyncStatus::Wip,
            timestamp: now_millis(),
            msg: side_effect_msg.clone(),
            error: None,
        });

        match self.remove_dir_checked(&parent, &right).await {
            Ok(()) => {
                let _ = self.events.send(SchedulerEvent::Cascade {
                    id: self.id,
                    status: SyncStatus::Success,
                    timestamp: now_millis(),
                    msg: side_effect_msg,
                    error: None,
                });
                Ok(now_millis())
            }
            Err(op_msg) => {
                let _ = self.events.send(SchedulerEvent::Cascade {
                    id: self.id,
                    status: SyncStatus::Error,
                    timestamp: now_millis(),
                    msg: side_effect_msg.clone(),
                    error: Some(TransactionErrorInfo {
                        error_msg: format!("{side_effect_msg}，但删除失败: {op_msg}"),
                        cleanup_msg: CLEANUP_NOT_REQUIRED.to_string(),
                    }),
                });
                Err(self.err(op_msg, CLEANUP_NOT_REQUIRED))
            }
        }
    }

    async fn noop(&self) -> TransactionOutcome {
        self.check_cancel()?;
        Ok(now_millis())
    }

    async fn remove_dir_checked(
        &self,
        parent: &EntryHandle,
        right: &DirEntity,
    ) -> Result<(), String> {
        match self.right_store.exists(parent, &right.name).await {
            Ok(true) => {}
            Ok(false) => return Err(format!("目标目录 '{}' 已不存在", right.name)),
            Err(e) => return Err(format!("检查目标目录失败: {e:#}")),
        }
        if self.cancel.is_cancelled() {
            return Err(CANCELLED_MSG.to_string());
        }
        self.right_store
            .remove_entry(parent, &right.name, true)
            .await
            .map_err(|e| format!("递归删除目标目录失败: {e:#}"))?;
        Ok(())
    }

    /// 分块写入，每个块之间检查取消信号
    async fn copy_into(&self, left: &FileEntity, dest: &EntryHandle) -> Result<(), String> {
        if self.cancel.is_cancelled() {
            return Err(CANCELLED_MSG.to_string());
        }
        let mut reader = self
            .left_store
            .open_reader(&left.handle)
            .await
            .map_err(|e| format!("打开源文件失败: {e:#}"))?;

        if self.cancel.is_cancelled() {
            return Err(CANCELLED_MSG.to_string());
        }
        let mut writer = self
            .right_store
            .open_writer(dest)
            .await
            .map_err(|e| format!("打开目标文件失败: {e:#}"))?;

        let mut written = 0u64;
        while let Some(chunk) = reader.next().await {
            if self.cancel.is_cancelled() {
                return Err(CANCELLED_MSG.to_string());
            }
            let chunk = chunk.map_err(|e| format!("读取源文件失败: {e}"))?;
            writer
                .write_all(&chunk)
                .await
                .map_err(|e| format!("写入目标文件失败: {e}"))?;
            written += chunk.len() as u64;
        }
        writer
            .flush()
            .await
            .map_err(|e| format!("写入目标文件失败: {e}"))?;

        debug!("复制完成: '{}' 共 {} 字节", left.path, written);
        Ok(())
    }

    /// 删除创建后未完成的目标文件，返回清理结果消息
    async fn cleanup_dest(&self, parent: &EntryHandle) -> String {
        match self.right_store.remove_entry(parent, &self.name, false).await {
            Ok(()) => format!("已删除文件 '{}' 的未完成副本", self.name),
            Err(e) => format!("清理失败，文件 '{}' 可能残留: {e:#}", self.name),
        }
    }
}
