//! 错误类型定义

use serde::Serialize;
use thiserror::Error;

/// 扫描阶段错误
///
/// 任一子项失败都会导致该侧扫描整体失败，该侧扫描树必须废弃后重扫
#[derive(Debug, Error)]
pub enum ScanError {
    /// 目录枚举失败（权限、路径长度等）
    #[error("failed to enumerate entries of '{path}': {source}")]
    DirEntries {
        path: String,
        #[source]
        source: anyhow::Error,
    },

    /// 文件元数据读取失败
    #[error("failed to read file metadata for '{path}': {source}")]
    FileRead {
        path: String,
        #[source]
        source: anyhow::Error,
    },

    /// 大小写归一化后同目录内名称冲突
    #[error("entry '{name}' in '{path}' collides with a sibling after case folding")]
    CaseSensitivity { path: String, name: String },

    /// 扫描被用户取消
    #[error("scan was cancelled")]
    Cancelled,
}

/// diff 阶段一致性错误
///
/// 统计无法与扫描结果对账，属于程序缺陷而非用户可恢复错误
#[derive(Debug, Error)]
pub enum DiffError {
    #[error("diff stats for directory '{name}' do not balance against scan stats: {detail}")]
    Inconsistent { name: String, detail: String },
}

/// 同步流程错误
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("both sides must be scanned before diffing")]
    NotScanned,

    #[error("no transaction tree, run diff first")]
    NotDiffed,

    #[error("root dirs do not need sync")]
    NothingToSync,

    #[error(transparent)]
    Diff(#[from] DiffError),
}

/// 事务执行失败详情：操作消息与清理结果消息成对记录在节点上
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionErrorInfo {
    pub error_msg: String,
    pub cleanup_msg: String,
}
