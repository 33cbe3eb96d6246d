//! mirrorsync - 单向目录备份引擎
//!
//! LEFT 为事实源，RIGHT 为备份目标。按名称、类型、大小与修改时间对比
//! 两侧目录树（不比较内容），生成事务树后在并发预算内执行，
//! 支持取消与部分失败恢复。

pub mod config;
pub mod core;
pub mod logging;
pub mod storage;

pub use crate::config::SyncOptions;
pub use crate::core::{
    DiffTotals, ScanError, SyncAction, SyncError, SyncReport, SyncSession, SyncSide, SyncStatus,
    TransactionTree,
};
pub use crate::storage::{EntryHandle, EntryKind, FileMeta, LocalStore, Store};
