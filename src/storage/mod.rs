pub mod local;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use tokio::io::AsyncWrite;

pub use local::LocalStore;

/// 条目类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
}

impl EntryKind {
    pub fn is_file(self) -> bool {
        matches!(self, EntryKind::File)
    }
}

/// 存储条目句柄，由具体存储实现签发
///
/// locator 的含义由签发它的存储实现决定，核心逻辑只原样传递
#[derive(Debug, Clone)]
pub struct EntryHandle {
    locator: String,
    name: String,
    kind: EntryKind,
}

impl EntryHandle {
    pub fn new(locator: impl Into<String>, name: impl Into<String>, kind: EntryKind) -> Self {
        Self {
            locator: locator.into(),
            name: name.into(),
            kind,
        }
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }
}

/// 文件元数据（修改时间为毫秒时间戳）
#[derive(Debug, Clone, Copy)]
pub struct FileMeta {
    pub size: u64,
    pub mtime: i64,
}

/// 分块读取流
pub type ByteStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>;

/// 可写字节槽
pub type ByteSink = Pin<Box<dyn AsyncWrite + Send>>;

/// 层级存储抽象接口
#[async_trait]
pub trait Store: Send + Sync {
    /// 根目录句柄
    async fn root(&self) -> Result<EntryHandle>;

    /// 列出目录的直接子条目（名称 + 类型）
    async fn list_children(&self, dir: &EntryHandle) -> Result<Vec<EntryHandle>>;

    /// 获取文件元数据
    async fn file_meta(&self, file: &EntryHandle) -> Result<FileMeta>;

    /// 打开文件的分块读取流
    async fn open_reader(&self, file: &EntryHandle) -> Result<ByteStream>;

    /// 在父目录下创建文件并返回句柄（已存在则复用，不截断内容）
    async fn create_file(&self, parent: &EntryHandle, name: &str) -> Result<EntryHandle>;

    /// 打开文件的可写槽（截断写入）
    async fn open_writer(&self, file: &EntryHandle) -> Result<ByteSink>;

    /// 在父目录下创建目录并返回句柄（已存在则复用）
    async fn create_dir(&self, parent: &EntryHandle, name: &str) -> Result<EntryHandle>;

    /// 删除父目录下的条目；目标不存在不视为错误
    async fn remove_entry(&self, parent: &EntryHandle, name: &str, recursive: bool) -> Result<()>;

    /// 检查父目录下是否存在该名称的条目
    async fn exists(&self, parent: &EntryHandle, name: &str) -> Result<bool>;

    /// 判断 a 是否为 b 的祖先（目录选择层使用，diff/同步核心不依赖）
    fn is_ancestor(&self, a: &EntryHandle, b: &EntryHandle) -> bool;

    /// 存储名称（用于日志）
    fn name(&self) -> &str;
}
