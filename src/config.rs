//! 同步选项配置

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

/// 同步选项
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOptions {
    /// 名称匹配是否区分大小写
    #[serde(default)]
    pub is_case_sensitive: bool,
    /// 并发复制字节预算（0 表示不限制）
    #[serde(default = "default_buffer_copy_max_size")]
    pub buffer_copy_max_size: u64,
    /// 并发事务数预算（0 表示不限制）
    #[serde(default = "default_number_transactions_max")]
    pub number_transactions_max: usize,
}

fn default_buffer_copy_max_size() -> u64 {
    100_000_000 // 默认 100MB
}

fn default_number_transactions_max() -> usize {
    5
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            is_case_sensitive: false,
            buffer_copy_max_size: default_buffer_copy_max_size(),
            number_transactions_max: default_number_transactions_max(),
        }
    }
}

impl SyncOptions {
    /// 从配置文件的 sync 段加载
    pub fn load(config_dir: &Path) -> Self {
        let config_file = config_dir.join("config.json");
        if config_file.exists() {
            if let Ok(content) = fs::read_to_string(&config_file) {
                if let Ok(config) = serde_json::from_str::<serde_json::Value>(&content) {
                    if let Some(sync_config) = config.get("sync") {
                        if let Ok(sync) = serde_json::from_value::<SyncOptions>(sync_config.clone())
                        {
                            return sync;
                        }
                    }
                }
            }
        }
        Self::default()
    }

    /// 保存到配置文件的 sync 段
    pub fn save(&self, config_dir: &Path) -> io::Result<()> {
        let config_file = config_dir.join("config.json");

        // 读取现有配置
        let mut config: serde_json::Value = if config_file.exists() {
            let content = fs::read_to_string(&config_file)?;
            serde_json::from_str(&content).unwrap_or_else(|_| serde_json::json!({}))
        } else {
            serde_json::json!({})
        };

        // 更新同步配置
        config["sync"] = serde_json::to_value(self).unwrap();

        // 写入文件
        let content = serde_json::to_string_pretty(&config).unwrap();
        fs::write(&config_file, content)?;

        Ok(())
    }
}
