//! 日志模块 - 文件日志与大小轮转

use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogConfig {
    /// 是否启用日志记录
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// 最大日志文件大小（MB）
    #[serde(default = "default_max_size_mb")]
    pub max_size_mb: u32,
    /// 日志级别: "error", "warn", "info", "debug", "trace"
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_enabled() -> bool {
    true
}

fn default_max_size_mb() -> u32 {
    5
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            max_size_mb: default_max_size_mb(),
            level: default_level(),
        }
    }
}

impl LogConfig {
    /// 从配置文件的 log 段加载
    pub fn load(config_dir: &Path) -> Self {
        let config_file = config_dir.join("config.json");
        fs::read_to_string(&config_file)
            .ok()
            .and_then(|content| serde_json::from_str::<serde_json::Value>(&content).ok())
            .and_then(|config| {
                config
                    .get("log")
                    .and_then(|log| serde_json::from_value::<LogConfig>(log.clone()).ok())
            })
            .unwrap_or_default()
    }

    /// 将配置的日志级别转换为 tracing Level
    pub fn tracing_level(&self) -> tracing::Level {
        match self.level.to_lowercase().as_str() {
            "error" => tracing::Level::ERROR,
            "warn" => tracing::Level::WARN,
            "debug" => tracing::Level::DEBUG,
            "trace" => tracing::Level::TRACE,
            _ => tracing::Level::INFO,
        }
    }
}

/// 带大小上限的日志写入器，超限时轮转为 app.log.old
pub struct SizeRotatingWriter {
    file_path: PathBuf,
    max_size: u64,
    writer: Arc<Mutex<Option<BufWriter<File>>>>,
}

impl SizeRotatingWriter {
    pub fn new(log_dir: &Path, max_size_mb: u32) -> io::Result<Self> {
        fs::create_dir_all(log_dir)?;

        let file_path = log_dir.join("app.log");
        let max_size = (max_size_mb as u64) * 1024 * 1024;
        let writer = Self::open_file(&file_path, max_size)?;

        Ok(Self {
            file_path,
            max_size,
            writer: Arc::new(Mutex::new(Some(writer))),
        })
    }

    fn open_file(file_path: &Path, max_size: u64) -> io::Result<BufWriter<File>> {
        if let Ok(metadata) = fs::metadata(file_path) {
            if metadata.len() > max_size {
                Self::rotate(file_path)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(file_path)?;
        Ok(BufWriter::new(file))
    }

    fn rotate(file_path: &Path) -> io::Result<()> {
        let backup_path = file_path.with_extension("log.old");
        if backup_path.exists() {
            fs::remove_file(&backup_path)?;
        }
        fs::rename(file_path, &backup_path)?;
        Ok(())
    }

    fn check_and_rotate(&self) -> io::Result<()> {
        let Ok(metadata) = fs::metadata(&self.file_path) else {
            return Ok(());
        };
        if metadata.len() <= self.max_size {
            return Ok(());
        }

        let mut guard = self.writer.lock().unwrap();
        if let Some(mut writer) = guard.take() {
            let _ = writer.flush();
        }
        Self::rotate(&self.file_path)?;
        *guard = Some(Self::open_file(&self.file_path, self.max_size)?);
        Ok(())
    }
}

impl Clone for SizeRotatingWriter {
    fn clone(&self) -> Self {
        Self {
            file_path: self.file_path.clone(),
            max_size: self.max_size,
            writer: self.writer.clone(),
        }
    }
}

/// 单次写入的句柄
pub struct LogWriter {
    inner: Arc<Mutex<Option<BufWriter<File>>>>,
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self.inner.lock().unwrap();
        match guard.as_mut() {
            Some(writer) => {
                let written = writer.write(buf)?;
                writer.flush()?;
                Ok(written)
            }
            None => Err(io::Error::new(io::ErrorKind::Other, "writer not available")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut guard = self.inner.lock().unwrap();
        match guard.as_mut() {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for SizeRotatingWriter {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        // 写入前检查轮转
        let _ = self.check_and_rotate();
        LogWriter {
            inner: self.writer.clone(),
        }
    }
}

/// 初始化日志系统：文件日志加 debug 构建下的控制台输出
pub fn init(log_dir: &Path, config: &LogConfig) {
    if !config.enabled {
        let _ = tracing::subscriber::set_global_default(tracing_subscriber::registry());
        return;
    }

    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(config.tracing_level().into());

    match SizeRotatingWriter::new(log_dir, config.max_size_mb) {
        Ok(file_writer) => {
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_target(false);

            #[cfg(debug_assertions)]
            {
                let console_layer = tracing_subscriber::fmt::layer().with_target(false);
                let subscriber = tracing_subscriber::registry()
                    .with(env_filter)
                    .with(file_layer)
                    .with(console_layer);
                let _ = tracing::subscriber::set_global_default(subscriber);
            }

            #[cfg(not(debug_assertions))]
            {
                let subscriber = tracing_subscriber::registry()
                    .with(env_filter)
                    .with(file_layer);
                let _ = tracing::subscriber::set_global_default(subscriber);
            }
        }
        Err(_) => {
            // 文件日志创建失败，回退到控制台
            let _ = tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .try_init();
        }
    }
}
