use anyhow::Result;
use clap::Parser;
use mirrorsync::core::session::SyncSession;
use mirrorsync::core::SyncError;
use mirrorsync::logging::{self, LogConfig};
use mirrorsync::storage::LocalStore;
use mirrorsync::{SyncOptions, SyncStatus};
use std::path::PathBuf;
use std::sync::Arc;

/// 单向目录备份：使 RIGHT 与 LEFT 一致
#[derive(Parser, Debug)]
#[command(name = "mirrorsync", version, about)]
struct Cli {
    /// 源目录（事实源）
    left: PathBuf,

    /// 目标目录（备份目标）
    right: PathBuf,

    /// 名称匹配区分大小写
    #[arg(long)]
    case_sensitive: bool,

    /// 并发事务数上限（0 表示不限制）
    #[arg(long, default_value_t = 5)]
    max_transactions: usize,

    /// 并发复制字节上限（0 表示不限制）
    #[arg(long, default_value_t = 100_000_000)]
    max_copy_bytes: u64,

    /// 只做扫描与对比，不执行同步
    #[arg(long)]
    dry_run: bool,

    /// 日志与配置目录
    #[arg(long, default_value = ".mirrorsync")]
    log_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_config = LogConfig::load(&cli.log_dir);
    logging::init(&cli.log_dir, &log_config);

    let options = SyncOptions {
        is_case_sensitive: cli.case_sensitive,
        buffer_copy_max_size: cli.max_copy_bytes,
        number_transactions_max: cli.max_transactions,
    };

    let left = Arc::new(LocalStore::new(&cli.left)?);
    let right = Arc::new(LocalStore::new(&cli.right)?);
    let mut session = SyncSession::new(left, right, options);

    let (left_stats, right_stats) = session.scan_both().await?;
    println!(
        "左侧: {} 个文件, {} 个目录, {} 字节",
        left_stats.files_count, left_stats.dirs_count, left_stats.size
    );
    println!(
        "右侧: {} 个文件, {} 个目录, {} 字节",
        right_stats.files_count, right_stats.dirs_count, right_stats.size
    );

    session.diff()?;
    let totals = session.root_totals().unwrap_or_default();
    println!(
        "待复制: {} 个文件, {} 个目录, {} 字节",
        totals.copy.files_count, totals.copy.dirs_count, totals.copy.size
    );
    println!(
        "待删除: {} 个文件, {} 个目录, {} 字节",
        totals.delete.files_count, totals.delete.dirs_count, totals.delete.size
    );
    println!(
        "已一致: {} 个文件, {} 个目录, {} 字节",
        totals.equal.files_count, totals.equal.dirs_count, totals.equal.size
    );

    if cli.dry_run {
        return Ok(());
    }

    // Ctrl-C 触发取消
    let cancel = session.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("收到中断信号，正在取消...");
            cancel.cancel();
        }
    });

    match session.start_sync().await {
        Ok(report) => {
            println!(
                "同步{}: 复制 {} 个文件 ({} 字节), 新建 {} 个目录, 删除 {} 个条目, 失败 {}",
                if report.cancelled { "已取消" } else { "完成" },
                report.files_copied,
                report.bytes_copied,
                report.dirs_created,
                report.entries_deleted,
                report.failed
            );

            if report.failed > 0 {
                if let Some(tree) = session.tree() {
                    for node in tree.nodes() {
                        if node.status() != SyncStatus::Error {
                            continue;
                        }
                        let Some(error) = node.error() else {
                            continue;
                        };
                        eprintln!(
                            "  失败: {} ({:?}) - {} / {}",
                            node.path(),
                            node.action(),
                            error.error_msg,
                            error.cleanup_msg
                        );
                    }
                }
                std::process::exit(1);
            }
        }
        Err(SyncError::NothingToSync) => {
            println!("两侧已一致，无需同步");
        }
        Err(e) => return Err(e.into()),
    }

    Ok(())
}
