use std::{io::stderr, path::Path};

use tracing_appender::{non_blocking, rolling::never};
use tracing_subscriber::{EnvFilter, Layer, fmt::layer, layer::SubscriberExt, util::SubscriberInitExt};

use crate::args::LOG_ENV;

const LOG_FILE: &str = "log.txt";

/// 初始化日志系统
///
/// 控制台日志写到 stderr；日志目录存在时额外写入 `<dir>/log.txt`。
/// 返回的 guard 必须在进程退出前释放，否则文件日志可能丢失。
pub fn init_logging(log_dir: &Path) -> Option<non_blocking::WorkerGuard> {
    let console_filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let console = layer().with_writer(stderr).with_filter(console_filter);

    let (file, guard) = if log_dir.is_dir() {
        let (writer, guard) = non_blocking(never(log_dir, LOG_FILE));
        let file = layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_filter(EnvFilter::new("info"));
        (Some(file), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry().with(console).with(file).init();

    guard
}
