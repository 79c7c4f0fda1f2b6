use std::process::exit;

use clap::{CommandFactory, Parser, error::ErrorKind};

use pgreader_core::{DataSourceOptions, Destination, ExportOutcome, WarningLog, create_connection};

use crate::{
    args::{Cli, resolve_arg},
    error::AppError,
    logging::init_logging,
};

mod args;
mod error;
mod logging;

const FAILURE: i32 = -1;

fn main() {
    // 1. 解析命令行参数
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => err.exit(),
        Err(err) => {
            let message = err.to_string();
            let first = message.lines().next().unwrap_or_default();
            print_failure(first.trim_start_matches("error: "));
            exit(FAILURE);
        }
    };

    // 2. 初始化日志系统
    let log_guard = init_logging(&cli.log_dir);
    tracing::info!("pgreader 启动, 输出: {}", cli.output.as_deref().unwrap_or("<console>"));

    // 3. 执行查询并导出
    let mut warnings = WarningLog::new();
    let code = match run(&cli, &mut warnings) {
        Ok(outcome) => {
            match outcome {
                ExportOutcome::Empty => tracing::info!("No rows found."),
                ExportOutcome::Rows(rows) => tracing::info!("导出完成, 共 {} 行", rows),
            }
            outcome.exit_code()
        }
        Err(err) => {
            tracing::error!("{}", err);
            print_failure(&err.to_string());
            FAILURE
        }
    };

    if !warnings.is_empty() {
        tracing::warn!("Field errors: {}", warnings.summary());
    }

    // exit 不会执行析构，先释放 guard 刷新文件日志
    drop(log_guard);
    exit(code);
}

fn run(
    cli: &Cli,
    warnings: &mut WarningLog,
) -> Result<ExportOutcome, AppError> {
    let connection = resolve_arg(&cli.connection)?;
    if let Some(path) = &connection.file {
        tracing::info!("读取连接文件: {}", path.display());
    }
    let options = DataSourceOptions::parse(&connection.text)?;
    tracing::info!("数据源: {}", options.endpoint());

    let query = resolve_arg(&cli.query)?;
    if let Some(path) = &query.file {
        tracing::info!("读取查询文件: {}", path.display());
    }
    let sql = query.text.trim();
    if sql.is_empty() {
        return Err(AppError::EmptyQuery);
    }
    tracing::info!("Executing sql: {}", sql);

    let destination = Destination::from_arg(cli.output.as_deref());

    tracing::info!("正在连接数据库...");
    let mut session = create_connection(&options)?;
    tracing::info!("数据库连接成功");

    Ok(session.export(sql, &destination, warnings)?)
}

fn print_failure(message: &str) {
    eprintln!("Error: {}", message);
    eprintln!();
    eprintln!("{}", Cli::command().render_help());
}
