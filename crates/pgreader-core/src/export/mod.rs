//! 结果导出：解析输出模式、逐行格式化并写入目标。
//!
//! 每次只持有当前一行，写出后再拉取下一行。字段级问题记入 [`WarningLog`]，
//! 结果流或输出目标的故障则中止整个导出。

use std::{io, io::Write, path::PathBuf};

use crate::{ResultRow, driver::DriverError, driver::ResultStream};

pub use field::{UNSUPPORTED_MARKER, format_field};
pub use mode::{Banner, BannerLevel, ExportMode, HtmlTags, OutputFormat, TagPair};
pub use render::TableRenderer;
pub use sink::{Destination, ExportSink};
pub use warning::{FormattingWarning, WarningLog};

mod field;
mod mode;
mod render;
mod sink;
mod warning;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error(transparent)]
    Driver(#[from] DriverError),
    #[error("创建输出文件失败 {path}: {source}")]
    Create { path: PathBuf, source: io::Error },
    #[error("写入输出失败: {0}")]
    Write(#[source] io::Error),
}

/// 导出结果：写出了若干行，或结果集为空
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportOutcome {
    Rows(u64),
    Empty,
}

impl ExportOutcome {
    /// 进程退出码：有数据为 1，空结果为 0
    pub fn exit_code(&self) -> i32 {
        match self {
            ExportOutcome::Rows(_) => 1,
            ExportOutcome::Empty => 0,
        }
    }

    pub fn rows(&self) -> u64 {
        match self {
            ExportOutcome::Rows(n) => *n,
            ExportOutcome::Empty => 0,
        }
    }
}

/// 把结果流导出到目标。结果为空时不输出任何内容，也不创建文件
pub fn export<S>(
    stream: &mut S,
    destination: &Destination,
    warnings: &mut WarningLog,
) -> Result<ExportOutcome, ExportError>
where
    S: ResultStream + ?Sized,
{
    let mode = ExportMode::resolve(&destination.name());
    tracing::debug!("导出模式: {:?}, 目标: {:?}", mode.format, destination);

    let Some(first) = stream.next_row()? else {
        return Ok(ExportOutcome::Empty);
    };

    let sink = ExportSink::open(destination)?;
    write_table(stream, first, &mode, sink, warnings).map(ExportOutcome::Rows)
}

/// 按给定模式导出到任意 writer
pub fn export_with<S, W>(
    stream: &mut S,
    mode: &ExportMode,
    writer: W,
    warnings: &mut WarningLog,
) -> Result<ExportOutcome, ExportError>
where
    S: ResultStream + ?Sized,
    W: Write,
{
    let Some(first) = stream.next_row()? else {
        return Ok(ExportOutcome::Empty);
    };

    write_table(stream, first, mode, ExportSink::new(writer), warnings).map(ExportOutcome::Rows)
}

/// 写出整张表并在任何情况下刷新目标；返回数据行数
fn write_table<S, W>(
    stream: &mut S,
    first: ResultRow,
    mode: &ExportMode,
    mut sink: ExportSink<W>,
    warnings: &mut WarningLog,
) -> Result<u64, ExportError>
where
    S: ResultStream + ?Sized,
    W: Write,
{
    let written = write_rows(stream, first, mode, &mut sink, warnings);
    let flushed = sink.finish();
    let rows = written?;
    flushed?;
    Ok(rows)
}

fn write_rows<S, W>(
    stream: &mut S,
    first: ResultRow,
    mode: &ExportMode,
    sink: &mut ExportSink<W>,
    warnings: &mut WarningLog,
) -> Result<u64, ExportError>
where
    S: ResultStream + ?Sized,
    W: Write,
{
    let columns = stream.columns().to_vec();
    let renderer = TableRenderer::new(mode, &columns);

    sink.write_lines(renderer.opening_lines())?;

    let mut rows = 0u64;
    let mut next = Some(first);
    while let Some(row) = next {
        sink.write_line(&renderer.row_line(&row, warnings))?;
        rows += 1;
        next = stream.next_row()?;
    }

    sink.write_lines(renderer.closing_lines())?;
    tracing::debug!("共写出 {} 行数据, 输出 {} 行文本", rows, sink.lines());
    Ok(rows)
}
