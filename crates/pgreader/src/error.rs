use std::{io, path::PathBuf};

use thiserror::Error;

use pgreader_core::{DriverError, ExportError};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("读取参数文件失败 {path}: {source}")]
    ReadArg {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("查询语句为空")]
    EmptyQuery,

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error(transparent)]
    Export(#[from] ExportError),
}
