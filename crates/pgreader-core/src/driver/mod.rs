use crate::{
    DataSourceOptions, ResultColumn, ResultRow,
    export::{Destination, ExportError, ExportOutcome, WarningLog},
};

pub use self::postgres::PostgresDriver;
pub use self::sqlite::SQLiteDriver;

pub(crate) use self::postgres::postgres_endpoint;

mod postgres;
mod sqlite;

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("{0}")]
    Other(String),
    #[error("配置字段缺失: {0}")]
    MissingField(String),
    #[error("配置字段非法: {0}")]
    InvalidField(String),
    #[error("连接 {endpoint} 失败: {message}")]
    Connect { endpoint: String, message: String },
    #[error("执行查询失败: {0}")]
    Query(String),
    #[error("读取结果失败: {0}")]
    Fetch(String),
}

/// 只进结果流：列元数据一次给出，之后逐行拉取
pub trait ResultStream {
    fn columns(&self) -> &[ResultColumn];

    /// 返回 `Ok(None)` 表示结果已读完；`Err` 代表连接或游标故障，整个导出随之失败
    fn next_row(&mut self) -> Result<Option<ResultRow>, DriverError>;
}

pub trait DatabaseDriver {
    type Config;

    fn create_connection(
        &self,
        config: &Self::Config,
    ) -> Result<Box<dyn DatabaseSession>, DriverError>;
}

pub trait DatabaseSession: Send {
    /// 执行查询并把结果流式导出到目标
    fn export(
        &mut self,
        sql: &str,
        destination: &Destination,
        warnings: &mut WarningLog,
    ) -> Result<ExportOutcome, ExportError>;
}

pub fn create_connection(opts: &DataSourceOptions) -> Result<Box<dyn DatabaseSession>, DriverError> {
    match opts {
        DataSourceOptions::Postgres(config) => PostgresDriver.create_connection(config),
        DataSourceOptions::SQLite(config) => SQLiteDriver.create_connection(config),
    }
}
