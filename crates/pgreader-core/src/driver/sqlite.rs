use std::{fs, path::Path};

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{Connection, OpenFlags, Rows, types::ValueRef};

use crate::{
    FieldValue, RawField, ResultColumn, ResultRow, SQLiteOptions, TypeTag,
    export::{Destination, ExportError, ExportOutcome, WarningLog, export},
};

use super::{DatabaseDriver, DatabaseSession, DriverError, ResultStream};

#[derive(Debug, Clone, Copy)]
pub struct SQLiteDriver;

struct SQLiteConnection {
    conn: Connection,
}

impl SQLiteConnection {
    fn new(conn: Connection) -> Self {
        Self { conn }
    }
}

impl DatabaseSession for SQLiteConnection {
    fn export(
        &mut self,
        sql: &str,
        destination: &Destination,
        warnings: &mut WarningLog,
    ) -> Result<ExportOutcome, ExportError> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|err| DriverError::Query(format!("准备查询失败: {}", err)))?;

        let columns = stmt
            .columns()
            .iter()
            .map(|column| ResultColumn::new(column.name(), affinity_tag(column.decl_type())))
            .collect::<Vec<_>>();
        tracing::debug!("查询返回 {} 列", columns.len());

        let rows = stmt
            .query([])
            .map_err(|err| DriverError::Query(err.to_string()))?;

        let mut stream = SQLiteStream { columns, rows };
        export(&mut stream, destination, warnings)
    }
}

struct SQLiteStream<'stmt> {
    columns: Vec<ResultColumn>,
    rows: Rows<'stmt>,
}

impl ResultStream for SQLiteStream<'_> {
    fn columns(&self) -> &[ResultColumn] {
        &self.columns
    }

    fn next_row(&mut self) -> Result<Option<ResultRow>, DriverError> {
        let Some(row) = self
            .rows
            .next()
            .map_err(|err| DriverError::Fetch(err.to_string()))?
        else {
            return Ok(None);
        };

        let record = self
            .columns
            .iter()
            .enumerate()
            .map(|(idx, column)| match row.get_ref(idx) {
                Ok(value) => read_field(value, &column.tag),
                Err(err) => Err(format!("读取列失败: {}", err)),
            })
            .collect();
        Ok(Some(record))
    }
}

impl DatabaseDriver for SQLiteDriver {
    type Config = SQLiteOptions;

    fn create_connection(
        &self,
        config: &Self::Config,
    ) -> Result<Box<dyn DatabaseSession>, DriverError> {
        let conn = open_conn(config)?;
        Ok(Box::new(SQLiteConnection::new(conn)))
    }
}

fn open_conn(config: &SQLiteOptions) -> Result<Connection, DriverError> {
    let path_str = config.filepath.trim();
    if path_str.is_empty() {
        return Err(DriverError::MissingField("file_path".into()));
    }

    let path = Path::new(path_str);

    if config.readonly {
        if !path.exists() {
            return Err(DriverError::InvalidField(format!("file_path 不存在: {}", path_str)));
        }
    } else if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|err| DriverError::Other(format!("创建目录失败: {}", err)))?;
        }
    }

    let flags = if config.readonly {
        OpenFlags::SQLITE_OPEN_READ_ONLY
    } else {
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE
    };

    Connection::open_with_flags(path, flags).map_err(|err| DriverError::Connect {
        endpoint: config.endpoint(),
        message: err.to_string(),
    })
}

/// 按 SQLite 类型亲和规则由声明类型确定标签；表达式列没有声明类型，按文本处理
fn affinity_tag(decl_type: Option<&str>) -> TypeTag {
    let Some(decl) = decl_type.map(str::trim).filter(|d| !d.is_empty()) else {
        return TypeTag::Text;
    };
    let upper = decl.to_ascii_uppercase();

    if upper.contains("INT") {
        TypeTag::Integer
    } else if ["CHAR", "CLOB", "TEXT"].iter().any(|k| upper.contains(k)) {
        TypeTag::Text
    } else if upper.contains("BLOB") {
        TypeTag::Unsupported(decl.to_string())
    } else if ["REAL", "FLOA", "DOUB"].iter().any(|k| upper.contains(k)) {
        TypeTag::FloatingPoint
    } else if upper.contains("DATE") || upper.contains("TIME") {
        TypeTag::Timestamp
    } else if upper.contains("DEC") || upper.contains("NUMERIC") {
        TypeTag::Decimal
    } else {
        TypeTag::Unsupported(decl.to_string())
    }
}

/// 按列标签读取值；存储类与标签不一致且无法转换时返回错误信息
fn read_field(
    value: ValueRef<'_>,
    tag: &TypeTag,
) -> RawField {
    match (tag, value) {
        (TypeTag::Unsupported(_), _) | (_, ValueRef::Null) => Ok(FieldValue::Null),
        (TypeTag::Integer, ValueRef::Integer(v)) => Ok(FieldValue::Integer(v)),
        (TypeTag::Decimal, ValueRef::Integer(v)) => Ok(FieldValue::Decimal(v.to_string())),
        (TypeTag::Decimal, ValueRef::Real(v)) => Ok(FieldValue::Decimal(v.to_string())),
        (TypeTag::FloatingPoint, ValueRef::Real(v)) => Ok(FieldValue::Double(v)),
        (TypeTag::FloatingPoint, ValueRef::Integer(v)) => Ok(FieldValue::Double(v as f64)),
        (TypeTag::Timestamp, ValueRef::Text(text)) => parse_timestamp(&String::from_utf8_lossy(text)),
        (TypeTag::Text, ValueRef::Text(text)) => Ok(FieldValue::Text(String::from_utf8_lossy(text).into_owned())),
        (TypeTag::Text, ValueRef::Integer(v)) => Ok(FieldValue::Text(v.to_string())),
        (TypeTag::Text, ValueRef::Real(v)) => Ok(FieldValue::Text(v.to_string())),
        (tag, value) => Err(format!("无法将 {} 转换为 {}", value.data_type(), tag.label())),
    }
}

fn parse_timestamp(text: &str) -> RawField {
    let text = text.trim();
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(text, fmt) {
            return Ok(FieldValue::Timestamp(ts));
        }
    }

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(FieldValue::Timestamp)
        .ok_or_else(|| format!("无法解析时间: {}", text))
}
