use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// 核心模块导出
pub mod driver;
pub mod export;

// 重新导出 driver 和 export 类型
pub use driver::{
    DatabaseDriver, DatabaseSession, DriverError, PostgresDriver, ResultStream, SQLiteDriver, create_connection,
};

pub use export::{
    Banner, BannerLevel, Destination, ExportError, ExportMode, ExportOutcome, ExportSink, FormattingWarning, HtmlTags,
    OutputFormat, TableRenderer, WarningLog, export, export_with, format_field,
};

// ============================================================================
// Model Types
// ============================================================================

/// 列的类型标签，由驱动根据列元数据一次性确定
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeTag {
    Integer,
    Decimal,
    FloatingPoint,
    Timestamp,
    Text,
    /// 携带数据库原生类型名
    Unsupported(String),
}

impl TypeTag {
    pub fn label(&self) -> &str {
        match self {
            TypeTag::Integer => "Integer",
            TypeTag::Decimal => "Decimal",
            TypeTag::FloatingPoint => "FloatingPoint",
            TypeTag::Timestamp => "Timestamp",
            TypeTag::Text => "Text",
            TypeTag::Unsupported(name) => name,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResultColumn {
    pub name: String,
    pub tag: TypeTag,
}

impl ResultColumn {
    pub fn new(
        name: impl Into<String>,
        tag: TypeTag,
    ) -> Self {
        Self { name: name.into(), tag }
    }
}

/// 从结果集中读出的单个字段值
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Null,
    Integer(i64),
    /// 定点数保留数据库给出的十进制文本
    Decimal(String),
    Single(f32),
    Double(f64),
    Timestamp(NaiveDateTime),
    Text(String),
}

impl FieldValue {
    pub fn kind(&self) -> &'static str {
        match self {
            FieldValue::Null => "Null",
            FieldValue::Integer(_) => "Integer",
            FieldValue::Decimal(_) => "Decimal",
            FieldValue::Single(_) => "Single",
            FieldValue::Double(_) => "Double",
            FieldValue::Timestamp(_) => "Timestamp",
            FieldValue::Text(_) => "Text",
        }
    }
}

/// 读取字段的结果；失败时保存转换错误信息，由格式化阶段记为警告
pub type RawField = Result<FieldValue, String>;

/// 一行结果，字段与 [`ResultColumn`] 按位置对齐
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResultRow {
    fields: Vec<RawField>,
}

impl ResultRow {
    pub fn new(fields: Vec<RawField>) -> Self {
        Self { fields }
    }

    pub fn get(
        &self,
        idx: usize,
    ) -> Option<&RawField> {
        self.fields.get(idx)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<RawField> for ResultRow {
    fn from_iter<I: IntoIterator<Item = RawField>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

// ============================================================================
// Data Source Options
// ============================================================================

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SQLiteOptions {
    pub readonly: bool,
    pub filepath: String,
}

impl Default for SQLiteOptions {
    fn default() -> Self {
        Self {
            readonly: false,
            filepath: String::new(),
        }
    }
}

impl SQLiteOptions {
    pub fn endpoint(&self) -> String {
        let path = self.filepath.trim();
        if path.is_empty() {
            return "sqlite://<未配置文件>".into();
        }

        if self.readonly {
            format!("sqlite://{}?mode=ro", path)
        } else {
            format!("sqlite://{}", path)
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PostgresOptions {
    /// libpq 风格连接串或 postgres:// URL，设置后忽略其余字段
    pub connection_string: Option<String>,
    pub host: String,
    pub port: String,
    pub database: String,
    pub username: String,
    pub password: String,
    pub use_tls: bool,
}

impl Default for PostgresOptions {
    fn default() -> Self {
        Self {
            connection_string: None,
            host: "127.0.0.1".into(),
            port: "5432".into(),
            database: String::new(),
            username: "postgres".into(),
            password: "".into(),
            use_tls: false,
        }
    }
}

impl PostgresOptions {
    pub fn from_connection_string(conn: &str) -> Self {
        Self {
            connection_string: Some(conn.to_string()),
            ..Self::default()
        }
    }

    /// 解析 `Host=..;Username=..;Password=..;Database=..` 形式的连接串
    pub fn from_ado(conn: &str) -> Result<Self, DriverError> {
        let mut opts = Self::default();
        for pair in conn.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| DriverError::InvalidField(format!("连接串片段缺少 '=': {}", pair)))?;
            let value = value.trim().to_string();
            match key.trim().to_ascii_lowercase().as_str() {
                "host" | "server" => opts.host = value,
                "port" => opts.port = value,
                "username" | "user id" | "userid" | "user" => opts.username = value,
                "password" | "pwd" => opts.password = value,
                "database" | "db" | "initial catalog" => opts.database = value,
                "ssl mode" | "sslmode" => {
                    opts.use_tls = matches!(
                        value.to_ascii_lowercase().as_str(),
                        "require" | "verifyca" | "verify-ca" | "verifyfull" | "verify-full"
                    )
                }
                other => tracing::debug!("忽略未识别的连接参数: {}", other),
            }
        }
        Ok(opts)
    }

    pub fn endpoint(&self) -> String {
        if let Some(conn) = &self.connection_string {
            return driver::postgres_endpoint(conn);
        }

        let db = self.database.trim();
        let suffix = if db.is_empty() {
            String::new()
        } else {
            format!("/{}", db)
        };
        format!("postgres://{}:{}{}", self.host, self.port, suffix)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum DataSourceOptions {
    Postgres(PostgresOptions),
    SQLite(SQLiteOptions),
}

impl DataSourceOptions {
    /// 按内容识别连接信息：JSON 配置、sqlite: 路径、ADO 连接串或 libpq 连接串
    pub fn parse(text: &str) -> Result<Self, DriverError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(DriverError::MissingField("connection".into()));
        }

        if text.starts_with('{') {
            return serde_json::from_str(text).map_err(|err| DriverError::InvalidField(format!("连接配置 JSON: {}", err)));
        }

        if let Some(path) = text.strip_prefix("sqlite://").or_else(|| text.strip_prefix("sqlite:")) {
            return Ok(Self::SQLite(SQLiteOptions {
                readonly: true,
                filepath: path.to_string(),
            }));
        }

        let is_url = text.starts_with("postgres://") || text.starts_with("postgresql://");
        if !is_url && text.contains(';') {
            return PostgresOptions::from_ado(text).map(Self::Postgres);
        }

        Ok(Self::Postgres(PostgresOptions::from_connection_string(text)))
    }

    pub fn endpoint(&self) -> String {
        match self {
            DataSourceOptions::Postgres(opts) => opts.endpoint(),
            DataSourceOptions::SQLite(opts) => opts.endpoint(),
        }
    }
}
