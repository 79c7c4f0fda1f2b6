use std::{error::Error, fmt::Write};

use chrono::{DateTime, Local, NaiveDate, Utc};
use postgres::{
    Client, Config, NoTls, Row, RowIter,
    config::Host,
    fallible_iterator::FallibleIterator,
    types::{FromSql, ToSql, Type},
};

use crate::{
    FieldValue, PostgresOptions, RawField, ResultColumn, ResultRow, TypeTag,
    export::{Destination, ExportError, ExportOutcome, WarningLog, export},
};

use super::{DatabaseDriver, DatabaseSession, DriverError, ResultStream};

#[derive(Debug, Clone, Copy)]
pub struct PostgresDriver;

impl DatabaseDriver for PostgresDriver {
    type Config = PostgresOptions;

    fn create_connection(
        &self,
        config: &Self::Config,
    ) -> Result<Box<dyn DatabaseSession>, DriverError> {
        let client = open_conn(config)?;
        Ok(Box::new(PostgresSession::new(client)))
    }
}

struct PostgresSession {
    client: Client,
}

impl PostgresSession {
    fn new(client: Client) -> Self {
        Self { client }
    }
}

impl DatabaseSession for PostgresSession {
    fn export(
        &mut self,
        sql: &str,
        destination: &Destination,
        warnings: &mut WarningLog,
    ) -> Result<ExportOutcome, ExportError> {
        let statement = self
            .client
            .prepare(sql)
            .map_err(|err| DriverError::Query(err.to_string()))?;

        let columns = statement
            .columns()
            .iter()
            .map(|column| ResultColumn::new(column.name(), type_tag(column.type_())))
            .collect::<Vec<_>>();
        tracing::debug!("查询返回 {} 列", columns.len());

        let params: Vec<&(dyn ToSql + Sync)> = vec![];
        let rows = self
            .client
            .query_raw(&statement, params)
            .map_err(|err| DriverError::Query(err.to_string()))?;

        let mut stream = PostgresStream { columns, rows };
        export(&mut stream, destination, warnings)
    }
}

struct PostgresStream<'a> {
    columns: Vec<ResultColumn>,
    rows: RowIter<'a>,
}

impl ResultStream for PostgresStream<'_> {
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
            .map(|(idx, column)| read_field(&row, idx, &column.tag))
            .collect();
        Ok(Some(record))
    }
}

fn open_conn(config: &PostgresOptions) -> Result<Client, DriverError> {
    if config.use_tls {
        return Err(DriverError::Other("PostgreSQL 暂未支持 TLS 连接".into()));
    }

    let pg_config = match &config.connection_string {
        Some(conn) => conn
            .parse::<Config>()
            .map_err(|err| DriverError::InvalidField(format!("连接串: {}", err)))?,
        None => {
            if config.host.trim().is_empty() {
                return Err(DriverError::MissingField("host".into()));
            }
            if config.username.trim().is_empty() {
                return Err(DriverError::MissingField("username".into()));
            }
            if config.database.trim().is_empty() {
                return Err(DriverError::MissingField("database".into()));
            }

            let mut pg_config = Config::new();
            pg_config.host(config.host.trim());
            pg_config.port(config.port.parse().unwrap_or(5432));
            pg_config.user(config.username.trim());
            pg_config.password(config.password.as_str());
            pg_config.dbname(config.database.trim());
            pg_config
        }
    };

    pg_config.connect(NoTls).map_err(|err| DriverError::Connect {
        endpoint: config.endpoint(),
        message: err.to_string(),
    })
}

/// 连接串的可记录形式，不含密码
pub(crate) fn postgres_endpoint(conn: &str) -> String {
    let Ok(config) = conn.parse::<Config>() else {
        return "postgres://<无效连接串>".into();
    };

    let hosts = config
        .get_hosts()
        .iter()
        .map(|host| match host {
            Host::Tcp(name) => name.clone(),
            #[cfg(unix)]
            Host::Unix(path) => path.display().to_string(),
        })
        .collect::<Vec<_>>();
    let host = if hosts.is_empty() {
        "localhost".to_string()
    } else {
        hosts.join(",")
    };
    let port = config.get_ports().first().copied().unwrap_or(5432);

    match config.get_dbname() {
        Some(db) => format!("postgres://{}:{}/{}", host, port, db),
        None => format!("postgres://{}:{}", host, port),
    }
}

fn type_tag(ty: &Type) -> TypeTag {
    match *ty {
        Type::INT2 | Type::INT4 | Type::INT8 | Type::OID => TypeTag::Integer,
        Type::NUMERIC => TypeTag::Decimal,
        Type::FLOAT4 | Type::FLOAT8 => TypeTag::FloatingPoint,
        Type::TIMESTAMP | Type::TIMESTAMPTZ | Type::DATE => TypeTag::Timestamp,
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::CHAR | Type::UNKNOWN => TypeTag::Text,
        _ => TypeTag::Unsupported(ty.name().to_string()),
    }
}

fn read_field(
    row: &Row,
    idx: usize,
    tag: &TypeTag,
) -> RawField {
    let Some(column) = row.columns().get(idx) else {
        return Err(format!("列索引越界: {}", idx));
    };
    let ty = column.type_();

    match tag {
        TypeTag::Integer => match *ty {
            Type::INT2 => take(row, idx, |v: i16| FieldValue::Integer(v.into())),
            Type::INT4 => take(row, idx, |v: i32| FieldValue::Integer(v.into())),
            Type::OID => take(row, idx, |v: u32| FieldValue::Integer(v.into())),
            _ => take(row, idx, FieldValue::Integer),
        },
        TypeTag::Decimal => take(row, idx, |v: PgNumeric| FieldValue::Decimal(v.0)),
        TypeTag::FloatingPoint => match *ty {
            Type::FLOAT4 => take(row, idx, FieldValue::Single),
            _ => take(row, idx, FieldValue::Double),
        },
        TypeTag::Timestamp => match *ty {
            Type::DATE => take(row, idx, |v: NaiveDate| {
                v.and_hms_opt(0, 0, 0).map_or(FieldValue::Null, FieldValue::Timestamp)
            }),
            // 带时区的时间按本地时间输出
            Type::TIMESTAMPTZ => take(row, idx, |v: DateTime<Utc>| {
                FieldValue::Timestamp(v.with_timezone(&Local).naive_local())
            }),
            _ => take(row, idx, FieldValue::Timestamp),
        },
        TypeTag::Text => match *ty {
            // 单字节 "char" 类型
            Type::CHAR => take(row, idx, |v: i8| FieldValue::Text(char_text(v))),
            _ => take(row, idx, FieldValue::Text),
        },
        TypeTag::Unsupported(_) => Ok(FieldValue::Null),
    }
}

fn char_text(value: i8) -> String {
    char::from(value as u8).to_string()
}

fn take<'a, T, F>(
    row: &'a Row,
    idx: usize,
    wrap: F,
) -> RawField
where
    T: FromSql<'a>,
    F: FnOnce(T) -> FieldValue,
{
    row.try_get::<_, Option<T>>(idx)
        .map(|value| value.map_or(FieldValue::Null, wrap))
        .map_err(|err| err.to_string())
}

/// NUMERIC 的十进制文本形式
struct PgNumeric(String);

impl<'a> FromSql<'a> for PgNumeric {
    fn from_sql(
        _ty: &Type,
        raw: &'a [u8],
    ) -> Result<Self, Box<dyn Error + Sync + Send>> {
        decode_numeric(raw).map(PgNumeric)
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }
}

const NUMERIC_POS: u16 = 0x0000;
const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;

/// 解码二进制 NUMERIC：ndigits, weight, sign, dscale 之后是 base-10000 的数位
fn decode_numeric(raw: &[u8]) -> Result<String, Box<dyn Error + Sync + Send>> {
    if raw.len() < 8 {
        return Err("NUMERIC 数据长度不足".into());
    }

    let read_u16 = |pos: usize| u16::from_be_bytes([raw[pos], raw[pos + 1]]);
    let ndigits = read_u16(0) as usize;
    let weight = read_u16(2) as i16 as isize;
    let sign = read_u16(4);
    let dscale = read_u16(6) as usize;

    match sign {
        NUMERIC_NAN => return Ok("NaN".into()),
        NUMERIC_PINF => return Ok("Infinity".into()),
        NUMERIC_NINF => return Ok("-Infinity".into()),
        NUMERIC_POS | NUMERIC_NEG => {}
        other => return Err(format!("NUMERIC 符号位非法: {:#06x}", other).into()),
    }

    if raw.len() != 8 + ndigits * 2 {
        return Err("NUMERIC 数位长度不匹配".into());
    }

    let digits = (0..ndigits).map(|i| read_u16(8 + i * 2)).collect::<Vec<_>>();
    let digit_at = |idx: isize| -> u16 {
        if idx < 0 {
            0
        } else {
            digits.get(idx as usize).copied().unwrap_or(0)
        }
    };

    let mut text = String::new();
    if sign == NUMERIC_NEG {
        text.push('-');
    }

    if weight < 0 {
        text.push('0');
    } else {
        for idx in 0..=weight {
            if idx == 0 {
                write!(text, "{}", digit_at(idx))?;
            } else {
                write!(text, "{:04}", digit_at(idx))?;
            }
        }
    }

    if dscale > 0 {
        let mut fraction = String::with_capacity(dscale + 4);
        let mut idx = weight + 1;
        while fraction.len() < dscale {
            write!(fraction, "{:04}", digit_at(idx))?;
            idx += 1;
        }
        fraction.truncate(dscale);
        text.push('.');
        text.push_str(&fraction);
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric(
        weight: i16,
        sign: u16,
        dscale: u16,
        digits: &[u16],
    ) -> Vec<u8> {
        let mut raw = vec![];
        raw.extend((digits.len() as u16).to_be_bytes());
        raw.extend(weight.to_be_bytes());
        raw.extend(sign.to_be_bytes());
        raw.extend(dscale.to_be_bytes());
        for digit in digits {
            raw.extend(digit.to_be_bytes());
        }
        raw
    }

    #[test]
    fn decode_numeric_values() {
        assert_eq!(decode_numeric(&numeric(0, NUMERIC_POS, 2, &[123, 4500])).unwrap(), "123.45");
        assert_eq!(decode_numeric(&numeric(1, NUMERIC_NEG, 0, &[1, 2])).unwrap(), "-10002");
        assert_eq!(decode_numeric(&numeric(-1, NUMERIC_POS, 4, &[1])).unwrap(), "0.0001");
        assert_eq!(decode_numeric(&numeric(-2, NUMERIC_POS, 6, &[1200])).unwrap(), "0.000012");
        assert_eq!(decode_numeric(&numeric(0, NUMERIC_POS, 0, &[])).unwrap(), "0");
        assert_eq!(decode_numeric(&numeric(0, NUMERIC_POS, 2, &[])).unwrap(), "0.00");
        // 10000 = 1 * 10000^1，末尾的零组被省略
        assert_eq!(decode_numeric(&numeric(1, NUMERIC_POS, 0, &[1])).unwrap(), "10000");
    }

    #[test]
    fn decode_numeric_special_values() {
        assert_eq!(decode_numeric(&numeric(0, NUMERIC_NAN, 0, &[])).unwrap(), "NaN");
        assert_eq!(decode_numeric(&numeric(0, NUMERIC_PINF, 0, &[])).unwrap(), "Infinity");
        assert_eq!(decode_numeric(&numeric(0, NUMERIC_NINF, 0, &[])).unwrap(), "-Infinity");
    }

    #[test]
    fn decode_numeric_rejects_malformed_input() {
        assert!(decode_numeric(&[0, 1, 0]).is_err());
        let mut raw = numeric(0, NUMERIC_POS, 0, &[5]);
        raw.pop();
        assert!(decode_numeric(&raw).is_err());
        assert!(decode_numeric(&numeric(0, 0x1234, 0, &[])).is_err());
    }

    #[test]
    fn type_tags_from_postgres_types() {
        assert_eq!(type_tag(&Type::INT8), TypeTag::Integer);
        assert_eq!(type_tag(&Type::OID), TypeTag::Integer);
        assert_eq!(type_tag(&Type::NUMERIC), TypeTag::Decimal);
        assert_eq!(type_tag(&Type::FLOAT4), TypeTag::FloatingPoint);
        assert_eq!(type_tag(&Type::DATE), TypeTag::Timestamp);
        assert_eq!(type_tag(&Type::TIMESTAMPTZ), TypeTag::Timestamp);
        assert_eq!(type_tag(&Type::BPCHAR), TypeTag::Text);
        assert_eq!(type_tag(&Type::CHAR), TypeTag::Text);
        assert_eq!(type_tag(&Type::BOOL), TypeTag::Unsupported("bool".into()));
        assert_eq!(type_tag(&Type::UUID), TypeTag::Unsupported("uuid".into()));
    }

    #[test]
    fn single_byte_char_as_text() {
        assert_eq!(char_text(b'r' as i8), "r");
        assert_eq!(char_text(b'A' as i8), "A");
    }

    #[test]
    fn endpoint_from_url_and_invalid_string() {
        assert_eq!(
            postgres_endpoint("postgres://reader:pw@db.example.com:6000/warehouse"),
            "postgres://db.example.com:6000/warehouse"
        );
        assert_eq!(postgres_endpoint("host=localhost"), "postgres://localhost:5432");
        assert_eq!(postgres_endpoint("host=localhost port=abc"), "postgres://<无效连接串>");
    }
}
