use std::{
    fs,
    path::{Path, PathBuf},
};

use clap::Parser;

use crate::error::AppError;

/// 控制台日志过滤环境变量
pub const LOG_ENV: &str = "PGREADER_LOG";

#[derive(Debug, Parser)]
#[command(name = "pgreader")]
#[command(about = "Run a query and write the result as text, CSV or HTML", long_about = None)]
#[command(version)]
#[command(
    after_help = "Examples:\n  pgreader conn.txt query.sql\n  pgreader conn.txt query.sql report.csv\n  pgreader 'Host=db;Username=app;Password=secret;Database=sales' 'select * from orders' H2_Open_Orders.html\n  pgreader sqlite:./local.db 'select * from product'\n\nOutput:\n  no OUTPUT     tab separated text on stdout\n  *.csv         comma separated, text columns quoted\n  *.htm, *.html HTML table; H_ / H1_..H5_ file name prefixes add a heading\n\nExit codes:\n  0   query returned no rows\n  1   rows were written\n  -1  error\n\nLogging:\n  Log lines go to stderr (filter with PGREADER_LOG, default warn).\n  If the log directory exists, an info log is also written to <DIR>/log.txt.\n"
)]
pub struct Cli {
    /// Connection: file path or inline text (JSON options, sqlite:<path>, Host=..;.. or libpq string/URL)
    #[arg(value_name = "CONNECTION")]
    pub connection: String,

    /// SQL query: file path or inline text
    #[arg(value_name = "QUERY")]
    pub query: String,

    /// Output file; the extension selects the format, omitted writes to stdout
    #[arg(value_name = "OUTPUT")]
    pub output: Option<String>,

    /// Directory for the log file; file logging is skipped when it does not exist
    #[arg(long, env = "PGREADER_LOG_DIR", default_value = "PgReaderLog", value_name = "DIR")]
    pub log_dir: PathBuf,
}

/// 参数文本及其来源
#[derive(Debug, PartialEq, Eq)]
pub struct ArgText {
    pub text: String,
    pub file: Option<PathBuf>,
}

/// 参数指向已存在的文件时读取文件内容，否则按原样使用
pub fn resolve_arg(arg: &str) -> Result<ArgText, AppError> {
    let path = Path::new(arg);
    if !path.is_file() {
        return Ok(ArgText {
            text: arg.to_string(),
            file: None,
        });
    }

    let text = fs::read_to_string(path).map_err(|source| AppError::ReadArg {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(ArgText {
        text,
        file: Some(path.to_path_buf()),
    })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn positional_arguments() {
        let cli = Cli::try_parse_from(["pgreader", "conn.txt", "select 1", "out.csv"]).unwrap();
        assert_eq!(cli.connection, "conn.txt");
        assert_eq!(cli.query, "select 1");
        assert_eq!(cli.output.as_deref(), Some("out.csv"));

        let cli = Cli::try_parse_from(["pgreader", "conn.txt", "select 1"]).unwrap();
        assert_eq!(cli.output, None);
    }

    #[test]
    fn explicit_log_dir() {
        let cli = Cli::try_parse_from(["pgreader", "--log-dir", "/tmp/logs", "c", "q"]).unwrap();
        assert_eq!(cli.log_dir, PathBuf::from("/tmp/logs"));
    }

    #[test]
    fn missing_query_is_an_error() {
        let err = Cli::try_parse_from(["pgreader", "conn.txt"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn resolve_inline_text() {
        let arg = resolve_arg("select * from orders where id = 1").unwrap();
        assert_eq!(arg.text, "select * from orders where id = 1");
        assert_eq!(arg.file, None);
    }

    #[test]
    fn resolve_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("query.sql");
        fs::write(&path, "select name\nfrom product\n").unwrap();

        let arg = resolve_arg(path.to_str().unwrap()).unwrap();
        assert_eq!(arg.text, "select name\nfrom product\n");
        assert_eq!(arg.file, Some(path));
    }

    #[test]
    fn directory_is_treated_as_inline_text() {
        let dir = tempfile::tempdir().unwrap();
        let arg = resolve_arg(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(arg.file, None);
    }
}
