use std::{
    borrow::Cow,
    fs::File,
    io::{self, BufWriter, Write},
    path::PathBuf,
};

use super::ExportError;

/// 导出目标：控制台或文件
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Destination {
    Console,
    File(PathBuf),
}

impl Destination {
    /// 空参数视为控制台
    pub fn from_arg(arg: Option<&str>) -> Self {
        match arg.map(str::trim) {
            Some(path) if !path.is_empty() => Destination::File(PathBuf::from(path)),
            _ => Destination::Console,
        }
    }

    /// 用于识别导出模式的名称，控制台为空串
    pub fn name(&self) -> Cow<'_, str> {
        match self {
            Destination::Console => Cow::Borrowed(""),
            Destination::File(path) => path.to_string_lossy(),
        }
    }
}

/// 按行写出导出内容
pub struct ExportSink<W: Write> {
    writer: BufWriter<W>,
    lines: u64,
}

impl ExportSink<Box<dyn Write>> {
    /// 打开目标；文件总是新建或截断
    pub fn open(destination: &Destination) -> Result<Self, ExportError> {
        let writer: Box<dyn Write> = match destination {
            Destination::Console => Box::new(io::stdout().lock()),
            Destination::File(path) => {
                let file = File::create(path).map_err(|source| ExportError::Create {
                    path: path.clone(),
                    source,
                })?;
                tracing::info!("输出文件创建成功: {}", path.display());
                Box::new(file)
            }
        };
        Ok(Self::new(writer))
    }
}

impl<W: Write> ExportSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
            lines: 0,
        }
    }

    pub fn write_line(
        &mut self,
        line: &str,
    ) -> Result<(), ExportError> {
        writeln!(self.writer, "{}", line).map_err(ExportError::Write)?;
        self.lines += 1;
        Ok(())
    }

    pub fn write_lines<I, S>(
        &mut self,
        lines: I,
    ) -> Result<(), ExportError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for line in lines {
            self.write_line(line.as_ref())?;
        }
        Ok(())
    }

    pub fn lines(&self) -> u64 {
        self.lines
    }

    /// 刷新缓冲并释放目标
    pub fn finish(mut self) -> Result<(), ExportError> {
        self.writer.flush().map_err(ExportError::Write)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn destination_from_arg() {
        assert_eq!(Destination::from_arg(None), Destination::Console);
        assert_eq!(Destination::from_arg(Some("  ")), Destination::Console);
        assert_eq!(Destination::from_arg(Some("out.csv")), Destination::File(PathBuf::from("out.csv")));
        assert_eq!(Destination::Console.name(), "");
        assert_eq!(Destination::from_arg(Some("a/b.htm")).name(), "a/b.htm");
    }

    #[test]
    fn writes_lines_in_order() {
        let mut buf = Vec::new();
        let mut sink = ExportSink::new(&mut buf);
        sink.write_line("first").unwrap();
        sink.write_lines(["second", "third"]).unwrap();
        assert_eq!(sink.lines(), 3);
        sink.finish().unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "first\nsecond\nthird\n");
    }

    #[test]
    fn file_is_truncated_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        fs::write(&path, "stale content that is longer\n").unwrap();

        let mut sink = ExportSink::open(&Destination::File(path.clone())).unwrap();
        sink.write_line("fresh").unwrap();
        sink.finish().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "fresh\n");
    }

    #[test]
    fn create_failure_is_reported_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.csv");

        let err = match ExportSink::open(&Destination::File(path.clone())) {
            Err(err) => err,
            Ok(_) => panic!("expected create failure"),
        };
        match err {
            ExportError::Create { path: failed, .. } => assert_eq!(failed, path),
            other => panic!("unexpected error: {}", other),
        }
    }
}
