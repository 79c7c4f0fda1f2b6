//! 根据输出目标名称确定导出格式。
//!
//! 扩展名与文件名前缀的识别只在这里进行，后续流程只使用解析出的 [`ExportMode`]。

pub const TAB: &str = "\t";
pub const COMMA: &str = ",";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Plain,
    Csv,
    Html,
}

/// 成对的开闭标签
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TagPair {
    pub open: &'static str,
    pub close: &'static str,
}

impl TagPair {
    const fn new(
        open: &'static str,
        close: &'static str,
    ) -> Self {
        Self { open, close }
    }

    pub fn wrap(
        &self,
        inner: &str,
    ) -> String {
        format!("{}{}{}", self.open, inner, self.close)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HtmlTags {
    pub table: TagPair,
    pub head: TagPair,
    pub body: TagPair,
    pub row: TagPair,
    pub header_cell: TagPair,
    pub data_cell: TagPair,
}

impl HtmlTags {
    pub const TABLE: HtmlTags = HtmlTags {
        table: TagPair::new("<table border=1>", "</table>"),
        head: TagPair::new("<thead>", "</thead>"),
        body: TagPair::new("<tbody>", "</tbody>"),
        row: TagPair::new("<tr>", "</tr>"),
        header_cell: TagPair::new("<th>", "</th>"),
        data_cell: TagPair::new("<td>", "</td>"),
    };
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BannerLevel {
    H1,
    H2,
    H3,
    H4,
    H5,
}

impl BannerLevel {
    pub fn tag(&self) -> &'static str {
        match self {
            BannerLevel::H1 => "h1",
            BannerLevel::H2 => "h2",
            BannerLevel::H3 => "h3",
            BannerLevel::H4 => "h4",
            BannerLevel::H5 => "h5",
        }
    }

    fn from_digit(digit: u8) -> Option<Self> {
        match digit {
            b'1' => Some(BannerLevel::H1),
            b'2' => Some(BannerLevel::H2),
            b'3' => Some(BannerLevel::H3),
            b'4' => Some(BannerLevel::H4),
            b'5' => Some(BannerLevel::H5),
            _ => None,
        }
    }
}

/// HTML 表格上方的标题
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Banner {
    pub title: String,
    pub level: BannerLevel,
}

impl Banner {
    pub fn line(&self) -> String {
        let tag = self.level.tag();
        format!("<div><{tag}>{}</{tag}></div>", self.title)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportMode {
    pub format: OutputFormat,
    pub delimiter: &'static str,
    pub markup: Option<HtmlTags>,
    pub banner: Option<Banner>,
}

impl ExportMode {
    pub fn plain() -> Self {
        Self {
            format: OutputFormat::Plain,
            delimiter: TAB,
            markup: None,
            banner: None,
        }
    }

    pub fn csv() -> Self {
        Self {
            format: OutputFormat::Csv,
            delimiter: COMMA,
            markup: None,
            banner: None,
        }
    }

    pub fn html(banner: Option<Banner>) -> Self {
        Self {
            format: OutputFormat::Html,
            delimiter: "",
            markup: Some(HtmlTags::TABLE),
            banner,
        }
    }

    /// 由目标名称解析导出模式；空名称表示控制台。不做 I/O，不会失败
    pub fn resolve(destination: &str) -> Self {
        if destination.is_empty() {
            return Self::plain();
        }

        // 同时包含 .csv 与 .htm 时按 HTML 输出
        let lower = destination.to_ascii_lowercase();
        if lower.contains(".htm") {
            Self::html(resolve_banner(file_name(destination)))
        } else if lower.contains(".csv") {
            Self::csv()
        } else {
            Self::plain()
        }
    }

    pub fn is_csv(&self) -> bool {
        self.format == OutputFormat::Csv
    }
}

/// 路径最后一段；同时识别 `/` 与 `\` 分隔符
fn file_name(destination: &str) -> &str {
    destination.rsplit(['/', '\\']).next().unwrap_or(destination)
}

/// `H_标题.html` 使用 h2，`H1_` 至 `H5_` 指定标题级别
fn resolve_banner(name: &str) -> Option<Banner> {
    let (level, rest) = if let Some(rest) = name.strip_prefix("H_") {
        (BannerLevel::H2, rest)
    } else {
        let bytes = name.as_bytes();
        if bytes.len() < 3 || bytes[0] != b'H' || bytes[2] != b'_' {
            return None;
        }
        (BannerLevel::from_digit(bytes[1])?, &name[3..])
    };

    Some(Banner {
        title: strip_html_extension(rest).replace('_', " "),
        level,
    })
}

fn strip_html_extension(name: &str) -> &str {
    let lower = name.to_ascii_lowercase();
    for ext in [".html", ".htm"] {
        if lower.ends_with(ext) {
            return &name[..name.len() - ext.len()];
        }
    }
    name
}
