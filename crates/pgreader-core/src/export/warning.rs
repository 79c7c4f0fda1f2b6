use std::fmt;

use indexmap::IndexMap;

/// 单个字段的格式化问题，不中断导出
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormattingWarning {
    pub field: String,
    pub message: String,
}

impl FormattingWarning {
    pub fn unsupported(
        field: &str,
        type_name: &str,
    ) -> Self {
        Self {
            field: field.to_string(),
            message: format!("{}: Unsupported type {}", field, type_name),
        }
    }

    pub fn conversion(
        field: &str,
        error: &str,
    ) -> Self {
        Self {
            field: field.to_string(),
            message: format!("{}:{}", field, error),
        }
    }
}

impl fmt::Display for FormattingWarning {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// 单次导出收集到的警告，按消息文本去重并保持首次出现的顺序
#[derive(Clone, Debug, Default)]
pub struct WarningLog {
    entries: IndexMap<String, FormattingWarning>,
}

impl WarningLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录警告；同一消息已存在时返回 false
    pub fn record(
        &mut self,
        warning: FormattingWarning,
    ) -> bool {
        if self.entries.contains_key(&warning.message) {
            return false;
        }
        tracing::debug!("字段警告: {}", warning);
        self.entries.insert(warning.message.clone(), warning);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FormattingWarning> {
        self.entries.values()
    }

    /// 逗号连接的汇总，用于导出结束时写日志
    pub fn summary(&self) -> String {
        self.entries.keys().map(String::as_str).collect::<Vec<_>>().join(", ")
    }
}
