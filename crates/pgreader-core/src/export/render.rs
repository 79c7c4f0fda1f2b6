use crate::{FieldValue, RawField, ResultColumn, ResultRow};

use super::{ExportMode, WarningLog, format_field};

const MISSING: RawField = Ok(FieldValue::Null);

/// 按导出模式拼装表头、数据行以及 HTML 外层标签
pub struct TableRenderer<'a> {
    mode: &'a ExportMode,
    columns: &'a [ResultColumn],
}

impl<'a> TableRenderer<'a> {
    pub fn new(
        mode: &'a ExportMode,
        columns: &'a [ResultColumn],
    ) -> Self {
        Self { mode, columns }
    }

    /// 数据行之前的所有行：标题、表格起始标签、表头、tbody 起始标签
    pub fn opening_lines(&self) -> Vec<String> {
        let mut lines = vec![];
        if let Some(banner) = &self.mode.banner {
            lines.push(banner.line());
        }
        if let Some(tags) = &self.mode.markup {
            lines.push(tags.table.open.to_string());
        }
        lines.push(self.header_line());
        if let Some(tags) = &self.mode.markup {
            lines.push(tags.body.open.to_string());
        }
        lines
    }

    pub fn header_line(&self) -> String {
        let names = self.columns.iter().map(|c| c.name.as_str());
        match &self.mode.markup {
            Some(tags) => {
                let cells = names.map(|name| tags.header_cell.wrap(name)).collect::<Vec<_>>();
                tags.head.wrap(&tags.row.wrap(&cells.join(self.mode.delimiter)))
            }
            None => names.collect::<Vec<_>>().join(self.mode.delimiter),
        }
    }

    /// 单元格数量总是等于列数；行内缺失的字段按空值输出
    pub fn row_line(
        &self,
        row: &ResultRow,
        warnings: &mut WarningLog,
    ) -> String {
        let cells = self
            .columns
            .iter()
            .enumerate()
            .map(|(idx, column)| {
                let text = format_field(column, row.get(idx).unwrap_or(&MISSING), self.mode, warnings);
                match &self.mode.markup {
                    Some(tags) => tags.data_cell.wrap(&text),
                    None => text,
                }
            })
            .collect::<Vec<_>>()
            .join(self.mode.delimiter);

        match &self.mode.markup {
            Some(tags) => tags.row.wrap(&cells),
            None => cells,
        }
    }

    pub fn closing_lines(&self) -> Vec<String> {
        match &self.mode.markup {
            Some(tags) => vec![tags.body.close.to_string(), tags.table.close.to_string()],
            None => vec![],
        }
    }
}
