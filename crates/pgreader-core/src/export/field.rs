use chrono::{NaiveDateTime, Timelike};

use crate::{FieldValue, RawField, ResultColumn, TypeTag};

use super::{ExportMode, FormattingWarning, WarningLog};

/// 不支持类型的单元格占位符
pub const UNSUPPORTED_MARKER: &str = "***";

const EMPTY_QUOTED: &str = "\"\"";

/// 把一个字段转换为单元格文本。
///
/// 失败不会中断导出：不支持的类型输出 [`UNSUPPORTED_MARKER`]，转换错误输出空单元格，
/// 两者都记录到 `warnings`。
pub fn format_field(
    column: &ResultColumn,
    raw: &RawField,
    mode: &ExportMode,
    warnings: &mut WarningLog,
) -> String {
    if let TypeTag::Unsupported(type_name) = &column.tag {
        warnings.record(FormattingWarning::unsupported(&column.name, type_name));
        return UNSUPPORTED_MARKER.to_string();
    }

    let value = match raw {
        Ok(FieldValue::Null) => return String::new(),
        Ok(value) => value,
        Err(err) => {
            warnings.record(FormattingWarning::conversion(&column.name, err));
            return String::new();
        }
    };

    match render_value(&column.tag, value, mode) {
        // 只折叠空的带引号文本；字面量 null 原样保留
        Ok(text) if text == EMPTY_QUOTED => String::new(),
        Ok(text) => text,
        Err(err) => {
            warnings.record(FormattingWarning::conversion(&column.name, &err));
            String::new()
        }
    }
}

fn render_value(
    tag: &TypeTag,
    value: &FieldValue,
    mode: &ExportMode,
) -> Result<String, String> {
    match (tag, value) {
        (TypeTag::Timestamp, FieldValue::Timestamp(ts)) => Ok(format_timestamp(ts)),
        (TypeTag::Integer, FieldValue::Integer(v)) => Ok(v.to_string()),
        (TypeTag::Decimal, FieldValue::Decimal(v)) => Ok(v.clone()),
        (TypeTag::Decimal, FieldValue::Integer(v)) => Ok(v.to_string()),
        (TypeTag::FloatingPoint, FieldValue::Single(v)) => Ok(v.to_string()),
        (TypeTag::FloatingPoint, FieldValue::Double(v)) => Ok(v.to_string()),
        // CSV 文本加双引号，但不转义内部的引号和逗号
        (TypeTag::Text, FieldValue::Text(s)) if mode.is_csv() => Ok(format!("\"{}\"", s)),
        (TypeTag::Text, FieldValue::Text(s)) => Ok(s.clone()),
        (tag, value) => Err(format!("无法将 {} 值按 {} 输出", value.kind(), tag.label())),
    }
}

/// `YYYY-MM-DD HH:MM:SS`，零点只输出日期
fn format_timestamp(ts: &NaiveDateTime) -> String {
    if ts.hour() == 0 && ts.minute() == 0 && ts.second() == 0 {
        ts.format("%Y-%m-%d").to_string()
    } else {
        ts.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn ts(
        ymd: (i32, u32, u32),
        hms: (u32, u32, u32),
    ) -> FieldValue {
        let date = NaiveDate::from_ymd_opt(ymd.0, ymd.1, ymd.2).unwrap();
        FieldValue::Timestamp(date.and_hms_opt(hms.0, hms.1, hms.2).unwrap())
    }

    fn cell(
        tag: TypeTag,
        raw: RawField,
        mode: &ExportMode,
    ) -> (String, WarningLog) {
        let mut warnings = WarningLog::new();
        let column = ResultColumn::new("col", tag);
        let text = format_field(&column, &raw, mode, &mut warnings);
        (text, warnings)
    }

    #[test]
    fn timestamps_drop_midnight() {
        let plain = ExportMode::plain();
        assert_eq!(cell(TypeTag::Timestamp, Ok(ts((2023, 1, 5), (0, 0, 0))), &plain).0, "2023-01-05");
        assert_eq!(
            cell(TypeTag::Timestamp, Ok(ts((2023, 1, 5), (14, 3, 9))), &plain).0,
            "2023-01-05 14:03:09"
        );
        assert_eq!(
            cell(TypeTag::Timestamp, Ok(ts((2023, 1, 5), (0, 0, 1))), &plain).0,
            "2023-01-05 00:00:01"
        );
    }

    #[test]
    fn numbers_use_natural_text() {
        let plain = ExportMode::plain();
        assert_eq!(cell(TypeTag::Integer, Ok(FieldValue::Integer(-42)), &plain).0, "-42");
        assert_eq!(cell(TypeTag::Integer, Ok(FieldValue::Integer(1234567)), &plain).0, "1234567");
        assert_eq!(cell(TypeTag::Decimal, Ok(FieldValue::Decimal("10.50".into())), &plain).0, "10.50");
        assert_eq!(cell(TypeTag::FloatingPoint, Ok(FieldValue::Double(2.5)), &plain).0, "2.5");
        assert_eq!(cell(TypeTag::FloatingPoint, Ok(FieldValue::Double(3.0)), &plain).0, "3");
        assert_eq!(cell(TypeTag::FloatingPoint, Ok(FieldValue::Single(0.1)), &plain).0, "0.1");
    }

    #[test]
    fn numbers_are_never_quoted_in_csv() {
        let csv = ExportMode::csv();
        assert_eq!(cell(TypeTag::Integer, Ok(FieldValue::Integer(7)), &csv).0, "7");
    }

    #[test]
    fn text_quoted_only_in_csv() {
        let text = || Ok(FieldValue::Text("Acme, Inc".into()));
        assert_eq!(cell(TypeTag::Text, text(), &ExportMode::plain()).0, "Acme, Inc");
        assert_eq!(cell(TypeTag::Text, text(), &ExportMode::csv()).0, "\"Acme, Inc\"");
        assert_eq!(cell(TypeTag::Text, text(), &ExportMode::html(None)).0, "Acme, Inc");
    }

    #[test]
    fn csv_does_not_escape_embedded_quotes() {
        let raw = Ok(FieldValue::Text("say \"hi\"".into()));
        assert_eq!(cell(TypeTag::Text, raw, &ExportMode::csv()).0, "\"say \"hi\"\"");
    }

    #[test]
    fn null_and_empty_quoted_collapse() {
        let csv = ExportMode::csv();
        for tag in [
            TypeTag::Integer,
            TypeTag::Decimal,
            TypeTag::FloatingPoint,
            TypeTag::Timestamp,
            TypeTag::Text,
        ] {
            let (text, warnings) = cell(tag, Ok(FieldValue::Null), &csv);
            assert_eq!(text, "");
            assert!(warnings.is_empty());
        }
        assert_eq!(cell(TypeTag::Text, Ok(FieldValue::Text(String::new())), &csv).0, "");
        assert_eq!(cell(TypeTag::Text, Ok(FieldValue::Text("null".into())), &csv).0, "\"null\"");
    }

    #[test]
    fn unsupported_type_renders_marker_and_warns() {
        let (text, warnings) = cell(TypeTag::Unsupported("bool".into()), Ok(FieldValue::Null), &ExportMode::plain());
        assert_eq!(text, UNSUPPORTED_MARKER);
        assert_eq!(warnings.summary(), "col: Unsupported type bool");
    }

    #[test]
    fn conversion_errors_render_empty_and_warn() {
        let plain = ExportMode::plain();
        let (text, warnings) = cell(TypeTag::Integer, Err("out of range".into()), &plain);
        assert_eq!(text, "");
        assert_eq!(warnings.summary(), "col:out of range");

        let (text, warnings) = cell(TypeTag::Integer, Ok(FieldValue::Text("x".into())), &plain);
        assert_eq!(text, "");
        assert_eq!(warnings.len(), 1);
        assert!(warnings.summary().starts_with("col:"));
    }

    #[test]
    fn repeated_warnings_are_deduplicated() {
        let mut warnings = WarningLog::new();
        let column = ResultColumn::new("payload", TypeTag::Unsupported("jsonb".into()));
        for _ in 0..50 {
            format_field(&column, &Ok(FieldValue::Null), &ExportMode::plain(), &mut warnings);
        }
        assert_eq!(warnings.len(), 1);
    }
}
