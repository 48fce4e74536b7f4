// ==========================================
// 库存计划后端 - 导出格式化
// ==========================================
// CSV: 仅在值含分隔符/引号/换行时加引号，内部引号加倍，行尾 '\n'
// JSON: 对象数组，数值保持数值，缺失值为 null
// ==========================================

use crate::domain::types::{FieldValue, RawRecord};
use crate::importer::error::{ImportError, ImporterResult};
use csv::{QuoteStyle, Terminator, WriterBuilder};
use serde_json::{Map, Value};

/// 记录集 → CSV 文本（首行为表头）
///
/// # 参数
/// - columns: 列顺序
/// - records: 记录（缺失的列输出为空）
/// - delimiter: 分隔符
pub fn format_csv(columns: &[&str], records: &[RawRecord], delimiter: u8) -> ImporterResult<String> {
    let mut writer = WriterBuilder::new()
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Necessary)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(columns)?;
    for record in records {
        writer.write_record(
            columns
                .iter()
                .map(|column| record.get(*column).map(String::as_str).unwrap_or("")),
        )?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ImportError::Csv(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| ImportError::Csv(e.to_string()))
}

/// 行集 → JSON 数组文本
///
/// rows 中每行的值与 columns 一一对应。
pub fn format_json(columns: &[&str], rows: &[Vec<FieldValue>]) -> ImporterResult<String> {
    let items: Vec<Value> = rows
        .iter()
        .map(|row| {
            let object: Map<String, Value> = columns
                .iter()
                .zip(row.iter())
                .map(|(column, value)| (column.to_string(), value.to_json()))
                .collect();
            Value::Object(object)
        })
        .collect();

    Ok(serde_json::to_string_pretty(&Value::Array(items))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::file_parser::parse_csv;
    use proptest::prelude::*;

    fn record(pairs: &[(&str, &str)]) -> RawRecord {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_csv_quotes_only_when_needed() {
        let records = vec![
            record(&[("code", "A"), ("title", "Plain")]),
            record(&[("code", "B"), ("title", "Comma, inside")]),
            record(&[("code", "C"), ("title", "Say \"hi\"")]),
            record(&[("code", "D"), ("title", "two\nlines")]),
            record(&[("code", "E")]),
        ];

        let csv = format_csv(&["code", "title"], &records, b',').unwrap();
        assert_eq!(
            csv,
            "code,title\nA,Plain\nB,\"Comma, inside\"\nC,\"Say \"\"hi\"\"\"\nD,\"two\nlines\"\nE,\n"
        );
    }

    #[test]
    fn test_csv_with_semicolon_delimiter() {
        let records = vec![record(&[("code", "A"), ("title", "x;y, z")])];
        let csv = format_csv(&["code", "title"], &records, b';').unwrap();
        assert_eq!(csv, "code;title\nA;\"x;y, z\"\n");
    }

    #[test]
    fn test_csv_output_parses_back_with_special_values() {
        let records = vec![
            record(&[("code", "A"), ("title", "Comma, inside")]),
            record(&[("code", "B"), ("title", "Say \"hi\"\nagain")]),
        ];
        let csv = format_csv(&["code", "title"], &records, b',').unwrap();
        assert_eq!(parse_csv(&csv, &["code"]).unwrap(), records);
    }

    #[test]
    fn test_json_keeps_numbers_and_nulls() {
        let json = format_json(
            &["code", "quantity", "price", "note"],
            &[vec![
                FieldValue::from("A"),
                FieldValue::Integer(3),
                FieldValue::Decimal(1.5),
                FieldValue::Null,
            ]],
        )
        .unwrap();

        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(
            value,
            serde_json::json!([{"code": "A", "quantity": 3, "price": 1.5, "note": null}])
        );
    }

    proptest! {
        #[test]
        fn prop_csv_round_trip(
            rows in prop::collection::vec(
                ("[A-Za-z0-9_.-]{1,8}", "[A-Za-z0-9_.-]{1,8}", "[A-Za-z0-9_.-]{1,8}"),
                1..20,
            )
        ) {
            let records: Vec<RawRecord> = rows
                .iter()
                .map(|(code, title, article)| {
                    record(&[
                        ("code", code.as_str()),
                        ("title", title.as_str()),
                        ("article", article.as_str()),
                    ])
                })
                .collect();

            let csv = format_csv(&["code", "title", "article"], &records, b',').unwrap();
            prop_assert_eq!(parse_csv(&csv, &["code"]).unwrap(), records);
        }
    }
}
