// ==========================================
// 库存计划后端 - 分隔符自适应 CSV 解析器
// ==========================================
// 职责: 原始文本 → 有序 RawRecord 序列（一次性，非流式）
// 方言: 表头含 ';' 用分号，否则逗号；RFC4180 引号；可选 UTF-8 BOM
// 行号: 表头为第 1 行，第一条数据为第 2 行
// ==========================================

use crate::domain::types::RawRecord;
use crate::importer::error::{ImportError, ImporterResult};
use csv::{ReaderBuilder, Trim};
use std::collections::HashMap;
use tracing::debug;

const UTF8_BOM: char = '\u{feff}';

/// 第一条数据行的行号
pub const FIRST_DATA_ROW: usize = 2;

// ==========================================
// CsvParser
// ==========================================
pub struct CsvParser;

impl CsvParser {
    /// 解析原始字节（必须是 UTF-8 文本）
    pub fn parse_bytes(&self, bytes: &[u8], required: &[&str]) -> ImporterResult<Vec<RawRecord>> {
        let text = std::str::from_utf8(bytes).map_err(|e| {
            ImportError::SchemaParse(format!("CSV input is not valid UTF-8 text: {}", e))
        })?;
        self.parse(text, required)
    }

    /// 解析 CSV 文本
    ///
    /// # 参数
    /// - text: CSV 文本（可带 BOM，LF / CRLF 皆可）
    /// - required: 必须出现在表头、且每行非空的列
    ///
    /// # 返回
    /// - Ok(Vec<RawRecord>): 行记录（值已 TRIM；缺失的尾部可选列不出现在记录中）
    /// - Err(SchemaParse): 空输入 / 表头缺列 / 必填值为空
    pub fn parse(&self, text: &str, required: &[&str]) -> ImporterResult<Vec<RawRecord>> {
        let text = text.strip_prefix(UTF8_BOM).unwrap_or(text);
        if text.trim().is_empty() {
            return Err(ImportError::SchemaParse("CSV input is empty".to_string()));
        }
        // 表头之前的空行（含仅空白的行）不计入表头
        let text = skip_leading_blank_lines(text);

        let delimiter = detect_delimiter(text);
        debug!(delimiter = %(delimiter as char), "CSV 分隔符判定完成");

        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true) // 允许行长度不一致（尾部可选列缺失）
            .trim(Trim::All)
            .from_reader(text.as_bytes());

        // 读取表头
        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        for column in required {
            if !headers.iter().any(|h| h == column) {
                return Err(ImportError::SchemaParse(format!(
                    "Column \"{}\" missing in header",
                    column
                )));
            }
        }

        // 读取所有行
        let mut records = Vec::new();
        let mut row_number = FIRST_DATA_ROW - 1;
        for result in reader.records() {
            let record = result?;

            // 仅含空白的行视为空行
            if record.len() <= 1 && record.iter().all(|v| v.is_empty()) {
                continue;
            }
            row_number += 1;

            let mut row_map: RawRecord = HashMap::with_capacity(headers.len());
            for (col_idx, value) in record.iter().enumerate() {
                if let Some(header) = headers.get(col_idx) {
                    row_map.insert(header.clone(), value.trim().to_string());
                }
            }

            for column in required {
                let present = row_map.get(*column).is_some_and(|v| !v.is_empty());
                if !present {
                    return Err(ImportError::SchemaParse(format!(
                        "Row {}: \"{}\" is required but empty or missing",
                        row_number, column
                    )));
                }
            }

            records.push(row_map);
        }

        debug!(rows = records.len(), columns = headers.len(), "CSV 解析完成");
        Ok(records)
    }
}

/// 解析 CSV 文本（无状态入口）
pub fn parse_csv(text: &str, required: &[&str]) -> ImporterResult<Vec<RawRecord>> {
    CsvParser.parse(text, required)
}

/// 解析 CSV 原始字节（无状态入口）
pub fn parse_csv_bytes(bytes: &[u8], required: &[&str]) -> ImporterResult<Vec<RawRecord>> {
    CsvParser.parse_bytes(bytes, required)
}

/// 去掉开头的空行与仅含空白的行
fn skip_leading_blank_lines(text: &str) -> &str {
    let mut rest = text;
    while let Some(pos) = rest.find('\n') {
        if !rest[..pos].trim().is_empty() {
            break;
        }
        rest = &rest[pos + 1..];
    }
    rest
}

/// 根据表头行判定分隔符：含分号即用分号，否则逗号
fn detect_delimiter(text: &str) -> u8 {
    let header_line = text
        .lines()
        .find(|line| !line.trim().is_empty())
        .unwrap_or_default();
    if header_line.contains(';') {
        b';'
    } else {
        b','
    }
}
