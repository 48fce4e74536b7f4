// ==========================================
// 库存计划后端 - 字段映射器
// ==========================================
// 职责: RawRecord → ValidatedItem（按实体 schema 做必填与类型转换）
// 说明: 编码字段此处只做 TRIM，规范化在管道后续阶段统一执行
// ==========================================

use crate::domain::entity::{EntitySpec, FieldSpec, FieldType};
use crate::domain::types::{FieldValue, RawRecord, ValidatedItem};
use crate::importer::error::{ImportError, ImporterResult};
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

pub struct FieldMapper;

impl FieldMapper {
    /// 将原始行记录映射为强类型条目
    ///
    /// # 返回
    /// - Ok(ValidatedItem): 全部字段通过
    /// - Err(Vec<String>): 该条目的全部失败原因（不含条目标识）
    pub fn map_record(
        &self,
        spec: &EntitySpec,
        record: &RawRecord,
        row: usize,
    ) -> Result<ValidatedItem, Vec<String>> {
        let mut values = BTreeMap::new();
        let mut messages = Vec::new();

        for field in spec.fields {
            let raw = raw_value(record, field.name)
                .or_else(|| field.default_from.and_then(|from| raw_value(record, from)));

            match raw {
                None if field.required => {
                    messages.push(format!("\"{}\" is required", field.name));
                }
                None => {
                    values.insert(field.name, FieldValue::Null);
                }
                Some(raw) => match convert(field, raw) {
                    Ok(value) => {
                        values.insert(field.name, value);
                    }
                    Err(message) => messages.push(message),
                },
            }
        }

        if messages.is_empty() {
            Ok(ValidatedItem { row, values })
        } else {
            Err(messages)
        }
    }
}

/// 取非空（TRIM 后）的原始值
fn raw_value<'a>(record: &'a RawRecord, field: &str) -> Option<&'a str> {
    record
        .get(field)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

fn convert(field: &FieldSpec, raw: &str) -> Result<FieldValue, String> {
    match field.field_type {
        FieldType::Code | FieldType::Reference(_) | FieldType::Text => {
            Ok(FieldValue::Text(raw.to_string()))
        }
        FieldType::Integer { min } => {
            let value = raw.parse::<i64>().map_err(|_| {
                format!("\"{}\" must be an integer, got \"{}\"", field.name, raw)
            })?;
            if let Some(min) = min {
                if value < min {
                    return Err(format!("\"{}\" must be at least {}, got {}", field.name, min, value));
                }
            }
            Ok(FieldValue::Integer(value))
        }
        FieldType::Decimal { min } => {
            let value = parse_decimal(raw)
                .ok_or_else(|| format!("\"{}\" must be a number, got \"{}\"", field.name, raw))?;
            if let Some(min) = min {
                if value < min {
                    return Err(format!("\"{}\" must be at least {}, got {}", field.name, min, value));
                }
            }
            Ok(FieldValue::Decimal(value))
        }
        FieldType::Period => parse_period(raw).map(FieldValue::Text).ok_or_else(|| {
            format!(
                "\"{}\" must be a month in YYYY-MM format, got \"{}\"",
                field.name, raw
            )
        }),
        FieldType::Month => match raw.parse::<i64>() {
            Ok(month) if (1..=12).contains(&month) => Ok(FieldValue::Integer(month)),
            _ => Err(format!(
                "\"{}\" must be a month number between 1 and 12, got \"{}\"",
                field.name, raw
            )),
        },
    }
}

/// 小数解析（兼容逗号小数点，拒绝 NaN / 无穷）
fn parse_decimal(raw: &str) -> Option<f64> {
    raw.replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// 期间解析：YYYY-MM，或 YYYY-MM-DD 截断到月
fn parse_period(raw: &str) -> Option<String> {
    let date = NaiveDate::parse_from_str(&format!("{}-01", raw), "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .ok()?;
    Some(date.format("%Y-%m").to_string())
}

// ==========================================
// JSON 输入 → RawRecord
// ==========================================

/// 将 JSON 请求体转为原始记录序列
///
/// # 返回
/// - Err(SchemaParse): 请求体不是数组（致命）
/// - Ok(vec): 每个元素各自成功或失败（非对象元素为单条错误）
pub fn json_to_raw_records(payload: &Value) -> ImporterResult<Vec<Result<RawRecord, String>>> {
    let items = payload.as_array().ok_or_else(|| {
        ImportError::SchemaParse("Import payload must be a JSON array of objects".to_string())
    })?;

    Ok(items
        .iter()
        .map(|item| match item.as_object() {
            Some(object) => Ok(object
                .iter()
                .filter_map(|(key, value)| json_scalar(value).map(|v| (key.clone(), v)))
                .collect::<HashMap<_, _>>()),
            None => Err("item is not a JSON object".to_string()),
        })
        .collect())
}

/// 标量转字符串；null 视为缺失；嵌套结构按 JSON 文本保留
fn json_scalar(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}
