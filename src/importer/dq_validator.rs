// ==========================================
// 库存计划后端 - 导入数据质量校验器
// ==========================================
// 职责: 逐条校验原始记录，失败条目收集错误并剔除，其余继续
// 错误格式: "<自然键>": msg; msg  或  Row <n>: msg; msg
// ==========================================

use crate::domain::entity::EntitySpec;
use crate::domain::types::{RawRecord, ValidatedItem};
use crate::importer::field_mapper::FieldMapper;
use tracing::debug;

pub struct DqValidator {
    mapper: FieldMapper,
}

impl DqValidator {
    pub fn new() -> Self {
        Self {
            mapper: FieldMapper,
        }
    }

    /// 批量校验
    ///
    /// # 参数
    /// - records: 原始记录（JSON 中的非对象元素以 Err 形式传入）
    /// - spec: 目标实体配置
    /// - first_row: 第一条记录的行号（JSON 为 1，CSV 为 2）
    ///
    /// # 返回
    /// (通过的条目, 每个失败条目一条错误)
    pub fn validate_records(
        &self,
        records: Vec<Result<RawRecord, String>>,
        spec: &EntitySpec,
        first_row: usize,
    ) -> (Vec<ValidatedItem>, Vec<String>) {
        let mut valid = Vec::with_capacity(records.len());
        let mut errors = Vec::new();

        for (offset, record) in records.into_iter().enumerate() {
            let row = first_row + offset;
            let outcome = match &record {
                Ok(raw) => self
                    .mapper
                    .map_record(spec, raw, row)
                    .map_err(|messages| (item_label(spec, raw, row), messages)),
                Err(message) => Err((format!("Row {}", row), vec![message.clone()])),
            };

            match outcome {
                Ok(item) => valid.push(item),
                Err((label, messages)) => {
                    errors.push(format!("{}: {}", label, messages.join("; ")));
                }
            }
        }

        debug!(
            entity = %spec.kind,
            valid = valid.len(),
            rejected = errors.len(),
            "条目校验完成"
        );
        (valid, errors)
    }
}

impl Default for DqValidator {
    fn default() -> Self {
        Self::new()
    }
}

/// 条目标识：优先使用已给出的自然键字段，否则使用行号
fn item_label(spec: &EntitySpec, raw: &RawRecord, row: usize) -> String {
    let present: Vec<&str> = spec
        .key_fields
        .iter()
        .filter_map(|f| raw.get(*f).map(|v| v.trim()).filter(|v| !v.is_empty()))
        .collect();

    if present.is_empty() {
        format!("Row {}", row)
    } else {
        format!("\"{}\"", present.join(" / "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::EntityKind;

    fn record(pairs: &[(&str, &str)]) -> Result<RawRecord, String> {
        Ok(pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect())
    }

    #[test]
    fn test_invalid_items_are_excluded_and_reported() {
        let spec = EntityKind::Sku.spec();
        let records = vec![
            record(&[("code", "A"), ("purchase_price", "12.5")]),
            record(&[("code", "B"), ("purchase_price", "cheap")]),
            record(&[("title", "no code")]),
            record(&[("code", "C")]),
        ];

        let (valid, errors) = DqValidator::new().validate_records(records, spec, 1);

        assert_eq!(valid.len(), 2);
        assert_eq!(valid[0].row, 1);
        assert_eq!(valid[1].row, 4);
        assert_eq!(
            errors,
            vec![
                r#""B": "purchase_price" must be a number, got "cheap""#.to_string(),
                r#"Row 3: "code" is required"#.to_string(),
            ]
        );
    }

    #[test]
    fn test_composite_key_label_and_joined_messages() {
        let spec = EntityKind::SalesHistory.spec();
        let records = vec![record(&[
            ("sku", "NEW-1"),
            ("marketplace", "wb"),
            ("period", "May"),
            ("quantity", "x"),
        ])];

        let (valid, errors) = DqValidator::new().validate_records(records, spec, 2);

        assert!(valid.is_empty());
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with(r#""NEW-1 / wb / May": "period""#), "{}", errors[0]);
        assert!(errors[0].contains("; \"quantity\" must be an integer"));
    }

    #[test]
    fn test_non_object_items_use_row_label() {
        let spec = EntityKind::Brand.spec();
        let records = vec![Err("item is not a JSON object".to_string()), record(&[("code", "A")])];

        let (valid, errors) = DqValidator::new().validate_records(records, spec, 1);

        assert_eq!(valid.len(), 1);
        assert_eq!(errors, vec!["Row 1: item is not a JSON object".to_string()]);
    }
}
