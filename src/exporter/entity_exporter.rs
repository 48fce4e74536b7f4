// ==========================================
// 库存计划后端 - 实体导出器
// ==========================================
// 职责: 读取作用域内全部行 → 外键回填为编码 → 按自然键稳定排序 → CSV / JSON
// ==========================================

use crate::config::ImportSettings;
use crate::domain::entity::{ColumnSource, EntityKind};
use crate::domain::types::{FieldValue, RawRecord, ShopScope};
use crate::exporter::formatter::{format_csv, format_json};
use crate::importer::error::{ImportError, ImporterResult};
use crate::repository::entity_repo::EntityStore;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, instrument};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(format!("Unknown export format: {}", other)),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Csv => write!(f, "csv"),
            ExportFormat::Json => write!(f, "json"),
        }
    }
}

// ==========================================
// EntityExporter
// ==========================================
pub struct EntityExporter {
    store: Arc<dyn EntityStore>,
    csv_delimiter: u8,
}

impl EntityExporter {
    pub fn new(store: Arc<dyn EntityStore>, settings: ImportSettings) -> Self {
        Self {
            store,
            csv_delimiter: settings.export_csv_delimiter,
        }
    }

    /// 导出为文本
    #[instrument(skip_all, fields(entity = %kind, scope = %scope, format = %format))]
    pub async fn export(
        &self,
        kind: EntityKind,
        scope: ShopScope,
        format: ExportFormat,
    ) -> ImporterResult<String> {
        let fields = kind.spec().export_fields();
        let rows = self.export_rows(kind, scope).await?;
        info!(rows = rows.len(), %format, "导出完成");

        match format {
            ExportFormat::Json => format_json(&fields, &rows),
            ExportFormat::Csv => {
                let records: Vec<RawRecord> = rows
                    .iter()
                    .map(|row| {
                        fields
                            .iter()
                            .zip(row.iter())
                            .map(|(field, value)| (field.to_string(), value.to_plain_string()))
                            .collect()
                    })
                    .collect();
                format_csv(&fields, &records, self.csv_delimiter)
            }
        }
    }

    /// 导出行（值对齐 EntitySpec::export_fields，外键已回填为编码，已排序）
    pub async fn export_rows(
        &self,
        kind: EntityKind,
        scope: ShopScope,
    ) -> ImporterResult<Vec<Vec<FieldValue>>> {
        let spec = kind.spec();
        let rows = self
            .store
            .select_rows(kind, scope)
            .await
            .map_err(|e| ImportError::from_repository(e, kind.plural()))?;

        // 外键列: 列下标 → (id → 编码)
        let mut lookups: HashMap<usize, HashMap<i64, String>> = HashMap::new();
        for (idx, column) in spec.columns.iter().enumerate() {
            let ColumnSource::Reference { target, .. } = column.source else {
                continue;
            };
            let mut ids: Vec<i64> = rows
                .iter()
                .filter_map(|row| row.values.get(idx).and_then(FieldValue::as_integer))
                .collect();
            ids.sort_unstable();
            ids.dedup();

            let codes = self
                .store
                .codes_by_ids(target, scope, &ids)
                .await
                .map_err(|e| ImportError::from_repository(e, target.plural()))?;
            lookups.insert(idx, codes);
        }

        let mut joined: Vec<(i64, Vec<FieldValue>)> = rows
            .into_iter()
            .map(|row| {
                let values = row
                    .values
                    .into_iter()
                    .enumerate()
                    .map(|(idx, value)| match (lookups.get(&idx), value.as_integer()) {
                        (Some(codes), Some(id)) => codes
                            .get(&id)
                            .map(|code| FieldValue::Text(code.clone()))
                            .unwrap_or(FieldValue::Null),
                        (Some(_), None) => FieldValue::Null,
                        (None, _) => value,
                    })
                    .collect();
                (row.id.unwrap_or_default(), values)
            })
            .collect();

        let key_indexes: Vec<usize> = spec
            .natural_key
            .iter()
            .filter_map(|column| spec.column_index(column))
            .collect();

        joined.sort_by(|(id_a, a), (id_b, b)| {
            key_indexes
                .iter()
                .map(|&i| compare_values(&a[i], &b[i]))
                .find(|ord| *ord != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
                .then(id_a.cmp(id_b))
        });

        Ok(joined.into_iter().map(|(_, values)| values).collect())
    }
}

/// 排序比较：Null 最小，数值按数值，文本按字典序，数值排在文本之前
fn compare_values(a: &FieldValue, b: &FieldValue) -> Ordering {
    fn rank(v: &FieldValue) -> u8 {
        match v {
            FieldValue::Null => 0,
            FieldValue::Integer(_) | FieldValue::Decimal(_) => 1,
            FieldValue::Text(_) => 2,
        }
    }

    match (a, b) {
        (FieldValue::Integer(x), FieldValue::Integer(y)) => x.cmp(y),
        (FieldValue::Text(x), FieldValue::Text(y)) => x.cmp(y),
        (FieldValue::Integer(_) | FieldValue::Decimal(_), FieldValue::Integer(_) | FieldValue::Decimal(_)) => {
            let x = numeric(a);
            let y = numeric(b);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        _ => rank(a).cmp(&rank(b)),
    }
}

fn numeric(v: &FieldValue) -> f64 {
    match v {
        FieldValue::Integer(i) => *i as f64,
        FieldValue::Decimal(d) => *d,
        _ => 0.0,
    }
}
