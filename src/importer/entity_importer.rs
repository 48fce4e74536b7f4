// ==========================================
// 库存计划后端 - 通用实体导入器
// ==========================================
// 流程: 解析 → 校验 → 规范化 → 批内查重 → 依赖解析 → 对账落库
// 红线: 解析错误与重复键错误必须在任何写入之前中止
// ==========================================

use crate::config::ImportSettings;
use crate::domain::entity::{ColumnSource, EntityKind, EntitySpec, FieldType};
use crate::domain::types::{
    DependencyMap, EntityRow, FieldValue, ImportResult, RawRecord, ShopScope, ValidatedItem,
};
use crate::importer::code_normalizer::normalize;
use crate::importer::conflict_handler::ConflictHandler;
use crate::importer::dependency_resolver::DependencyResolver;
use crate::importer::dq_validator::DqValidator;
use crate::importer::error::{ImportError, ImporterResult};
use crate::importer::field_mapper::json_to_raw_records;
use crate::importer::file_parser::{CsvParser, FIRST_DATA_ROW};
use crate::importer::upsert_reconciler::UpsertReconciler;
use crate::repository::entity_repo::EntityStore;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// 导入输入：CSV 原始字节或 JSON 数组，二选一
#[derive(Debug, Clone)]
pub enum ImportSource {
    Csv(Vec<u8>),
    Json(serde_json::Value),
}

// ==========================================
// EntityImporter
// ==========================================
pub struct EntityImporter {
    parser: CsvParser,
    validator: DqValidator,
    conflict_handler: ConflictHandler,
    resolver: DependencyResolver,
    reconciler: UpsertReconciler,
}

impl EntityImporter {
    pub fn new(store: Arc<dyn EntityStore>, settings: ImportSettings) -> Self {
        Self {
            parser: CsvParser,
            validator: DqValidator::new(),
            conflict_handler: ConflictHandler::new(settings.duplicate_report_limit),
            resolver: DependencyResolver::new(store.clone()),
            reconciler: UpsertReconciler::new(store),
        }
    }

    /// 导入一批记录
    ///
    /// # 返回
    /// - Ok(ImportResult): 成功条目计数 + 被剔除条目的错误
    /// - Err(SchemaParse / DuplicateKey): 未发生任何写入
    /// - Err(Conflict / Repository): 写入阶段失败
    #[instrument(
        skip_all,
        fields(import_id = %Uuid::new_v4(), entity = %kind, scope = %scope)
    )]
    pub async fn import(
        &self,
        kind: EntityKind,
        scope: ShopScope,
        source: ImportSource,
    ) -> ImporterResult<ImportResult> {
        let spec = kind.spec();

        // === 步骤 1: 解析 ===
        let (records, first_row) = self.read_source(spec, source)?;
        info!(records = records.len(), "开始导入");

        // === 步骤 2: 逐条校验 ===
        let (items, mut errors) = self.validator.validate_records(records, spec, first_row);

        // === 步骤 3: 规范化自然键与引用编码 ===
        let items: Vec<ValidatedItem> = items
            .into_iter()
            .filter_map(|item| match normalize_item(spec, item) {
                Ok(item) => Some(item),
                Err(message) => {
                    errors.push(message);
                    None
                }
            })
            .collect();

        // === 步骤 4: 批内查重（致命） ===
        self.conflict_handler
            .check(&items, |item| item_key(spec, item), spec.key_description)?;

        // === 步骤 5: 依赖解析 ===
        let mut dependencies_created = BTreeMap::new();
        let mut resolved: HashMap<&'static str, DependencyMap> = HashMap::new();
        for (field, target) in spec.references() {
            let codes: Vec<String> = items
                .iter()
                .filter_map(|item| item.text(field).map(str::to_string))
                .collect();
            let dependency = self.resolver.resolve(target, scope, &codes).await?;

            *dependencies_created
                .entry(target.created_counter_key())
                .or_insert(0) += dependency.created;
            resolved.insert(field, dependency.code_to_id);
        }

        // === 步骤 6: 组装落库行并对账 ===
        let rows = items
            .iter()
            .map(|item| build_row(spec, item, &resolved))
            .collect::<ImporterResult<Vec<_>>>()?;
        let outcome = self.reconciler.reconcile(kind, scope, &rows).await?;

        if !errors.is_empty() {
            warn!(rejected = errors.len(), "部分条目未通过校验");
        }
        info!(
            created = outcome.created,
            updated = outcome.updated,
            rejected = errors.len(),
            "导入完成"
        );

        Ok(ImportResult {
            created: outcome.created,
            updated: outcome.updated,
            errors,
            dependencies_created,
        })
    }

    fn read_source(
        &self,
        spec: &EntitySpec,
        source: ImportSource,
    ) -> ImporterResult<(Vec<Result<RawRecord, String>>, usize)> {
        match source {
            ImportSource::Csv(bytes) => {
                let records = self.parser.parse_bytes(&bytes, &spec.required_columns())?;
                Ok((records.into_iter().map(Ok).collect(), FIRST_DATA_ROW))
            }
            ImportSource::Json(payload) => Ok((json_to_raw_records(&payload)?, 1)),
        }
    }
}

/// 规范化条目中的编码字段（本实体编码按本实体约定，引用按目标约定）
///
/// 规范化后为空的编码视为该条目失败。
fn normalize_item(spec: &EntitySpec, mut item: ValidatedItem) -> Result<ValidatedItem, String> {
    let mut messages = Vec::new();

    for field in spec.fields {
        let convention = match field.field_type {
            FieldType::Code => spec.normalization,
            FieldType::Reference(target) => target.spec().normalization,
            _ => continue,
        };
        let Some(FieldValue::Text(raw)) = item.values.get(field.name) else {
            continue;
        };

        let normalized = normalize(raw, convention);
        if normalized.is_empty() {
            if field.required {
                messages.push(format!("\"{}\" is empty after normalization", field.name));
            }
            item.values.insert(field.name, FieldValue::Null);
        } else {
            item.values.insert(field.name, FieldValue::Text(normalized));
        }
    }

    if messages.is_empty() {
        Ok(item)
    } else {
        Err(format!("Row {}: {}", item.row, messages.join("; ")))
    }
}

/// 批内查重使用的键（自然键字段值，以 " / " 连接）
fn item_key(spec: &EntitySpec, item: &ValidatedItem) -> String {
    spec.key_fields
        .iter()
        .map(|field| item.get(field).to_plain_string())
        .collect::<Vec<_>>()
        .join(" / ")
}

/// 条目 → 落库行（引用字段替换为代理主键）
fn build_row(
    spec: &EntitySpec,
    item: &ValidatedItem,
    resolved: &HashMap<&'static str, DependencyMap>,
) -> ImporterResult<EntityRow> {
    let values = spec
        .columns
        .iter()
        .map(|column| match column.source {
            ColumnSource::Field(field) => Ok(item.get(field).clone()),
            ColumnSource::Reference { field, target } => match item.text(field) {
                None => Ok(FieldValue::Null),
                Some(code) => resolved
                    .get(field)
                    .and_then(|map| map.get(code))
                    .map(|id| FieldValue::Integer(*id))
                    .ok_or_else(|| {
                        ImportError::Other(anyhow::anyhow!(
                            "unresolved {} reference \"{}\" in row {}",
                            target,
                            code,
                            item.row
                        ))
                    }),
            },
        })
        .collect::<ImporterResult<Vec<_>>>()?;

    Ok(EntityRow { id: None, values })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ensure_schema;
    use crate::repository::entity_repo::SqliteEntityStore;
    use rusqlite::Connection;
    use serde_json::json;
    use std::sync::Mutex;

    fn importer() -> (EntityImporter, Arc<SqliteEntityStore>) {
        crate::logging::init_test();
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();
        let store = Arc::new(SqliteEntityStore::from_connection(Arc::new(Mutex::new(conn))));
        (
            EntityImporter::new(store.clone(), ImportSettings::default()),
            store,
        )
    }

    #[tokio::test]
    async fn test_csv_import_counts() {
        let (importer, _) = importer();
        let result = importer
            .import(
                EntityKind::Brand,
                ShopScope::new(1, 1),
                ImportSource::Csv(b"code,title\nABC,Product A\nDEF,Product B".to_vec()),
            )
            .await
            .unwrap();

        assert_eq!(result.created, 2);
        assert_eq!(result.updated, 0);
        assert!(result.errors.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_after_normalization_aborts_before_write() {
        let (importer, store) = importer();
        let scope = ShopScope::new(1, 1);
        let err = importer
            .import(
                EntityKind::Warehouse,
                scope,
                ImportSource::Json(json!([
                    {"code": "main store"},
                    {"code": "other"},
                    {"code": "main-store"}
                ])),
            )
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            r#"Duplicate code found: "mainStore" in rows 1, 3. Each code must be unique."#
        );
        assert!(store.select_rows(EntityKind::Warehouse, scope).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_code_empty_after_normalization_is_item_error() {
        let (importer, _) = importer();
        let result = importer
            .import(
                EntityKind::Brand,
                ShopScope::new(1, 1),
                ImportSource::Json(json!([{"code": "ъ"}, {"code": "OK"}])),
            )
            .await
            .unwrap();

        assert_eq!(result.created, 1);
        assert_eq!(
            result.errors,
            vec![r#"Row 1: "code" is empty after normalization"#.to_string()]
        );
    }

    #[tokio::test]
    async fn test_counters_present_for_every_reference() {
        let (importer, _) = importer();
        let result = importer
            .import(
                EntityKind::Sku,
                ShopScope::new(1, 1),
                ImportSource::Json(json!([{"code": "S-1", "brand": "ACME"}])),
            )
            .await
            .unwrap();

        assert_eq!(result.dependency_created("brands_created"), Some(1));
        assert_eq!(result.dependency_created("categories_created"), Some(0));
        assert_eq!(result.dependency_created("suppliers_created"), Some(0));
        assert_eq!(result.dependencies_created.len(), 5);
    }

    #[test]
    fn test_item_key_joins_composite_fields() {
        let spec = EntityKind::Leftover.spec();
        let mut values = BTreeMap::new();
        values.insert("warehouse", FieldValue::from("main"));
        values.insert("sku", FieldValue::from("S-1"));
        values.insert("quantity", FieldValue::Integer(3));
        let item = ValidatedItem { row: 1, values };

        assert_eq!(item_key(spec, &item), "main / S-1");
    }
}
