// ==========================================
// 库存计划后端 - Upsert 对账器
// ==========================================
// 职责: 预探测已存在的自然键得出 created/updated，然后单事务批量 upsert
// 限制: 计数来自写前探测；并发导入重叠编码时计数可能偏差，落库结果仍收敛
// ==========================================

use crate::domain::entity::EntityKind;
use crate::domain::types::{EntityRow, FieldValue, ShopScope};
use crate::importer::error::{ImportError, ImporterResult};
use crate::repository::entity_repo::EntityStore;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub created: usize,
    pub updated: usize,
}

pub struct UpsertReconciler {
    store: Arc<dyn EntityStore>,
}

impl UpsertReconciler {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    /// 对账并落库
    ///
    /// # 参数
    /// - rows: 已规范化、已解析外键的落库行（values 对齐 EntitySpec::columns）
    ///
    /// # 返回
    /// - created = 行数 − 探测到的已存在数
    /// - Err(Conflict): 写入时触发唯一约束（并发竞争）
    pub async fn reconcile(
        &self,
        kind: EntityKind,
        scope: ShopScope,
        rows: &[EntityRow],
    ) -> ImporterResult<ReconcileOutcome> {
        if rows.is_empty() {
            return Ok(ReconcileOutcome::default());
        }

        let keys = natural_keys(kind, rows)?;
        let updated = self
            .store
            .count_existing(kind, scope, &keys)
            .await
            .map_err(|e| ImportError::from_repository(e, kind.plural()))?;

        self.store
            .upsert_rows(kind, scope, rows)
            .await
            .map_err(|e| ImportError::from_repository(e, kind.plural()))?;

        let outcome = ReconcileOutcome {
            created: rows.len().saturating_sub(updated),
            updated,
        };
        debug!(entity = %kind, %scope, created = outcome.created, updated = outcome.updated, "对账完成");
        Ok(outcome)
    }
}

/// 取每行的自然键列值
fn natural_keys(kind: EntityKind, rows: &[EntityRow]) -> ImporterResult<Vec<Vec<FieldValue>>> {
    let spec = kind.spec();
    let indexes = spec
        .natural_key
        .iter()
        .map(|column| {
            spec.column_index(column).ok_or_else(|| {
                ImportError::Other(anyhow::anyhow!(
                    "natural key column {} missing from {}",
                    column,
                    spec.table
                ))
            })
        })
        .collect::<ImporterResult<Vec<usize>>>()?;

    Ok(rows
        .iter()
        .map(|row| {
            indexes
                .iter()
                .map(|&i| row.values.get(i).cloned().unwrap_or(FieldValue::Null))
                .collect()
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ensure_schema;
    use crate::repository::entity_repo::SqliteEntityStore;
    use rusqlite::Connection;
    use std::sync::Mutex;

    fn reconciler() -> (UpsertReconciler, Arc<SqliteEntityStore>) {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();
        let store = Arc::new(SqliteEntityStore::from_connection(Arc::new(Mutex::new(conn))));
        (UpsertReconciler::new(store.clone()), store)
    }

    fn brand(code: &str, title: &str) -> EntityRow {
        EntityRow {
            id: None,
            values: vec![FieldValue::from(code), FieldValue::from(title)],
        }
    }

    #[tokio::test]
    async fn test_all_new_then_all_existing() {
        let (reconciler, _) = reconciler();
        let scope = ShopScope::new(1, 1);
        let rows = vec![brand("A", "a"), brand("B", "b"), brand("C", "c")];

        let first = reconciler.reconcile(EntityKind::Brand, scope, &rows).await.unwrap();
        assert_eq!(first, ReconcileOutcome { created: 3, updated: 0 });

        let second = reconciler.reconcile(EntityKind::Brand, scope, &rows).await.unwrap();
        assert_eq!(second, ReconcileOutcome { created: 0, updated: 3 });
    }

    #[tokio::test]
    async fn test_mixed_batch_and_scope_isolation() {
        let (reconciler, store) = reconciler();
        let shop_a = ShopScope::new(1, 1);
        let shop_b = ShopScope::new(2, 1);

        reconciler
            .reconcile(EntityKind::Brand, shop_a, &[brand("A", "old")])
            .await
            .unwrap();

        let outcome = reconciler
            .reconcile(EntityKind::Brand, shop_a, &[brand("A", "new"), brand("B", "b")])
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome { created: 1, updated: 1 });

        // 另一店铺的同编码是全新行
        let other = reconciler
            .reconcile(EntityKind::Brand, shop_b, &[brand("A", "x")])
            .await
            .unwrap();
        assert_eq!(other, ReconcileOutcome { created: 1, updated: 0 });

        let rows = store.select_rows(EntityKind::Brand, shop_a).await.unwrap();
        assert_eq!(rows[0].values[1], FieldValue::from("new"));
    }

    #[tokio::test]
    async fn test_empty_batch_is_noop() {
        let (reconciler, _) = reconciler();
        let outcome = reconciler
            .reconcile(EntityKind::Sku, ShopScope::new(1, 1), &[])
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::default());
    }
}
