// ==========================================
// 库存计划后端 - 实体数据仓储
// ==========================================
// 职责: 按实体配置表对任意实体做店铺作用域内的读写
// 红线: Repository 不含业务规则，只做数据 CRUD；每条 SQL 都带 shop_id + tenant_id
// ==========================================

use crate::db::{ensure_schema, open_sqlite_connection, quote_ident};
use crate::domain::entity::EntityKind;
use crate::domain::types::{DependencyMap, EntityRow, FieldValue, ShopScope};
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use rusqlite::{params, params_from_iter, Connection, ToSql};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// IN (...) 查询单批最大参数数
const QUERY_CHUNK: usize = 500;

// ==========================================
// EntityStore Trait
// ==========================================
// 用途: 导入/导出管道所需的持久化接口
// 实现者: SqliteEntityStore（使用 rusqlite）
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// 按编码查找已存在行（仅限带 code 列的实体）
    ///
    /// # 返回
    /// - Ok(DependencyMap): 已存在的 编码 → id（不存在的编码不出现）
    async fn find_ids_by_codes(
        &self,
        kind: EntityKind,
        scope: ShopScope,
        codes: &[String],
    ) -> RepositoryResult<DependencyMap>;

    /// 批量插入占位行（code = title = 编码），单事务
    ///
    /// # 返回
    /// - Ok(DependencyMap): 新插入的 编码 → id
    /// - Err(UniqueConstraintViolation): 并发导入抢先创建了同一编码
    async fn insert_placeholders(
        &self,
        kind: EntityKind,
        scope: ShopScope,
        codes: &[String],
    ) -> RepositoryResult<DependencyMap>;

    /// 统计已存在的自然键个数
    ///
    /// # 参数
    /// - keys: 每项为自然键列值（顺序同 EntitySpec::natural_key）
    async fn count_existing(
        &self,
        kind: EntityKind,
        scope: ShopScope,
        keys: &[Vec<FieldValue>],
    ) -> RepositoryResult<usize>;

    /// 原子批量 upsert（冲突时更新全部非不可变列）
    async fn upsert_rows(
        &self,
        kind: EntityKind,
        scope: ShopScope,
        rows: &[EntityRow],
    ) -> RepositoryResult<usize>;

    /// 读取作用域内全部行（按 id 排序）
    async fn select_rows(&self, kind: EntityKind, scope: ShopScope)
        -> RepositoryResult<Vec<EntityRow>>;

    /// id → 编码（导出时回填外键）
    async fn codes_by_ids(
        &self,
        kind: EntityKind,
        scope: ShopScope,
        ids: &[i64],
    ) -> RepositoryResult<HashMap<i64, String>>;

    /// 单事务内按给定顺序删除作用域内多个实体的全部行
    ///
    /// # 返回
    /// - Ok: 每个实体删除的行数（顺序同 kinds）
    /// - Err: 任一删除失败则整体回滚
    async fn delete_scopes(
        &self,
        scope: ShopScope,
        kinds: &[EntityKind],
    ) -> RepositoryResult<Vec<(EntityKind, usize)>>;
}

// ==========================================
// FieldValue ↔ SQLite 值
// ==========================================
impl ToSql for FieldValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            FieldValue::Integer(v) => ToSqlOutput::Owned(Value::Integer(*v)),
            FieldValue::Decimal(v) => ToSqlOutput::Owned(Value::Real(*v)),
            FieldValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            FieldValue::Null => ToSqlOutput::Owned(Value::Null),
        })
    }
}

fn field_value_from_ref(value: ValueRef<'_>) -> FieldValue {
    match value {
        ValueRef::Null => FieldValue::Null,
        ValueRef::Integer(v) => FieldValue::Integer(v),
        ValueRef::Real(v) => FieldValue::Decimal(v),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            FieldValue::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

fn transaction_error(err: rusqlite::Error) -> RepositoryError {
    RepositoryError::DatabaseTransactionError(err.to_string())
}

fn now_text() -> String {
    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

fn placeholders(start: usize, count: usize) -> String {
    (start..start + count)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

/// 仅允许对带 code 列的实体做按编码的操作
fn ensure_code_entity(kind: EntityKind) -> RepositoryResult<()> {
    if kind.is_code_entity() {
        Ok(())
    } else {
        Err(RepositoryError::InternalError(format!(
            "{} has no code column",
            kind
        )))
    }
}

// ==========================================
// SqliteEntityStore
// ==========================================
pub struct SqliteEntityStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteEntityStore {
    /// 创建新的仓储实例（打开连接并初始化 schema）
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path).map_err(|e| {
            RepositoryError::DatabaseConnectionError(format!("{}: {}", db_path, e))
        })?;
        ensure_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }
}

#[async_trait]
impl EntityStore for SqliteEntityStore {
    async fn find_ids_by_codes(
        &self,
        kind: EntityKind,
        scope: ShopScope,
        codes: &[String],
    ) -> RepositoryResult<DependencyMap> {
        ensure_code_entity(kind)?;
        let conn = self.get_conn()?;
        let mut found = DependencyMap::new();

        for chunk in codes.chunks(QUERY_CHUNK) {
            let sql = format!(
                "SELECT code, id FROM {} WHERE shop_id = ?1 AND tenant_id = ?2 AND code IN ({})",
                quote_ident(kind.spec().table),
                placeholders(3, chunk.len())
            );
            let mut stmt = conn.prepare(&sql)?;

            let mut args: Vec<FieldValue> = vec![scope.shop_id.into(), scope.tenant_id.into()];
            args.extend(chunk.iter().map(|c| FieldValue::from(c.as_str())));

            let rows = stmt.query_map(params_from_iter(args.iter()), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            for row in rows {
                let (code, id) = row?;
                found.insert(code, id);
            }
        }

        Ok(found)
    }

    async fn insert_placeholders(
        &self,
        kind: EntityKind,
        scope: ShopScope,
        codes: &[String],
    ) -> RepositoryResult<DependencyMap> {
        ensure_code_entity(kind)?;
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction().map_err(transaction_error)?;
        let now = now_text();
        let mut inserted = DependencyMap::new();

        {
            let sql = format!(
                "INSERT INTO {} (shop_id, tenant_id, code, title, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?3, ?4, ?4)",
                quote_ident(kind.spec().table)
            );
            let mut stmt = tx.prepare(&sql)?;
            for code in codes {
                stmt.execute(params![scope.shop_id, scope.tenant_id, code, now])?;
                inserted.insert(code.clone(), tx.last_insert_rowid());
            }
        }

        tx.commit().map_err(transaction_error)?;
        debug!(entity = %kind, %scope, inserted = inserted.len(), "占位行插入完成");
        Ok(inserted)
    }

    async fn count_existing(
        &self,
        kind: EntityKind,
        scope: ShopScope,
        keys: &[Vec<FieldValue>],
    ) -> RepositoryResult<usize> {
        let spec = kind.spec();
        let conditions: Vec<String> = spec
            .natural_key
            .iter()
            .enumerate()
            .map(|(i, column)| format!("{} IS ?{}", quote_ident(column), i + 3))
            .collect();
        let sql = format!(
            "SELECT 1 FROM {} WHERE shop_id = ?1 AND tenant_id = ?2 AND {} LIMIT 1",
            quote_ident(spec.table),
            conditions.join(" AND ")
        );

        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let mut count = 0;

        for key in keys {
            let mut args: Vec<FieldValue> = vec![scope.shop_id.into(), scope.tenant_id.into()];
            args.extend(key.iter().cloned());
            if stmt.exists(params_from_iter(args.iter()))? {
                count += 1;
            }
        }

        Ok(count)
    }

    async fn upsert_rows(
        &self,
        kind: EntityKind,
        scope: ShopScope,
        rows: &[EntityRow],
    ) -> RepositoryResult<usize> {
        let spec = kind.spec();
        let columns: Vec<String> = spec.columns.iter().map(|c| quote_ident(c.name)).collect();
        let key: Vec<String> = spec.natural_key.iter().map(|k| quote_ident(k)).collect();

        let mut assignments: Vec<String> = spec
            .update_columns()
            .iter()
            .map(|c| format!("{0} = excluded.{0}", quote_ident(c)))
            .collect();
        assignments.push("updated_at = excluded.updated_at".to_string());

        let n = columns.len();
        let sql = format!(
            "INSERT INTO {table} (shop_id, tenant_id, {columns}, created_at, updated_at) \
             VALUES (?1, ?2, {values}, ?{ts}, ?{ts}) \
             ON CONFLICT (shop_id, tenant_id, {key}) DO UPDATE SET {assignments}",
            table = quote_ident(spec.table),
            columns = columns.join(", "),
            values = placeholders(3, n),
            ts = n + 3,
            key = key.join(", "),
            assignments = assignments.join(", "),
        );

        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction().map_err(transaction_error)?;
        let now = FieldValue::Text(now_text());
        let shop = FieldValue::Integer(scope.shop_id);
        let tenant = FieldValue::Integer(scope.tenant_id);
        let mut count = 0;

        {
            let mut stmt = tx.prepare(&sql)?;
            for row in rows {
                if row.values.len() != n {
                    return Err(RepositoryError::FieldValueError {
                        field: spec.table.to_string(),
                        message: format!("expected {} values, got {}", n, row.values.len()),
                    });
                }
                let mut args: Vec<&FieldValue> = Vec::with_capacity(n + 3);
                args.push(&shop);
                args.push(&tenant);
                args.extend(row.values.iter());
                args.push(&now);
                stmt.execute(params_from_iter(args))?;
                count += 1;
            }
        }

        tx.commit().map_err(transaction_error)?;
        debug!(entity = %kind, %scope, rows = count, "批量 upsert 完成");
        Ok(count)
    }

    async fn select_rows(
        &self,
        kind: EntityKind,
        scope: ShopScope,
    ) -> RepositoryResult<Vec<EntityRow>> {
        let spec = kind.spec();
        let columns: Vec<String> = spec.columns.iter().map(|c| quote_ident(c.name)).collect();
        let sql = format!(
            "SELECT id, {} FROM {} WHERE shop_id = ?1 AND tenant_id = ?2 ORDER BY id",
            columns.join(", "),
            quote_ident(spec.table)
        );

        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![scope.shop_id, scope.tenant_id], |row| {
            let id: i64 = row.get(0)?;
            let mut values = Vec::with_capacity(columns.len());
            for idx in 0..columns.len() {
                values.push(field_value_from_ref(row.get_ref(idx + 1)?));
            }
            Ok(EntityRow {
                id: Some(id),
                values,
            })
        })?;

        let result = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(result)
    }

    async fn codes_by_ids(
        &self,
        kind: EntityKind,
        scope: ShopScope,
        ids: &[i64],
    ) -> RepositoryResult<HashMap<i64, String>> {
        ensure_code_entity(kind)?;
        let conn = self.get_conn()?;
        let mut codes = HashMap::new();

        for chunk in ids.chunks(QUERY_CHUNK) {
            let sql = format!(
                "SELECT id, code FROM {} WHERE shop_id = ?1 AND tenant_id = ?2 AND id IN ({})",
                quote_ident(kind.spec().table),
                placeholders(3, chunk.len())
            );
            let mut stmt = conn.prepare(&sql)?;

            let mut args: Vec<i64> = vec![scope.shop_id, scope.tenant_id];
            args.extend_from_slice(chunk);

            let rows = stmt.query_map(params_from_iter(args.iter()), |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })?;
            for row in rows {
                let (id, code) = row?;
                codes.insert(id, code);
            }
        }

        Ok(codes)
    }

    async fn delete_scopes(
        &self,
        scope: ShopScope,
        kinds: &[EntityKind],
    ) -> RepositoryResult<Vec<(EntityKind, usize)>> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction().map_err(transaction_error)?;
        let mut deleted = Vec::with_capacity(kinds.len());

        for kind in kinds {
            let sql = format!(
                "DELETE FROM {} WHERE shop_id = ?1 AND tenant_id = ?2",
                quote_ident(kind.spec().table)
            );
            let count = tx.execute(&sql, params![scope.shop_id, scope.tenant_id])?;
            deleted.push((*kind, count));
        }

        tx.commit().map_err(transaction_error)?;
        debug!(%scope, tables = deleted.len(), "作用域数据删除完成");
        Ok(deleted)
    }
}
