// ==========================================
// 库存计划后端 - SQLite 连接初始化与建表
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键、busy_timeout）
// - 按实体配置表生成各实体表，唯一约束 = (shop_id, tenant_id, 自然键)
// ==========================================

use crate::domain::entity::{ColumnSource, EntityKind, EntitySpec};
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 标识符加双引号（表名如 groups 与 SQL 关键字重名）
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name)
}

/// 生成单个实体表的建表语句
pub fn create_table_sql(spec: &EntitySpec) -> String {
    let mut lines = vec![
        "id INTEGER PRIMARY KEY AUTOINCREMENT".to_string(),
        "shop_id INTEGER NOT NULL".to_string(),
        "tenant_id INTEGER NOT NULL".to_string(),
    ];

    for column in spec.columns {
        let mut line = format!("{} {}", quote_ident(column.name), column.sql_type.as_sql());
        if column.not_null {
            line.push_str(" NOT NULL");
        }
        if let ColumnSource::Reference { target, .. } = column.source {
            line.push_str(&format!(" REFERENCES {}(id)", quote_ident(target.spec().table)));
        }
        lines.push(line);
    }

    lines.push("created_at TEXT NOT NULL".to_string());
    lines.push("updated_at TEXT NOT NULL".to_string());

    let key: Vec<String> = spec.natural_key.iter().map(|k| quote_ident(k)).collect();
    lines.push(format!("UNIQUE (shop_id, tenant_id, {})", key.join(", ")));

    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        quote_ident(spec.table),
        lines.join(",\n    ")
    )
}

/// 初始化 schema（幂等）
///
/// 按依赖顺序创建各实体表、config_kv 与 schema_version。
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    for kind in EntityKind::ALL {
        conn.execute_batch(&create_table_sql(kind.spec()))?;
    }

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}
