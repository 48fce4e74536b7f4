// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、行计数等功能
// ==========================================

#![allow(dead_code)]

use inventory_import::db::{ensure_schema, open_sqlite_connection, quote_ident};
use inventory_import::{EntityKind, ShopScope};
use std::error::Error;
use tempfile::NamedTempFile;

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file
        .path()
        .to_str()
        .ok_or("临时文件路径不是 UTF-8")?
        .to_string();

    let conn = open_sqlite_connection(&db_path)?;
    ensure_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 统计某店铺作用域内某实体的行数
pub fn count_rows(db_path: &str, kind: EntityKind, scope: ShopScope) -> i64 {
    let conn = open_sqlite_connection(db_path).expect("打开测试数据库失败");
    let sql = format!(
        "SELECT COUNT(*) FROM {} WHERE shop_id = ?1 AND tenant_id = ?2",
        quote_ident(kind.plural())
    );
    conn.query_row(&sql, [scope.shop_id, scope.tenant_id], |row| row.get(0))
        .expect("统计行数失败")
}

/// 按编码读取 code 类实体的 title
pub fn title_of(db_path: &str, kind: EntityKind, scope: ShopScope, code: &str) -> Option<String> {
    let conn = open_sqlite_connection(db_path).expect("打开测试数据库失败");
    let sql = format!(
        "SELECT title FROM {} WHERE shop_id = ?1 AND tenant_id = ?2 AND code = ?3",
        quote_ident(kind.plural())
    );
    conn.query_row(
        &sql,
        rusqlite::params![scope.shop_id, scope.tenant_id, code],
        |row| row.get(0),
    )
    .ok()
}

/// 写入临时输入文件（保持 NamedTempFile 存活）
pub fn write_input_file(suffix: &str, content: &str) -> (NamedTempFile, String) {
    let file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("创建临时输入文件失败");
    std::fs::write(file.path(), content).expect("写入临时输入文件失败");
    let path = file.path().to_string_lossy().to_string();
    (file, path)
}
