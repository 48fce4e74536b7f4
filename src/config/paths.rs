// ==========================================
// 库存计划后端 - 默认数据库路径
// ==========================================

use std::path::PathBuf;

/// 显式指定数据库路径的环境变量
pub const DB_PATH_ENV: &str = "INVENTORY_IMPORT_DB_PATH";

const DB_FILE_NAME: &str = "inventory_import.db";

/// 获取默认数据库路径
///
/// # 返回
/// - 环境变量 INVENTORY_IMPORT_DB_PATH（非空时）
/// - 用户数据目录/inventory-import/inventory_import.db
/// - 回退: ./inventory_import.db
pub fn get_default_db_path() -> String {
    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from(".").join(DB_FILE_NAME);

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("inventory-import");
        // 目录创建失败时退回当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join(DB_FILE_NAME);
        }
    }

    path.to_string_lossy().to_string()
}
