// ==========================================
// 库存计划后端 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::import_config_trait::{
    ImportConfigReader, DEFAULT_DUPLICATE_REPORT_LIMIT, DEFAULT_EXPORT_CSV_DELIMITER,
};
use crate::db::{ensure_schema, open_sqlite_connection};
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
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

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let conn_guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_global_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global scope 的配置值（存在则覆盖）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 从 config_kv 表读取配置值，带默认值
    fn get_config_or_default(&self, key: &str, default: &str) -> RepositoryResult<String> {
        Ok(self
            .get_global_config_value(key)?
            .unwrap_or_else(|| default.to_string()))
    }

    /// 获取所有 global 配置的快照（JSON 格式）
    pub fn get_config_snapshot(&self) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut config_map = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        serde_json::to_string(&config_map)
            .map_err(|e| RepositoryError::InternalError(e.to_string()))
    }
}

// ==========================================
// ImportConfigReader Trait 实现
// ==========================================
#[async_trait]
impl ImportConfigReader for ConfigManager {
    async fn get_duplicate_report_limit(&self) -> RepositoryResult<usize> {
        let value = self.get_config_or_default(
            config_keys::DUPLICATE_REPORT_LIMIT,
            &DEFAULT_DUPLICATE_REPORT_LIMIT.to_string(),
        )?;
        match value.trim().parse::<usize>() {
            Ok(limit) if limit > 0 => Ok(limit),
            _ => {
                tracing::warn!(
                    config_key = config_keys::DUPLICATE_REPORT_LIMIT,
                    raw_value = %value,
                    "配置格式错误，使用默认值"
                );
                Ok(DEFAULT_DUPLICATE_REPORT_LIMIT)
            }
        }
    }

    async fn get_export_csv_delimiter(&self) -> RepositoryResult<u8> {
        let value = self.get_config_or_default(config_keys::EXPORT_CSV_DELIMITER, ",")?;
        // 只接受单个 ASCII 字符；"\t" 写法表示制表符
        let delimiter = match value.as_str() {
            "\\t" | "\t" => Some(b'\t'),
            v if v.len() == 1 && v.is_ascii() => v.bytes().next(),
            _ => None,
        };
        Ok(delimiter.unwrap_or_else(|| {
            tracing::warn!(
                config_key = config_keys::EXPORT_CSV_DELIMITER,
                raw_value = %value,
                "配置格式错误，使用默认值"
            );
            DEFAULT_EXPORT_CSV_DELIMITER
        }))
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 重复键错误最多列出的组数
    pub const DUPLICATE_REPORT_LIMIT: &str = "duplicate_report_limit";

    // 导出
    pub const EXPORT_CSV_DELIMITER: &str = "export_csv_delimiter";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImportSettings;

    fn manager() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[tokio::test]
    async fn test_defaults_when_unset() {
        let settings = manager().load_import_settings().await.unwrap();
        assert_eq!(settings, ImportSettings::default());
    }

    #[tokio::test]
    async fn test_overrides_are_read() {
        let manager = manager();
        manager
            .set_global_config_value(config_keys::DUPLICATE_REPORT_LIMIT, "2")
            .unwrap();
        manager
            .set_global_config_value(config_keys::EXPORT_CSV_DELIMITER, ";")
            .unwrap();

        let settings = manager.load_import_settings().await.unwrap();
        assert_eq!(settings.duplicate_report_limit, 2);
        assert_eq!(settings.export_csv_delimiter, b';');
    }

    #[tokio::test]
    async fn test_invalid_values_fall_back() {
        let manager = manager();
        manager
            .set_global_config_value(config_keys::DUPLICATE_REPORT_LIMIT, "zero")
            .unwrap();
        manager
            .set_global_config_value(config_keys::EXPORT_CSV_DELIMITER, "::")
            .unwrap();

        assert_eq!(manager.get_duplicate_report_limit().await.unwrap(), 5);
        assert_eq!(manager.get_export_csv_delimiter().await.unwrap(), b',');
        assert!(manager.get_config_snapshot().unwrap().contains("\"zero\""));
    }
}
