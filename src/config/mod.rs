// ==========================================
// 库存计划后端 - 配置层
// ==========================================
// 职责: 导入/导出配置读取，默认数据库路径
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod import_config_trait;
pub mod paths;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
pub use import_config_trait::{ImportConfigReader, ImportSettings};
pub use paths::get_default_db_path;
