// ==========================================
// 库存计划后端 - 导入/导出核心库
// ==========================================
// 职责: 多租户实体数据的 CSV/JSON 导入、依赖自动创建、幂等 upsert 与导出
// 技术栈: Rust + SQLite
// 红线: 所有读写限定在调用方传入的店铺作用域内
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体配置与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 导入层 - 解析/校验/对账
pub mod importer;

// 导出层 - CSV / JSON 序列化
pub mod exporter;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA/建表统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域
pub use domain::entity::{EntityKind, EntitySpec, Normalization};
pub use domain::types::{FieldValue, ImportResult, RawRecord, ShopScope};

// 导入 / 导出
pub use exporter::{EntityExporter, ExportFormat};
pub use importer::{EntityImporter, ImportError, ImportSource};

// API
pub use api::{ApiError, ApiResult, ImportApi, WipeShopResponse};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "inventory-import";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
