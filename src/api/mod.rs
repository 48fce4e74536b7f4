// ==========================================
// 库存计划后端 - API 层
// ==========================================
// 职责: 提供导入/导出/清库接口,供 CLI 或外部服务调用
// ==========================================

pub mod error;
pub mod import_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use import_api::{ImportApi, WipeShopResponse};
