// ==========================================
// 库存计划后端 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化；表名/列名只来自实体配置表
// ==========================================

pub mod entity_repo;
pub mod error;

// 重导出核心仓储
pub use entity_repo::{EntityStore, SqliteEntityStore};
pub use error::{RepositoryError, RepositoryResult};
