// ==========================================
// 库存计划后端 - 领域模型层
// ==========================================
// 职责: 定义实体配置、店铺作用域、字段值与导入结果
// 红线: 不含数据访问逻辑,不含导入管道逻辑
// ==========================================

pub mod entity;
pub mod types;

// 重导出核心类型
pub use entity::{
    ColumnSource, ColumnSpec, EntityKind, EntitySpec, FieldSpec, FieldType, Normalization,
    SqlType, IMMUTABLE_COLUMNS,
};
pub use types::{
    DependencyMap, EntityRow, FieldValue, ImportResult, RawRecord, ShopScope, ValidatedItem,
};
