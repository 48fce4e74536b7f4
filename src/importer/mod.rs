// ==========================================
// 库存计划后端 - 导入层
// ==========================================
// 职责: CSV / JSON → 校验 → 规范化 → 依赖解析 → 幂等落库
// 支持: 分隔符自适应 CSV, JSON 对象数组
// ==========================================

// 模块声明
pub mod code_normalizer;
pub mod conflict_handler;
pub mod dependency_resolver;
pub mod dq_validator;
pub mod entity_importer;
pub mod error;
pub mod field_mapper;
pub mod file_parser;
pub mod upsert_reconciler;

// 重导出核心类型
pub use code_normalizer::{normalize, normalize_code_preserve, normalize_identifier, transliterate};
pub use conflict_handler::{ensure_unique, group_duplicates, ConflictHandler, DuplicateGroup};
pub use dependency_resolver::{DependencyResolver, ResolvedDependencies};
pub use dq_validator::DqValidator;
pub use entity_importer::{EntityImporter, ImportSource};
pub use error::{ImportError, ImporterResult};
pub use field_mapper::FieldMapper;
pub use file_parser::{parse_csv, parse_csv_bytes, CsvParser};
pub use upsert_reconciler::{ReconcileOutcome, UpsertReconciler};
