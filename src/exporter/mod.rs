// ==========================================
// 库存计划后端 - 导出层
// ==========================================
// 职责: 店铺作用域内的实体数据 → CSV / JSON（顺序稳定，可 diff）
// ==========================================

pub mod entity_exporter;
pub mod formatter;

pub use entity_exporter::{EntityExporter, ExportFormat};
pub use formatter::{format_csv, format_json};
