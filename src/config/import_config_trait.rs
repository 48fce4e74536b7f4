// ==========================================
// 库存计划后端 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入/导出管道所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::repository::error::RepositoryResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// 重复键错误默认列出的组数
pub const DEFAULT_DUPLICATE_REPORT_LIMIT: usize = 5;

/// 导出 CSV 默认分隔符
pub const DEFAULT_EXPORT_CSV_DELIMITER: u8 = b',';

// ==========================================
// ImportSettings - 一次导入/导出调用使用的配置快照
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSettings {
    pub duplicate_report_limit: usize,
    pub export_csv_delimiter: u8,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            duplicate_report_limit: DEFAULT_DUPLICATE_REPORT_LIMIT,
            export_csv_delimiter: DEFAULT_EXPORT_CSV_DELIMITER,
        }
    }
}

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 用途: 导入模块所需的配置读取接口
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait ImportConfigReader: Send + Sync {
    /// 获取重复键错误中最多列出的重复组数
    ///
    /// # 默认值
    /// - 5
    async fn get_duplicate_report_limit(&self) -> RepositoryResult<usize>;

    /// 获取导出 CSV 的分隔符
    ///
    /// # 默认值
    /// - ','
    async fn get_export_csv_delimiter(&self) -> RepositoryResult<u8>;

    /// 一次性读取全部导入配置
    async fn load_import_settings(&self) -> RepositoryResult<ImportSettings> {
        Ok(ImportSettings {
            duplicate_report_limit: self.get_duplicate_report_limit().await?,
            export_csv_delimiter: self.get_export_csv_delimiter().await?,
        })
    }
}
