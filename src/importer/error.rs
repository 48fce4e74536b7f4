// ==========================================
// 库存计划后端 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 分类: 致命解析错误 / 致命重复键错误 / 引用竞争冲突 / 存储错误
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 导入模块错误类型
///
/// 单条记录的校验失败不走这里，而是收集进 `ImportResult.errors`。
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 致命解析/结构错误（落库前中止）=====
    #[error("{0}")]
    SchemaParse(String),

    // ===== 致命重复键错误（落库前中止）=====
    #[error("{0}")]
    DuplicateKey(String),

    // ===== 并发导入竞争（唯一约束冲突，不重试）=====
    #[error("Conflict while writing {entity}: {message}")]
    Conflict { entity: String, message: String },

    // ===== 存储错误 =====
    #[error("Storage failure: {0}")]
    Repository(RepositoryError),

    #[error("CSV failure: {0}")]
    Csv(String),

    // ===== 导出序列化失败（内部错误，与输入校验无关）=====
    #[error("JSON serialization failure: {0}")]
    Serialization(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ImportError {
    /// 是否为落库前的致命错误（无任何持久化副作用）
    pub fn is_pre_write(&self) -> bool {
        matches!(
            self,
            ImportError::SchemaParse(_) | ImportError::DuplicateKey(_)
        )
    }

    /// 存储错误转换，唯一约束冲突标注出冲突的实体
    pub fn from_repository(err: RepositoryError, entity: &str) -> Self {
        match err {
            RepositoryError::UniqueConstraintViolation(message) => ImportError::Conflict {
                entity: entity.to_string(),
                message,
            },
            other => ImportError::Repository(other),
        }
    }
}

// 实现 From<RepositoryError>：唯一约束冲突单独归类
impl From<RepositoryError> for ImportError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::UniqueConstraintViolation(message) => ImportError::Conflict {
                entity: "unknown".to_string(),
                message,
            },
            other => ImportError::Repository(other),
        }
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::Csv(err.to_string())
    }
}

// 实现 From<serde_json::Error>
impl From<serde_json::Error> for ImportError {
    fn from(err: serde_json::Error) -> Self {
        ImportError::Serialization(err.to_string())
    }
}

/// Result 类型别名
pub type ImporterResult<T> = Result<T, ImportError>;
