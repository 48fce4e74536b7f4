// ==========================================
// 库存计划后端 - 重复键检测
// ==========================================
// 职责: 批次内自然键重复检测（纯函数，与实体无关）
// 策略: 发现任何重复即整体中止导入，不落库
// ==========================================

use crate::domain::types::ValidatedItem;
use crate::importer::error::{ImportError, ImporterResult};
use std::collections::HashMap;

/// 默认最多列出的重复组数
pub const DEFAULT_REPORT_LIMIT: usize = 5;

/// 同一键值的全部出现位置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    pub key: String,
    /// 1-based 行号，按出现顺序
    pub rows: Vec<usize>,
}

/// 按键分组，仅返回出现多次的组（按首次出现顺序）
pub fn group_duplicates<F>(items: &[ValidatedItem], key_fn: F) -> Vec<DuplicateGroup>
where
    F: Fn(&ValidatedItem) -> String,
{
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<DuplicateGroup> = Vec::new();

    for item in items {
        let key = key_fn(item);
        match index.get(&key) {
            Some(&pos) => groups[pos].rows.push(item.row),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push(DuplicateGroup {
                    key,
                    rows: vec![item.row],
                });
            }
        }
    }

    groups.retain(|g| g.rows.len() > 1);
    groups
}

/// 存在重复组时返回致命错误
///
/// # 参数
/// - groups: group_duplicates 的结果
/// - description: 键的人类可读描述（如 "code"）
/// - limit: 最多列出的组数，超出部分以 "and N more" 汇总
pub fn ensure_unique(
    groups: &[DuplicateGroup],
    description: &str,
    limit: usize,
) -> ImporterResult<()> {
    if groups.is_empty() {
        return Ok(());
    }

    let listed: Vec<String> = groups
        .iter()
        .take(limit)
        .map(|g| {
            let rows: Vec<String> = g.rows.iter().map(|r| r.to_string()).collect();
            format!("\"{}\" in rows {}", g.key, rows.join(", "))
        })
        .collect();

    let mut message = format!("Duplicate {} found: {}", description, listed.join("; "));
    if groups.len() > limit {
        message.push_str(&format!(" and {} more", groups.len() - limit));
    }
    message.push_str(&format!(". Each {} must be unique.", description));

    Err(ImportError::DuplicateKey(message))
}

// ==========================================
// ConflictHandler - 带配置的重复检测入口
// ==========================================
pub struct ConflictHandler {
    report_limit: usize,
}

impl ConflictHandler {
    pub fn new(report_limit: usize) -> Self {
        Self {
            report_limit: report_limit.max(1),
        }
    }

    /// 检测批次内重复键
    pub fn check<F>(&self, items: &[ValidatedItem], key_fn: F, description: &str) -> ImporterResult<()>
    where
        F: Fn(&ValidatedItem) -> String,
    {
        let groups = group_duplicates(items, key_fn);
        if !groups.is_empty() {
            tracing::warn!(groups = groups.len(), key = description, "批次内发现重复键");
        }
        ensure_unique(&groups, description, self.report_limit)
    }
}

impl Default for ConflictHandler {
    fn default() -> Self {
        Self::new(DEFAULT_REPORT_LIMIT)
    }
}
