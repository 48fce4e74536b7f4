// ==========================================
// 库存计划后端 - 依赖解析器（按编码查找或创建）
// ==========================================
// 职责: 引用编码 → 代理主键；缺失的被引用行以占位行自动创建
// 限制: 并发导入同时创建同一编码时，后者触发唯一约束，这里不重试
// ==========================================

use crate::domain::entity::EntityKind;
use crate::domain::types::{DependencyMap, ShopScope};
use crate::importer::code_normalizer::normalize;
use crate::importer::error::{ImportError, ImporterResult};
use crate::repository::entity_repo::EntityStore;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// 一次解析的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedDependencies {
    /// 规范化编码 → 代理主键（已存在 + 新建）
    pub code_to_id: DependencyMap,
    /// 本次新建的行数
    pub created: usize,
}

pub struct DependencyResolver {
    store: Arc<dyn EntityStore>,
}

impl DependencyResolver {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    /// 解析引用编码
    ///
    /// # 参数
    /// - target: 被引用的实体种类（必须带 code 列）
    /// - scope: 店铺作用域
    /// - codes: 引用编码（可未规范化、可重复）
    pub async fn resolve(
        &self,
        target: EntityKind,
        scope: ShopScope,
        codes: &[String],
    ) -> ImporterResult<ResolvedDependencies> {
        let convention = target.spec().normalization;
        let mut seen = HashSet::new();
        let wanted: Vec<String> = codes
            .iter()
            .map(|code| normalize(code, convention))
            .filter(|code| !code.is_empty())
            .filter(|code| seen.insert(code.clone()))
            .collect();

        if wanted.is_empty() {
            return Ok(ResolvedDependencies::default());
        }

        let mut code_to_id = self
            .store
            .find_ids_by_codes(target, scope, &wanted)
            .await
            .map_err(|e| ImportError::from_repository(e, target.plural()))?;

        let missing: Vec<String> = wanted
            .into_iter()
            .filter(|code| !code_to_id.contains_key(code))
            .collect();

        let mut created = 0;
        if !missing.is_empty() {
            let inserted = self
                .store
                .insert_placeholders(target, scope, &missing)
                .await
                .map_err(|e| ImportError::from_repository(e, target.plural()))?;
            created = inserted.len();
            code_to_id.extend(inserted);
        }

        debug!(
            entity = %target,
            %scope,
            resolved = code_to_id.len(),
            created,
            "依赖解析完成"
        );
        Ok(ResolvedDependencies {
            code_to_id,
            created,
        })
    }
}
