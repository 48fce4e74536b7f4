// ==========================================
// 库存计划后端 - 导入/导出 API
// ==========================================
// 职责: 封装实体导入、导出与店铺数据清除
// 说明: ShopScope 由调用方完成鉴权后传入
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::{ConfigManager, ImportConfigReader, ImportSettings};
use crate::domain::entity::EntityKind;
use crate::domain::types::{ImportResult, ShopScope};
use crate::exporter::{EntityExporter, ExportFormat};
use crate::importer::{EntityImporter, ImportSource};
use crate::repository::{EntityStore, SqliteEntityStore};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// 清除店铺数据响应
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WipeShopResponse {
    /// 各实体表删除的行数（表名 → 行数）
    pub deleted: BTreeMap<String, usize>,
    /// 删除总行数
    pub total: usize,
}

// ==========================================
// ImportApi
// ==========================================
pub struct ImportApi {
    db_path: String,
}

impl ImportApi {
    /// 创建新的ImportApi实例
    pub fn new(db_path: String) -> Self {
        Self { db_path }
    }

    fn create_store(&self) -> ApiResult<Arc<SqliteEntityStore>> {
        Ok(Arc::new(SqliteEntityStore::new(&self.db_path)?))
    }

    async fn load_settings(&self) -> ApiResult<ImportSettings> {
        let config = ConfigManager::new(&self.db_path)?;
        Ok(config.load_import_settings().await?)
    }

    /// 导入实体数据
    ///
    /// # 参数
    /// - kind: 实体种类
    /// - scope: 店铺作用域
    /// - source: CSV 字节或 JSON 数组
    ///
    /// # 返回
    /// - Ok(ImportResult): 导入结果
    /// - Err(ApiError::ValidationError): 解析/重复键错误，未写入任何数据
    pub async fn import(
        &self,
        kind: EntityKind,
        scope: ShopScope,
        source: ImportSource,
    ) -> ApiResult<ImportResult> {
        let settings = self.load_settings().await?;
        let importer = EntityImporter::new(self.create_store()?, settings);
        Ok(importer.import(kind, scope, source).await?)
    }

    /// 从文件导入（.json 按 JSON 数组处理，其余按 CSV 处理）
    pub async fn import_file(
        &self,
        kind: EntityKind,
        scope: ShopScope,
        file_path: &str,
    ) -> ApiResult<ImportResult> {
        let bytes = std::fs::read(file_path)
            .map_err(|e| ApiError::ImportError(format!("读取文件失败 {}: {}", file_path, e)))?;

        let is_json = Path::new(file_path)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let source = if is_json {
            let payload = serde_json::from_slice(&bytes)
                .map_err(|e| ApiError::ValidationError(format!("Invalid JSON payload: {}", e)))?;
            ImportSource::Json(payload)
        } else {
            ImportSource::Csv(bytes)
        };

        self.import(kind, scope, source).await
    }

    /// 导出实体数据
    pub async fn export(
        &self,
        kind: EntityKind,
        scope: ShopScope,
        format: ExportFormat,
    ) -> ApiResult<String> {
        let settings = self.load_settings().await?;
        let exporter = EntityExporter::new(self.create_store()?, settings);
        Ok(exporter.export(kind, scope, format).await?)
    }

    /// 清除店铺作用域内的全部实体数据
    ///
    /// 单事务内按依赖逆序删除（引用方先于被引用方），失败时不留下半清除状态。
    pub async fn wipe_shop(&self, scope: ShopScope) -> ApiResult<WipeShopResponse> {
        let store = self.create_store()?;
        let mut kinds = EntityKind::ALL;
        kinds.reverse();

        let mut response = WipeShopResponse::default();
        for (kind, deleted) in store.delete_scopes(scope, &kinds).await? {
            response.deleted.insert(kind.plural().to_string(), deleted);
            response.total += deleted;
        }

        info!(%scope, total = response.total, "店铺数据已清除");
        Ok(response)
    }
}
