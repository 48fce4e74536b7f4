// ==========================================
// 库存计划后端 - 领域类型定义
// ==========================================
// 职责: 店铺作用域 / 字段值 / 原始记录 / 导入结果
// 红线: 任何读写都不得跨越店铺作用域
// ==========================================

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// 原始行记录（列名 → 值），来自 CSV 解析或 JSON 对象
pub type RawRecord = HashMap<String, String>;

/// 依赖映射（规范化编码 → 代理主键），每次导入调用内新建
pub type DependencyMap = HashMap<String, i64>;

// ==========================================
// 店铺作用域 (Shop Scope)
// ==========================================
// 由调用方完成鉴权后传入，引擎内不再校验
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShopScope {
    pub shop_id: i64,
    pub tenant_id: i64,
}

impl ShopScope {
    pub fn new(shop_id: i64, tenant_id: i64) -> Self {
        Self { shop_id, tenant_id }
    }
}

impl fmt::Display for ShopScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "shop={}/tenant={}", self.shop_id, self.tenant_id)
    }
}

// ==========================================
// 字段值 (Field Value)
// ==========================================
// 校验后的强类型值，同时也是落库/导出的统一表示
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Decimal(f64),
    Text(String),
    Null,
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// 导出/比较用的文本形式（Null → 空串）
    pub fn to_plain_string(&self) -> String {
        match self {
            FieldValue::Integer(v) => v.to_string(),
            FieldValue::Decimal(v) => v.to_string(),
            FieldValue::Text(s) => s.clone(),
            FieldValue::Null => String::new(),
        }
    }

    /// 转为 JSON 值（数值保持数值）
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FieldValue::Integer(v) => serde_json::Value::from(*v),
            FieldValue::Decimal(v) => serde_json::Number::from_f64(*v)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            FieldValue::Text(s) => serde_json::Value::String(s.clone()),
            FieldValue::Null => serde_json::Value::Null,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_plain_string())
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Decimal(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

// ==========================================
// 校验通过的条目 (Validated Item)
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedItem {
    /// 1-based 行号（CSV 以表头为第 1 行）
    pub row: usize,
    pub values: BTreeMap<&'static str, FieldValue>,
}

impl ValidatedItem {
    pub fn get(&self, field: &str) -> &FieldValue {
        self.values.get(field).unwrap_or(&FieldValue::Null)
    }

    pub fn text(&self, field: &str) -> Option<&str> {
        self.get(field).as_text()
    }
}

// ==========================================
// 落库行 (Entity Row)
// ==========================================
// values 与 EntitySpec::columns 一一对应
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRow {
    pub id: Option<i64>,
    pub values: Vec<FieldValue>,
}

// ==========================================
// 导入结果 (Import Result)
// ==========================================
// 每次导入调用构造一次，返回后不可变
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportResult {
    pub created: usize,
    pub updated: usize,
    pub errors: Vec<String>,
    /// 依赖自动创建计数，序列化为顶层 "<dependency>_created" 字段
    #[serde(flatten)]
    pub dependencies_created: BTreeMap<String, usize>,
}

impl ImportResult {
    /// 读取某个依赖的自动创建计数（如 "skus_created"）
    pub fn dependency_created(&self, key: &str) -> Option<usize> {
        self.dependencies_created.get(key).copied()
    }
}
