// ==========================================
// 库存计划后端 - 实体配置表
// ==========================================
// 职责: 每种实体一份静态配置值对象，驱动通用导入/导出管道
// 约束: 表名/列名只来自本文件的封闭枚举，不接受外部字符串
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// 实体种类 (Entity Kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Brand,
    Category,
    Group,
    Status,
    Supplier,
    Warehouse,
    Marketplace,
    Sku,
    SalesHistory,
    Leftover,
    SeasonalCoefficient,
    CompetitorProduct,
    SkuCompetitorMapping,
}

impl EntityKind {
    /// 按依赖顺序排列（被引用者在前）
    pub const ALL: [EntityKind; 13] = [
        EntityKind::Brand,
        EntityKind::Category,
        EntityKind::Group,
        EntityKind::Status,
        EntityKind::Supplier,
        EntityKind::Warehouse,
        EntityKind::Marketplace,
        EntityKind::Sku,
        EntityKind::CompetitorProduct,
        EntityKind::SalesHistory,
        EntityKind::Leftover,
        EntityKind::SeasonalCoefficient,
        EntityKind::SkuCompetitorMapping,
    ];

    /// 单数名（CLI 参数 / 日志）
    pub fn name(self) -> &'static str {
        match self {
            EntityKind::Brand => "brand",
            EntityKind::Category => "category",
            EntityKind::Group => "group",
            EntityKind::Status => "status",
            EntityKind::Supplier => "supplier",
            EntityKind::Warehouse => "warehouse",
            EntityKind::Marketplace => "marketplace",
            EntityKind::Sku => "sku",
            EntityKind::SalesHistory => "sales_history",
            EntityKind::Leftover => "leftover",
            EntityKind::SeasonalCoefficient => "seasonal_coefficient",
            EntityKind::CompetitorProduct => "competitor_product",
            EntityKind::SkuCompetitorMapping => "sku_competitor_mapping",
        }
    }

    /// 复数名，同时作为表名与 "<plural>_created" 计数键的前缀
    pub fn plural(self) -> &'static str {
        self.spec().table
    }

    /// 依赖自动创建计数键
    pub fn created_counter_key(self) -> String {
        format!("{}_created", self.plural())
    }

    pub fn spec(self) -> &'static EntitySpec {
        match self {
            EntityKind::Brand => &BRAND,
            EntityKind::Category => &CATEGORY,
            EntityKind::Group => &GROUP,
            EntityKind::Status => &STATUS,
            EntityKind::Supplier => &SUPPLIER,
            EntityKind::Warehouse => &WAREHOUSE,
            EntityKind::Marketplace => &MARKETPLACE,
            EntityKind::Sku => &SKU,
            EntityKind::SalesHistory => &SALES_HISTORY,
            EntityKind::Leftover => &LEFTOVER,
            EntityKind::SeasonalCoefficient => &SEASONAL_COEFFICIENT,
            EntityKind::CompetitorProduct => &COMPETITOR_PRODUCT,
            EntityKind::SkuCompetitorMapping => &SKU_COMPETITOR_MAPPING,
        }
    }

    /// 是否为带 code/title 的可引用实体（可作为依赖自动创建）
    pub fn is_code_entity(self) -> bool {
        self.spec().columns.iter().any(|c| c.name == "code")
            && self.spec().natural_key == ["code"]
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    /// 接受单数名或复数表名，'-' 等同 '_'
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('-', "_");
        EntityKind::ALL
            .into_iter()
            .find(|k| k.name() == wanted || k.plural() == wanted)
            .ok_or_else(|| format!("Unknown entity kind: {}", s))
    }
}

// ==========================================
// 编码规范化约定 (Normalization)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Normalization {
    /// 标识符规范化：音译 + 分隔符切分 + lowerCamelCase
    Identifier,
    /// 保留编码：音译 + 删除空白，保留大小写与标点
    CodePreserve,
}

// ==========================================
// 字段类型 (Field Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldType {
    /// 本实体的自然键编码（按实体约定规范化）
    Code,
    /// 引用其他实体的编码（按目标实体约定规范化，并解析为代理主键）
    Reference(EntityKind),
    Text,
    Integer { min: Option<i64> },
    Decimal { min: Option<f64> },
    /// 期间 YYYY-MM
    Period,
    /// 月份 1..=12
    Month,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub field_type: FieldType,
    pub required: bool,
    /// 缺省时取另一字段的值（如 title 缺省取 code）
    pub default_from: Option<&'static str>,
}

impl FieldSpec {
    const fn required(name: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            field_type,
            required: true,
            default_from: None,
        }
    }

    const fn optional(name: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            field_type,
            required: false,
            default_from: None,
        }
    }

    const fn defaulted(name: &'static str, field_type: FieldType, from: &'static str) -> Self {
        Self {
            name,
            field_type,
            required: false,
            default_from: Some(from),
        }
    }
}

// ==========================================
// 落库列 (Column Spec)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnSource {
    /// 直接取同名校验字段
    Field(&'static str),
    /// 由引用字段经依赖映射得到的外键
    Reference {
        field: &'static str,
        target: EntityKind,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Text,
    Integer,
    Real,
}

impl SqlType {
    pub fn as_sql(self) -> &'static str {
        match self {
            SqlType::Text => "TEXT",
            SqlType::Integer => "INTEGER",
            SqlType::Real => "REAL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub source: ColumnSource,
    pub sql_type: SqlType,
    pub not_null: bool,
}

impl ColumnSpec {
    const fn field(name: &'static str, sql_type: SqlType, not_null: bool) -> Self {
        Self {
            name,
            source: ColumnSource::Field(name),
            sql_type,
            not_null,
        }
    }

    const fn reference(
        name: &'static str,
        field: &'static str,
        target: EntityKind,
        not_null: bool,
    ) -> Self {
        Self {
            name,
            source: ColumnSource::Reference { field, target },
            sql_type: SqlType::Integer,
            not_null,
        }
    }

    /// 导出时使用的字段名（外键列导出为被引用实体的编码）
    pub fn export_name(&self) -> &'static str {
        match self.source {
            ColumnSource::Field(f) => f,
            ColumnSource::Reference { field, .. } => field,
        }
    }
}

// ==========================================
// 实体配置值对象 (Entity Spec)
// ==========================================
#[derive(Debug)]
pub struct EntitySpec {
    pub kind: EntityKind,
    pub table: &'static str,
    /// 导入字段（校验 schema）
    pub fields: &'static [FieldSpec],
    /// 数据列（不含 id / shop_id / tenant_id / 时间戳）
    pub columns: &'static [ColumnSpec],
    /// 自然键列（与 shop_id, tenant_id 组成唯一约束）
    pub natural_key: &'static [&'static str],
    /// 自然键对应的导入字段（重复检测 / 错误定位）
    pub key_fields: &'static [&'static str],
    /// 重复检测的人类可读描述
    pub key_description: &'static str,
    /// 本实体编码的规范化约定
    pub normalization: Normalization,
}

/// 所有实体共有的不可变列，upsert 的更新分支永不触碰
pub const IMMUTABLE_COLUMNS: [&str; 4] = ["id", "shop_id", "tenant_id", "created_at"];

impl EntitySpec {
    /// CSV 解析时必须出现在表头中的列
    pub fn required_columns(&self) -> Vec<&'static str> {
        self.fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name)
            .collect()
    }

    /// 导出字段（顺序固定）
    pub fn export_fields(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.export_name()).collect()
    }

    /// 引用的其他实体（去重，按声明顺序）
    pub fn references(&self) -> Vec<(&'static str, EntityKind)> {
        self.fields
            .iter()
            .filter_map(|f| match f.field_type {
                FieldType::Reference(target) => Some((f.name, target)),
                _ => None,
            })
            .collect()
    }

    /// 更新分支涉及的列：非自然键、非不可变列
    pub fn update_columns(&self) -> Vec<&'static str> {
        self.columns
            .iter()
            .map(|c| c.name)
            .filter(|name| !self.natural_key.contains(name))
            .filter(|name| !IMMUTABLE_COLUMNS.contains(name))
            .collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }
}

// ==========================================
// 各实体配置
// ==========================================

const CODE_TITLE_FIELDS: [FieldSpec; 2] = [
    FieldSpec::required("code", FieldType::Code),
    FieldSpec::defaulted("title", FieldType::Text, "code"),
];

const CODE_TITLE_COLUMNS: [ColumnSpec; 2] = [
    ColumnSpec::field("code", SqlType::Text, true),
    ColumnSpec::field("title", SqlType::Text, true),
];

macro_rules! code_entity {
    ($kind:expr, $table:literal, $normalization:expr) => {
        EntitySpec {
            kind: $kind,
            table: $table,
            fields: &CODE_TITLE_FIELDS,
            columns: &CODE_TITLE_COLUMNS,
            natural_key: &["code"],
            key_fields: &["code"],
            key_description: "code",
            normalization: $normalization,
        }
    };
}

static BRAND: EntitySpec = code_entity!(EntityKind::Brand, "brands", Normalization::CodePreserve);
static CATEGORY: EntitySpec =
    code_entity!(EntityKind::Category, "categories", Normalization::CodePreserve);
static GROUP: EntitySpec = code_entity!(EntityKind::Group, "groups", Normalization::CodePreserve);
static STATUS: EntitySpec =
    code_entity!(EntityKind::Status, "statuses", Normalization::CodePreserve);
static SUPPLIER: EntitySpec =
    code_entity!(EntityKind::Supplier, "suppliers", Normalization::CodePreserve);
static WAREHOUSE: EntitySpec =
    code_entity!(EntityKind::Warehouse, "warehouses", Normalization::Identifier);
static MARKETPLACE: EntitySpec =
    code_entity!(EntityKind::Marketplace, "marketplaces", Normalization::Identifier);

static SKU: EntitySpec = EntitySpec {
    kind: EntityKind::Sku,
    table: "skus",
    fields: &[
        FieldSpec::required("code", FieldType::Code),
        FieldSpec::defaulted("title", FieldType::Text, "code"),
        FieldSpec::optional("article", FieldType::Text),
        FieldSpec::optional("brand", FieldType::Reference(EntityKind::Brand)),
        FieldSpec::optional("category", FieldType::Reference(EntityKind::Category)),
        FieldSpec::optional("group", FieldType::Reference(EntityKind::Group)),
        FieldSpec::optional("status", FieldType::Reference(EntityKind::Status)),
        FieldSpec::optional("supplier", FieldType::Reference(EntityKind::Supplier)),
        FieldSpec::optional("purchase_price", FieldType::Decimal { min: Some(0.0) }),
    ],
    columns: &[
        ColumnSpec::field("code", SqlType::Text, true),
        ColumnSpec::field("title", SqlType::Text, true),
        ColumnSpec::field("article", SqlType::Text, false),
        ColumnSpec::reference("brand_id", "brand", EntityKind::Brand, false),
        ColumnSpec::reference("category_id", "category", EntityKind::Category, false),
        ColumnSpec::reference("group_id", "group", EntityKind::Group, false),
        ColumnSpec::reference("status_id", "status", EntityKind::Status, false),
        ColumnSpec::reference("supplier_id", "supplier", EntityKind::Supplier, false),
        ColumnSpec::field("purchase_price", SqlType::Real, false),
    ],
    natural_key: &["code"],
    key_fields: &["code"],
    key_description: "code",
    normalization: Normalization::CodePreserve,
};

static SALES_HISTORY: EntitySpec = EntitySpec {
    kind: EntityKind::SalesHistory,
    table: "sales_history",
    fields: &[
        FieldSpec::required("sku", FieldType::Reference(EntityKind::Sku)),
        FieldSpec::required("marketplace", FieldType::Reference(EntityKind::Marketplace)),
        FieldSpec::required("period", FieldType::Period),
        FieldSpec::required("quantity", FieldType::Integer { min: None }),
        FieldSpec::optional("revenue", FieldType::Decimal { min: None }),
    ],
    columns: &[
        ColumnSpec::reference("sku_id", "sku", EntityKind::Sku, true),
        ColumnSpec::reference("marketplace_id", "marketplace", EntityKind::Marketplace, true),
        ColumnSpec::field("period", SqlType::Text, true),
        ColumnSpec::field("quantity", SqlType::Integer, true),
        ColumnSpec::field("revenue", SqlType::Real, false),
    ],
    natural_key: &["sku_id", "marketplace_id", "period"],
    key_fields: &["sku", "marketplace", "period"],
    key_description: "sku, marketplace and period",
    normalization: Normalization::CodePreserve,
};

static LEFTOVER: EntitySpec = EntitySpec {
    kind: EntityKind::Leftover,
    table: "leftovers",
    fields: &[
        FieldSpec::required("warehouse", FieldType::Reference(EntityKind::Warehouse)),
        FieldSpec::required("sku", FieldType::Reference(EntityKind::Sku)),
        FieldSpec::required("quantity", FieldType::Integer { min: Some(0) }),
    ],
    columns: &[
        ColumnSpec::reference("warehouse_id", "warehouse", EntityKind::Warehouse, true),
        ColumnSpec::reference("sku_id", "sku", EntityKind::Sku, true),
        ColumnSpec::field("quantity", SqlType::Integer, true),
    ],
    natural_key: &["warehouse_id", "sku_id"],
    key_fields: &["warehouse", "sku"],
    key_description: "warehouse and sku",
    normalization: Normalization::CodePreserve,
};

static SEASONAL_COEFFICIENT: EntitySpec = EntitySpec {
    kind: EntityKind::SeasonalCoefficient,
    table: "seasonal_coefficients",
    fields: &[
        FieldSpec::required("group", FieldType::Reference(EntityKind::Group)),
        FieldSpec::required("month", FieldType::Month),
        FieldSpec::required("coefficient", FieldType::Decimal { min: Some(0.0) }),
    ],
    columns: &[
        ColumnSpec::reference("group_id", "group", EntityKind::Group, true),
        ColumnSpec::field("month", SqlType::Integer, true),
        ColumnSpec::field("coefficient", SqlType::Real, true),
    ],
    natural_key: &["group_id", "month"],
    key_fields: &["group", "month"],
    key_description: "group and month",
    normalization: Normalization::CodePreserve,
};

static COMPETITOR_PRODUCT: EntitySpec = EntitySpec {
    kind: EntityKind::CompetitorProduct,
    table: "competitor_products",
    fields: &[
        FieldSpec::required("code", FieldType::Code),
        FieldSpec::defaulted("title", FieldType::Text, "code"),
        FieldSpec::optional("marketplace", FieldType::Reference(EntityKind::Marketplace)),
        FieldSpec::optional("url", FieldType::Text),
        FieldSpec::optional("price", FieldType::Decimal { min: Some(0.0) }),
    ],
    columns: &[
        ColumnSpec::field("code", SqlType::Text, true),
        ColumnSpec::field("title", SqlType::Text, true),
        ColumnSpec::reference("marketplace_id", "marketplace", EntityKind::Marketplace, false),
        ColumnSpec::field("url", SqlType::Text, false),
        ColumnSpec::field("price", SqlType::Real, false),
    ],
    natural_key: &["code"],
    key_fields: &["code"],
    key_description: "code",
    normalization: Normalization::CodePreserve,
};

static SKU_COMPETITOR_MAPPING: EntitySpec = EntitySpec {
    kind: EntityKind::SkuCompetitorMapping,
    table: "sku_competitor_mappings",
    fields: &[
        FieldSpec::required("sku", FieldType::Reference(EntityKind::Sku)),
        FieldSpec::required(
            "competitor",
            FieldType::Reference(EntityKind::CompetitorProduct),
        ),
    ],
    columns: &[
        ColumnSpec::reference("sku_id", "sku", EntityKind::Sku, true),
        ColumnSpec::reference(
            "competitor_product_id",
            "competitor",
            EntityKind::CompetitorProduct,
            true,
        ),
    ],
    natural_key: &["sku_id", "competitor_product_id"],
    key_fields: &["sku", "competitor"],
    key_description: "sku and competitor",
    normalization: Normalization::CodePreserve,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_spec_matches_its_kind() {
        for kind in EntityKind::ALL {
            assert_eq!(kind.spec().kind, kind);
        }
    }

    #[test]
    fn test_natural_key_columns_exist() {
        for kind in EntityKind::ALL {
            let spec = kind.spec();
            for key in spec.natural_key {
                assert!(spec.column_index(key).is_some(), "{}: {}", kind, key);
            }
            assert_eq!(spec.natural_key.len(), spec.key_fields.len());
        }
    }

    #[test]
    fn test_references_point_backwards_in_dependency_order() {
        let order = |k: EntityKind| EntityKind::ALL.iter().position(|x| *x == k).unwrap();
        for kind in EntityKind::ALL {
            for (_, target) in kind.spec().references() {
                assert!(target.is_code_entity());
                assert!(order(target) < order(kind), "{} -> {}", kind, target);
            }
        }
    }

    #[test]
    fn test_update_columns_exclude_key_and_immutable() {
        let spec = EntityKind::Brand.spec();
        assert_eq!(spec.update_columns(), vec!["title"]);

        let spec = EntityKind::SalesHistory.spec();
        assert_eq!(spec.update_columns(), vec!["quantity", "revenue"]);
    }

    #[test]
    fn test_parse_entity_kind() {
        assert_eq!("brands".parse::<EntityKind>().unwrap(), EntityKind::Brand);
        assert_eq!("sales-history".parse::<EntityKind>().unwrap(), EntityKind::SalesHistory);
        assert_eq!("SKU".parse::<EntityKind>().unwrap(), EntityKind::Sku);
        assert!("widgets".parse::<EntityKind>().is_err());
    }

    #[test]
    fn test_export_fields() {
        assert_eq!(EntityKind::Brand.spec().export_fields(), vec!["code", "title"]);
        assert_eq!(
            EntityKind::Leftover.spec().export_fields(),
            vec!["warehouse", "sku", "quantity"]
        );
    }
}
