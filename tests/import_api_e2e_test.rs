// ==========================================
// 导入 API 端到端测试
// ==========================================
// 模拟调用方经 ImportApi 完成导入 → 重导入 → 导出 → 清除的完整流程

use inventory_import::api::{ApiError, ImportApi};
use inventory_import::{EntityKind, ImportSource, ShopScope};
use serde_json::json;

mod test_helpers;
use test_helpers::{count_rows, create_test_db, title_of, write_input_file};

fn scope() -> ShopScope {
    ShopScope::new(1, 100)
}

#[tokio::test]
async fn test_csv_import_creates_rows() {
    let (_temp_file, db_path) = create_test_db().expect("创建测试数据库失败");
    let api = ImportApi::new(db_path.clone());

    let result = api
        .import(
            EntityKind::Brand,
            scope(),
            ImportSource::Csv(b"code,title\nABC,Product A\nDEF,Product B".to_vec()),
        )
        .await
        .unwrap();

    assert_eq!(result.created, 2);
    assert_eq!(result.updated, 0);
    assert!(result.errors.is_empty());
    assert_eq!(count_rows(&db_path, EntityKind::Brand, scope()), 2);
}

#[tokio::test]
async fn test_csv_missing_required_value_is_fatal() {
    let (_temp_file, db_path) = create_test_db().expect("创建测试数据库失败");
    let api = ImportApi::new(db_path.clone());

    let err = api
        .import(
            EntityKind::Brand,
            scope(),
            ImportSource::Csv(b"code,title\nABC,Product A\n,Product B".to_vec()),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::ValidationError(_)));
    assert_eq!(
        err.to_string(),
        r#"Row 3: "code" is required but empty or missing"#
    );
    assert_eq!(count_rows(&db_path, EntityKind::Brand, scope()), 0);
}

#[tokio::test]
async fn test_semicolon_csv_with_quoted_comma() {
    let (_temp_file, db_path) = create_test_db().expect("创建测试数据库失败");
    let api = ImportApi::new(db_path.clone());

    let result = api
        .import(
            EntityKind::Brand,
            scope(),
            ImportSource::Csv(b"code;title\nABC;\"Product, with comma\"\nDEF;Simple".to_vec()),
        )
        .await
        .unwrap();

    assert_eq!(result.created, 2);
    assert_eq!(
        title_of(&db_path, EntityKind::Brand, scope(), "ABC").as_deref(),
        Some("Product, with comma")
    );
    assert_eq!(
        title_of(&db_path, EntityKind::Brand, scope(), "DEF").as_deref(),
        Some("Simple")
    );
}

#[tokio::test]
async fn test_sales_history_auto_creates_missing_sku() {
    let (_temp_file, db_path) = create_test_db().expect("创建测试数据库失败");
    let api = ImportApi::new(db_path.clone());

    let result = api
        .import(
            EntityKind::SalesHistory,
            scope(),
            ImportSource::Json(json!([
                {"sku": "NEW-1", "marketplace": "wb", "period": "2024-05", "quantity": 12}
            ])),
        )
        .await
        .unwrap();

    assert_eq!(result.created, 1);
    assert_eq!(result.dependency_created("skus_created"), Some(1));
    assert_eq!(result.dependency_created("marketplaces_created"), Some(1));
    assert_eq!(
        title_of(&db_path, EntityKind::Sku, scope(), "NEW-1").as_deref(),
        Some("NEW-1")
    );

    // 依赖计数以顶层字段序列化
    let value = serde_json::to_value(&result).unwrap();
    assert_eq!(value["skus_created"], 1);
}

#[tokio::test]
async fn test_same_json_import_twice_is_idempotent() {
    let (_temp_file, db_path) = create_test_db().expect("创建测试数据库失败");
    let api = ImportApi::new(db_path.clone());
    let payload = json!([
        {"code": "A", "title": "Alpha"},
        {"code": "B", "title": "Beta"},
        {"code": "C", "title": "Gamma"}
    ]);

    let first = api
        .import(EntityKind::Category, scope(), ImportSource::Json(payload.clone()))
        .await
        .unwrap();
    assert_eq!((first.created, first.updated), (3, 0));

    let second = api
        .import(EntityKind::Category, scope(), ImportSource::Json(payload))
        .await
        .unwrap();
    assert_eq!((second.created, second.updated), (0, 3));
    assert_eq!(count_rows(&db_path, EntityKind::Category, scope()), 3);
}

#[tokio::test]
async fn test_duplicate_code_in_batch_is_fatal() {
    let (_temp_file, db_path) = create_test_db().expect("创建测试数据库失败");
    let api = ImportApi::new(db_path.clone());

    let err = api
        .import(
            EntityKind::Sku,
            scope(),
            ImportSource::Json(json!([
                {"code": "A", "brand": "ACME"},
                {"code": "B", "brand": "ACME"},
                {"code": "A", "brand": "Other"}
            ])),
        )
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        r#"Duplicate code found: "A" in rows 1, 3. Each code must be unique."#
    );
    // 重复键在依赖自动创建之前中止
    assert_eq!(count_rows(&db_path, EntityKind::Sku, scope()), 0);
    assert_eq!(count_rows(&db_path, EntityKind::Brand, scope()), 0);
}

#[tokio::test]
async fn test_invalid_items_are_reported_and_rest_is_written() {
    let (_temp_file, db_path) = create_test_db().expect("创建测试数据库失败");
    let api = ImportApi::new(db_path.clone());

    let result = api
        .import(
            EntityKind::Leftover,
            scope(),
            ImportSource::Json(json!([
                {"warehouse": "main store", "sku": "S-1", "quantity": 5},
                {"warehouse": "main store", "sku": "S-2", "quantity": -1},
                {"warehouse": "main store", "sku": "S-3", "quantity": "many"}
            ])),
        )
        .await
        .unwrap();

    assert_eq!(result.created, 1);
    assert_eq!(result.errors.len(), 2);
    assert!(result.errors[0].contains("\"quantity\" must be at least 0, got -1"));
    assert!(result.errors[1].contains("\"quantity\" must be an integer, got \"many\""));
    assert_eq!(result.dependency_created("warehouses_created"), Some(1));
}

#[tokio::test]
async fn test_non_array_json_is_rejected() {
    let (_temp_file, db_path) = create_test_db().expect("创建测试数据库失败");
    let api = ImportApi::new(db_path);

    let err = api
        .import(
            EntityKind::Brand,
            scope(),
            ImportSource::Json(json!({"code": "A"})),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::ValidationError(_)));
}

#[tokio::test]
async fn test_import_file_dispatches_on_extension() {
    let (_temp_file, db_path) = create_test_db().expect("创建测试数据库失败");
    let api = ImportApi::new(db_path.clone());

    let (_csv, csv_path) = write_input_file(".csv", "code,title\nX1,First\n");
    let (_json, json_path) = write_input_file(".json", r#"[{"code": "X2"}]"#);

    let first = api
        .import_file(EntityKind::Supplier, scope(), &csv_path)
        .await
        .unwrap();
    let second = api
        .import_file(EntityKind::Supplier, scope(), &json_path)
        .await
        .unwrap();

    assert_eq!(first.created, 1);
    assert_eq!(second.created, 1);
    assert_eq!(
        title_of(&db_path, EntityKind::Supplier, scope(), "X2").as_deref(),
        Some("X2")
    );

    let (_bad, bad_path) = write_input_file(".json", "not json");
    let err = api
        .import_file(EntityKind::Supplier, scope(), &bad_path)
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("Invalid JSON payload"));
}

#[tokio::test]
async fn test_shops_are_isolated() {
    let (_temp_file, db_path) = create_test_db().expect("创建测试数据库失败");
    let api = ImportApi::new(db_path.clone());
    let shop_a = ShopScope::new(1, 100);
    let shop_b = ShopScope::new(2, 100);
    let payload = json!([{"code": "SHARED", "title": "A's"}]);

    api.import(EntityKind::Brand, shop_a, ImportSource::Json(payload))
        .await
        .unwrap();
    let result = api
        .import(
            EntityKind::Brand,
            shop_b,
            ImportSource::Json(json!([{"code": "SHARED", "title": "B's"}])),
        )
        .await
        .unwrap();

    // 同编码在另一店铺是全新行，且不改写 A 店铺数据
    assert_eq!((result.created, result.updated), (1, 0));
    assert_eq!(
        title_of(&db_path, EntityKind::Brand, shop_a, "SHARED").as_deref(),
        Some("A's")
    );
}

#[tokio::test]
async fn test_wipe_shop_only_clears_own_scope() {
    let (_temp_file, db_path) = create_test_db().expect("创建测试数据库失败");
    let api = ImportApi::new(db_path.clone());
    let shop_a = ShopScope::new(1, 100);
    let shop_b = ShopScope::new(2, 100);
    let payload = json!([
        {"warehouse": "main", "sku": "S-1", "quantity": 1},
        {"warehouse": "main", "sku": "S-2", "quantity": 2}
    ]);

    api.import(EntityKind::Leftover, shop_a, ImportSource::Json(payload.clone()))
        .await
        .unwrap();
    api.import(EntityKind::Leftover, shop_b, ImportSource::Json(payload))
        .await
        .unwrap();

    let response = api.wipe_shop(shop_a).await.unwrap();
    assert_eq!(response.deleted.get("leftovers"), Some(&2));
    assert_eq!(response.deleted.get("skus"), Some(&2));
    assert_eq!(response.deleted.get("warehouses"), Some(&1));
    assert_eq!(response.total, 5);

    assert_eq!(count_rows(&db_path, EntityKind::Sku, shop_a), 0);
    assert_eq!(count_rows(&db_path, EntityKind::Sku, shop_b), 2);
    assert_eq!(count_rows(&db_path, EntityKind::Leftover, shop_b), 2);
}

#[tokio::test]
async fn test_unopenable_database_is_connection_error() {
    let dir = tempfile::tempdir().expect("创建临时目录失败");
    let db_path = dir.path().join("missing").join("inventory.db");
    let api = ImportApi::new(db_path.to_string_lossy().to_string());

    let err = api
        .import(
            EntityKind::Brand,
            scope(),
            ImportSource::Json(json!([{"code": "A"}])),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::DatabaseConnectionError(_)));
}
