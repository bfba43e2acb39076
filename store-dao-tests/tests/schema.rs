mod common;

use store_dao::{QueryGenerator, QueryKind, schema::Dialect, sqlx};
use store_dao_tests::SCHEMA;

#[tokio::test]
async fn test_introspected_schema() {
    let config = common::config();
    let pool = config.connect().await.expect("Failed to connect");

    sqlx::raw_sql(SCHEMA)
        .execute(&pool)
        .await
        .expect("Failed to create tables");

    let schema = config.schema(&pool).await.expect("Failed to introspect");

    assert_eq!(schema.dialect, Dialect::Sqlite);
    assert_eq!(
        schema.tables.keys().map(String::as_str).collect::<Vec<_>>(),
        ["Price", "Product", "Purchase", "Status"]
    );

    let purchase = schema.table("Purchase").expect("Missing purchase table");
    assert_eq!(purchase.name, "purchase");
    assert_eq!(purchase.primary_key, "id");
    assert_eq!(
        purchase
            .foreign_keys()
            .map(|e| (e.name.as_str(), e.field_name.as_str()))
            .collect::<Vec<_>>(),
        [("product_id", "product"), ("status_id", "status")]
    );

    let generator = QueryGenerator::new(schema.into());
    assert_eq!(
        generator
            .query_for(QueryKind::Insert, "Purchase")
            .expect("Failed to generate query"),
        r#"INSERT INTO "purchase" ("quantity", "note", "product_id", "status_id") VALUES (?, ?, ?, ?)"#
    );
}
