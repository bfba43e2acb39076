use std::sync::Arc;

use store_dao::{DaoFactory, StoreConfig, sqlx};
use store_dao_tests::{SCHEMA, registry};

/// A single-connection in-memory database holding the storefront tables. Every connection
/// to `sqlite::memory:` is a database of its own, so the pool must not open a second one.
pub fn config() -> StoreConfig {
    StoreConfig {
        database_url: Some("sqlite::memory:".into()),
        max_connections: 1,
        acquire_timeout_secs: 1,
        ..Default::default()
    }
}

pub async fn storefront(transactional: bool) -> DaoFactory {
    let config = config();
    let pool = config.connect().await.expect("Failed to connect");

    sqlx::raw_sql(SCHEMA)
        .execute(&pool)
        .await
        .expect("Failed to create tables");

    let schema = config.schema(&pool).await.expect("Failed to introspect");

    DaoFactory::new(Arc::new(pool), Arc::new(schema), registry(), transactional)
        .expect("Failed to create factory")
}
