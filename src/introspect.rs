use futures::TryStreamExt;
use sqlx::{AnyPool, Row};
use store_dao_schema::{
    Dialect, SchemaMetadata,
    query::{DdlError, parse_tables},
};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum IntrospectError {
    #[error("failed to read the database catalog: {0}")]
    Catalog(#[from] sqlx::Error),

    #[error("failed to parse the definition of table `{table}`: {source}")]
    Definition {
        table: String,
        #[source]
        source: DdlError,
    },
}

/// Build schema metadata from the `CREATE TABLE` statements a SQLite database stores in its
/// catalog. SQLite's internal tables are left out.
///
/// # Errors
///
/// If the catalog cannot be read, or a table definition cannot be parsed.
pub async fn introspect_sqlite(pool: &AnyPool) -> Result<SchemaMetadata, IntrospectError> {
    let rows = sqlx::query(
        "SELECT name, sql FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )
    .fetch(pool)
    .try_collect::<Vec<_>>()
    .await?;

    let mut schema = SchemaMetadata::new(Dialect::Sqlite);

    for row in rows {
        let name: String = row.try_get("name")?;
        let sql: String = row.try_get("sql")?;

        parse_tables(&sql)
            .map_err(|source| IntrospectError::Definition {
                table: name.clone(),
                source,
            })?
            .into_iter()
            .for_each(|e| schema.add_table(e));

        debug!(table = %name, "Introspected table");
    }

    Ok(schema)
}
