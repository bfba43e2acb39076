use std::path::PathBuf;

use clap::Parser;
use eyre::Context;
use store_dao::{StoreConfig, introspect::introspect_sqlite};
use store_dao_schema::{Dialect, db::get_database_url};
use tracing::info;

/// (Re-)Generate the database schema in JSON format
#[derive(Parser, Debug)]
pub struct GenerateSchema {
    /// The URL to the database for which to generate the schema. If left unset, will be pulled
    /// from the `DATABASE_URL` environment variable, or a corresponding `.env` file instead.
    #[arg(short, long, value_name = "DATABASE_URL")]
    database_url: Option<String>,

    /// Where to write the schema.
    #[arg(short, long, default_value = "store_dao/schema.json")]
    output: PathBuf,
}

impl GenerateSchema {
    pub async fn run(&self) -> eyre::Result<()> {
        let Some(database_url) = self.database_url.clone().or_else(get_database_url) else {
            return Err(eyre::eyre!(
                "Missing database URL, either set the `DATABASE_URL` environment variable, or specify it manually via --database-url [URL]"
            ));
        };

        let Some(dialect) = Dialect::from_connection_string(&database_url) else {
            return Err(eyre::eyre!(
                "Failed to determine database type from connection string, ensure it starts with either `postgres`, `mysql`, or `sqlite`."
            ));
        };

        if dialect != Dialect::Sqlite {
            return Err(eyre::eyre!(
                "Only SQLite databases can be introspected, write the schema for {dialect} by hand."
            ));
        }

        let config = StoreConfig {
            database_url: Some(database_url),
            max_connections: 1,
            ..Default::default()
        };

        let pool = config
            .connect()
            .await
            .context("Failed to connect to database")?;

        let schema = introspect_sqlite(&pool)
            .await
            .context("Failed to introspect database")?;

        if let Some(parent) = self.output.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create schema directory")?;
        }

        tokio::fs::write(
            &self.output,
            schema.to_json().context("Failed to serialize schema")?,
        )
        .await
        .context("Failed to write schema")?;

        info!(
            tables = schema.tables.len(),
            "Schema file updated under {}",
            self.output.display()
        );

        Ok(())
    }
}
