use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use serde::{Deserialize, Serialize};
use sqlx::{AnyPool, any::AnyPoolOptions};
use store_dao_schema::{Dialect, SchemaError, SchemaMetadata, db::get_database_url};
use thiserror::Error;
use tracing::info;

use crate::{
    entity::registry::EntityRegistry,
    error::DaoError,
    introspect::{IntrospectError, introspect_sqlite},
    session::DaoFactory,
};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(
        "missing database URL, set `database_url` in the config, or the `DATABASE_URL` environment variable"
    )]
    MissingDatabaseUrl,

    #[error("cannot tell the SQL dialect from `{0}`, set `dialect` in the config")]
    UnknownDialect(String),

    #[error("failed to connect to the database: {0}")]
    Connect(#[source] sqlx::Error),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Introspect(#[from] IntrospectError),

    #[error("no schema file is configured, and only SQLite databases can be introspected")]
    MissingSchema,

    #[error(transparent)]
    Dao(#[from] DaoError),
}

/// Settings for connecting to the store, usually read from a TOML file.
///
/// ```toml
/// database_url = "sqlite://store.db"
/// max_connections = 10
/// acquire_timeout_secs = 30
/// transactional = true
/// schema_file = "store_dao/schema.json"
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct StoreConfig {
    /// Falls back to `DATABASE_URL` from the environment or a `.env` file.
    pub database_url: Option<String>,
    pub max_connections: u32,
    /// How long opening a session waits for a free connection.
    pub acquire_timeout_secs: u64,
    pub transactional: bool,
    /// Inferred from the database URL if unset.
    pub dialect: Option<Dialect>,
    /// Schema JSON as written by `store-dao-cli generate-schema`. SQLite databases are
    /// introspected if unset.
    pub schema_file: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: 10,
            acquire_timeout_secs: 30,
            transactional: true,
            dialect: None,
            schema_file: None,
        }
    }
}

impl StoreConfig {
    /// # Errors
    ///
    /// If `input` is not valid TOML for this struct.
    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(input)?)
    }

    /// # Errors
    ///
    /// If the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_toml(&std::fs::read_to_string(path)?)
    }

    /// # Errors
    ///
    /// If neither the config nor the environment provide a URL.
    pub fn database_url(&self) -> Result<String, ConfigError> {
        self.database_url
            .clone()
            .or_else(get_database_url)
            .ok_or(ConfigError::MissingDatabaseUrl)
    }

    /// # Errors
    ///
    /// If no dialect is configured and none can be inferred from the database URL.
    pub fn dialect(&self) -> Result<Dialect, ConfigError> {
        if let Some(dialect) = self.dialect {
            return Ok(dialect);
        }

        let url = self.database_url()?;

        Dialect::from_connection_string(&url).ok_or(ConfigError::UnknownDialect(url))
    }

    /// Open a connection pool of bounded size, whose acquisition gives up after the
    /// configured timeout.
    ///
    /// # Errors
    ///
    /// If there is no database URL, or the first connection cannot be established.
    pub async fn connect(&self) -> Result<AnyPool, ConfigError> {
        sqlx::any::install_default_drivers();

        AnyPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(Duration::from_secs(self.acquire_timeout_secs))
            .connect(&self.database_url()?)
            .await
            .map_err(ConfigError::Connect)
    }

    /// The configured schema file, or else the introspected schema of a SQLite database.
    /// Either way, the configured dialect wins over the one recorded in the schema.
    ///
    /// # Errors
    ///
    /// If the schema file cannot be read, or introspection fails or is not possible.
    pub async fn schema(&self, pool: &AnyPool) -> Result<SchemaMetadata, ConfigError> {
        let dialect = self.dialect()?;

        let mut schema = match &self.schema_file {
            Some(path) => SchemaMetadata::load(path)?,
            None if dialect == Dialect::Sqlite => introspect_sqlite(pool).await?,
            None => return Err(ConfigError::MissingSchema),
        };

        schema.dialect = dialect;

        Ok(schema)
    }

    /// Connect, load the schema, and check `registry` against it.
    ///
    /// # Errors
    ///
    /// See [`StoreConfig::connect`], [`StoreConfig::schema`] and [`DaoFactory::new`].
    pub async fn dao_factory(&self, registry: EntityRegistry) -> Result<DaoFactory, ConfigError> {
        let pool = self.connect().await?;
        let schema = self.schema(&pool).await?;

        info!(
            dialect = %schema.dialect,
            tables = schema.tables.len(),
            "Loaded store schema"
        );

        Ok(DaoFactory::new(
            Arc::new(pool),
            Arc::new(schema),
            registry,
            self.transactional,
        )?)
    }
}
