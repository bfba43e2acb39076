pub mod config;
pub mod connection;
pub mod dao;
pub mod entity;
pub mod error;
pub mod introspect;
pub mod query;
pub mod session;

#[cfg(test)]
mod test_support;

pub use config::StoreConfig;
pub use connection::{Connection, ConnectionProvider, Record};
pub use dao::{Dao, Lookup};
pub use entity::{
    Entity,
    metadata::{EntityMetadata, FieldType},
    registry::EntityRegistry,
    value::{FieldValue, Value, ValueKind},
};
pub use error::{DaoError, MappingError, QueryGenerationError};
pub use query::{QueryGenerator, QueryKind};
pub use session::{DaoFactory, DaoSession};

/// Derive macro to implement [`Entity`].
pub use store_dao_macros::Entity;

pub use sqlx;
pub use store_dao_schema as schema;
