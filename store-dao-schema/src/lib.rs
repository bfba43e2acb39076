//! Table and column metadata consumed by the `store-dao` persistence layer.
//!
//! The schema is read-only once built. It is produced either from live introspection
//! (see `store_dao::introspect`), from `CREATE TABLE` statements via [`query::parse_tables`],
//! or from a JSON file written by the `store-dao-cli generate-schema` command.

pub mod db;
pub mod query;
pub mod schema;

pub use db::Dialect;
pub use schema::{DatabaseColumn, DatabaseTable, SchemaError, SchemaMetadata};
