use std::fmt::Display;

use thiserror::Error;

use crate::{entity::value::ValueError, query::QueryKind};

/// Failures resolving fields on an entity, or converting values in and out of them.
#[derive(Error, Debug)]
pub enum MappingError {
    #[error("entity `{entity}` has no field named `{field}`")]
    UnknownField { entity: &'static str, field: String },

    #[error("field `{field}` of entity `{entity}` holds another entity and cannot be accessed as a plain value")]
    NotScalar { entity: &'static str, field: String },

    #[error("column `{column}` of entity `{entity}` is {column_kind}, but field `{field}` is {field_kind}")]
    KindMismatch {
        entity: &'static str,
        column: String,
        field: String,
        column_kind: &'static str,
        field_kind: &'static str,
    },

    #[error("cannot convert value of field `{field}` on entity `{entity}`: {source}")]
    Conversion {
        entity: &'static str,
        field: String,
        #[source]
        source: ValueError,
    },

    #[error("column `{column}` is missing from the result row of entity `{entity}`")]
    MissingColumn { entity: &'static str, column: String },

    #[error("primary key column `{column}` of entity `{entity}` holds {found}, expected an integer")]
    InvalidIdentity {
        entity: &'static str,
        column: String,
        found: String,
    },

    #[error("foreign key column `{column}` of entity `{entity}` holds {found}, expected an integer")]
    InvalidReference {
        entity: &'static str,
        column: String,
        found: String,
    },

    #[error("entity `{0}` is not registered")]
    Unregistered(&'static str),
}

/// Failures generating SQL from schema metadata.
#[derive(Error, Debug)]
pub enum QueryGenerationError {
    #[error("no table is mapped for entity `{0}`")]
    UnmappedEntity(String),

    #[error("table `{table}` has no column mapped to field `{field}`")]
    UnknownField { table: String, field: String },

    #[error("{0} queries are built from filter fields, use the find-by-parameters query instead")]
    NeedsParameters(QueryKind),
}

/// The data-access operation that failed, for error context and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Insert,
    ReadLast,
    Find,
    Update,
    Delete,
    ReadAll,
    FindByParameters,
    Transaction,
}

impl Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Insert => "insert",
                Self::ReadLast => "read last",
                Self::Find => "find",
                Self::Update => "update",
                Self::Delete => "delete",
                Self::ReadAll => "read all",
                Self::FindByParameters => "find by parameters",
                Self::Transaction => "transaction",
            }
        )
    }
}

#[derive(Error, Debug)]
pub enum DaoError {
    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error(transparent)]
    Query(#[from] QueryGenerationError),

    #[error("failed to acquire a database connection: {0}")]
    Acquire(#[source] sqlx::Error),

    #[error("{operation} on `{entity}` failed: {source}")]
    Store {
        entity: &'static str,
        operation: Operation,
        #[source]
        source: sqlx::Error,
    },

    #[error("{operation} on `{entity}` affected {actual} rows, expected {expected}")]
    AffectedRows {
        entity: &'static str,
        operation: Operation,
        expected: &'static str,
        actual: u64,
    },

    #[error("`{entity}` with id {id} was not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("`{entity}` with id {id} matched {rows} rows")]
    Ambiguous {
        entity: &'static str,
        id: i64,
        rows: usize,
    },

    #[error("the row just inserted into `{entity}` could not be read back")]
    MissingInsertedRow { entity: &'static str },

    #[error("transaction on `{entity}` was rolled back after a nested operation failed")]
    RolledBack { entity: &'static str },

    #[error("cannot use a session for `{entity}` after one of its operations was cancelled")]
    Interrupted { entity: &'static str },

    #[error("`{entity}` has no identity yet, it must be inserted before {operation}")]
    Unpersisted {
        entity: &'static str,
        operation: Operation,
    },
}

pub type Result<T, E = DaoError> = std::result::Result<T, E>;
