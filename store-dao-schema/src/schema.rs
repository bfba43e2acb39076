use std::{collections::BTreeMap, path::Path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::Dialect;

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("failed to access schema file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed schema JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DatabaseColumn {
    /// Column name as it appears in the database.
    pub name: String,
    /// Name of the entity field this column is mapped to.
    pub field_name: String,
    /// Whether the column references another entity's primary key. The mapped field must
    /// then hold that entity.
    #[serde(default)]
    pub foreign_key: bool,
}

impl DatabaseColumn {
    pub fn new(name: impl Into<String>, field_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_name: field_name.into(),
            foreign_key: false,
        }
    }

    pub fn foreign_key(name: impl Into<String>, field_name: impl Into<String>) -> Self {
        Self {
            foreign_key: true,
            ..Self::new(name, field_name)
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DatabaseTable {
    pub name: String,
    /// Name of the entity type persisted in this table.
    pub entity: String,
    pub primary_key: String,
    /// All columns in declaration order, primary key included.
    pub columns: Vec<DatabaseColumn>,
}

impl DatabaseTable {
    pub fn new(
        name: impl Into<String>,
        entity: impl Into<String>,
        primary_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            entity: entity.into(),
            primary_key: primary_key.into(),
            columns: vec![],
        }
    }

    #[must_use]
    pub fn with_column(mut self, column: DatabaseColumn) -> Self {
        self.columns.push(column);
        self
    }

    #[must_use]
    pub fn is_primary_key(&self, column: &DatabaseColumn) -> bool {
        column.name.eq(&self.primary_key)
    }

    /// Every column except the primary key, in declaration order. These are the columns
    /// written by inserts and updates.
    pub fn value_columns(&self) -> impl Iterator<Item = &DatabaseColumn> {
        self.columns.iter().filter(|e| !self.is_primary_key(e))
    }

    pub fn foreign_keys(&self) -> impl Iterator<Item = &DatabaseColumn> {
        self.columns.iter().filter(|e| e.foreign_key)
    }

    #[must_use]
    pub fn find_column(&self, name: &str) -> Option<&DatabaseColumn> {
        self.columns.iter().find(|e| e.name.eq(name))
    }

    #[must_use]
    pub fn column_for_field(&self, field_name: &str) -> Option<&DatabaseColumn> {
        self.columns.iter().find(|e| e.field_name.eq(field_name))
    }
}

/// Process-wide description of every mapped table, keyed by entity name.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaMetadata {
    #[serde(default)]
    pub dialect: Dialect,
    pub tables: BTreeMap<String, DatabaseTable>,
}

impl SchemaMetadata {
    #[must_use]
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            tables: BTreeMap::new(),
        }
    }

    pub fn from_tables(dialect: Dialect, tables: impl IntoIterator<Item = DatabaseTable>) -> Self {
        Self {
            dialect,
            tables: tables
                .into_iter()
                .map(|e| (e.entity.clone(), e))
                .collect(),
        }
    }

    pub fn add_table(&mut self, table: DatabaseTable) {
        self.tables.insert(table.entity.clone(), table);
    }

    /// The table mapped to the given entity.
    #[must_use]
    pub fn table(&self, entity: &str) -> Option<&DatabaseTable> {
        self.tables.get(entity)
    }

    #[must_use]
    pub fn find_table(&self, name: &str) -> Option<&DatabaseTable> {
        self.tables.values().find(|e| e.name.eq(name))
    }

    #[must_use]
    pub fn quote(&self, identifier: &str) -> String {
        self.dialect.quote(identifier)
    }

    #[must_use]
    pub fn placeholder(&self, index: usize) -> String {
        self.dialect.placeholder(index)
    }

    /// # Errors
    ///
    /// If the input is not a valid schema document.
    pub fn from_json(input: &str) -> Result<Self, SchemaError> {
        Ok(serde_json::from_str(input)?)
    }

    /// # Errors
    ///
    /// If serialization fails, which only happens for non-string map keys.
    pub fn to_json(&self) -> Result<String, SchemaError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// # Errors
    ///
    /// If the file cannot be read or does not contain a valid schema document.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }
}
