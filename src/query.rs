use std::{fmt::Display, sync::Arc};

use itertools::Itertools;
use store_dao_schema::{DatabaseTable, SchemaMetadata};

use crate::{entity::Entity, error::QueryGenerationError};

/// The statements generated for every mapped table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Insert,
    FindById,
    UpdateById,
    DeleteById,
    ReadAll,
    /// The row with the highest primary key. Used to recover the identity generated by an
    /// insert; a concurrent insert from another session can win the race.
    ReadLast,
    FindByParameters,
}

impl QueryKind {
    pub const ALL: [Self; 7] = [
        Self::Insert,
        Self::FindById,
        Self::UpdateById,
        Self::DeleteById,
        Self::ReadAll,
        Self::ReadLast,
        Self::FindByParameters,
    ];
}

impl Display for QueryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Insert => "INSERT",
                Self::FindById => "FIND_BY_ID",
                Self::UpdateById => "UPDATE_BY_ID",
                Self::DeleteById => "DELETE_BY_ID",
                Self::ReadAll => "READ_ALL",
                Self::ReadLast => "READ_LAST",
                Self::FindByParameters => "FIND_BY_PARAMETERS",
            }
        )
    }
}

/// Builds parameterized SQL from schema metadata. Stateless apart from the shared schema.
#[derive(Debug, Clone)]
pub struct QueryGenerator {
    schema: Arc<SchemaMetadata>,
}

impl QueryGenerator {
    #[must_use]
    pub const fn new(schema: Arc<SchemaMetadata>) -> Self {
        Self { schema }
    }

    #[must_use]
    pub fn schema(&self) -> &SchemaMetadata {
        &self.schema
    }

    /// # Errors
    ///
    /// If no table is mapped for `entity`, or `kind` is [`QueryKind::FindByParameters`].
    pub fn query_for(&self, kind: QueryKind, entity: &str) -> Result<String, QueryGenerationError> {
        let table = self.table(entity)?;

        Ok(match kind {
            QueryKind::Insert => self.insert(table),
            QueryKind::FindById => format!("{} WHERE {}", self.select(table), self.primary_key_predicate(table, 1)),
            QueryKind::UpdateById => self.update(table),
            QueryKind::DeleteById => format!(
                "DELETE FROM {} WHERE {}",
                self.schema.quote(&table.name),
                self.primary_key_predicate(table, 1)
            ),
            QueryKind::ReadAll => self.select(table),
            QueryKind::ReadLast => format!(
                "{} ORDER BY {} DESC LIMIT 1",
                self.select(table),
                self.schema.quote(&table.primary_key)
            ),
            QueryKind::FindByParameters => {
                return Err(QueryGenerationError::NeedsParameters(kind));
            }
        })
    }

    /// # Errors
    ///
    /// See [`QueryGenerator::query_for`].
    pub fn query_for_entity<E>(&self, kind: QueryKind) -> Result<String, QueryGenerationError>
    where
        E: Entity,
    {
        self.query_for(kind, E::NAME)
    }

    /// A `SELECT` matching rows where every given field equals a bound parameter, joined with
    /// `AND` in the order given. Without fields every row matches.
    ///
    /// # Errors
    ///
    /// If no table is mapped for `entity`, or a field has no column.
    pub fn find_by_parameters_query<S>(
        &self,
        entity: &str,
        fields: &[S],
    ) -> Result<String, QueryGenerationError>
    where
        S: AsRef<str>,
    {
        let table = self.table(entity)?;

        let predicates = fields
            .iter()
            .enumerate()
            .map(|(i, e)| {
                let field = e.as_ref();

                table
                    .column_for_field(field)
                    .map(|column| {
                        format!(
                            "{} = {}",
                            self.schema.quote(&column.name),
                            self.schema.placeholder(i + 1)
                        )
                    })
                    .ok_or_else(|| QueryGenerationError::UnknownField {
                        table: table.name.clone(),
                        field: field.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if predicates.is_empty() {
            Ok(self.select(table))
        } else {
            Ok(format!("{} WHERE {}", self.select(table), predicates.join(" AND ")))
        }
    }

    fn table(&self, entity: &str) -> Result<&DatabaseTable, QueryGenerationError> {
        self.schema
            .table(entity)
            .ok_or_else(|| QueryGenerationError::UnmappedEntity(entity.to_string()))
    }

    fn select(&self, table: &DatabaseTable) -> String {
        format!("SELECT * FROM {}", self.schema.quote(&table.name))
    }

    fn primary_key_predicate(&self, table: &DatabaseTable, index: usize) -> String {
        format!(
            "{} = {}",
            self.schema.quote(&table.primary_key),
            self.schema.placeholder(index)
        )
    }

    fn insert(&self, table: &DatabaseTable) -> String {
        let columns = table
            .value_columns()
            .map(|e| self.schema.quote(&e.name))
            .join(", ");

        let placeholders = (1..=table.value_columns().count())
            .map(|i| self.schema.placeholder(i))
            .join(", ");

        format!(
            "INSERT INTO {} ({columns}) VALUES ({placeholders})",
            self.schema.quote(&table.name)
        )
    }

    fn update(&self, table: &DatabaseTable) -> String {
        let assignments = table
            .value_columns()
            .enumerate()
            .map(|(i, e)| {
                format!(
                    "{} = {}",
                    self.schema.quote(&e.name),
                    self.schema.placeholder(i + 1)
                )
            })
            .join(", ");

        format!(
            "UPDATE {} SET {assignments} WHERE {}",
            self.schema.quote(&table.name),
            self.primary_key_predicate(table, table.value_columns().count() + 1)
        )
    }
}
