use convert_case::{Case, Casing};
use sqlparser::{
    ast::{ColumnDef, ColumnOption, CreateTable, ObjectName, ObjectNamePart, Statement, TableConstraint},
    dialect::SQLiteDialect,
    parser::{Parser, ParserError},
};
use thiserror::Error;

use crate::schema::{DatabaseColumn, DatabaseTable};

#[derive(Error, Debug)]
pub enum DdlError {
    #[error("failed to parse table definition: {0}")]
    Parse(#[from] ParserError),

    #[error("table `{0}` has no single-column primary key")]
    MissingPrimaryKey(String),
}

/// Parse every `CREATE TABLE` statement in `query` into a [`DatabaseTable`]. Other statements
/// are ignored.
///
/// Field names are derived from column names: foreign key columns lose their `_id` suffix
/// (`price_id` maps to the `price` field), everything is converted to snake case. The entity
/// name is the table name in pascal case.
///
/// # Errors
///
/// If the SQL cannot be parsed, or a table lacks a single-column primary key.
pub fn parse_tables(query: &str) -> Result<Vec<DatabaseTable>, DdlError> {
    let ast = Parser::parse_sql(&SQLiteDialect {}, query)?;

    ast.iter()
        .filter_map(|e| {
            if let Statement::CreateTable(statement) = e {
                Some(statement)
            } else {
                None
            }
        })
        .map(table_from_create)
        .collect()
}

fn table_from_create(create_table: &CreateTable) -> Result<DatabaseTable, DdlError> {
    let name = object_name(&create_table.name);

    let mut primary_key = create_table
        .columns
        .iter()
        .find(|e| is_primary_key(e))
        .map(|e| e.name.value.clone());

    let mut constraint_foreign_keys = vec![];

    for constraint in &create_table.constraints {
        match constraint {
            TableConstraint::PrimaryKey { columns, .. } if columns.len() == 1 => {
                primary_key = primary_key.or_else(|| columns.first().map(|e| unquote(&e.to_string())));
            }
            TableConstraint::ForeignKey { columns, .. } if columns.len() == 1 => {
                constraint_foreign_keys.extend(columns.iter().map(|e| unquote(&e.to_string())));
            }
            _ => {}
        }
    }

    let primary_key = primary_key
        .or_else(|| {
            create_table
                .primary_key
                .as_ref()
                .map(|e| unquote(&e.to_string()))
        })
        .ok_or_else(|| DdlError::MissingPrimaryKey(name.clone()))?;

    let columns = create_table
        .columns
        .iter()
        .map(|e| {
            let column_name = e.name.value.clone();
            let foreign_key = has_references(e)
                || constraint_foreign_keys
                    .iter()
                    .any(|c| c.eq_ignore_ascii_case(&column_name));

            DatabaseColumn {
                field_name: field_name_for(&column_name, foreign_key),
                name: column_name,
                foreign_key,
            }
        })
        .collect();

    Ok(DatabaseTable {
        entity: name.to_case(Case::Pascal),
        name,
        primary_key,
        columns,
    })
}

fn object_name(name: &ObjectName) -> String {
    name.0
        .iter()
        .map(|e| {
            let ObjectNamePart::Identifier(ident) = e;

            ident.value.clone()
        })
        .next_back()
        .unwrap_or_default()
}

fn is_primary_key(column: &ColumnDef) -> bool {
    column.options.iter().any(|e| {
        matches!(
            e.option,
            ColumnOption::Unique {
                is_primary: true,
                ..
            }
        )
    })
}

fn has_references(column: &ColumnDef) -> bool {
    column
        .options
        .iter()
        .any(|e| matches!(e.option, ColumnOption::ForeignKey { .. }))
}

fn unquote(identifier: &str) -> String {
    identifier
        .trim_matches(|c| c == '"' || c == '`' || c == '[' || c == ']')
        .to_string()
}

/// Derive the entity field name for a column.
#[must_use]
pub fn field_name_for(column_name: &str, foreign_key: bool) -> String {
    let lower = column_name.to_lowercase();

    let base = if foreign_key {
        lower
            .strip_suffix("_id")
            .filter(|e| !e.is_empty())
            .unwrap_or(&lower)
    } else {
        &lower
    };

    base.to_case(Case::Snake)
}
