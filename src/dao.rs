use std::sync::Arc;

use store_dao_schema::{DatabaseColumn, DatabaseTable};
use tracing::debug;

use crate::{
    connection::Record,
    entity::{
        Entity,
        metadata::{EntityMetadata, Field},
        value::{Value, ValueKind},
    },
    error::{DaoError, MappingError, Operation, QueryGenerationError, Result},
    query::{QueryGenerator, QueryKind},
    session::DaoSession,
};

/// Outcome of reading a single row by primary key.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<E> {
    Found(E),
    NotFound,
    /// More rows than one matched; the primary key is not unique in the store.
    Ambiguous(usize),
}

impl<E> Lookup<E> {
    pub fn found(self) -> Option<E> {
        match self {
            Self::Found(e) => Some(e),
            Self::NotFound | Self::Ambiguous(_) => None,
        }
    }
}

/// Per-session state of one entity's DAO: where it is stored and the statements used.
pub struct DaoState<E>
where
    E: Entity,
{
    metadata: Arc<EntityMetadata<E>>,
    table: DatabaseTable,
    insert: String,
    find_by_id: String,
    update_by_id: String,
    delete_by_id: String,
    read_all: String,
    read_last: String,
}

impl<E> DaoState<E>
where
    E: Entity,
{
    pub(crate) fn new(metadata: Arc<EntityMetadata<E>>, generator: &QueryGenerator) -> Result<Self> {
        let table = generator
            .schema()
            .table(E::NAME)
            .cloned()
            .ok_or_else(|| QueryGenerationError::UnmappedEntity(E::NAME.to_string()))?;

        let query = |kind| generator.query_for(kind, E::NAME);

        Ok(Self {
            metadata,
            table,
            insert: query(QueryKind::Insert)?,
            find_by_id: query(QueryKind::FindById)?,
            update_by_id: query(QueryKind::UpdateById)?,
            delete_by_id: query(QueryKind::DeleteById)?,
            read_all: query(QueryKind::ReadAll)?,
            read_last: query(QueryKind::ReadLast)?,
        })
    }

    #[must_use]
    pub const fn table(&self) -> &DatabaseTable {
        &self.table
    }
}

/// CRUD access to the table of `E`, running on a session's connection.
///
/// Entities referenced through foreign keys are read, inserted and deleted through the DAOs
/// of their own types on the same session.
pub struct Dao<'s, E>
where
    E: Entity,
{
    session: &'s mut DaoSession,
    state: Arc<DaoState<E>>,
}

impl<'s, E> Dao<'s, E>
where
    E: Entity,
{
    pub(crate) const fn new(session: &'s mut DaoSession, state: Arc<DaoState<E>>) -> Self {
        Self { session, state }
    }

    #[must_use]
    pub fn table(&self) -> &DatabaseTable {
        &self.state.table
    }

    #[must_use]
    pub fn metadata(&self) -> &EntityMetadata<E> {
        &self.state.metadata
    }

    /// Insert `entity` and set its identity to the generated primary key, which is also
    /// returned. Referenced entities without an identity are inserted first.
    ///
    /// # Errors
    ///
    /// If the store fails, the insert does not affect exactly one row, or the inserted row
    /// cannot be read back.
    pub async fn insert(&mut self, entity: &mut E) -> Result<i64> {
        let scope = self.session.begin(E::NAME).await?;
        let result = self.insert_unscoped(entity).await;
        self.session.finish(scope, E::NAME, result).await
    }

    async fn insert_unscoped(&mut self, entity: &mut E) -> Result<i64> {
        let state = Arc::clone(&self.state);
        let params = self.column_values(entity).await?;

        let affected = self
            .session
            .execute(E::NAME, Operation::Insert, &state.insert, params)
            .await?;

        if affected != 1 {
            return Err(DaoError::AffectedRows {
                entity: E::NAME,
                operation: Operation::Insert,
                expected: "exactly 1",
                actual: affected,
            });
        }

        let record = self
            .session
            .fetch_all(E::NAME, Operation::ReadLast, &state.read_last, vec![])
            .await?
            .into_iter()
            .next()
            .ok_or(DaoError::MissingInsertedRow { entity: E::NAME })?;

        let id = identity::<E>(&state.table, &record)?;
        entity.set_id(id);

        debug!(entity = E::NAME, id, "Inserted");

        Ok(id)
    }

    /// # Errors
    ///
    /// If the store fails, or not exactly one row has the given id.
    pub async fn find(&mut self, id: i64) -> Result<E> {
        match self.lookup(id).await? {
            Lookup::Found(e) => Ok(e),
            Lookup::NotFound => Err(DaoError::NotFound {
                entity: E::NAME,
                id,
            }),
            Lookup::Ambiguous(rows) => Err(DaoError::Ambiguous {
                entity: E::NAME,
                id,
                rows,
            }),
        }
    }

    /// Like [`Dao::find`], but reports a missing or duplicated row as a [`Lookup`] instead of
    /// an error.
    ///
    /// # Errors
    ///
    /// If the store fails, or the row cannot be mapped.
    pub async fn lookup(&mut self, id: i64) -> Result<Lookup<E>> {
        let state = Arc::clone(&self.state);

        let mut records = self
            .session
            .fetch_all(
                E::NAME,
                Operation::Find,
                &state.find_by_id,
                vec![Value::Integer(id)],
            )
            .await?;

        if records.len() > 1 {
            return Ok(Lookup::Ambiguous(records.len()));
        }

        match records.pop() {
            Some(record) => Ok(Lookup::Found(self.map_record(record).await?)),
            None => Ok(Lookup::NotFound),
        }
    }

    /// Write every column of `entity` to the row with its identity. Referenced entities
    /// without an identity are inserted first.
    ///
    /// Returns `false` if no row has that identity.
    ///
    /// # Errors
    ///
    /// If `entity` has no identity, the store fails, or more than one row was affected.
    pub async fn update(&mut self, entity: &mut E) -> Result<bool> {
        let Some(id) = entity.id() else {
            return Err(DaoError::Unpersisted {
                entity: E::NAME,
                operation: Operation::Update,
            });
        };

        let scope = self.session.begin(E::NAME).await?;
        let result = self.update_unscoped(entity, id).await;
        self.session.finish(scope, E::NAME, result).await
    }

    async fn update_unscoped(&mut self, entity: &mut E, id: i64) -> Result<bool> {
        let state = Arc::clone(&self.state);

        let mut params = self.column_values(entity).await?;
        params.push(Value::Integer(id));

        let affected = self
            .session
            .execute(E::NAME, Operation::Update, &state.update_by_id, params)
            .await?;

        match affected {
            0 => Ok(false),
            1 => Ok(true),
            actual => Err(DaoError::AffectedRows {
                entity: E::NAME,
                operation: Operation::Update,
                expected: "at most 1",
                actual,
            }),
        }
    }

    /// Delete the row with the given id, after deleting every entity it references.
    ///
    /// Referenced entities are deleted even if other rows still reference them.
    ///
    /// # Errors
    ///
    /// If the row does not exist, the store fails, or the delete does not affect exactly
    /// one row.
    pub async fn delete(&mut self, id: i64) -> Result<bool> {
        let scope = self.session.begin(E::NAME).await?;
        let result = self.delete_unscoped(id).await;
        self.session.finish(scope, E::NAME, result).await
    }

    async fn delete_unscoped(&mut self, id: i64) -> Result<bool> {
        let state = Arc::clone(&self.state);
        let entity = self.find(id).await?;

        for column in state.table.foreign_keys() {
            if let Field::Reference(reference) = state.metadata.field(&column.field_name)? {
                reference.delete(self.session, &entity).await?;
            }
        }

        let affected = self
            .session
            .execute(
                E::NAME,
                Operation::Delete,
                &state.delete_by_id,
                vec![Value::Integer(id)],
            )
            .await?;

        if affected != 1 {
            return Err(DaoError::AffectedRows {
                entity: E::NAME,
                operation: Operation::Delete,
                expected: "exactly 1",
                actual: affected,
            });
        }

        debug!(entity = E::NAME, id, "Deleted");

        Ok(true)
    }

    /// # Errors
    ///
    /// If the store fails, or a row cannot be mapped.
    pub async fn get_all(&mut self) -> Result<Vec<E>> {
        let state = Arc::clone(&self.state);

        let records = self
            .session
            .fetch_all(E::NAME, Operation::ReadAll, &state.read_all, vec![])
            .await?;

        self.map_records(records).await
    }

    /// # Errors
    ///
    /// See [`Dao::find_by_parameters`].
    pub async fn find_by_parameter(&mut self, field: &str, value: impl Into<Value>) -> Result<Vec<E>> {
        self.find_by_parameters([(field, value.into())]).await
    }

    /// Every row whose columns equal the given values. Fields are matched in the order
    /// given; an empty filter matches every row.
    ///
    /// Reference fields are filtered by the referenced entity's identity.
    ///
    /// # Errors
    ///
    /// If a field has no column, the store fails, or a row cannot be mapped.
    pub async fn find_by_parameters<I, S>(&mut self, filter: I) -> Result<Vec<E>>
    where
        I: IntoIterator<Item = (S, Value)> + Send,
        S: AsRef<str>,
    {
        let (fields, params): (Vec<String>, Vec<Value>) = filter
            .into_iter()
            .map(|(field, value)| (field.as_ref().to_string(), value))
            .unzip();

        let sql = self
            .session
            .generator()
            .find_by_parameters_query(E::NAME, &fields)?;

        let records = self
            .session
            .fetch_all(E::NAME, Operation::FindByParameters, &sql, params)
            .await?;

        self.map_records(records).await
    }

    /// The values bound for every non-key column, in table order.
    async fn column_values(&mut self, entity: &mut E) -> Result<Vec<Value>> {
        let state = Arc::clone(&self.state);
        let mut params = Vec::with_capacity(state.table.columns.len());

        for column in state.table.value_columns() {
            let value = match state.metadata.field(&column.field_name)? {
                Field::Scalar(scalar) if !column.foreign_key => scalar.get(entity),
                Field::Reference(reference) if column.foreign_key => reference
                    .persist(self.session, entity)
                    .await?
                    .map_or(Value::Null(ValueKind::Integer), Value::Integer),
                field => return Err(kind_mismatch::<E>(column, field).into()),
            };

            params.push(value);
        }

        Ok(params)
    }

    async fn map_records(&mut self, records: Vec<Record>) -> Result<Vec<E>> {
        let mut entities = Vec::with_capacity(records.len());

        for record in records {
            entities.push(self.map_record(record).await?);
        }

        Ok(entities)
    }

    async fn map_record(&mut self, mut record: Record) -> Result<E> {
        let state = Arc::clone(&self.state);
        let mut entity = state.metadata.new_instance();

        entity.set_id(identity::<E>(&state.table, &record)?);

        for column in state.table.value_columns() {
            if !state.metadata.has_field(&column.field_name) {
                continue;
            }

            let value = record
                .take(&column.name)
                .ok_or_else(|| MappingError::MissingColumn {
                    entity: E::NAME,
                    column: column.name.clone(),
                })?;

            match state.metadata.field(&column.field_name)? {
                Field::Scalar(_) if !column.foreign_key => {
                    state.metadata.set(&column.field_name, &mut entity, value)?;
                }
                Field::Reference(reference) if column.foreign_key => match value {
                    Value::Null(_) | Value::Integer(0) => {}
                    Value::Integer(id) => reference.load(self.session, &mut entity, id).await?,
                    other => {
                        return Err(MappingError::InvalidReference {
                            entity: E::NAME,
                            column: column.name.clone(),
                            found: other.kind().to_string(),
                        }
                        .into());
                    }
                },
                field => return Err(kind_mismatch::<E>(column, field).into()),
            }
        }

        Ok(entity)
    }
}

fn identity<E>(table: &DatabaseTable, record: &Record) -> Result<i64, MappingError>
where
    E: Entity,
{
    match record.get(&table.primary_key) {
        Some(Value::Integer(id)) => Ok(*id),
        Some(other) => Err(MappingError::InvalidIdentity {
            entity: E::NAME,
            column: table.primary_key.clone(),
            found: other.kind().to_string(),
        }),
        None => Err(MappingError::MissingColumn {
            entity: E::NAME,
            column: table.primary_key.clone(),
        }),
    }
}

fn kind_mismatch<E>(column: &DatabaseColumn, field: &Field<E>) -> MappingError
where
    E: Entity,
{
    MappingError::KindMismatch {
        entity: E::NAME,
        column: column.name.clone(),
        field: column.field_name.clone(),
        column_kind: if column.foreign_key {
            "a foreign key"
        } else {
            "a plain column"
        },
        field_kind: field.kind(),
    }
}

/// Check that every column of `table` mapped to a field of `E` agrees with it on being a
/// foreign key. Columns without a matching field are left for the write paths to reject.
pub(crate) fn check_table<E>(metadata: &EntityMetadata<E>, table: &DatabaseTable) -> Result<(), MappingError>
where
    E: Entity,
{
    table
        .value_columns()
        .filter(|e| metadata.has_field(&e.field_name))
        .try_for_each(|column| match metadata.field(&column.field_name)? {
            Field::Scalar(_) if !column.foreign_key => Ok(()),
            Field::Reference(_) if column.foreign_key => Ok(()),
            field => Err(kind_mismatch::<E>(column, field)),
        })
}
