use futures::{FutureExt, TryFutureExt, future::BoxFuture};
use sqlx::{
    Any, AnyPool, Column, Executor, Row,
    any::{AnyArguments, AnyRow},
    pool::PoolConnection,
    query::Query,
};

use crate::entity::value::{Value, ValueKind};

/// One result row: column names paired with their values, in select order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    columns: Vec<(String, Value)>,
}

impl Record {
    #[must_use]
    pub const fn new() -> Self {
        Self { columns: vec![] }
    }

    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.columns.push((column.into(), value.into()));
        self
    }

    /// Column names match exactly first, then ignoring ASCII case.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.position(column).map(|i| &self.columns[i].1)
    }

    /// Like [`Record::get`], but moves the value out, leaving a null in its place.
    pub fn take(&mut self, column: &str) -> Option<Value> {
        self.position(column)
            .map(|i| std::mem::take(&mut self.columns[i].1))
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(e, _)| e.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    fn position(&self, column: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|(e, _)| e.eq(column))
            .or_else(|| {
                self.columns
                    .iter()
                    .position(|(e, _)| e.eq_ignore_ascii_case(column))
            })
    }

    /// # Errors
    ///
    /// If a column holds a value that maps to none of the [`Value`] variants.
    pub fn from_any_row(row: &AnyRow) -> Result<Self, sqlx::Error> {
        row.columns()
            .iter()
            .map(|column| Ok((column.name().to_string(), decode(row, column.ordinal())?)))
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map(|columns| Self { columns })
    }
}

fn decode(row: &AnyRow, index: usize) -> Result<Value, sqlx::Error> {
    if let Ok(value) = row.try_get::<Option<i64>, _>(index) {
        return Ok(value.map_or(Value::Null(ValueKind::Integer), Value::Integer));
    }

    if let Ok(value) = row.try_get::<Option<bool>, _>(index) {
        return Ok(value.map_or(Value::Null(ValueKind::Bool), Value::Bool));
    }

    if let Ok(value) = row.try_get::<Option<f64>, _>(index) {
        return Ok(value.map_or(Value::Null(ValueKind::Real), Value::Real));
    }

    if let Ok(value) = row.try_get::<Option<String>, _>(index) {
        return Ok(value.map_or(Value::Null(ValueKind::Text), Value::Text));
    }

    row.try_get::<Option<Vec<u8>>, _>(index)
        .map(|e| e.map_or(Value::Null(ValueKind::Blob), Value::Blob))
}

/// A single database connection, exclusively owned by one session.
pub trait Connection: Send {
    /// Run a statement and return the number of affected rows.
    fn execute<'a>(
        &'a mut self,
        sql: &'a str,
        params: Vec<Value>,
    ) -> BoxFuture<'a, Result<u64, sqlx::Error>>;

    fn fetch_all<'a>(
        &'a mut self,
        sql: &'a str,
        params: Vec<Value>,
    ) -> BoxFuture<'a, Result<Vec<Record>, sqlx::Error>>;

    fn begin(&mut self) -> BoxFuture<'_, Result<(), sqlx::Error>> {
        self.execute("BEGIN", vec![]).map_ok(|_| ()).boxed()
    }

    fn commit(&mut self) -> BoxFuture<'_, Result<(), sqlx::Error>> {
        self.execute("COMMIT", vec![]).map_ok(|_| ()).boxed()
    }

    fn rollback(&mut self) -> BoxFuture<'_, Result<(), sqlx::Error>> {
        self.execute("ROLLBACK", vec![]).map_ok(|_| ()).boxed()
    }

    /// Mark the connection as unusable, so it is closed instead of reused once released.
    fn discard(&mut self) {}
}

/// Hands out connections. Implementations must be safe to share between sessions.
pub trait ConnectionProvider: Send + Sync {
    fn acquire(&self) -> BoxFuture<'_, Result<Box<dyn Connection>, sqlx::Error>>;
}

fn bind_all(sql: &str, params: Vec<Value>) -> Query<'_, Any, AnyArguments<'_>> {
    params
        .into_iter()
        .fold(sqlx::query(sql), |query, value| match value {
            Value::Null(ValueKind::Bool) => query.bind(None::<bool>),
            Value::Null(ValueKind::Integer) => query.bind(None::<i64>),
            Value::Null(ValueKind::Real) => query.bind(None::<f64>),
            Value::Null(ValueKind::Text) => query.bind(None::<String>),
            Value::Null(ValueKind::Blob) => query.bind(None::<Vec<u8>>),
            Value::Bool(e) => query.bind(e),
            Value::Integer(e) => query.bind(e),
            Value::Real(e) => query.bind(e),
            Value::Text(e) => query.bind(e),
            Value::Blob(e) => query.bind(e),
        })
}

impl Connection for PoolConnection<Any> {
    fn execute<'a>(
        &'a mut self,
        sql: &'a str,
        params: Vec<Value>,
    ) -> BoxFuture<'a, Result<u64, sqlx::Error>> {
        async move {
            bind_all(sql, params)
                .execute(&mut **self)
                .await
                .map(|e| e.rows_affected())
        }
        .boxed()
    }

    fn fetch_all<'a>(
        &'a mut self,
        sql: &'a str,
        params: Vec<Value>,
    ) -> BoxFuture<'a, Result<Vec<Record>, sqlx::Error>> {
        async move {
            let rows = bind_all(sql, params).fetch_all(&mut **self).await?;

            rows.iter()
                .map(Record::from_any_row)
                .collect::<Result<Vec<_>, _>>()
        }
        .boxed()
    }

    fn begin(&mut self) -> BoxFuture<'_, Result<(), sqlx::Error>> {
        Executor::execute(&mut **self, "BEGIN")
            .map_ok(|_| ())
            .boxed()
    }

    fn commit(&mut self) -> BoxFuture<'_, Result<(), sqlx::Error>> {
        Executor::execute(&mut **self, "COMMIT")
            .map_ok(|_| ())
            .boxed()
    }

    fn rollback(&mut self) -> BoxFuture<'_, Result<(), sqlx::Error>> {
        Executor::execute(&mut **self, "ROLLBACK")
            .map_ok(|_| ())
            .boxed()
    }

    fn discard(&mut self) {
        self.close_on_drop();
    }
}

impl ConnectionProvider for AnyPool {
    fn acquire(&self) -> BoxFuture<'_, Result<Box<dyn Connection>, sqlx::Error>> {
        async move {
            let connection = sqlx::Pool::acquire(self).await?;

            Ok(Box::new(connection) as Box<dyn Connection>)
        }
        .boxed()
    }
}
