//! Scripted stand-in for a database, and a small storefront model, for unit tests.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use futures::{FutureExt, future::BoxFuture};
use store_dao_schema::{DatabaseColumn, DatabaseTable, Dialect, SchemaMetadata};

use crate::{
    connection::{Connection, ConnectionProvider, Record},
    entity::{Entity, metadata::EntityMetadata, registry::EntityRegistry, value::Value},
    session::DaoFactory,
};

#[derive(Default, Debug, Clone, PartialEq)]
pub struct Status {
    pub id: Option<i64>,
    pub name: String,
}

impl Entity for Status {
    const NAME: &'static str = "Status";

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    fn describe() -> EntityMetadata<Self> {
        EntityMetadata::builder()
            .field("name", |e: &Self| &e.name, |e: &mut Self| &mut e.name)
            .build()
    }
}

#[derive(Default, Debug, Clone, PartialEq)]
pub struct Price {
    pub id: Option<i64>,
    pub value: f64,
    pub currency: String,
}

impl Entity for Price {
    const NAME: &'static str = "Price";

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    fn describe() -> EntityMetadata<Self> {
        EntityMetadata::builder()
            .field("value", |e: &Self| &e.value, |e: &mut Self| &mut e.value)
            .field(
                "currency",
                |e: &Self| &e.currency,
                |e: &mut Self| &mut e.currency,
            )
            .build()
    }
}

#[derive(Default, Debug, Clone, PartialEq)]
pub struct Product {
    pub id: Option<i64>,
    pub name: String,
    pub category: String,
    pub price: Price,
}

impl Entity for Product {
    const NAME: &'static str = "Product";

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    fn describe() -> EntityMetadata<Self> {
        EntityMetadata::builder()
            .field("name", |e: &Self| &e.name, |e: &mut Self| &mut e.name)
            .field(
                "category",
                |e: &Self| &e.category,
                |e: &mut Self| &mut e.category,
            )
            .reference(
                "price",
                |e: &Self| Some(&e.price),
                |e: &mut Self| Some(&mut e.price),
                |e: &mut Self, price| e.price = price,
            )
            .build()
    }
}

pub fn store_schema() -> SchemaMetadata {
    SchemaMetadata::from_tables(
        Dialect::Sqlite,
        [
            DatabaseTable::new("status", "Status", "id")
                .with_column(DatabaseColumn::new("id", "id"))
                .with_column(DatabaseColumn::new("name", "name")),
            DatabaseTable::new("price", "Price", "id")
                .with_column(DatabaseColumn::new("id", "id"))
                .with_column(DatabaseColumn::new("value", "value"))
                .with_column(DatabaseColumn::new("currency", "currency")),
            DatabaseTable::new("product", "Product", "id")
                .with_column(DatabaseColumn::new("id", "id"))
                .with_column(DatabaseColumn::new("name", "name"))
                .with_column(DatabaseColumn::new("category", "category"))
                .with_column(DatabaseColumn::foreign_key("price_id", "price")),
        ],
    )
}

pub fn price_record(id: i64, value: f64) -> Record {
    Record::new()
        .with("id", id)
        .with("value", value)
        .with("currency", "EUR")
}

pub fn product_record(id: i64, name: &str, category: &str, price_id: i64) -> Record {
    Record::new()
        .with("id", id)
        .with("name", name)
        .with("category", category)
        .with("price_id", price_id)
}

/// What the store answers to the next data statement.
pub enum Reply {
    Affected(u64),
    Rows(Vec<Record>),
    Fail(&'static str),
    /// Never answers.
    Pending,
}

#[derive(Default)]
struct Script {
    statements: Vec<(String, Vec<Value>)>,
    replies: VecDeque<Reply>,
    failing: Vec<&'static str>,
    acquired: usize,
    released: usize,
    discarded: usize,
}

/// A connection provider whose connections log every statement and answer data
/// statements from a queue of [`Reply`]s. Transaction statements are logged but consume no
/// reply, and succeed unless set up to fail with [`FakeStore::fail_next`].
#[derive(Clone, Default)]
pub struct FakeStore {
    script: Arc<Mutex<Script>>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, reply: Reply) -> Self {
        self.script
            .lock()
            .expect("Poisoned script")
            .replies
            .push_back(reply);
        self
    }

    /// Fail the next `BEGIN`, `COMMIT` or `ROLLBACK`, whichever `statement` names.
    pub fn fail_next(self, statement: &'static str) -> Self {
        self.script
            .lock()
            .expect("Poisoned script")
            .failing
            .push(statement);
        self
    }

    pub fn factory(&self, transactional: bool) -> DaoFactory {
        DaoFactory::new(
            Arc::new(self.clone()),
            Arc::new(store_schema()),
            EntityRegistry::new().with::<Product>().with::<Status>(),
            transactional,
        )
        .expect("Failed to create factory")
    }

    pub fn statements(&self) -> Vec<String> {
        self.script
            .lock()
            .expect("Poisoned script")
            .statements
            .iter()
            .map(|(e, _)| e.clone())
            .collect()
    }

    pub fn params(&self, index: usize) -> Vec<Value> {
        self.script.lock().expect("Poisoned script").statements[index]
            .1
            .clone()
    }

    pub fn acquired(&self) -> usize {
        self.script.lock().expect("Poisoned script").acquired
    }

    pub fn released(&self) -> usize {
        self.script.lock().expect("Poisoned script").released
    }

    pub fn discarded(&self) -> usize {
        self.script.lock().expect("Poisoned script").discarded
    }
}

impl ConnectionProvider for FakeStore {
    fn acquire(&self) -> BoxFuture<'_, Result<Box<dyn Connection>, sqlx::Error>> {
        self.script.lock().expect("Poisoned script").acquired += 1;

        futures::future::ready(Ok(Box::new(FakeConnection {
            script: Arc::clone(&self.script),
        }) as Box<dyn Connection>))
        .boxed()
    }
}

struct FakeConnection {
    script: Arc<Mutex<Script>>,
}

impl FakeConnection {
    fn next_reply(&self, sql: &str, params: Vec<Value>) -> Option<Reply> {
        let mut script = self.script.lock().expect("Poisoned script");
        script.statements.push((sql.to_string(), params));
        script.replies.pop_front()
    }

    fn log(&self, sql: &'static str) -> BoxFuture<'static, Result<(), sqlx::Error>> {
        let mut script = self.script.lock().expect("Poisoned script");
        script.statements.push((sql.to_string(), vec![]));

        let result = match script.failing.iter().position(|e| (*e).eq(sql)) {
            Some(index) => {
                script.failing.remove(index);
                Err(sqlx::Error::Protocol(format!("{sql} failed")))
            }
            None => Ok(()),
        };

        futures::future::ready(result).boxed()
    }
}

fn unexpected(sql: &str) -> sqlx::Error {
    sqlx::Error::Protocol(format!("unscripted reply to `{sql}`"))
}

impl Connection for FakeConnection {
    fn execute<'a>(
        &'a mut self,
        sql: &'a str,
        params: Vec<Value>,
    ) -> BoxFuture<'a, Result<u64, sqlx::Error>> {
        let result = match self.next_reply(sql, params) {
            Some(Reply::Affected(n)) => Ok(n),
            Some(Reply::Fail(message)) => Err(sqlx::Error::Protocol(message.to_string())),
            Some(Reply::Pending) => return futures::future::pending().boxed(),
            Some(Reply::Rows(_)) | None => Err(unexpected(sql)),
        };

        futures::future::ready(result).boxed()
    }

    fn fetch_all<'a>(
        &'a mut self,
        sql: &'a str,
        params: Vec<Value>,
    ) -> BoxFuture<'a, Result<Vec<Record>, sqlx::Error>> {
        let result = match self.next_reply(sql, params) {
            Some(Reply::Rows(rows)) => Ok(rows),
            Some(Reply::Fail(message)) => Err(sqlx::Error::Protocol(message.to_string())),
            Some(Reply::Pending) => return futures::future::pending().boxed(),
            Some(Reply::Affected(_)) | None => Err(unexpected(sql)),
        };

        futures::future::ready(result).boxed()
    }

    fn begin(&mut self) -> BoxFuture<'_, Result<(), sqlx::Error>> {
        self.log("BEGIN")
    }

    fn commit(&mut self) -> BoxFuture<'_, Result<(), sqlx::Error>> {
        self.log("COMMIT")
    }

    fn rollback(&mut self) -> BoxFuture<'_, Result<(), sqlx::Error>> {
        self.log("ROLLBACK")
    }

    fn discard(&mut self) {
        self.script.lock().expect("Poisoned script").discarded += 1;
    }
}

impl Drop for FakeConnection {
    fn drop(&mut self) {
        if let Ok(mut script) = self.script.lock() {
            script.released += 1;
        }
    }
}
