use std::{
    any::{Any, TypeId},
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use store_dao_schema::SchemaMetadata;
use tracing::{debug, warn};

use crate::{
    connection::{Connection, ConnectionProvider, Record},
    dao::{Dao, DaoState},
    entity::{Entity, registry::EntityRegistry, value::Value},
    error::{DaoError, Operation, Result},
    query::QueryGenerator,
};

struct SessionContext {
    provider: Arc<dyn ConnectionProvider>,
    generator: QueryGenerator,
    registry: EntityRegistry,
    transactional: bool,
}

/// Opens [`DaoSession`]s. Holds everything sessions share: the connection provider, the
/// schema, and the registered entities.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct DaoFactory {
    context: Arc<SessionContext>,
}

impl DaoFactory {
    /// With `transactional` set, every insert, update and delete runs in a single store
    /// transaction together with the dependency writes it triggers.
    ///
    /// # Errors
    ///
    /// If a registered entity has no table in `schema`, or one of its columns disagrees
    /// with the matching field on being a foreign key.
    pub fn new(
        provider: Arc<dyn ConnectionProvider>,
        schema: Arc<SchemaMetadata>,
        registry: EntityRegistry,
        transactional: bool,
    ) -> Result<Self> {
        registry.check_schema(&schema)?;

        Ok(Self {
            context: Arc::new(SessionContext {
                provider,
                generator: QueryGenerator::new(schema),
                registry,
                transactional,
            }),
        })
    }

    #[must_use]
    pub fn generator(&self) -> &QueryGenerator {
        &self.context.generator
    }

    #[must_use]
    pub fn registry(&self) -> &EntityRegistry {
        &self.context.registry
    }

    /// Acquire a connection and open a session on it. Waits for the provider if none is
    /// free.
    ///
    /// # Errors
    ///
    /// If the provider fails to hand out a connection, e.g. on timeout.
    pub async fn open_session(&self) -> Result<DaoSession> {
        let connection = self
            .context
            .provider
            .acquire()
            .await
            .map_err(DaoError::Acquire)?;

        debug!("Opened DAO session");

        Ok(DaoSession {
            connection,
            context: Arc::clone(&self.context),
            daos: HashMap::new(),
            depth: 0,
            failed: false,
            interrupted: Arc::new(AtomicBool::new(false)),
        })
    }
}

/// An entered transaction scope, handed back to [`DaoSession::finish`].
///
/// Dropping it unfinished means the operation was cancelled part-way, which leaves the
/// session interrupted.
#[must_use]
pub(crate) struct Scope {
    interrupted: Option<Arc<AtomicBool>>,
}

impl Scope {
    const fn detached() -> Self {
        Self { interrupted: None }
    }

    fn close(mut self) {
        self.interrupted = None;
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        if let Some(interrupted) = self.interrupted.take() {
            interrupted.store(true, Ordering::Release);
        }
    }
}

/// A unit of work owning one connection and the DAOs created on it.
///
/// The connection goes back to the provider when the session is closed or dropped. A
/// session dropped while a transaction is open has its connection discarded instead.
///
/// If an insert, update or delete future is dropped before it completes, e.g. by a
/// timeout, the transaction it opened is left in an unknown state. Every later store call
/// on the session then fails with [`DaoError::Interrupted`], and the connection is
/// discarded once the session is dropped.
pub struct DaoSession {
    connection: Box<dyn Connection>,
    context: Arc<SessionContext>,
    daos: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
    depth: usize,
    failed: bool,
    interrupted: Arc<AtomicBool>,
}

impl DaoSession {
    /// The DAO for `E`. Its statements are generated on first use and reused for the rest
    /// of the session.
    ///
    /// # Errors
    ///
    /// If `E` was not registered with the factory.
    pub fn dao<E>(&mut self) -> Result<Dao<'_, E>>
    where
        E: Entity,
    {
        let state = self.state::<E>()?;

        Ok(Dao::new(self, state))
    }

    fn state<E>(&mut self) -> Result<Arc<DaoState<E>>>
    where
        E: Entity,
    {
        if let Some(state) = self
            .daos
            .get(&TypeId::of::<E>())
            .and_then(|e| Arc::clone(e).downcast::<DaoState<E>>().ok())
        {
            return Ok(state);
        }

        let state = Arc::new(DaoState::new(
            self.context.registry.metadata::<E>()?,
            &self.context.generator,
        )?);

        debug!(entity = E::NAME, table = %state.table().name, "Created DAO");

        self.daos.insert(
            TypeId::of::<E>(),
            Arc::clone(&state) as Arc<dyn Any + Send + Sync>,
        );

        Ok(state)
    }

    #[must_use]
    pub fn generator(&self) -> &QueryGenerator {
        &self.context.generator
    }

    #[must_use]
    pub const fn in_transaction(&self) -> bool {
        self.depth > 0
    }

    /// Whether an operation on this session was cancelled part-way. An interrupted session
    /// refuses further store calls and should be dropped.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::Acquire)
    }

    fn ensure_usable(&self, entity: &'static str) -> Result<()> {
        if self.is_interrupted() {
            return Err(DaoError::Interrupted { entity });
        }

        Ok(())
    }

    /// Release the connection back to the provider.
    pub fn close(self) {
        debug!("Closing DAO session");
    }

    pub(crate) async fn execute(
        &mut self,
        entity: &'static str,
        operation: Operation,
        sql: &str,
        params: Vec<Value>,
    ) -> Result<u64> {
        self.ensure_usable(entity)?;

        debug!(entity, %operation, sql, params = params.len(), "Executing statement");

        self.connection
            .execute(sql, params)
            .await
            .map_err(|source| DaoError::Store {
                entity,
                operation,
                source,
            })
    }

    pub(crate) async fn fetch_all(
        &mut self,
        entity: &'static str,
        operation: Operation,
        sql: &str,
        params: Vec<Value>,
    ) -> Result<Vec<Record>> {
        self.ensure_usable(entity)?;

        debug!(entity, %operation, sql, params = params.len(), "Running query");

        self.connection
            .fetch_all(sql, params)
            .await
            .map_err(|source| DaoError::Store {
                entity,
                operation,
                source,
            })
    }

    /// Enter a transaction scope. Only the outermost scope starts a store transaction.
    ///
    /// The returned scope must be passed to [`DaoSession::finish`].
    pub(crate) async fn begin(&mut self, entity: &'static str) -> Result<Scope> {
        if !self.context.transactional {
            return Ok(Scope::detached());
        }

        self.ensure_usable(entity)?;

        let scope = Scope {
            interrupted: Some(Arc::clone(&self.interrupted)),
        };

        self.depth += 1;

        if self.depth == 1 {
            self.failed = false;

            if let Err(source) = self.connection.begin().await {
                self.depth = 0;
                scope.close();

                return Err(DaoError::Store {
                    entity,
                    operation: Operation::Transaction,
                    source,
                });
            }
        }

        Ok(scope)
    }

    /// Leave a transaction scope with the result of the work done inside it. The outermost
    /// scope commits, unless any scope inside it failed, in which case everything is rolled
    /// back. A failed commit is rolled back too.
    pub(crate) async fn finish<T>(
        &mut self,
        scope: Scope,
        entity: &'static str,
        result: Result<T>,
    ) -> Result<T> {
        if !self.context.transactional {
            return result;
        }

        self.depth = self.depth.saturating_sub(1);
        self.failed |= result.is_err();

        if self.depth > 0 {
            scope.close();
            return result;
        }

        if self.failed {
            warn!(entity, "Rolling back transaction");
            self.rollback(entity).await;
            scope.close();

            return match result {
                Ok(_) => Err(DaoError::RolledBack { entity }),
                Err(e) => Err(e),
            };
        }

        if let Err(source) = self.connection.commit().await {
            warn!(entity, "Commit failed, rolling back transaction: {source}");
            self.rollback(entity).await;
            scope.close();

            return Err(DaoError::Store {
                entity,
                operation: Operation::Transaction,
                source,
            });
        }

        scope.close();

        result
    }

    async fn rollback(&mut self, entity: &'static str) {
        if let Err(e) = self.connection.rollback().await {
            warn!(entity, "Rollback failed, discarding connection: {e}");
            self.connection.discard();
        }
    }
}

impl Drop for DaoSession {
    fn drop(&mut self) {
        if self.is_interrupted() {
            warn!("DAO session was interrupted, discarding its connection");
            self.connection.discard();
        } else if self.depth > 0 {
            warn!(
                depth = self.depth,
                "DAO session dropped inside a transaction, discarding its connection"
            );
            self.connection.discard();
        }
    }
}
