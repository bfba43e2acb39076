use std::any::TypeId;

use futures::{FutureExt, future::BoxFuture};

use super::{Entity, registry::EntityRegistry};
use crate::{error::DaoError, session::DaoSession};

/// Type-erased access to a field holding another entity.
///
/// Every operation that has to reach the referenced entity's own DAO goes through here, so
/// the owning DAO never needs to name the referenced type.
pub(crate) trait ReferenceField<E>: Send + Sync {
    fn entity_name(&self) -> &'static str;

    fn target_type_id(&self) -> TypeId;

    /// `None` if no entity is referenced, `Some(None)` if it has not been inserted yet.
    fn referenced_id(&self, entity: &E) -> Option<Option<i64>>;

    fn register(&self, registry: &mut EntityRegistry);

    /// Resolve the foreign key value to write for `entity`, inserting the referenced entity
    /// first if it has no identity yet.
    fn persist<'a>(
        &'a self,
        session: &'a mut DaoSession,
        entity: &'a mut E,
    ) -> BoxFuture<'a, Result<Option<i64>, DaoError>>;

    /// Read the referenced entity with the given id and store it on `entity`.
    fn load<'a>(
        &'a self,
        session: &'a mut DaoSession,
        entity: &'a mut E,
        id: i64,
    ) -> BoxFuture<'a, Result<(), DaoError>>;

    /// Delete the referenced entity, if there is one with an identity.
    fn delete<'a>(
        &'a self,
        session: &'a mut DaoSession,
        entity: &'a E,
    ) -> BoxFuture<'a, Result<(), DaoError>>;
}

pub(crate) struct Reference<E, R> {
    pub(crate) get: fn(&E) -> Option<&R>,
    pub(crate) get_mut: fn(&mut E) -> Option<&mut R>,
    pub(crate) set: fn(&mut E, R),
}

impl<E, R> ReferenceField<E> for Reference<E, R>
where
    E: Entity,
    R: Entity,
{
    fn entity_name(&self) -> &'static str {
        R::NAME
    }

    fn target_type_id(&self) -> TypeId {
        TypeId::of::<R>()
    }

    fn referenced_id(&self, entity: &E) -> Option<Option<i64>> {
        (self.get)(entity).map(Entity::id)
    }

    fn register(&self, registry: &mut EntityRegistry) {
        registry.register::<R>();
    }

    fn persist<'a>(
        &'a self,
        session: &'a mut DaoSession,
        entity: &'a mut E,
    ) -> BoxFuture<'a, Result<Option<i64>, DaoError>> {
        async move {
            let Some(target) = (self.get_mut)(entity) else {
                return Ok(None);
            };

            if let Some(id) = target.id() {
                return Ok(Some(id));
            }

            let id = session.dao::<R>()?.insert(target).await?;

            Ok(Some(id))
        }
        .boxed()
    }

    fn load<'a>(
        &'a self,
        session: &'a mut DaoSession,
        entity: &'a mut E,
        id: i64,
    ) -> BoxFuture<'a, Result<(), DaoError>> {
        async move {
            let target = session.dao::<R>()?.find(id).await?;
            (self.set)(entity, target);

            Ok(())
        }
        .boxed()
    }

    fn delete<'a>(
        &'a self,
        session: &'a mut DaoSession,
        entity: &'a E,
    ) -> BoxFuture<'a, Result<(), DaoError>> {
        async move {
            if let Some(id) = (self.get)(entity).and_then(Entity::id) {
                session.dao::<R>()?.delete(id).await?;
            }

            Ok(())
        }
        .boxed()
    }
}
