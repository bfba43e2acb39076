use std::{
    any::{Any, TypeId},
    collections::HashMap,
    sync::Arc,
};

use store_dao_schema::SchemaMetadata;

use super::{Entity, metadata::EntityMetadata};
use crate::{dao::check_table, error::{DaoError, MappingError, QueryGenerationError}};

struct Registration {
    name: &'static str,
    metadata: Arc<dyn Any + Send + Sync>,
    check: fn(&EntityRegistry, &SchemaMetadata) -> Result<(), DaoError>,
}

/// The accessor tables of every entity the application persists, built once at startup and
/// handed to [`DaoFactory`](crate::session::DaoFactory).
#[derive(Default)]
pub struct EntityRegistry {
    entries: HashMap<TypeId, Registration>,
}

impl EntityRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `E` along with every entity reachable through its reference fields.
    /// Registering a type twice has no effect.
    pub fn register<E>(&mut self) -> &mut Self
    where
        E: Entity,
    {
        if self.entries.contains_key(&TypeId::of::<E>()) {
            return self;
        }

        let metadata = Arc::new(E::describe());

        self.entries.insert(
            TypeId::of::<E>(),
            Registration {
                name: E::NAME,
                metadata: Arc::clone(&metadata) as Arc<dyn Any + Send + Sync>,
                check: check_registration::<E>,
            },
        );

        metadata.references().for_each(|e| e.register(self));

        self
    }

    #[must_use]
    pub fn with<E>(mut self) -> Self
    where
        E: Entity,
    {
        self.register::<E>();
        self
    }

    #[must_use]
    pub fn contains<E>(&self) -> bool
    where
        E: Entity,
    {
        self.entries.contains_key(&TypeId::of::<E>())
    }

    /// # Errors
    ///
    /// If `E` was never registered.
    pub fn metadata<E>(&self) -> Result<Arc<EntityMetadata<E>>, MappingError>
    where
        E: Entity,
    {
        self.entries
            .get(&TypeId::of::<E>())
            .and_then(|e| Arc::clone(&e.metadata).downcast::<EntityMetadata<E>>().ok())
            .ok_or(MappingError::Unregistered(E::NAME))
    }

    pub fn entity_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.values().map(|e| e.name)
    }

    /// Check every registered entity against the schema: each must have a table, and each
    /// column it maps must agree with its field on being a foreign key.
    ///
    /// # Errors
    ///
    /// The first mismatch found.
    pub fn check_schema(&self, schema: &SchemaMetadata) -> Result<(), DaoError> {
        self.entries
            .values()
            .try_for_each(|e| (e.check)(self, schema))
    }
}

fn check_registration<E>(registry: &EntityRegistry, schema: &SchemaMetadata) -> Result<(), DaoError>
where
    E: Entity,
{
    let metadata = registry.metadata::<E>()?;
    let table = schema
        .table(E::NAME)
        .ok_or_else(|| QueryGenerationError::UnmappedEntity(E::NAME.to_string()))?;

    check_table(&metadata, table)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use store_dao_schema::{DatabaseColumn, DatabaseTable, Dialect, SchemaMetadata};

    use super::EntityRegistry;
    use crate::{
        error::{DaoError, MappingError, QueryGenerationError},
        test_support::{Price, Product, Status, store_schema},
    };

    #[test]
    fn test_register_follows_references() {
        let registry = EntityRegistry::new().with::<Product>();

        assert!(registry.contains::<Product>());
        assert!(registry.contains::<Price>());
        assert!(!registry.contains::<Status>());

        let mut names = registry.entity_names().collect::<Vec<_>>();
        names.sort_unstable();
        assert_eq!(names, ["Price", "Product"]);
    }

    #[test]
    fn test_unregistered_metadata() {
        let registry = EntityRegistry::new().with::<Status>();

        assert!(registry.metadata::<Status>().is_ok());
        assert!(matches!(
            registry.metadata::<Product>(),
            Err(MappingError::Unregistered("Product"))
        ));
    }

    #[test]
    fn test_check_schema() {
        let registry = EntityRegistry::new().with::<Product>();

        assert!(registry.check_schema(&store_schema()).is_ok());

        let mut missing_price = store_schema();
        missing_price.tables.remove("Price");
        assert!(matches!(
            registry.check_schema(&missing_price),
            Err(DaoError::Query(QueryGenerationError::UnmappedEntity(name))) if name == "Price"
        ));

        let scalar_price = SchemaMetadata::from_tables(
            Dialect::Sqlite,
            [
                DatabaseTable::new("product", "Product", "id")
                    .with_column(DatabaseColumn::new("id", "id"))
                    .with_column(DatabaseColumn::new("price_id", "price")),
                DatabaseTable::new("price", "Price", "id")
                    .with_column(DatabaseColumn::new("id", "id")),
            ],
        );
        assert!(matches!(
            registry.check_schema(&scalar_price),
            Err(DaoError::Mapping(MappingError::KindMismatch { column, .. })) if column == "price_id"
        ));
    }
}
