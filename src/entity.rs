pub mod metadata;
pub(crate) mod reference;
pub mod registry;
pub mod value;

use metadata::EntityMetadata;

/// A record type persisted as one row of a table.
///
/// Implementations are usually generated with [`Entity`](crate::Entity) derive. The identity is
/// unset until the entity is inserted; afterwards it holds the row's primary key.
pub trait Entity: Default + Send + Sync + 'static {
    /// Name used to look up this entity's table in the schema metadata.
    const NAME: &'static str;

    fn id(&self) -> Option<i64>;

    fn set_id(&mut self, id: i64);

    /// Build the field accessor table for this entity. Called once per type when the entity
    /// is registered.
    fn describe() -> EntityMetadata<Self>;
}
