use std::{any::TypeId, marker::PhantomData};

use super::{
    Entity,
    reference::{Reference, ReferenceField},
    value::{FieldValue, Value, ValueError, ValueKind},
};
use crate::error::MappingError;

/// The declared type of an entity field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// A plain column value.
    Scalar { type_name: &'static str },
    /// Another entity, stored as a foreign key column.
    Reference {
        entity: &'static str,
        type_id: TypeId,
    },
}

impl FieldType {
    #[must_use]
    pub const fn is_reference(&self) -> bool {
        matches!(self, Self::Reference { .. })
    }
}

pub(crate) trait ScalarAccess<E>: Send + Sync {
    fn get(&self, entity: &E) -> Value;

    fn set(&self, entity: &mut E, value: Value) -> Result<(), ValueError>;

    fn type_name(&self) -> &'static str;
}

struct Scalar<E, T> {
    get: fn(&E) -> &T,
    get_mut: fn(&mut E) -> &mut T,
}

impl<E, T> ScalarAccess<E> for Scalar<E, T>
where
    T: FieldValue,
{
    fn get(&self, entity: &E) -> Value {
        (self.get)(entity).to_value()
    }

    fn set(&self, entity: &mut E, value: Value) -> Result<(), ValueError> {
        *(self.get_mut)(entity) = T::from_value(value)?;
        Ok(())
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

pub(crate) enum Field<E> {
    Scalar(Box<dyn ScalarAccess<E>>),
    Reference(Box<dyn ReferenceField<E>>),
}

impl<E> Field<E> {
    pub(crate) const fn kind(&self) -> &'static str {
        match self {
            Self::Scalar(_) => "a plain value",
            Self::Reference(_) => "an entity reference",
        }
    }
}

/// Accessor table of one entity type: field name to getter/setter pair and field type.
///
/// Built once per type via [`EntityMetadata::builder`] and immutable afterwards.
pub struct EntityMetadata<E>
where
    E: Entity,
{
    fields: Vec<(&'static str, Field<E>)>,
}

impl<E> EntityMetadata<E>
where
    E: Entity,
{
    #[must_use]
    pub fn builder() -> EntityMetadataBuilder<E> {
        EntityMetadataBuilder {
            fields: vec![],
            marker: PhantomData,
        }
    }

    #[must_use]
    pub const fn entity_name(&self) -> &'static str {
        E::NAME
    }

    /// A default-constructed instance, the starting point when mapping a row.
    #[must_use]
    pub fn new_instance(&self) -> E {
        E::default()
    }

    #[must_use]
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|(e, _)| (*e).eq(name))
    }

    /// Field names in declaration order.
    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|(e, _)| *e)
    }

    /// # Errors
    ///
    /// If the entity has no such field.
    pub fn field_type(&self, name: &str) -> Result<FieldType, MappingError> {
        Ok(match self.field(name)? {
            Field::Scalar(scalar) => FieldType::Scalar {
                type_name: scalar.type_name(),
            },
            Field::Reference(reference) => FieldType::Reference {
                entity: reference.entity_name(),
                type_id: reference.target_type_id(),
            },
        })
    }

    /// Read a field. For reference fields this is the referenced entity's identity, or
    /// an integer null if there is no referenced entity or it has not been inserted yet.
    ///
    /// # Errors
    ///
    /// If the entity has no such field.
    pub fn get(&self, name: &str, entity: &E) -> Result<Value, MappingError> {
        Ok(match self.field(name)? {
            Field::Scalar(scalar) => scalar.get(entity),
            Field::Reference(reference) => reference
                .referenced_id(entity)
                .flatten()
                .map_or(Value::Null(ValueKind::Integer), Value::Integer),
        })
    }

    /// Write a scalar field.
    ///
    /// # Errors
    ///
    /// If the entity has no such field, the field holds another entity, or the value cannot be
    /// converted to the field's type.
    pub fn set(&self, name: &str, entity: &mut E, value: Value) -> Result<(), MappingError> {
        match self.field(name)? {
            Field::Scalar(scalar) => {
                scalar
                    .set(entity, value)
                    .map_err(|source| MappingError::Conversion {
                        entity: E::NAME,
                        field: name.to_string(),
                        source,
                    })
            }
            Field::Reference(_) => Err(MappingError::NotScalar {
                entity: E::NAME,
                field: name.to_string(),
            }),
        }
    }

    pub(crate) fn field(&self, name: &str) -> Result<&Field<E>, MappingError> {
        self.fields
            .iter()
            .find_map(|(e, field)| (*e).eq(name).then_some(field))
            .ok_or_else(|| MappingError::UnknownField {
                entity: E::NAME,
                field: name.to_string(),
            })
    }

    pub(crate) fn references(&self) -> impl Iterator<Item = &dyn ReferenceField<E>> {
        self.fields.iter().filter_map(|(_, field)| match field {
            Field::Reference(reference) => Some(reference.as_ref()),
            Field::Scalar(_) => None,
        })
    }
}

pub struct EntityMetadataBuilder<E>
where
    E: Entity,
{
    fields: Vec<(&'static str, Field<E>)>,
    marker: PhantomData<E>,
}

impl<E> EntityMetadataBuilder<E>
where
    E: Entity,
{
    /// Register a plain field. A later registration under the same name replaces the earlier
    /// one.
    #[must_use]
    pub fn field<T>(self, name: &'static str, get: fn(&E) -> &T, get_mut: fn(&mut E) -> &mut T) -> Self
    where
        T: FieldValue,
    {
        self.push(name, Field::Scalar(Box::new(Scalar { get, get_mut })))
    }

    /// Register a field holding another entity, persisted through a foreign key column.
    ///
    /// `get` and `get_mut` return `None` when no entity is referenced; `set` stores an entity
    /// loaded from the store.
    #[must_use]
    pub fn reference<R>(
        self,
        name: &'static str,
        get: fn(&E) -> Option<&R>,
        get_mut: fn(&mut E) -> Option<&mut R>,
        set: fn(&mut E, R),
    ) -> Self
    where
        R: Entity,
    {
        self.push(
            name,
            Field::Reference(Box::new(Reference { get, get_mut, set })),
        )
    }

    fn push(mut self, name: &'static str, field: Field<E>) -> Self {
        self.fields.retain(|(e, _)| !(*e).eq(name));
        self.fields.push((name, field));
        self
    }

    #[must_use]
    pub fn build(self) -> EntityMetadata<E> {
        EntityMetadata {
            fields: self.fields,
        }
    }
}
