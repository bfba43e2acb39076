mod entity;

use entity::derive_entity;
use proc_macro::TokenStream;
use proc_macro_error2::proc_macro_error;

/// Implement `store_dao::Entity` for a struct with named fields.
///
/// The identity is the `Option<i64>` field marked `#[store_dao(id)]`, or the field named `id`.
/// Every other field is persisted unless marked `#[store_dao(skip)]`. Fields holding another
/// entity, directly or as an `Option`, are marked `#[store_dao(reference)]`.
///
/// `#[store_dao(name = "...")]` on the struct overrides the entity name used to find its
/// table, `#[store_dao(field = "...")]` on a field overrides the field name.
#[proc_macro_error]
#[proc_macro_derive(Entity, attributes(store_dao))]
pub fn entity(input: TokenStream) -> TokenStream {
    derive_entity(input.into()).into()
}
