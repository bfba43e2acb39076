use darling::{FromDeriveInput, FromField, ast::Data};
use proc_macro_error2::{abort, emit_error};
use proc_macro2::TokenStream;
use quote::quote;
use syn::{DeriveInput, GenericArgument, Ident, PathArguments, Type, parse2};

#[derive(FromField, Debug, Clone)]
#[darling(attributes(store_dao))]
struct DeriveEntityField {
    ident: Option<Ident>,
    ty: Type,
    #[darling(default)]
    id: bool,
    #[darling(default)]
    reference: bool,
    #[darling(default)]
    skip: bool,
    field: Option<String>,
}

#[derive(FromDeriveInput)]
#[darling(attributes(store_dao), supports(struct_named))]
struct DeriveEntityTarget {
    ident: Ident,
    name: Option<String>,
    data: Data<(), DeriveEntityField>,
}

enum FieldKind {
    Scalar,
    Reference,
    OptionalReference,
}

struct TargetField {
    ident: Ident,
    name: String,
    kind: FieldKind,
}

/// `Some(T)` if `ty` is spelled `Option<T>`.
fn option_inner(ty: &Type) -> Option<&Type> {
    let Type::Path(path) = ty else {
        return None;
    };

    let segment = path.path.segments.last()?;

    if !segment.ident.eq("Option") {
        return None;
    }

    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };

    match args.args.first()? {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    }
}

pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input: DeriveInput = match parse2(input) {
        Ok(e) => e,
        Err(e) => return e.to_compile_error(),
    };

    let target = match DeriveEntityTarget::from_derive_input(&input) {
        Ok(r) => r,
        Err(e) => return e.write_errors(),
    };

    let Some(struct_data) = target.data.take_struct() else {
        abort! {
            input, "Target is not a struct.";
            note = "This macro must be run on a struct.";
        };
    };

    let explicit_id = struct_data.fields.iter().filter(|e| e.id).count();

    if explicit_id > 1 {
        abort! {
            input, "More than one identity field.";
            note = "Mark exactly one `Option<i64>` field with #[store_dao(id)].";
        };
    }

    let Some(id_ident) = struct_data
        .fields
        .iter()
        .find(|e| {
            if explicit_id == 1 {
                e.id
            } else {
                e.ident.as_ref().is_some_and(|ident| ident.eq("id"))
            }
        })
        .and_then(|e| e.ident.clone())
    else {
        abort! {
            input, "Missing identity field.";
            note = "Add an `id: Option<i64>` field, or mark one with #[store_dao(id)].";
        };
    };

    let fields = struct_data
        .fields
        .iter()
        .filter(|e| !e.skip && !e.ident.as_ref().is_some_and(|ident| ident.eq(&id_ident)))
        .map(|e| {
            let Some(ident) = &e.ident else {
                abort! {
                    e.ident, "Field has no ident.";
                    note = "This macro cannot be run on tuple structs.";
                };
            };

            let kind = if !e.reference {
                FieldKind::Scalar
            } else if option_inner(&e.ty).is_some() {
                FieldKind::OptionalReference
            } else {
                FieldKind::Reference
            };

            TargetField {
                ident: ident.clone(),
                name: e.field.clone().unwrap_or_else(|| ident.to_string()),
                kind,
            }
        })
        .collect::<Vec<_>>();

    // Make sure all fields have unique names.
    if let Some(duplicate) = fields
        .iter()
        .find(|e| fields.iter().filter(|o| e.name.eq(&o.name)).count() > 1)
    {
        fields.iter().for_each(|e| {
            if fields.iter().filter(|o| e.name.eq(&o.name)).count() > 1 {
                emit_error! {
                    e.ident.span(), "Clashing occurrence of \"{}\" here.", e.name
                };
            }
        });

        abort! {
            duplicate.ident.span(), "Duplicate field name \"{}\"", duplicate.name;
            note = "Fields must have unique names, if necessary use the #[store_dao(field = \"my_field_name\")] attribute to specify a unique name.";
        }
    }

    let registrations = fields.iter().map(|e| {
        let ident = &e.ident;
        let name = &e.name;

        match e.kind {
            FieldKind::Scalar => quote! {
                .field(#name, |e: &Self| &e.#ident, |e: &mut Self| &mut e.#ident)
            },
            FieldKind::Reference => quote! {
                .reference(
                    #name,
                    |e: &Self| ::std::option::Option::Some(&e.#ident),
                    |e: &mut Self| ::std::option::Option::Some(&mut e.#ident),
                    |e: &mut Self, value| e.#ident = value,
                )
            },
            FieldKind::OptionalReference => quote! {
                .reference(
                    #name,
                    |e: &Self| e.#ident.as_ref(),
                    |e: &mut Self| e.#ident.as_mut(),
                    |e: &mut Self, value| e.#ident = ::std::option::Option::Some(value),
                )
            },
        }
    });

    let model_ident = &target.ident;
    let entity_name = target.name.unwrap_or_else(|| model_ident.to_string());

    quote! {
        impl ::store_dao::entity::Entity for #model_ident {
            const NAME: &'static str = #entity_name;

            fn id(&self) -> ::std::option::Option<i64> {
                self.#id_ident
            }

            fn set_id(&mut self, id: i64) {
                self.#id_ident = ::std::option::Option::Some(id);
            }

            fn describe() -> ::store_dao::entity::metadata::EntityMetadata<Self> {
                ::store_dao::entity::metadata::EntityMetadata::builder()
                    #(
                        #registrations
                    )*
                    .build()
            }
        }
    }
}
