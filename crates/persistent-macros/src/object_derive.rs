//! Implementation of the `PersistentObject` derive macro.
//!
//! Every named field becomes a property of the object state unless it is marked
//! `#[persistent(skip)]`. The property name defaults to the field name.

use proc_macro2::TokenStream;
use quote::{ToTokens, quote};
use syn::{Data, DeriveInput, Error, Field, Fields, Ident, Lit, LitStr, Result};

/// Parsed `#[derive(PersistentObject)]` input.
#[derive(Debug)]
pub struct ObjectDef {
    /// The struct name.
    pub name: Ident,
    /// Class name the definition is looked up by.
    pub class: String,
    /// Mapped (non-skipped) fields.
    pub fields: Vec<PropertyField>,
    /// Generics from the struct.
    pub generics: syn::Generics,
}

/// A field carried in the object state.
#[derive(Debug)]
pub struct PropertyField {
    pub ident: Ident,
    pub property: String,
}

/// Parse a `DeriveInput` into an `ObjectDef`.
pub fn parse_object(input: &DeriveInput) -> Result<ObjectDef> {
    let mut class = None;
    for attr in &input.attrs {
        if !attr.path().is_ident("persistent") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("class") {
                let value: LitStr = meta.value()?.parse()?;
                class = Some(value.value());
                Ok(())
            } else {
                let attr_name = meta.path.to_token_stream().to_string();
                Err(Error::new_spanned(
                    &meta.path,
                    format!("unknown persistent attribute `{attr_name}` on a struct; expected `class`"),
                ))
            }
        })?;
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => named
                .named
                .iter()
                .map(parse_field)
                .filter_map(Result::transpose)
                .collect::<Result<Vec<_>>>()?,
            Fields::Unnamed(_) => {
                return Err(Error::new_spanned(
                    &data.fields,
                    "PersistentObject requires a struct with named fields",
                ));
            }
            Fields::Unit => Vec::new(),
        },
        Data::Enum(_) | Data::Union(_) => {
            return Err(Error::new_spanned(
                input,
                "PersistentObject can only be derived for structs",
            ));
        }
    };

    Ok(ObjectDef {
        name: input.ident.clone(),
        class: class.unwrap_or_else(|| input.ident.to_string()),
        fields,
        generics: input.generics.clone(),
    })
}

/// `Ok(None)` for skipped fields.
fn parse_field(field: &Field) -> Result<Option<PropertyField>> {
    let ident = field
        .ident
        .clone()
        .ok_or_else(|| Error::new_spanned(field, "expected named field"))?;
    let mut property = None;
    let mut skip = false;

    for attr in &field.attrs {
        if !attr.path().is_ident("persistent") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                skip = true;
            } else if meta.path.is_ident("rename") {
                let value: Lit = meta.value()?.parse()?;
                match value {
                    Lit::Str(lit) if !lit.value().is_empty() => property = Some(lit.value()),
                    other => {
                        return Err(Error::new_spanned(
                            other,
                            "expected a non-empty string literal for rename",
                        ));
                    }
                }
            } else {
                let attr_name = meta.path.to_token_stream().to_string();
                return Err(Error::new_spanned(
                    &meta.path,
                    format!(
                        "unknown persistent attribute `{attr_name}`. \
                         Valid field attributes are: rename, skip"
                    ),
                ));
            }
            Ok(())
        })?;
    }

    if skip {
        return Ok(None);
    }
    let property = property.unwrap_or_else(|| {
        let name = ident.to_string();
        name.strip_prefix("r#").map_or_else(|| name.clone(), str::to_string)
    });
    Ok(Some(PropertyField { ident, property }))
}

/// Generate the `PersistentObject` implementation.
pub fn generate_object_impl(def: &ObjectDef) -> TokenStream {
    let name = &def.name;
    let class = &def.class;
    let (impl_generics, ty_generics, where_clause) = def.generics.split_for_impl();
    let capacity = def.fields.len();

    let inserts = def.fields.iter().map(|field| {
        let ident = &field.ident;
        let property = &field.property;
        quote! {
            state.insert(
                ::std::string::String::from(#property),
                ::persistent_core::Value::from(::std::clone::Clone::clone(&self.#ident)),
            );
        }
    });

    let assignments = def.fields.iter().map(|field| {
        let ident = &field.ident;
        let property = &field.property;
        quote! {
            if let ::std::option::Option::Some(value) = state.get(#property) {
                self.#ident = ::persistent_core::object::property_from_value(#class, #property, value)?;
            }
        }
    });

    quote! {
        impl #impl_generics ::persistent_core::PersistentObject for #name #ty_generics #where_clause {
            const CLASS: &'static str = #class;

            fn state(&self) -> ::persistent_core::State {
                let mut state = ::persistent_core::State::with_capacity(#capacity);
                #(#inserts)*
                state
            }

            fn set_state(&mut self, state: &::persistent_core::State) -> ::persistent_core::Result<()> {
                #(#assignments)*
                ::std::result::Result::Ok(())
            }
        }
    }
}
