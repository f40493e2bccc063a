//! Procedural macros for the docmap project.
//!
//! `#[derive(Document)]` implements `docmap::document::Document` for a struct with named
//! fields:
//!
//! ```ignore
//! #[derive(Debug, Clone, Default, Serialize, Deserialize, Document)]
//! #[document(collection = "accounts")]
//! #[serde(default)]
//! pub struct Account {
//!     #[document(primary_key)]
//!     pub handle: String,
//!     pub balance: i64,
//! }
//! ```
//!
//! The collection name defaults to the lowercased struct name. Exactly one field must carry
//! `#[document(primary_key)]`. When serde stores that field under another name, repeat it with
//! `#[document(primary_key, name = "...")]`.

#[allow(unused_extern_crates)]
extern crate self as docmap_macros;

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    Attribute, Data, DataStruct, DeriveInput, Field, Fields, LitStr, ext::IdentExt,
    parse_macro_input, spanned::Spanned,
};

#[proc_macro_derive(Document, attributes(document))]
pub fn derive_document(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    expand_document(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand_document(input: DeriveInput) -> syn::Result<TokenStream2> {
    let ident = &input.ident;
    let collection = collection_name(&input.attrs)?.unwrap_or_else(|| ident.unraw().to_string().to_lowercase());

    let fields = match &input.data {
        Data::Struct(DataStruct { fields: Fields::Named(named), .. }) => &named.named,
        _ => {
            return Err(syn::Error::new_spanned(
                ident,
                "Document can only be derived for structs with named fields",
            ));
        }
    };

    let mut primary_key = None;
    for field in fields {
        if let Some(name) = primary_key_name(field)? {
            if primary_key.is_some() {
                return Err(syn::Error::new(
                    field.span(),
                    "only one field can be marked #[document(primary_key)]",
                ));
            }
            primary_key = Some(name);
        }
    }

    let primary_key = primary_key.ok_or_else(|| {
        syn::Error::new_spanned(ident, "missing a field marked #[document(primary_key)]")
    })?;

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::docmap::document::Document for #ident #ty_generics #where_clause {
            fn collection_name() -> &'static str {
                #collection
            }

            fn primary_key_field() -> &'static str {
                #primary_key
            }
        }
    })
}

fn collection_name(attrs: &[Attribute]) -> syn::Result<Option<String>> {
    let mut collection = None;

    for attr in attrs.iter().filter(|attr| attr.path().is_ident("document")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("collection") {
                let name: LitStr = meta.value()?.parse()?;
                collection = Some(name.value());
                Ok(())
            } else {
                Err(meta.error("expected `collection = \"...\"`"))
            }
        })?;
    }

    Ok(collection)
}

/// Returns the stored name of `field` if it is marked as the primary key.
fn primary_key_name(field: &Field) -> syn::Result<Option<String>> {
    let mut is_key = false;
    let mut name = None;

    for attr in field.attrs.iter().filter(|attr| attr.path().is_ident("document")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("primary_key") {
                is_key = true;
                Ok(())
            } else if meta.path.is_ident("name") {
                let value: LitStr = meta.value()?.parse()?;
                name = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("expected `primary_key` or `name = \"...\"`"))
            }
        })?;
    }

    if !is_key {
        if name.is_some() {
            return Err(syn::Error::new(field.span(), "`name` is only valid on the primary key field"));
        }
        return Ok(None);
    }

    Ok(Some(match name {
        Some(name) => name,
        None => field
            .ident
            .as_ref()
            .map(|ident| ident.unraw().to_string())
            .ok_or_else(|| syn::Error::new(field.span(), "primary key field must be named"))?,
    }))
}
