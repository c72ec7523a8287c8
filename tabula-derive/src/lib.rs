//! Derive macros emitting Tabula schema declarations.
//!
//! `#[derive(Schema)]` describes an embedded wrapper type; `#[derive(Model)]`
//! additionally implements `tabula::Model` through the field marked
//! `#[tabula(meta)]`. Field names follow serde's `camelCase` convention.
//!
//! Field attributes: `meta`, `skip`, `mixin` (with optional `designated`),
//! `unique`, `nullable`, `rename = "..."`, `inherit = bool`, `inline = bool`,
//! `foreign = "..."`, `variant = "..."` with `discriminant = "..."`,
//! `references = "Model"` with optional `on_delete = "cascade" | "set_null" |
//! "restrict"`, and `migration_default = <literal>`.

mod attrs;
mod schema_gen;
mod type_utils;

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

#[proc_macro_derive(Schema, attributes(tabula))]
pub fn derive_schema(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match schema_gen::expand_schema(&input) {
        Ok(expanded) => expanded.schema.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

#[proc_macro_derive(Model, attributes(tabula))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match schema_gen::expand_model(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}
