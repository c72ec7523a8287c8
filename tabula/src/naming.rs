//! Deterministic conversion between Rust-side names and SQL identifiers.
//!
//! Model names are UpperCamelCase and map to lower_snake table names. Field
//! names are lowerCamelCase (the serde `camelCase` convention) and map to
//! snake_case columns. Inlined columns join their path with [`INLINE_SEPARATOR`].

use crate::error::{Error, Result};
use heck::{ToLowerCamelCase, ToSnakeCase, ToUpperCamelCase};

pub const INLINE_SEPARATOR: &str = "__";

pub fn table_name(model: &str) -> String {
    model.to_snake_case()
}

pub fn model_name(table: &str) -> String {
    table.to_upper_camel_case()
}

pub fn column_name(field: &str) -> String {
    field.to_snake_case()
}

pub fn field_name(column: &str) -> String {
    column.to_lower_camel_case()
}

/// Column name for a field path, e.g. `["location", "world"]` -> `location__world`.
pub fn path_column(path: &[String]) -> String {
    path.iter()
        .map(|segment| column_name(segment))
        .collect::<Vec<_>>()
        .join(INLINE_SEPARATOR)
}

/// Reverse of [`path_column`].
pub fn column_path(column: &str) -> Vec<String> {
    column.split(INLINE_SEPARATOR).map(field_name).collect()
}

/// Double-quote an SQL identifier.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

pub fn check_model_name(model: &str) -> Result<()> {
    if model.is_empty() || model_name(&table_name(model)) != model {
        return Err(Error::Schema(format!(
            "Model name '{model}' does not survive the table name round trip (expected UpperCamelCase)"
        )));
    }
    Ok(())
}

pub fn check_field_name(model: &str, field: &str) -> Result<()> {
    if field.contains(INLINE_SEPARATOR) {
        return Err(Error::Schema(format!(
            "Field '{model}.{field}' contains the reserved separator '{INLINE_SEPARATOR}'"
        )));
    }
    if field.is_empty() || field_name(&column_name(field)) != field {
        return Err(Error::Schema(format!(
            "Field '{model}.{field}' does not survive the column name round trip (expected lowerCamelCase)"
        )));
    }
    Ok(())
}
