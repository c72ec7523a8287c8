use crate::codec;
use crate::error::{Error, Result};
use crate::naming::quote_ident;
use crate::schema::OnDelete;
use crate::transform::ErasedTransformer;
use crate::types::StorageType;
use rusqlite::types::Value as SqlValue;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKey {
    pub model: String,
    pub table: String,
    pub on_delete: OnDelete,
}

/// For inlined columns: the top-level field and the wrapper sub-field path.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnOrigin {
    pub field: String,
    pub sub_field: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    /// Field path from the model root, e.g. `["location", "world"]`.
    pub path: Vec<String>,
    pub storage: StorageType,
    pub nullable: bool,
    pub unique: bool,
    pub inlineable: bool,
    pub primary_key: bool,
    pub origin: Option<ColumnOrigin>,
    pub foreign_key: Option<ForeignKey>,
    pub migration_default: Option<Value>,
}

impl Column {
    pub fn new(name: impl Into<String>, path: Vec<String>, storage: StorageType) -> Self {
        Column {
            name: name.into(),
            path,
            storage,
            nullable: false,
            unique: false,
            inlineable: true,
            primary_key: false,
            origin: None,
            foreign_key: None,
            migration_default: None,
        }
    }

    /// Column definition as used in `CREATE TABLE`.
    pub fn definition(&self) -> String {
        let mut sql = format!("{} {}", quote_ident(&self.name), self.storage.sql_type());
        if self.primary_key {
            sql.push_str(" PRIMARY KEY");
        }
        if !self.nullable {
            sql.push_str(" NOT NULL");
        }
        if self.unique {
            sql.push_str(" UNIQUE");
        }
        sql
    }
}

/// How one declared field maps onto columns.
#[derive(Clone)]
pub enum FieldLayout {
    Column(usize),
    Inlined {
        transformer: Arc<dyn ErasedTransformer>,
        fields: Vec<FieldEntry>,
    },
    Variant {
        discriminant: String,
        arms: Vec<(String, FieldLayout)>,
    },
}

impl FieldLayout {
    /// Indices of every column under this layout, in column order.
    pub fn columns(&self) -> Vec<usize> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns(&self, out: &mut Vec<usize>) {
        match self {
            FieldLayout::Column(index) => out.push(*index),
            FieldLayout::Inlined { fields, .. } => {
                for entry in fields {
                    entry.layout.collect_columns(out);
                }
            }
            FieldLayout::Variant { arms, .. } => {
                for (_, arm) in arms {
                    arm.collect_columns(out);
                }
            }
        }
    }
}

impl fmt::Debug for FieldLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldLayout::Column(index) => f.debug_tuple("Column").field(index).finish(),
            FieldLayout::Inlined { transformer, fields } => f
                .debug_struct("Inlined")
                .field("foreign", &transformer.foreign_type())
                .field("fields", fields)
                .finish(),
            FieldLayout::Variant { discriminant, arms } => f
                .debug_struct("Variant")
                .field("discriminant", discriminant)
                .field("arms", arms)
                .finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldEntry {
    pub name: String,
    pub unique: bool,
    pub inlineable: bool,
    pub layout: FieldLayout,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UniqueKey {
    /// Column name for single-column keys, field path for composite ones.
    pub name: String,
    pub columns: Vec<usize>,
}

/// Result of resolving a field path against a table.
#[derive(Debug)]
pub enum Resolved<'a> {
    Column(usize),
    Field(&'a FieldLayout),
}

#[derive(Debug, Clone)]
pub struct Table {
    pub(crate) model: &'static str,
    pub(crate) name: String,
    pub(crate) columns: Vec<Column>,
    pub(crate) fields: Vec<FieldEntry>,
    pub(crate) unique_keys: Vec<UniqueKey>,
    pub(crate) transformer_only: bool,
}

impl Table {
    pub fn model(&self) -> &'static str {
        self.model
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn fields(&self) -> &[FieldEntry] {
        &self.fields
    }

    pub fn unique_keys(&self) -> &[UniqueKey] {
        &self.unique_keys
    }

    pub fn is_transformer_only(&self) -> bool {
        self.transformer_only
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub(crate) fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Resolve a dotted field path (`location.world`) or a raw column name.
    pub fn resolve(&self, path: &str) -> Option<Resolved<'_>> {
        self.resolve_path(path).or_else(|| {
            self.column_index(path).map(Resolved::Column)
        })
    }

    fn resolve_path(&self, path: &str) -> Option<Resolved<'_>> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut layout = &self.fields.iter().find(|e| e.name == first)?.layout;
        for segment in segments {
            layout = match layout {
                FieldLayout::Column(_) => return None,
                FieldLayout::Inlined { fields, .. } => {
                    &fields.iter().find(|e| e.name == segment)?.layout
                }
                FieldLayout::Variant { arms, .. } => {
                    &arms.iter().find(|(tag, _)| tag == segment)?.1
                }
            };
        }
        Some(match layout {
            FieldLayout::Column(index) => Resolved::Column(*index),
            other => Resolved::Field(other),
        })
    }

    pub fn create_sql(&self) -> String {
        let mut parts: Vec<String> = self.columns.iter().map(Column::definition).collect();
        for key in self.unique_keys.iter().filter(|k| k.columns.len() > 1) {
            let cols: Vec<String> = key
                .columns
                .iter()
                .map(|i| quote_ident(&self.columns[*i].name))
                .collect();
            parts.push(format!("UNIQUE ({})", cols.join(", ")));
        }
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
            quote_ident(&self.name),
            parts.join(",\n    ")
        )
    }

    /// Flatten a serialized model into one SQL value per column.
    pub(crate) fn encode_row(&self, object: &Map<String, Value>) -> Result<Vec<SqlValue>> {
        let mut row = vec![SqlValue::Null; self.columns.len()];
        for entry in &self.fields {
            let value = object.get(&entry.name).unwrap_or(&Value::Null);
            self.flatten(&entry.layout, value, object, &mut row)?;
        }
        for (column, value) in self.columns.iter().zip(&row) {
            if !column.nullable && *value == SqlValue::Null {
                return Err(Error::Conversion(format!(
                    "{}.{} may not be null",
                    self.model, column.name
                )));
            }
        }
        Ok(row)
    }

    /// Flatten a single field value, returning `(column, value)` pairs.
    pub(crate) fn encode_field(&self, layout: &FieldLayout, value: &Value) -> Result<Vec<(usize, SqlValue)>> {
        let mut row = vec![SqlValue::Null; self.columns.len()];
        self.flatten(layout, value, &Map::new(), &mut row)?;
        Ok(layout
            .columns()
            .into_iter()
            .map(|index| (index, std::mem::replace(&mut row[index], SqlValue::Null)))
            .collect())
    }

    fn flatten(
        &self,
        layout: &FieldLayout,
        value: &Value,
        siblings: &Map<String, Value>,
        row: &mut [SqlValue],
    ) -> Result<()> {
        match layout {
            FieldLayout::Column(index) => {
                row[*index] = codec::encode(&self.columns[*index], value)?;
            }
            FieldLayout::Inlined { transformer, fields } => {
                // One replace per field; every sub-column reads from the same wrapper.
                let known = transformer.replace(value)?;
                let known = match known {
                    Value::Null => return Ok(()),
                    Value::Object(map) => map,
                    _ => {
                        return Err(Error::Conversion(format!(
                            "Transformer for '{}' did not produce an object",
                            transformer.foreign_type()
                        )))
                    }
                };
                for entry in fields {
                    let sub = known.get(&entry.name).unwrap_or(&Value::Null);
                    self.flatten(&entry.layout, sub, &known, row)?;
                }
            }
            FieldLayout::Variant { discriminant, arms } => {
                if value.is_null() {
                    return Ok(());
                }
                let arm = self.variant_arm(discriminant, arms, siblings)?.ok_or_else(|| {
                    Error::Conversion(format!(
                        "{}: discriminant '{discriminant}' is missing",
                        self.model
                    ))
                })?;
                self.flatten(arm, value, siblings, row)?;
            }
        }
        Ok(())
    }

    /// Rebuild a serialized model from one SQL value per column.
    pub(crate) fn decode_row(&self, row: &[SqlValue]) -> Result<Map<String, Value>> {
        let mut object = Map::new();
        for entry in &self.fields {
            let value = self.assemble(&entry.layout, row, &object)?;
            object.insert(entry.name.clone(), value);
        }
        Ok(object)
    }

    fn assemble(&self, layout: &FieldLayout, row: &[SqlValue], siblings: &Map<String, Value>) -> Result<Value> {
        match layout {
            FieldLayout::Column(index) => codec::decode(&self.columns[*index], &row[*index]),
            FieldLayout::Inlined { transformer, fields } => {
                if layout.columns().iter().all(|i| row[*i] == SqlValue::Null) {
                    return Ok(Value::Null);
                }
                let mut known = Map::new();
                for entry in fields {
                    let value = self.assemble(&entry.layout, row, &known)?;
                    known.insert(entry.name.clone(), value);
                }
                transformer.revive(Value::Object(known))
            }
            FieldLayout::Variant { discriminant, arms } => {
                match self.variant_arm(discriminant, arms, siblings)? {
                    Some(arm) => self.assemble(arm, row, siblings),
                    None => Ok(Value::Null),
                }
            }
        }
    }

    fn variant_arm<'a>(
        &self,
        discriminant: &str,
        arms: &'a [(String, FieldLayout)],
        siblings: &Map<String, Value>,
    ) -> Result<Option<&'a FieldLayout>> {
        let tag = match siblings.get(discriminant) {
            None | Some(Value::Null) => return Ok(None),
            Some(Value::String(tag)) => tag,
            Some(other) => {
                return Err(Error::Conversion(format!(
                    "{}: discriminant '{discriminant}' must be a string, got {other}",
                    self.model
                )))
            }
        };
        arms.iter()
            .find(|(candidate, _)| candidate == tag)
            .map(|(_, arm)| Some(arm))
            .ok_or_else(|| {
                Error::Conversion(format!(
                    "{}: no variant registered for {discriminant} = '{tag}'",
                    self.model
                ))
            })
    }

    /// Loosely typed value of a field, without reviving transformed values.
    pub(crate) fn raw_value(&self, layout: &FieldLayout, row: &[SqlValue]) -> Result<Value> {
        match layout {
            FieldLayout::Column(index) => codec::decode(&self.columns[*index], &row[*index]),
            FieldLayout::Inlined { fields, .. } => {
                let mut object = Map::new();
                for entry in fields {
                    object.insert(entry.name.clone(), self.raw_value(&entry.layout, row)?);
                }
                Ok(Value::Object(object))
            }
            FieldLayout::Variant { arms, .. } => {
                let mut object = Map::new();
                for (tag, arm) in arms {
                    object.insert(tag.clone(), self.raw_value(arm, row)?);
                }
                Ok(Value::Object(object))
            }
        }
    }
}
