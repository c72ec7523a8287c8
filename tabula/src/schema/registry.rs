use super::table::{Column, ColumnOrigin, FieldEntry, FieldLayout, ForeignKey, Table, UniqueKey};
use super::{FieldDescriptor, FieldSet, OnDelete, Schema, SchemaRef};
use crate::error::{Error, Result};
use crate::model::{self, Model};
use crate::naming;
use crate::transform::{Transformer, TransformerRegistry, VariantSet};
use crate::types::{FieldType, StorageType, TypeCatalog};
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

/// Collects transformers and models, then derives every table in one pass.
#[derive(Default)]
pub struct RegistryBuilder {
    catalog: TypeCatalog,
    transformers: TransformerRegistry,
    models: Vec<SchemaRef>,
}

impl RegistryBuilder {
    /// Fails immediately when another transformer already fronts the same foreign type.
    pub fn transformer<T: Transformer>(mut self, transformer: T) -> Result<Self> {
        self.transformers.register(transformer)?;
        Ok(self)
    }

    pub fn variants(mut self, set: VariantSet) -> Result<Self> {
        self.transformers.register_variants(set)?;
        Ok(self)
    }

    /// Registering the same model twice is a no-op.
    pub fn model<M: Model>(mut self) -> Self {
        let schema = SchemaRef::of::<M>();
        if !self.models.iter().any(|m| m.type_id == schema.type_id) {
            self.models.push(schema);
        }
        self
    }

    pub fn build(self) -> Result<Registry> {
        let mut deriver = Deriver {
            catalog: &self.catalog,
            transformers: &self.transformers,
            by_type: HashMap::new(),
            by_name: HashMap::new(),
            order: Vec::new(),
            in_progress: Vec::new(),
        };
        for schema in &self.models {
            deriver.derive(*schema, true)?;
        }

        let Deriver {
            by_type,
            by_name,
            order,
            ..
        } = deriver;

        let mut references: HashMap<String, Vec<(Arc<Table>, usize)>> = HashMap::new();
        for table in order.iter().filter(|t| !t.transformer_only) {
            for (index, column) in table.columns.iter().enumerate() {
                let Some(fk) = &column.foreign_key else {
                    continue;
                };
                let target = by_name.get(&fk.table).filter(|t| !t.transformer_only).ok_or_else(|| {
                    Error::Schema(format!(
                        "{}.{} references '{}', which is not a registered model",
                        table.model, column.name, fk.model
                    ))
                })?;
                if column.storage != StorageType::Binary16 {
                    return Err(Error::Schema(format!(
                        "{}.{} references {} but is not a UUID column",
                        table.model, column.name, target.model
                    )));
                }
                references
                    .entry(fk.table.clone())
                    .or_default()
                    .push((table.clone(), index));
            }
        }

        Ok(Registry {
            tables: order,
            by_type,
            by_name,
            references,
        })
    }
}

/// Derived, immutable table definitions for every registered model and wrapper.
#[derive(Debug)]
pub struct Registry {
    tables: Vec<Arc<Table>>,
    by_type: HashMap<TypeId, Arc<Table>>,
    by_name: HashMap<String, Arc<Table>>,
    references: HashMap<String, Vec<(Arc<Table>, usize)>>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn table<S: Schema>(&self) -> Result<&Arc<Table>> {
        self.by_type
            .get(&TypeId::of::<S>())
            .ok_or_else(|| Error::Schema(format!("{} is not registered", S::NAME)))
    }

    pub fn table_named(&self, name: &str) -> Option<&Arc<Table>> {
        self.by_name.get(name)
    }

    /// All tables in derivation order, wrappers before the models inlining them.
    pub fn tables(&self) -> impl Iterator<Item = &Arc<Table>> {
        self.tables.iter()
    }

    /// `(table, column)` pairs whose foreign key targets `table`.
    pub(crate) fn references_to(&self, table: &str) -> &[(Arc<Table>, usize)] {
        self.references.get(table).map(Vec::as_slice).unwrap_or(&[])
    }
}

struct Deriver<'a> {
    catalog: &'a TypeCatalog,
    transformers: &'a TransformerRegistry,
    by_type: HashMap<TypeId, Arc<Table>>,
    by_name: HashMap<String, Arc<Table>>,
    order: Vec<Arc<Table>>,
    in_progress: Vec<&'static str>,
}

impl Deriver<'_> {
    fn derive(&mut self, schema: SchemaRef, is_model: bool) -> Result<Arc<Table>> {
        if let Some(table) = self.by_type.get(&schema.type_id) {
            if table.transformer_only == is_model {
                return Err(Error::Schema(format!(
                    "{} is registered as a model and also used as a transformer's known type",
                    schema.name
                )));
            }
            return Ok(table.clone());
        }
        if self.in_progress.contains(&schema.name) {
            return Err(Error::Schema(format!(
                "{} inlines itself through {}",
                schema.name,
                self.in_progress.join(" -> ")
            )));
        }
        naming::check_model_name(schema.name)?;
        let table_name = naming::table_name(schema.name);
        if let Some(existing) = self.by_name.get(&table_name) {
            return Err(Error::Schema(format!(
                "{} and {} both map to table '{table_name}'",
                existing.model, schema.name
            )));
        }

        self.in_progress.push(schema.name);
        let derived = self.derive_fields(schema, is_model);
        self.in_progress.pop();
        let (columns, fields) = derived?;

        for (i, column) in columns.iter().enumerate() {
            if columns[..i].iter().any(|c| c.name == column.name) {
                return Err(Error::Schema(format!(
                    "{} declares column '{}' more than once",
                    schema.name, column.name
                )));
            }
        }

        if is_model {
            let keys: Vec<&Column> = columns.iter().filter(|c| c.primary_key).collect();
            if keys.len() != 1 || keys[0].name != model::ID {
                return Err(Error::Schema(format!(
                    "{} must have exactly one primary key column named '{}'",
                    schema.name,
                    model::ID
                )));
            }
        }

        let mut columns = columns;
        let mut unique_keys = Vec::new();
        collect_unique_keys(&columns, &fields, "", &mut unique_keys);
        for key in unique_keys.iter().filter(|k| k.columns.len() == 1) {
            columns[key.columns[0]].unique = true;
        }

        let table = Arc::new(Table {
            model: schema.name,
            name: table_name.clone(),
            columns,
            fields,
            unique_keys,
            transformer_only: !is_model,
        });
        self.by_type.insert(schema.type_id, table.clone());
        self.by_name.insert(table_name, table.clone());
        self.order.push(table.clone());
        Ok(table)
    }

    fn derive_fields(&mut self, schema: SchemaRef, is_model: bool) -> Result<(Vec<Column>, Vec<FieldEntry>)> {
        let mut set = FieldSet::new(schema.name);
        if is_model {
            model::base_fields(&mut set);
        }
        (schema.describe)(&mut set);

        let mut columns = Vec::new();
        let mut entries: Vec<FieldEntry> = Vec::new();
        for field in set.into_fields() {
            naming::check_field_name(schema.name, &field.name)?;
            if entries.iter().any(|e| e.name == field.name) {
                return Err(Error::Schema(format!(
                    "{} declares field '{}' more than once",
                    schema.name, field.name
                )));
            }
            let primary = is_model && field.name == model::ID;
            let path = vec![field.name.clone()];
            let layout = self.place(schema.name, &field, &path, primary, &entries, &mut columns)?;
            entries.push(FieldEntry {
                name: field.name.clone(),
                unique: field.unique,
                inlineable: field.inlineable,
                layout,
            });
        }
        Ok((columns, entries))
    }

    fn place(
        &mut self,
        model: &str,
        field: &FieldDescriptor,
        path: &[String],
        primary: bool,
        earlier: &[FieldEntry],
        columns: &mut Vec<Column>,
    ) -> Result<FieldLayout> {
        match field.field_type {
            FieldType::Foreign(foreign) => {
                if field.references.is_some() {
                    return Err(Error::Schema(format!(
                        "{model}.{}: foreign keys are only allowed on UUID fields",
                        field.name
                    )));
                }
                self.inline(model, &field.name, foreign, path, field.nullable, columns)
            }
            FieldType::Variant { set, discriminant } => {
                self.place_variant(model, field, set, discriminant, path, earlier, columns)
            }
            primitive => {
                let storage = self
                    .catalog
                    .resolve(primitive, primary || field.unique)
                    .ok_or_else(|| {
                        Error::Schema(format!(
                            "{model}.{}: type {primitive} has no storage mapping",
                            field.name
                        ))
                    })?;
                if primary && storage != StorageType::Binary16 {
                    return Err(Error::Schema(format!(
                        "{model}.{}: identifiers must be fixed-length UUIDs",
                        field.name
                    )));
                }
                let mut column = Column::new(naming::path_column(path), path.to_vec(), storage);
                column.nullable = field.nullable;
                column.primary_key = primary;
                column.inlineable = field.inlineable;
                column.migration_default = field.migration_default.clone();
                if let Some(reference) = &field.references {
                    if reference.on_delete == OnDelete::SetNull && !field.nullable {
                        return Err(Error::Schema(format!(
                            "{model}.{}: SetNull requires a nullable field",
                            field.name
                        )));
                    }
                    column.foreign_key = Some(ForeignKey {
                        model: reference.model.clone(),
                        table: naming::table_name(&reference.model),
                        on_delete: reference.on_delete,
                    });
                }
                columns.push(column);
                Ok(FieldLayout::Column(columns.len() - 1))
            }
        }
    }

    fn inline(
        &mut self,
        model: &str,
        field: &str,
        foreign: &str,
        path: &[String],
        nullable: bool,
        columns: &mut Vec<Column>,
    ) -> Result<FieldLayout> {
        let transformer = self.transformers.get(foreign).cloned().ok_or_else(|| {
            Error::Schema(format!(
                "{model}.{field}: '{foreign}' is neither a column type nor covered by a transformer"
            ))
        })?;
        let known = self.derive(transformer.known(), false)?;

        let mut fields = Vec::new();
        for entry in known.fields.iter().filter(|e| e.inlineable) {
            fields.push(FieldEntry {
                name: entry.name.clone(),
                unique: entry.unique,
                inlineable: true,
                layout: inline_layout(&known, &entry.layout, path, nullable, columns),
            });
        }
        if fields.is_empty() {
            return Err(Error::Schema(format!(
                "{model}.{field}: {} has no inlineable fields",
                known.model
            )));
        }
        Ok(FieldLayout::Inlined {
            transformer,
            fields,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn place_variant(
        &mut self,
        model: &str,
        field: &FieldDescriptor,
        set: &str,
        discriminant: &str,
        path: &[String],
        earlier: &[FieldEntry],
        columns: &mut Vec<Column>,
    ) -> Result<FieldLayout> {
        if field.unique || field.references.is_some() {
            return Err(Error::Schema(format!(
                "{model}.{}: variant fields cannot be unique or referencing",
                field.name
            )));
        }
        let textual = earlier
            .iter()
            .find(|e| e.name == discriminant)
            .map(|e| matches!(e.layout, FieldLayout::Column(i) if columns[i].storage.is_textual()));
        if textual != Some(true) {
            return Err(Error::Schema(format!(
                "{model}.{}: discriminant '{discriminant}' must be a string field declared before it",
                field.name
            )));
        }
        let variants = self.transformers.variant_set(set).cloned().ok_or_else(|| {
            Error::Schema(format!("{model}.{}: unknown variant set '{set}'", field.name))
        })?;

        let mut arms = Vec::new();
        for (tag, foreign) in variants.arms() {
            naming::check_field_name(model, tag)?;
            let mut arm_path = path.to_vec();
            arm_path.push(tag.clone());
            // Only one arm is populated per row.
            let layout = self.inline(model, &field.name, foreign, &arm_path, true, columns)?;
            arms.push((tag.clone(), layout));
        }
        Ok(FieldLayout::Variant {
            discriminant: discriminant.to_string(),
            arms,
        })
    }
}

fn inline_layout(
    known: &Table,
    layout: &FieldLayout,
    prefix: &[String],
    nullable: bool,
    columns: &mut Vec<Column>,
) -> FieldLayout {
    match layout {
        FieldLayout::Column(index) => {
            let source = &known.columns[*index];
            let mut column = source.clone();
            column.path = prefix.iter().chain(&source.path).cloned().collect();
            column.name = naming::path_column(&column.path);
            column.nullable = source.nullable || nullable;
            column.unique = false;
            column.primary_key = false;
            column.origin = Some(ColumnOrigin {
                field: column.path[0].clone(),
                sub_field: column.path[1..].join("."),
            });
            columns.push(column);
            FieldLayout::Column(columns.len() - 1)
        }
        FieldLayout::Inlined {
            transformer,
            fields,
        } => FieldLayout::Inlined {
            transformer: transformer.clone(),
            fields: fields
                .iter()
                .map(|entry| FieldEntry {
                    name: entry.name.clone(),
                    unique: entry.unique,
                    inlineable: entry.inlineable,
                    layout: inline_layout(known, &entry.layout, prefix, nullable, columns),
                })
                .collect(),
        },
        FieldLayout::Variant { discriminant, arms } => FieldLayout::Variant {
            discriminant: discriminant.clone(),
            arms: arms
                .iter()
                .map(|(tag, arm)| (tag.clone(), inline_layout(known, arm, prefix, nullable, columns)))
                .collect(),
        },
    }
}

fn collect_unique_keys(columns: &[Column], entries: &[FieldEntry], prefix: &str, out: &mut Vec<UniqueKey>) {
    for entry in entries {
        let path = if prefix.is_empty() {
            entry.name.clone()
        } else {
            format!("{prefix}.{}", entry.name)
        };
        if entry.unique {
            let key_columns = entry.layout.columns();
            let name = match key_columns.as_slice() {
                [single] => columns[*single].name.clone(),
                _ => path.clone(),
            };
            out.push(UniqueKey {
                name,
                columns: key_columns,
            });
        }
        if let FieldLayout::Inlined { fields, .. } = &entry.layout {
            collect_unique_keys(columns, fields, &path, out);
        }
    }
}
