//! Schema declarations and the registry that derives tables from them.

mod registry;
mod table;

pub use registry::{Registry, RegistryBuilder};
pub use table::{Column, ColumnOrigin, FieldEntry, FieldLayout, ForeignKey, Resolved, Table, UniqueKey};

use crate::types::FieldType;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::TypeId;

/// What happens to referencing rows when the referenced row is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnDelete {
    Cascade,
    SetNull,
    Restrict,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    /// Target model name (not table name).
    pub model: String,
    pub on_delete: OnDelete,
}

/// Declaration of one persisted field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    pub field_type: FieldType,
    pub nullable: bool,
    pub unique: bool,
    /// Mixin fields with `inherit = false` only materialize in models that
    /// designate the mixin.
    pub inherit: bool,
    /// Whether this field's columns are flattened when its schema is inlined.
    pub inlineable: bool,
    pub migration_default: Option<serde_json::Value>,
    pub references: Option<Reference>,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        FieldDescriptor {
            name: name.into(),
            field_type,
            nullable: false,
            unique: false,
            inherit: true,
            inlineable: true,
            migration_default: None,
            references: None,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn inherit(mut self, inherit: bool) -> Self {
        self.inherit = inherit;
        self
    }

    pub fn inlineable(mut self, inlineable: bool) -> Self {
        self.inlineable = inlineable;
        self
    }

    pub fn migration_default(mut self, value: impl Into<serde_json::Value>) -> Self {
        self.migration_default = Some(value.into());
        self
    }

    pub fn references(mut self, model: impl Into<String>, on_delete: OnDelete) -> Self {
        self.references = Some(Reference {
            model: model.into(),
            on_delete,
        });
        self
    }
}

/// Ordered field declarations for one schema, as filled in by [`Schema::describe`].
#[derive(Debug, Clone)]
pub struct FieldSet {
    owner: &'static str,
    fields: Vec<FieldDescriptor>,
}

impl FieldSet {
    pub fn new(owner: &'static str) -> Self {
        FieldSet {
            owner,
            fields: Vec::new(),
        }
    }

    /// Name of the schema these fields belong to.
    pub fn owner(&self) -> &'static str {
        self.owner
    }

    pub fn field(&mut self, descriptor: FieldDescriptor) -> &mut Self {
        self.fields.push(descriptor);
        self
    }

    /// Add a mixin's fields. Non-inherited fields are only added when `designated`.
    pub fn mixin<M: Mixin>(&mut self, designated: bool) -> &mut Self {
        let mut mixin_fields = FieldSet::new(self.owner);
        M::describe(&mut mixin_fields);
        self.fields.extend(
            mixin_fields
                .fields
                .into_iter()
                .filter(|field| field.inherit || designated),
        );
        self
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub(crate) fn into_fields(self) -> Vec<FieldDescriptor> {
        self.fields
    }
}

/// A type whose fields can be laid out as table columns.
///
/// Field names given to [`FieldSet`] must match the serde names of the type,
/// which are expected to be camelCase.
pub trait Schema: Serialize + DeserializeOwned + 'static {
    const NAME: &'static str;

    fn describe(fields: &mut FieldSet);
}

/// Type-erased handle to a [`Schema`] implementation.
#[derive(Clone, Copy)]
pub struct SchemaRef {
    pub name: &'static str,
    pub type_id: TypeId,
    pub describe: fn(&mut FieldSet),
}

impl SchemaRef {
    pub fn of<S: Schema>() -> Self {
        SchemaRef {
            name: S::NAME,
            type_id: TypeId::of::<S>(),
            describe: S::describe,
        }
    }
}

impl std::fmt::Debug for SchemaRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaRef").field("name", &self.name).finish()
    }
}

/// A reusable group of fields that models flatten into themselves.
pub trait Mixin {
    fn describe(fields: &mut FieldSet);
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Tagged;

    impl Mixin for Tagged {
        fn describe(fields: &mut FieldSet) {
            fields
                .field(FieldDescriptor::new("tag", FieldType::String).nullable())
                .field(FieldDescriptor::new("tagNote", FieldType::String).nullable().inherit(false));
        }
    }

    #[test]
    fn test_mixin_designation() {
        let mut plain = FieldSet::new("Home");
        plain.mixin::<Tagged>(false);
        let names: Vec<_> = plain.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["tag"]);

        let mut designated = FieldSet::new("Home");
        designated.mixin::<Tagged>(true);
        assert_eq!(designated.fields().len(), 2);
    }

    #[test]
    fn test_descriptor_builder() {
        let field = FieldDescriptor::new("owner", FieldType::Uuid)
            .nullable()
            .references("Player", OnDelete::SetNull)
            .migration_default("none");
        assert!(field.nullable);
        assert_eq!(field.references.as_ref().map(|r| r.on_delete), Some(OnDelete::SetNull));
        assert_eq!(field.migration_default, Some(serde_json::json!("none")));
    }
}
