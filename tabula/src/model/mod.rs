//! Base contract for persisted records and the bookkeeping fields every
//! model table starts with.

pub mod mixins;

use crate::schema::{FieldDescriptor, FieldSet, Schema};
use crate::types::FieldType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const ID: &str = "id";
pub const CREATED_AT: &str = "createdAt";
pub const UPDATED_AT: &str = "updatedAt";

/// Engine-managed bookkeeping. Embed with `#[serde(flatten)]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelMeta {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ModelMeta {
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }
}

/// A record persisted in its own table.
pub trait Model: Schema {
    fn meta(&self) -> &ModelMeta;

    fn meta_mut(&mut self) -> &mut ModelMeta;

    fn id(&self) -> Option<Uuid> {
        self.meta().id
    }
}

pub(crate) fn base_fields(fields: &mut FieldSet) {
    fields
        .field(FieldDescriptor::new(ID, FieldType::Uuid).inlineable(false))
        .field(FieldDescriptor::new(CREATED_AT, FieldType::Timestamp).inlineable(false))
        .field(
            FieldDescriptor::new(UPDATED_AT, FieldType::Timestamp)
                .nullable()
                .inlineable(false),
        );
}
