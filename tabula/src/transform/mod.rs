//! Transformers convert foreign values into known wrapper schemas whose
//! columns can be inlined into the owning table, and back again.

use crate::error::{Error, Result};
use crate::schema::{Schema, SchemaRef};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Bidirectional conversion between a foreign value and its storable wrapper.
pub trait Transformer: Send + Sync + 'static {
    type Foreign: Serialize + DeserializeOwned;
    type Known: Schema;

    /// Name used in `FieldType::Foreign` declarations.
    const FOREIGN: &'static str;

    fn replace(&self, foreign: &Self::Foreign) -> Self::Known;

    fn revive(&self, known: Self::Known) -> Self::Foreign;
}

/// Object-safe view of a [`Transformer`] operating on serde values.
pub trait ErasedTransformer: Send + Sync {
    fn foreign_type(&self) -> &'static str;

    fn known(&self) -> SchemaRef;

    /// Null in, null out.
    fn replace(&self, foreign: &Value) -> Result<Value>;

    /// Null in, null out.
    fn revive(&self, known: Value) -> Result<Value>;
}

struct Erased<T: Transformer>(T);

impl<T: Transformer> ErasedTransformer for Erased<T> {
    fn foreign_type(&self) -> &'static str {
        T::FOREIGN
    }

    fn known(&self) -> SchemaRef {
        SchemaRef::of::<T::Known>()
    }

    fn replace(&self, foreign: &Value) -> Result<Value> {
        if foreign.is_null() {
            return Ok(Value::Null);
        }
        let foreign: T::Foreign = serde_json::from_value(foreign.clone()).map_err(|e| {
            Error::Conversion(format!("Value is not a valid {}: {e}", T::FOREIGN))
        })?;
        Ok(serde_json::to_value(self.0.replace(&foreign))?)
    }

    fn revive(&self, known: Value) -> Result<Value> {
        if known.is_null() {
            return Ok(Value::Null);
        }
        let known: T::Known = serde_json::from_value(known).map_err(|e| {
            Error::Conversion(format!(
                "Stored columns do not form a valid {}: {e}",
                <T::Known as Schema>::NAME
            ))
        })?;
        Ok(serde_json::to_value(self.0.revive(known))?)
    }
}

/// Explicit dispatch table for a field whose foreign type depends on a
/// sibling discriminant value.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantSet {
    name: &'static str,
    arms: Vec<(String, &'static str)>,
}

impl VariantSet {
    pub fn new(name: &'static str) -> Self {
        VariantSet {
            name,
            arms: Vec::new(),
        }
    }

    /// Map discriminant value `tag` to the transformer registered for `foreign`.
    pub fn arm(mut self, tag: impl Into<String>, foreign: &'static str) -> Self {
        self.arms.push((tag.into(), foreign));
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn arms(&self) -> &[(String, &'static str)] {
        &self.arms
    }
}

/// All transformers and variant sets known to a registry. One transformer
/// per foreign type, one variant set per name.
#[derive(Default, Clone)]
pub struct TransformerRegistry {
    transformers: HashMap<&'static str, Arc<dyn ErasedTransformer>>,
    variants: HashMap<&'static str, VariantSet>,
}

impl TransformerRegistry {
    pub fn register<T: Transformer>(&mut self, transformer: T) -> Result<()> {
        if self.transformers.contains_key(T::FOREIGN) {
            return Err(Error::Schema(format!(
                "Multiple transformers registered for foreign type '{}'",
                T::FOREIGN
            )));
        }
        let erased: Arc<dyn ErasedTransformer> = Arc::new(Erased(transformer));
        self.transformers.insert(T::FOREIGN, erased);
        Ok(())
    }

    pub fn register_variants(&mut self, set: VariantSet) -> Result<()> {
        if self.variants.contains_key(set.name) {
            return Err(Error::Schema(format!(
                "Variant set '{}' registered twice",
                set.name
            )));
        }
        for (i, (tag, _)) in set.arms.iter().enumerate() {
            if set.arms[..i].iter().any(|(other, _)| other == tag) {
                return Err(Error::Schema(format!(
                    "Variant set '{}' maps tag '{tag}' more than once",
                    set.name
                )));
            }
        }
        self.variants.insert(set.name, set);
        Ok(())
    }

    pub fn get(&self, foreign: &str) -> Option<&Arc<dyn ErasedTransformer>> {
        self.transformers.get(foreign)
    }

    pub fn variant_set(&self, name: &str) -> Option<&VariantSet> {
        self.variants.get(name)
    }
}
