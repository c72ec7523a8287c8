//! Schema-derived object-relational persistence over SQLite.
//!
//! Models are plain serde structs. A [`Registry`] derives one table per model,
//! flattening fields of foreign types into prefixed columns through registered
//! [`Transformer`]s. A [`Database`] creates and migrates those tables, compiles
//! [`Query`] trees to parameterized SQL, and hydrates rows back into models.
//!
//! ```no_run
//! use std::sync::Arc;
//! use tabula::{CompareOp, Database, Model, ModelMeta, Query, Registry};
//!
//! #[derive(Debug, serde::Serialize, serde::Deserialize, Model)]
//! #[serde(rename_all = "camelCase")]
//! struct Warp {
//!     #[serde(flatten)]
//!     #[tabula(meta)]
//!     meta: ModelMeta,
//!     #[tabula(unique)]
//!     name: String,
//!     cost: i32,
//! }
//!
//! # fn main() -> tabula::Result<()> {
//! let registry = Arc::new(Registry::builder().model::<Warp>().build()?);
//! let db = Database::open_in_memory(registry)?;
//! let mut warp = Warp { meta: ModelMeta::default(), name: "spawn".into(), cost: 0 };
//! db.store(&mut warp)?;
//! let free = db.find::<Warp>(&Query::filter("cost", CompareOp::Eq, 0))?;
//! # Ok(())
//! # }
//! ```

extern crate self as tabula;

mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod migration;
pub mod model;
pub mod naming;
pub mod query;
pub mod schema;
pub mod system_db;
pub mod transform;
pub mod types;

pub use config::DatabaseConfig;
pub use engine::Database;
pub use error::{Error, ErrorKind, Result};
pub use model::mixins::{Cooldown, Cooling, Revocable, Revocation, Sequence, Sequenced};
pub use model::{Model, ModelMeta};
pub use query::{Condition, Connector, Group, Operand, Predicate, Query, Sort};
pub use schema::{FieldDescriptor, FieldSet, Mixin, OnDelete, Registry, RegistryBuilder, Schema};
pub use transform::{Transformer, VariantSet};
pub use types::{ArithmeticOp, CompareOp, FieldType, StorageType};

pub use tabula_derive::{Model, Schema};
