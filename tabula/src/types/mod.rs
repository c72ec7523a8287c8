//! The type catalog: semantic field kinds, storage kinds, and the operators
//! each storage kind can be compared with.

use std::fmt;

/// Semantic type of a declared field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Uuid,
    String,
    Bool,
    Int,
    Long,
    Double,
    Float,
    Timestamp,
    /// A type fronted by a transformer, looked up by this name.
    Foreign(&'static str),
    /// A field whose foreign type is picked per row by a sibling string field.
    Variant {
        set: &'static str,
        discriminant: &'static str,
    },
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Foreign(name) => write!(f, "{name}"),
            FieldType::Variant { set, .. } => write!(f, "variant {set}"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// Column storage representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageType {
    /// 16-byte big-endian UUID.
    Binary16,
    Text,
    VarChar,
    /// Stored as 0 / 1.
    Boolean,
    Integer,
    BigInt,
    Double,
    Float,
    /// Nanoseconds since the Unix epoch.
    Timestamp,
}

impl StorageType {
    pub fn sql_type(&self) -> &'static str {
        match self {
            StorageType::Binary16 => "BINARY(16)",
            StorageType::Text => "TEXT",
            StorageType::VarChar => "VARCHAR(255)",
            StorageType::Boolean => "BOOLEAN",
            StorageType::Integer => "INTEGER",
            StorageType::BigInt => "BIGINT",
            StorageType::Double => "DOUBLE",
            StorageType::Float => "FLOAT",
            StorageType::Timestamp => "TIMESTAMP",
        }
    }

    pub fn fixed_length(&self) -> bool {
        !matches!(self, StorageType::Text)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            StorageType::Integer | StorageType::BigInt | StorageType::Double | StorageType::Float
        )
    }

    pub fn is_textual(&self) -> bool {
        matches!(self, StorageType::Text | StorageType::VarChar)
    }

    pub fn supports(&self, op: CompareOp) -> bool {
        use CompareOp::*;
        match self {
            StorageType::Binary16 | StorageType::Boolean => matches!(op, Eq | Ne),
            StorageType::Text | StorageType::VarChar => matches!(op, Eq | Ne | IEq | INe),
            StorageType::Integer
            | StorageType::BigInt
            | StorageType::Double
            | StorageType::Float
            | StorageType::Timestamp => !matches!(op, IEq | INe),
        }
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_type())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    /// Case-insensitive equality.
    IEq,
    /// Case-insensitive inequality.
    INe,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOp {
    pub fn sql(&self) -> &'static str {
        match self {
            CompareOp::Eq | CompareOp::IEq => "=",
            CompareOp::Ne | CompareOp::INe => "<>",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
        }
    }

    pub fn is_case_insensitive(&self) -> bool {
        matches!(self, CompareOp::IEq | CompareOp::INe)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithmeticOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl ArithmeticOp {
    pub fn sql(&self) -> &'static str {
        match self {
            ArithmeticOp::Add => "+",
            ArithmeticOp::Subtract => "-",
            ArithmeticOp::Multiply => "*",
            ArithmeticOp::Divide => "/",
        }
    }
}

/// Registered mappings from semantic kinds to storage kinds, in preference order.
pub struct TypeCatalog {
    entries: Vec<(FieldType, StorageType)>,
}

impl Default for TypeCatalog {
    fn default() -> Self {
        TypeCatalog {
            entries: vec![
                (FieldType::Uuid, StorageType::Binary16),
                (FieldType::String, StorageType::Text),
                (FieldType::String, StorageType::VarChar),
                (FieldType::Bool, StorageType::Boolean),
                (FieldType::Int, StorageType::Integer),
                (FieldType::Long, StorageType::BigInt),
                (FieldType::Double, StorageType::Double),
                (FieldType::Float, StorageType::Float),
                (FieldType::Timestamp, StorageType::Timestamp),
            ],
        }
    }
}

impl TypeCatalog {
    /// Resolve a semantic type. With `length_required`, only fixed-length
    /// storage qualifies.
    pub fn resolve(&self, field_type: FieldType, length_required: bool) -> Option<StorageType> {
        self.entries
            .iter()
            .find(|(ty, storage)| *ty == field_type && (!length_required || storage.fixed_length()))
            .map(|(_, storage)| *storage)
    }
}
