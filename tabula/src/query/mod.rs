//! Immutable predicate trees with sort, skip and limit.
//!
//! Nothing here touches the database; [`crate::Database`] compiles a
//! [`Query`] against a table and rejects unknown fields or unsupported
//! operators before any SQL runs.

use crate::error::{Error, Result};
use crate::model::ID;
use crate::types::{ArithmeticOp, CompareOp};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connector {
    And,
    Or,
}

impl Connector {
    pub fn sql(&self) -> &'static str {
        match self {
            Connector::And => "AND",
            Connector::Or => "OR",
        }
    }
}

/// Left-hand side of a predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Dotted field path, e.g. `location.world`.
    Field(String),
    Arithmetic {
        left: String,
        op: ArithmeticOp,
        right: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub operand: Operand,
    pub op: CompareOp,
    pub value: Value,
}

impl Predicate {
    pub fn new(field: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Predicate {
            operand: Operand::Field(field.into()),
            op,
            value: value.into(),
        }
    }

    /// `(left <arith> right) <op> value`, both sides numeric fields.
    pub fn arithmetic(
        left: impl Into<String>,
        arith: ArithmeticOp,
        right: impl Into<String>,
        op: CompareOp,
        value: impl Into<Value>,
    ) -> Self {
        Predicate {
            operand: Operand::Arithmetic {
                left: left.into(),
                op: arith,
                right: right.into(),
            },
            op,
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Predicate(Predicate),
    Group(Group),
}

impl From<Predicate> for Condition {
    fn from(predicate: Predicate) -> Self {
        Condition::Predicate(predicate)
    }
}

impl From<Group> for Condition {
    fn from(group: Group) -> Self {
        Condition::Group(group)
    }
}

/// Conditions chained at one precedence level, folded left to right.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Group {
    conditions: Vec<(Connector, Condition)>,
}

impl Group {
    pub fn new(first: impl Into<Condition>) -> Self {
        Group {
            conditions: vec![(Connector::And, first.into())],
        }
    }

    pub fn and(self, next: impl Into<Condition>) -> Self {
        self.push(Connector::And, next.into())
    }

    pub fn or(self, next: impl Into<Condition>) -> Self {
        self.push(Connector::Or, next.into())
    }

    fn push(mut self, connector: Connector, next: Condition) -> Self {
        self.conditions.push((connector, next));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// The connector of the first entry is ignored.
    pub fn conditions(&self) -> &[(Connector, Condition)] {
        &self.conditions
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    pub field: String,
    pub ascending: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Query {
    root: Group,
    sort: Vec<Sort>,
    skip: Option<u64>,
    limit: Option<u64>,
}

impl Query {
    /// Matches every row.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(field: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Query::new().and(Predicate::new(field, op, value))
    }

    pub fn by_id(id: Uuid) -> Self {
        Query::filter(ID, CompareOp::Eq, id.to_string())
    }

    pub fn and(mut self, next: impl Into<Condition>) -> Self {
        self.root = self.root.and(next);
        self
    }

    pub fn or(mut self, next: impl Into<Condition>) -> Self {
        self.root = self.root.or(next);
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, ascending: bool) -> Self {
        self.sort.push(Sort {
            field: field.into(),
            ascending,
        });
        self
    }

    /// `skip(0)` is a no-op.
    pub fn skip(mut self, count: i64) -> Result<Self> {
        self.skip = checked_count("skip", count)?.or(self.skip);
        Ok(self)
    }

    /// `limit(0)` is a no-op.
    pub fn limit(mut self, count: i64) -> Result<Self> {
        self.limit = checked_count("limit", count)?.or(self.limit);
        Ok(self)
    }

    pub fn root(&self) -> &Group {
        &self.root
    }

    pub fn sort(&self) -> &[Sort] {
        &self.sort
    }

    pub fn skip_count(&self) -> Option<u64> {
        self.skip
    }

    pub fn limit_count(&self) -> Option<u64> {
        self.limit
    }

    pub(crate) fn is_windowed(&self) -> bool {
        self.skip.is_some() || self.limit.is_some()
    }
}

fn checked_count(what: &str, count: i64) -> Result<Option<u64>> {
    match count {
        n if n < 0 => Err(Error::Query(format!("{what} must not be negative, got {n}"))),
        0 => Ok(None),
        n => Ok(Some(n as u64)),
    }
}
