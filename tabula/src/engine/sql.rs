//! Compiles [`Query`] trees into parameterized SQLite statements.

use crate::codec;
use crate::error::{Error, Result};
use crate::naming::quote_ident;
use crate::query::{Condition, Group, Operand, Predicate, Query};
use crate::schema::{Column, FieldLayout, Resolved, Table};
use crate::types::CompareOp;
use rusqlite::types::Value as SqlValue;
use serde_json::Value;

/// `WHERE`, `ORDER BY` and `LIMIT` clauses with their bound parameters.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct Clauses {
    pub where_sql: String,
    pub order_sql: String,
    pub window_sql: String,
    pub params: Vec<SqlValue>,
}

impl Clauses {
    fn tail(&self) -> String {
        format!("{}{}{}", self.where_sql, self.order_sql, self.window_sql)
    }
}

pub(crate) fn compile(table: &Table, query: &Query) -> Result<Clauses> {
    let mut clauses = Clauses::default();
    if !query.root().is_empty() {
        let condition = compile_group(table, query.root(), &mut clauses.params)?;
        clauses.where_sql = format!(" WHERE {condition}");
    }

    let mut order = Vec::new();
    for sort in query.sort() {
        let direction = if sort.ascending { "ASC" } else { "DESC" };
        for index in resolve_columns(table, &sort.field)? {
            order.push(format!("{} {direction}", quote_ident(&table.columns()[index].name)));
        }
    }
    if !order.is_empty() {
        clauses.order_sql = format!(" ORDER BY {}", order.join(", "));
    }

    clauses.window_sql = match (query.limit_count(), query.skip_count()) {
        (Some(limit), Some(skip)) => format!(" LIMIT {limit} OFFSET {skip}"),
        (Some(limit), None) => format!(" LIMIT {limit}"),
        (None, Some(skip)) => format!(" LIMIT -1 OFFSET {skip}"),
        (None, None) => String::new(),
    };
    Ok(clauses)
}

pub(crate) fn select(table: &Table, query: &Query) -> Result<(String, Vec<SqlValue>)> {
    let clauses = compile(table, query)?;
    let columns: Vec<String> = table.columns().iter().map(|c| quote_ident(&c.name)).collect();
    let sql = format!(
        "SELECT {} FROM {}{}",
        columns.join(", "),
        quote_ident(table.name()),
        clauses.tail()
    );
    log::debug!("{sql}");
    Ok((sql, clauses.params))
}

pub(crate) fn select_ids(table: &Table, query: &Query) -> Result<(String, Vec<SqlValue>)> {
    let clauses = compile(table, query)?;
    let sql = format!(
        "SELECT {} FROM {}{}",
        quote_ident(crate::model::ID),
        quote_ident(table.name()),
        clauses.tail()
    );
    log::debug!("{sql}");
    Ok((sql, clauses.params))
}

pub(crate) fn count(table: &Table, query: &Query) -> Result<(String, Vec<SqlValue>)> {
    let clauses = compile(table, query)?;
    let sql = if query.is_windowed() {
        format!(
            "SELECT COUNT(*) FROM (SELECT 1 FROM {}{})",
            quote_ident(table.name()),
            clauses.tail()
        )
    } else {
        format!("SELECT COUNT(*) FROM {}{}", quote_ident(table.name()), clauses.where_sql)
    };
    log::debug!("{sql}");
    Ok((sql, clauses.params))
}

fn compile_group(table: &Table, group: &Group, params: &mut Vec<SqlValue>) -> Result<String> {
    let mut sql: Option<String> = None;
    for (connector, condition) in group.conditions() {
        let next = match condition {
            Condition::Predicate(predicate) => compile_predicate(table, predicate, params)?,
            Condition::Group(inner) if inner.is_empty() => {
                return Err(Error::Query("empty predicate group".into()))
            }
            Condition::Group(inner) => compile_group(table, inner, params)?,
        };
        sql = Some(match sql {
            None => next,
            Some(prev) => format!("({prev} {} {next})", connector.sql()),
        });
    }
    sql.ok_or_else(|| Error::Query("empty predicate group".into()))
}

fn compile_predicate(table: &Table, predicate: &Predicate, params: &mut Vec<SqlValue>) -> Result<String> {
    match &predicate.operand {
        Operand::Field(path) => match resolve(table, path)? {
            Resolved::Column(index) => {
                compare_column(table, &table.columns()[index], predicate.op, &predicate.value, params)
            }
            Resolved::Field(layout) => compare_field(table, path, layout, predicate, params),
        },
        Operand::Arithmetic { left, op, right } => {
            let left = numeric_column(table, left)?;
            let right = numeric_column(table, right)?;
            if !left.storage.supports(predicate.op) || predicate.op.is_case_insensitive() {
                return Err(unsupported(table, &left.name, predicate.op, left));
            }
            let param = match &predicate.value {
                Value::Number(n) => match n.as_i64() {
                    Some(i) => SqlValue::Integer(i),
                    None => SqlValue::Real(n.as_f64().unwrap_or_default()),
                },
                other => {
                    return Err(Error::Query(format!(
                        "arithmetic on {}.{} must compare to a number, got {other}",
                        table.model(),
                        left.name
                    )))
                }
            };
            params.push(param);
            Ok(format!(
                "({} {} {}) {} ?",
                quote_ident(&left.name),
                op.sql(),
                quote_ident(&right.name),
                predicate.op.sql()
            ))
        }
    }
}

fn compare_column(
    table: &Table,
    column: &Column,
    op: CompareOp,
    value: &Value,
    params: &mut Vec<SqlValue>,
) -> Result<String> {
    if !column.storage.supports(op) {
        return Err(unsupported(table, &column.name, op, column));
    }
    let name = quote_ident(&column.name);
    if value.is_null() {
        return match op {
            CompareOp::Eq | CompareOp::IEq => Ok(format!("{name} IS NULL")),
            CompareOp::Ne | CompareOp::INe => Ok(format!("{name} IS NOT NULL")),
            _ => Err(Error::Query(format!(
                "{}.{} can only be compared to null for equality",
                table.model(),
                column.name
            ))),
        };
    }
    params.push(codec::encode(column, value)?);
    if op.is_case_insensitive() {
        Ok(format!("lower({name}) {} lower(?)", op.sql()))
    } else {
        Ok(format!("{name} {} ?", op.sql()))
    }
}

/// Equality on a whole transformed field, through its transformer.
fn compare_field(
    table: &Table,
    path: &str,
    layout: &FieldLayout,
    predicate: &Predicate,
    params: &mut Vec<SqlValue>,
) -> Result<String> {
    if !matches!(layout, FieldLayout::Inlined { .. }) {
        return Err(Error::Query(format!(
            "{}.{path} is a variant field and cannot be compared",
            table.model()
        )));
    }
    let negate = match predicate.op {
        CompareOp::Eq => false,
        CompareOp::Ne => true,
        other => {
            return Err(Error::Query(format!(
                "{}.{path} is a transformed field and only supports Eq and Ne, not {other:?}",
                table.model()
            )))
        }
    };
    // `IS` keeps each term two-valued, so the negation also matches rows with NULL sub-columns.
    let parts: Vec<String> = table
        .encode_field(layout, &predicate.value)?
        .into_iter()
        .map(|(index, value)| {
            let name = quote_ident(&table.columns()[index].name);
            if value == SqlValue::Null {
                format!("{name} IS NULL")
            } else {
                params.push(value);
                format!("{name} IS ?")
            }
        })
        .collect();
    let all = format!("({})", parts.join(" AND "));
    Ok(if negate { format!("NOT {all}") } else { all })
}

fn resolve<'a>(table: &'a Table, path: &str) -> Result<Resolved<'a>> {
    table
        .resolve(path)
        .ok_or_else(|| Error::Query(format!("{} has no field '{path}'", table.model())))
}

fn resolve_columns(table: &Table, path: &str) -> Result<Vec<usize>> {
    Ok(match resolve(table, path)? {
        Resolved::Column(index) => vec![index],
        Resolved::Field(layout) => layout.columns(),
    })
}

fn numeric_column<'a>(table: &'a Table, path: &str) -> Result<&'a Column> {
    match resolve(table, path)? {
        Resolved::Column(index) if table.columns()[index].storage.is_numeric() => {
            Ok(&table.columns()[index])
        }
        _ => Err(Error::Query(format!(
            "{}.{path} is not a numeric field and cannot be used in arithmetic",
            table.model()
        ))),
    }
}

fn unsupported(table: &Table, name: &str, op: CompareOp, column: &Column) -> Error {
    Error::Query(format!(
        "{op:?} is not supported on {}.{name} ({})",
        table.model(),
        column.storage
    ))
}

/// Placeholder list `(?, ?, ?)` for `IN` clauses.
pub(crate) fn placeholders(count: usize) -> String {
    format!("({})", vec!["?"; count].join(", "))
}
