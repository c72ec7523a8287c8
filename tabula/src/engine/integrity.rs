//! Foreign-key delete policies, applied by the engine inside the delete
//! transaction.

use super::sql::placeholders;
use crate::error::{Error, Result};
use crate::naming::quote_ident;
use crate::schema::{OnDelete, Registry, Table};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};
use std::collections::HashSet;

/// Upper bound on bound parameters per `IN (...)` list.
pub(crate) const CHUNK: usize = 500;

/// Delete rows by identifier after applying the policies of every column that
/// references `table`. Returns the number of rows removed from `table` itself;
/// cascaded rows are not counted.
pub(crate) fn delete_rows(
    conn: &Connection,
    registry: &Registry,
    table: &Table,
    ids: Vec<SqlValue>,
    visited: &mut HashSet<(String, Vec<u8>)>,
) -> Result<usize> {
    let ids: Vec<SqlValue> = ids
        .into_iter()
        .filter(|id| match id {
            SqlValue::Blob(bytes) => visited.insert((table.name().to_string(), bytes.clone())),
            _ => false,
        })
        .collect();
    if ids.is_empty() {
        return Ok(0);
    }

    for (referencing, index) in registry.references_to(table.name()) {
        let column = &referencing.columns()[*index];
        let Some(fk) = &column.foreign_key else {
            continue;
        };
        for chunk in ids.chunks(CHUNK) {
            let target = format!(
                "{} WHERE {} IN {}",
                quote_ident(referencing.name()),
                quote_ident(&column.name),
                placeholders(chunk.len())
            );
            match fk.on_delete {
                OnDelete::Restrict => {
                    let sql = format!("SELECT COUNT(*) FROM {target}");
                    log::debug!("{sql}");
                    let n: i64 = conn.query_row(&sql, params_from_iter(chunk), |row| row.get(0))?;
                    if n > 0 {
                        return Err(Error::RestrictedDelete {
                            model: table.model().to_string(),
                            referenced_by: referencing.model().to_string(),
                            column: column.name.clone(),
                        });
                    }
                }
                OnDelete::SetNull => {
                    let sql = format!(
                        "UPDATE {} SET {} = NULL WHERE {} IN {}",
                        quote_ident(referencing.name()),
                        quote_ident(&column.name),
                        quote_ident(&column.name),
                        placeholders(chunk.len())
                    );
                    log::debug!("{sql}");
                    conn.execute(&sql, params_from_iter(chunk))?;
                }
                OnDelete::Cascade => {
                    let sql = format!(
                        "SELECT {} FROM {target}",
                        quote_ident(crate::model::ID)
                    );
                    log::debug!("{sql}");
                    let dependents = select_ids(conn, &sql, chunk)?;
                    delete_rows(conn, registry, referencing, dependents, visited)?;
                }
            }
        }
    }

    let mut removed = 0;
    for chunk in ids.chunks(CHUNK) {
        let sql = format!(
            "DELETE FROM {} WHERE {} IN {}",
            quote_ident(table.name()),
            quote_ident(crate::model::ID),
            placeholders(chunk.len())
        );
        log::debug!("{sql}");
        removed += conn.execute(&sql, params_from_iter(chunk))?;
    }
    Ok(removed)
}

pub(crate) fn select_ids(conn: &Connection, sql: &str, params: &[SqlValue]) -> Result<Vec<SqlValue>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params_from_iter(params), |row| row.get::<_, SqlValue>(0))?;

    let mut ids = Vec::new();
    for row in rows {
        ids.push(row?);
    }
    Ok(ids)
}
