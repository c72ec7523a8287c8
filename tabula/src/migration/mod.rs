use crate::codec;
use crate::error::{Error, Result};
use crate::naming::quote_ident;
use crate::schema::{Column, Table};
use crate::system_db::ExistingColumn;
use std::collections::HashSet;

/// A single difference between an existing table and its derived definition.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnMigration {
    ColumnAdded {
        table: String,
        column: String,
        definition: String,
        has_default: bool,
        nullable: bool,
        primary_key: bool,
    },
    UniqueIndexAdded {
        table: String,
        index: String,
        columns: Vec<String>,
        /// Existing rows that would all receive the same backfilled key, or 0.
        colliding_rows: u64,
    },
    ColumnRemoved {
        table: String,
        column: String,
    },
    ColumnTypeChanged {
        table: String,
        column: String,
        existing: String,
        derived: String,
    },
}

impl ColumnMigration {
    /// Whether this migration can be applied without touching existing data.
    pub fn is_safe(&self) -> bool {
        match self {
            ColumnMigration::ColumnAdded {
                has_default,
                nullable,
                primary_key,
                ..
            } => !*primary_key && (*has_default || *nullable),
            ColumnMigration::UniqueIndexAdded { colliding_rows, .. } => *colliding_rows == 0,
            ColumnMigration::ColumnRemoved { .. } | ColumnMigration::ColumnTypeChanged { .. } => false,
        }
    }

    /// Drift is reported but never applied.
    pub fn is_drift(&self) -> bool {
        matches!(
            self,
            ColumnMigration::ColumnRemoved { .. } | ColumnMigration::ColumnTypeChanged { .. }
        )
    }

    pub fn describe(&self) -> String {
        match self {
            ColumnMigration::ColumnAdded {
                table,
                column,
                has_default,
                nullable,
                ..
            } => {
                let qualifier = if *has_default {
                    " (has default, will backfill)"
                } else if *nullable {
                    " (nullable)"
                } else {
                    " (required, no default: ERROR)"
                };
                format!("Column '{table}.{column}' added{qualifier}")
            }
            ColumnMigration::UniqueIndexAdded {
                table,
                index,
                columns,
                colliding_rows,
            } => {
                let qualifier = if *colliding_rows > 0 {
                    format!(" (default repeats across {colliding_rows} rows: ERROR)")
                } else {
                    String::new()
                };
                format!("Unique index '{index}' on {table}({}) added{qualifier}", columns.join(", "))
            }
            ColumnMigration::ColumnRemoved { table, column } => {
                format!("Column '{table}.{column}' is no longer declared (data preserved)")
            }
            ColumnMigration::ColumnTypeChanged {
                table,
                column,
                existing,
                derived,
            } => format!("Column '{table}.{column}' is {existing} but is declared {derived} (not altered)"),
        }
    }

    /// SQL that applies this migration, for the safe kinds.
    pub fn statement(&self) -> Option<String> {
        match self {
            ColumnMigration::ColumnAdded {
                table, definition, ..
            } if self.is_safe() => Some(format!(
                "ALTER TABLE {} ADD COLUMN {definition}",
                quote_ident(table)
            )),
            ColumnMigration::UniqueIndexAdded {
                table, index, columns, ..
            } if self.is_safe() => {
                let columns: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
                Some(format!(
                    "CREATE UNIQUE INDEX IF NOT EXISTS {} ON {} ({})",
                    quote_ident(index),
                    quote_ident(table),
                    columns.join(", ")
                ))
            }
            _ => None,
        }
    }
}

/// Compare the columns of an existing table holding `rows` rows with its derived definition.
pub fn diff_table(table: &Table, existing: &[ExistingColumn], rows: u64) -> Result<Vec<ColumnMigration>> {
    let mut migrations = Vec::new();
    let mut added: HashSet<usize> = HashSet::new();

    for (index, column) in table.columns().iter().enumerate() {
        match existing.iter().find(|c| c.name == column.name) {
            None => {
                migrations.push(ColumnMigration::ColumnAdded {
                    table: table.name().to_string(),
                    column: column.name.clone(),
                    definition: added_definition(column)?,
                    has_default: column.migration_default.is_some(),
                    nullable: column.nullable,
                    primary_key: column.primary_key,
                });
                added.insert(index);
            }
            Some(found) if !found.sql_type.eq_ignore_ascii_case(column.storage.sql_type()) => {
                migrations.push(ColumnMigration::ColumnTypeChanged {
                    table: table.name().to_string(),
                    column: column.name.clone(),
                    existing: found.sql_type.clone(),
                    derived: column.storage.sql_type().to_string(),
                });
            }
            Some(_) => {}
        }
    }

    // Constraints on added columns cannot be declared inline by ALTER TABLE.
    for key in table.unique_keys() {
        if key.columns.iter().any(|i| added.contains(i)) {
            // A key made only of defaulted new columns backfills one value into every row.
            let constant = key
                .columns
                .iter()
                .all(|i| added.contains(i) && table.columns()[*i].migration_default.is_some());
            migrations.push(ColumnMigration::UniqueIndexAdded {
                table: table.name().to_string(),
                index: format!("{}_{}_unique", table.name(), key.name.replace('.', "_")),
                columns: key
                    .columns
                    .iter()
                    .map(|i| table.columns()[*i].name.clone())
                    .collect(),
                colliding_rows: if constant && rows > 1 { rows } else { 0 },
            });
        }
    }

    for found in existing {
        if table.column(&found.name).is_none() {
            migrations.push(ColumnMigration::ColumnRemoved {
                table: table.name().to_string(),
                column: found.name.clone(),
            });
        }
    }

    Ok(migrations)
}

fn added_definition(column: &Column) -> Result<String> {
    let mut sql = format!("{} {}", quote_ident(&column.name), column.storage.sql_type());
    if let Some(default) = &column.migration_default {
        let literal = codec::sql_literal(column, default).map_err(|e| match e {
            Error::Conversion(msg) => Error::Schema(format!("invalid migration default: {msg}")),
            other => other,
        })?;
        if !column.nullable {
            sql.push_str(" NOT NULL");
        }
        sql.push_str(&format!(" DEFAULT {literal}"));
    }
    Ok(sql)
}
