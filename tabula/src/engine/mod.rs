//! The persistence engine: table preparation, writes with duplicate checks,
//! reads with hydration, and deletes with foreign-key policies.

mod integrity;
mod sql;

use crate::codec;
use crate::config::DatabaseConfig;
use crate::error::{Error, Result};
use crate::migration;
use crate::model::{Model, CREATED_AT, ID, UPDATED_AT};
use crate::naming::quote_ident;
use crate::query::Query;
use crate::schema::{Registry, Resolved, Table};
use crate::system_db::SystemDb;
use chrono::{DateTime, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection, OptionalExtension, TransactionBehavior};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

/// Handle to one SQLite database and the registry describing its tables.
pub struct Database {
    system: SystemDb,
    registry: Arc<Registry>,
}

impl Database {
    /// Open the database, create missing tables, and migrate existing ones
    /// when `config.migrate` is set.
    pub fn open(config: &DatabaseConfig, registry: Arc<Registry>) -> Result<Self> {
        let system = SystemDb::open(config)?;
        let db = Database { system, registry };
        db.prepare_tables(config.migrate)?;
        Ok(db)
    }

    pub fn open_in_memory(registry: Arc<Registry>) -> Result<Self> {
        Self::open(&DatabaseConfig::in_memory(), registry)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn system(&self) -> &SystemDb {
        &self.system
    }

    fn prepare_tables(&self, migrate: bool) -> Result<()> {
        let mut conn = self.system.lock()?;
        for table in self.registry.tables().filter(|t| !t.is_transformer_only()) {
            if !SystemDb::table_exists(&conn, table.name())? {
                let sql = table.create_sql();
                log::debug!("{sql}");
                conn.execute_batch(&sql)?;
                log::info!("Created table '{}' for {}", table.name(), table.model());
                continue;
            }
            if !migrate {
                continue;
            }

            let existing = SystemDb::table_columns(&conn, table.name())?;
            let rows = SystemDb::row_count(&conn, table.name())?;
            let plan = migration::diff_table(table, &existing, rows)?;
            if let Some(blocked) = plan.iter().find(|m| !m.is_safe() && !m.is_drift()) {
                return Err(Error::Schema(format!(
                    "Cannot migrate table '{}': {}",
                    table.name(),
                    blocked.describe()
                )));
            }

            let tx = conn.transaction()?;
            for step in &plan {
                if step.is_drift() {
                    log::warn!("{}", step.describe());
                    continue;
                }
                if let Some(statement) = step.statement() {
                    log::debug!("{statement}");
                    tx.execute_batch(&statement)?;
                    SystemDb::record_migration(&tx, table.name(), &step.describe())?;
                    log::info!("Applied migration: {}", step.describe());
                }
            }
            tx.commit()?;
        }
        Ok(())
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// Insert the model when it has no identifier, otherwise update it.
    ///
    /// On success the model's [`crate::ModelMeta`] reflects what was stored.
    pub fn store<M: Model>(&self, model: &mut M) -> Result<()> {
        let table = self.registry.table::<M>()?;
        let mut meta = model.meta().clone();
        let now = Utc::now();

        let mut conn = self.system.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let inserting = meta.id.is_none();
        if inserting {
            meta.id = Some(Uuid::new_v4());
            meta.created_at = Some(now);
            meta.updated_at = None;
        } else {
            meta.created_at = Some(stored_created_at(&tx, table, meta.id)?);
            meta.updated_at = Some(now);
        }

        let mut object = match serde_json::to_value(&*model)? {
            Value::Object(object) => object,
            other => {
                return Err(Error::Conversion(format!(
                    "{} serialized to {other}, expected an object",
                    M::NAME
                )))
            }
        };
        object.insert(ID.into(), serde_json::to_value(meta.id)?);
        object.insert(CREATED_AT.into(), serde_json::to_value(meta.created_at)?);
        object.insert(UPDATED_AT.into(), serde_json::to_value(meta.updated_at)?);

        let row = table.encode_row(&object)?;
        let id_index = table
            .column_index(ID)
            .ok_or_else(|| Error::Internal(format!("{} has no id column", M::NAME)))?;
        let exclude = (!inserting).then(|| row[id_index].clone());
        check_unique(&tx, table, &row, exclude.as_ref())?;

        if inserting {
            insert_row(&tx, table, row)?;
        } else if update_row(&tx, table, row)? == 0 {
            return Err(Error::NotFound {
                model: M::NAME.to_string(),
                id: meta.id.map(|id| id.to_string()).unwrap_or_default(),
            });
        }
        tx.commit()?;

        *model.meta_mut() = meta;
        Ok(())
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub fn find<M: Model>(&self, query: &Query) -> Result<Vec<M>> {
        let table = self.registry.table::<M>()?;
        let (sql, params) = sql::select(table, query)?;
        let conn = self.system.lock()?;
        fetch_rows(&conn, &sql, &params, table.columns().len())?
            .iter()
            .map(|row| hydrate(table, row))
            .collect()
    }

    pub fn find_first<M: Model>(&self, query: &Query) -> Result<Option<M>> {
        let query = query.clone().limit(1)?;
        Ok(self.find(&query)?.into_iter().next())
    }

    pub fn find_by_id<M: Model>(&self, id: Uuid) -> Result<Option<M>> {
        self.find_first(&Query::by_id(id))
    }

    pub fn list<M: Model>(&self) -> Result<Vec<M>> {
        self.find(&Query::new())
    }

    /// Number of matching rows, honouring skip and limit.
    pub fn count<M: Model>(&self, query: &Query) -> Result<u64> {
        let table = self.registry.table::<M>()?;
        let (sql, params) = sql::count(table, query)?;
        let conn = self.system.lock()?;
        let n: i64 = conn.query_row(&sql, params_from_iter(&params), |row| row.get(0))?;
        Ok(n as u64)
    }

    pub fn count_all<M: Model>(&self) -> Result<u64> {
        self.count::<M>(&Query::new())
    }

    /// Loosely typed projections keyed by the requested field paths.
    /// Transformed fields come back as their wrapper objects.
    pub fn find_raw<M: Model>(&self, query: &Query, fields: &[&str]) -> Result<Vec<Map<String, Value>>> {
        let table = self.registry.table::<M>()?;
        let resolved = fields
            .iter()
            .map(|path| {
                table
                    .resolve(path)
                    .map(|r| (path.to_string(), r))
                    .ok_or_else(|| Error::Query(format!("{} has no field '{path}'", M::NAME)))
            })
            .collect::<Result<Vec<_>>>()?;

        let (sql, params) = sql::select(table, query)?;
        let conn = self.system.lock()?;
        let mut out = Vec::new();
        for row in fetch_rows(&conn, &sql, &params, table.columns().len())? {
            let mut object = Map::new();
            for (path, target) in &resolved {
                let value = match target {
                    Resolved::Column(index) => codec::decode(&table.columns()[*index], &row[*index])?,
                    Resolved::Field(layout) => table.raw_value(layout, &row)?,
                };
                object.insert(path.clone(), value);
            }
            out.push(object);
        }
        Ok(out)
    }

    pub fn list_raw<M: Model>(&self, fields: &[&str]) -> Result<Vec<Map<String, Value>>> {
        self.find_raw::<M>(&Query::new(), fields)
    }

    // ── Deletes ──────────────────────────────────────────────────────

    pub fn delete<M: Model>(&self, model: &M) -> Result<()> {
        let id = model.id().ok_or_else(|| Error::MissingIdentifier {
            model: M::NAME.to_string(),
        })?;
        self.delete_by_id::<M>(id)
    }

    pub fn delete_by_id<M: Model>(&self, id: Uuid) -> Result<()> {
        if self.delete_where::<M>(&Query::by_id(id))? == 0 {
            return Err(Error::NotFound {
                model: M::NAME.to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    /// Delete every matching row. Returns how many rows of `M` were removed.
    pub fn delete_where<M: Model>(&self, query: &Query) -> Result<usize> {
        let table = self.registry.table::<M>()?;
        let (sql, params) = sql::select_ids(table, query)?;

        let mut conn = self.system.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let ids = integrity::select_ids(&tx, &sql, &params)?;
        let removed = integrity::delete_rows(&tx, &self.registry, table, ids, &mut HashSet::new())?;
        tx.commit()?;
        Ok(removed)
    }
}

fn stored_created_at(conn: &Connection, table: &Table, id: Option<Uuid>) -> Result<DateTime<Utc>> {
    let id = id.map(|id| id.to_string()).unwrap_or_default();
    let not_found = || Error::NotFound {
        model: table.model().to_string(),
        id: id.clone(),
    };
    let created_index = table
        .column_index(&crate::naming::column_name(CREATED_AT))
        .ok_or_else(not_found)?;
    let id_index = table.column_index(ID).ok_or_else(not_found)?;
    let key = codec::encode(&table.columns()[id_index], &Value::String(id.clone()))?;
    let sql = format!(
        "SELECT {} FROM {} WHERE {} = ?",
        quote_ident(&table.columns()[created_index].name),
        quote_ident(table.name()),
        quote_ident(ID)
    );
    log::debug!("{sql}");
    let stored: Option<SqlValue> = conn
        .query_row(&sql, [key], |row| row.get(0))
        .optional()?;
    let decoded = codec::decode(&table.columns()[created_index], &stored.ok_or_else(not_found)?)?;
    serde_json::from_value(decoded).map_err(Error::from)
}

fn check_unique(conn: &Connection, table: &Table, row: &[SqlValue], exclude: Option<&SqlValue>) -> Result<()> {
    for key in table.unique_keys() {
        if key.columns.iter().any(|i| row[*i] == SqlValue::Null) {
            continue;
        }
        let conditions: Vec<String> = key
            .columns
            .iter()
            .map(|i| format!("{} = ?", quote_ident(&table.columns()[*i].name)))
            .collect();
        let mut sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {}",
            quote_ident(table.name()),
            conditions.join(" AND ")
        );
        let mut params: Vec<&SqlValue> = key.columns.iter().map(|i| &row[*i]).collect();
        if let Some(id) = exclude {
            sql.push_str(&format!(" AND {} <> ?", quote_ident(ID)));
            params.push(id);
        }
        log::debug!("{sql}");
        let n: i64 = conn.query_row(&sql, params_from_iter(params), |r| r.get(0))?;
        if n > 0 {
            let value: Vec<String> = key
                .columns
                .iter()
                .map(|i| codec::display(&codec::raw_json(row[*i].clone())))
                .collect();
            return Err(Error::DuplicateProperty {
                model: table.model().to_string(),
                column: key.name.clone(),
                value: value.join(", "),
            });
        }
    }
    Ok(())
}

fn insert_row(conn: &Connection, table: &Table, row: Vec<SqlValue>) -> Result<()> {
    let columns: Vec<String> = table.columns().iter().map(|c| quote_ident(&c.name)).collect();
    let sql = format!(
        "INSERT INTO {} ({}) VALUES {}",
        quote_ident(table.name()),
        columns.join(", "),
        sql::placeholders(columns.len())
    );
    log::debug!("{sql}");
    conn.execute(&sql, params_from_iter(row))?;
    Ok(())
}

fn update_row(conn: &Connection, table: &Table, row: Vec<SqlValue>) -> Result<usize> {
    let created = crate::naming::column_name(CREATED_AT);
    let mut assignments = Vec::new();
    let mut params = Vec::new();
    let mut id = SqlValue::Null;
    for (column, value) in table.columns().iter().zip(row) {
        if column.name == ID {
            id = value;
        } else if column.name != created {
            assignments.push(format!("{} = ?", quote_ident(&column.name)));
            params.push(value);
        }
    }
    params.push(id);
    let sql = format!(
        "UPDATE {} SET {} WHERE {} = ?",
        quote_ident(table.name()),
        assignments.join(", "),
        quote_ident(ID)
    );
    log::debug!("{sql}");
    Ok(conn.execute(&sql, params_from_iter(params))?)
}

fn fetch_rows(conn: &Connection, sql: &str, params: &[SqlValue], width: usize) -> Result<Vec<Vec<SqlValue>>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params_from_iter(params))?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let values = (0..width)
            .map(|i| row.get::<_, SqlValue>(i))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        out.push(values);
    }
    Ok(out)
}

fn hydrate<M: Model>(table: &Table, row: &[SqlValue]) -> Result<M> {
    let object = table.decode_row(row)?;
    serde_json::from_value(Value::Object(object)).map_err(|e| {
        Error::Conversion(format!("Stored row does not form a valid {}: {e}", M::NAME))
    })
}
