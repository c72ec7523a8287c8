use crate::codec;
use crate::config::DatabaseConfig;
use crate::error::{Error, Result};
use crate::naming::quote_ident;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, Connection};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

const MIGRATIONS_TABLE: &str = "tabula_migrations";

/// Column as reported by `PRAGMA table_info`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExistingColumn {
    pub name: String,
    pub sql_type: String,
    pub not_null: bool,
    pub primary_key: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MigrationRecord {
    pub id: i64,
    pub table: String,
    pub description: String,
    pub applied_at: String,
}

/// Owns the connection plus the bookkeeping tables and introspection queries.
pub struct SystemDb {
    conn: Mutex<Connection>,
}

impl SystemDb {
    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        let conn = match &config.path {
            Some(path) => Connection::open(path)?,
            None => Connection::open_in_memory()?,
        };
        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
        let db = SystemDb {
            conn: Mutex::new(conn),
        };
        db.initialize_tables()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        Self::open(&DatabaseConfig::in_memory())
    }

    fn initialize_tables(&self) -> Result<()> {
        self.lock()?.execute_batch(&format!(
            "
            CREATE TABLE IF NOT EXISTS {MIGRATIONS_TABLE} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                table_name TEXT NOT NULL,
                description TEXT NOT NULL,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            "
        ))?;
        Ok(())
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Internal("connection lock poisoned".into()))
    }

    // ── Migration Log ────────────────────────────────────────────────

    pub(crate) fn record_migration(conn: &Connection, table: &str, description: &str) -> Result<()> {
        conn.execute(
            &format!("INSERT INTO {MIGRATIONS_TABLE} (table_name, description) VALUES (?1, ?2)"),
            params![table, description],
        )?;
        Ok(())
    }

    pub fn migrations(&self) -> Result<Vec<MigrationRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT id, table_name, description, applied_at FROM {MIGRATIONS_TABLE} ORDER BY id"
        ))?;
        let rows = stmt.query_map([], |row| {
            Ok(MigrationRecord {
                id: row.get(0)?,
                table: row.get(1)?,
                description: row.get(2)?,
                applied_at: row.get(3)?,
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    // ── Introspection ────────────────────────────────────────────────

    pub(crate) fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub(crate) fn row_count(conn: &Connection, table: &str) -> Result<u64> {
        let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", quote_ident(table)), [], |row| {
            row.get(0)
        })?;
        Ok(count.max(0) as u64)
    }

    pub(crate) fn table_columns(conn: &Connection, table: &str) -> Result<Vec<ExistingColumn>> {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
        let rows = stmt.query_map([], |row| {
            Ok(ExistingColumn {
                name: row.get(1)?,
                sql_type: row.get(2)?,
                not_null: row.get::<_, i64>(3)? != 0,
                primary_key: row.get::<_, i64>(5)? != 0,
            })
        })?;

        let mut columns = Vec::new();
        for row in rows {
            columns.push(row?);
        }
        Ok(columns)
    }

    /// User tables, excluding SQLite internals and the migration log.
    pub fn list_tables(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut tables = Vec::new();
        for row in rows {
            let name = row?;
            if name != MIGRATIONS_TABLE {
                tables.push(name);
            }
        }
        Ok(tables)
    }

    pub fn columns(&self, table: &str) -> Result<Vec<ExistingColumn>> {
        let conn = self.lock()?;
        if !Self::table_exists(&conn, table)? {
            return Err(Error::NotFound {
                model: "table".into(),
                id: table.to_string(),
            });
        }
        Self::table_columns(&conn, table)
    }

    /// Raw rows of any table as JSON objects keyed by column name.
    pub fn dump_table(&self, table: &str, limit: Option<u64>) -> Result<Vec<serde_json::Map<String, serde_json::Value>>> {
        let columns = self.columns(table)?;
        let mut sql = format!("SELECT * FROM {}", quote_ident(table));
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut object = serde_json::Map::new();
            for (i, column) in columns.iter().enumerate() {
                let value: SqlValue = row.get(i)?;
                object.insert(column.name.clone(), codec::raw_json(value));
            }
            out.push(object);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bookkeeping_table_is_hidden() {
        let db = SystemDb::open_in_memory().unwrap();
        assert!(db.list_tables().unwrap().is_empty());
        let conn = db.lock().unwrap();
        assert!(SystemDb::table_exists(&conn, MIGRATIONS_TABLE).unwrap());
    }

    #[test]
    fn test_record_migration() {
        let db = SystemDb::open_in_memory().unwrap();
        {
            let conn = db.lock().unwrap();
            SystemDb::record_migration(&conn, "warp", "add column warp.cost").unwrap();
        }
        let records = db.migrations().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].table, "warp");
        assert_eq!(records[0].description, "add column warp.cost");
    }

    #[test]
    fn test_table_columns_and_dump() {
        let db = SystemDb::open_in_memory().unwrap();
        {
            let conn = db.lock().unwrap();
            conn.execute_batch(
                "CREATE TABLE note (id INTEGER PRIMARY KEY, body TEXT NOT NULL, tag TEXT);
                 INSERT INTO note (body) VALUES ('first'), ('second');",
            )
            .unwrap();
        }
        let columns = db.columns("note").unwrap();
        let names: Vec<_> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "body", "tag"]);
        assert!(columns[0].primary_key);
        assert!(columns[1].not_null);
        assert!(!columns[2].not_null);

        let rows = db.dump_table("note", Some(1)).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["body"], serde_json::json!("first"));
        assert_eq!(rows[0]["tag"], serde_json::Value::Null);
    }

    #[test]
    fn test_missing_table() {
        let db = SystemDb::open_in_memory().unwrap();
        let err = db.columns("nothing").unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }
}
