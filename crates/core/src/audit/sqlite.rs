use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

use super::{AuditError, AuditEvent, AuditFilter, AuditRecord, AuditStore};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS audit_log (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    recorded_at TEXT NOT NULL,
    event_type  TEXT NOT NULL,
    handle_id   TEXT,
    user_id     TEXT,
    payload     TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_audit_log_type_time ON audit_log(event_type, recorded_at);
CREATE INDEX IF NOT EXISTS idx_audit_log_handle ON audit_log(handle_id);
CREATE INDEX IF NOT EXISTS idx_audit_log_user ON audit_log(user_id);
"#;

const COLUMNS: &str = "id, recorded_at, event_type, handle_id, user_id, payload";

impl From<rusqlite::Error> for AuditError {
    fn from(e: rusqlite::Error) -> Self {
        AuditError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for AuditError {
    fn from(e: serde_json::Error) -> Self {
        AuditError::Serialization(e.to_string())
    }
}

/// Audit log in a SQLite table. Shares the database file with the cooldown
/// store; each store holds its own connection.
pub struct SqliteAuditStore {
    conn: Mutex<Connection>,
}

impl SqliteAuditStore {
    pub fn new(path: &Path) -> Result<Self, AuditError> {
        Self::init(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self, AuditError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, AuditError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, AuditError> {
        self.conn
            .lock()
            .map_err(|_| AuditError::Database("audit connection poisoned".to_string()))
    }
}

/// `WHERE` fragment plus its bound values, built from a filter.
#[derive(Default)]
struct Predicate {
    clauses: Vec<&'static str>,
    values: Vec<Value>,
}

impl Predicate {
    fn from_filter(filter: &AuditFilter) -> Self {
        let mut predicate = Self::default();

        if let Some(event_type) = &filter.event_type {
            predicate.require("event_type = ?", event_type.clone());
        }
        if let Some(user) = filter.user {
            predicate.require("user_id = ?", user.to_string());
        }
        if let Some(handle) = filter.handle {
            predicate.require("handle_id = ?", handle.to_string());
        }
        // Only carried in the JSON payload.
        if let Some(trigger) = &filter.trigger {
            predicate.require("json_extract(payload, '$.trigger') = ?", trigger.clone());
        }
        if let Some(outcome) = &filter.outcome {
            predicate.require("json_extract(payload, '$.outcome') = ?", outcome.clone());
        }
        // RFC 3339 in UTC sorts lexically.
        if let Some(since) = filter.since {
            predicate.require("recorded_at >= ?", since.to_rfc3339());
        }
        if let Some(until) = filter.until {
            predicate.require("recorded_at <= ?", until.to_rfc3339());
        }

        predicate
    }

    fn require(&mut self, clause: &'static str, value: String) {
        self.clauses.push(clause);
        self.values.push(Value::Text(value));
    }

    fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }
}

struct StoredRow {
    id: i64,
    recorded_at: String,
    event_type: String,
    handle_id: Option<String>,
    user_id: Option<String>,
    payload: String,
}

impl StoredRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            recorded_at: row.get(1)?,
            event_type: row.get(2)?,
            handle_id: row.get(3)?,
            user_id: row.get(4)?,
            payload: row.get(5)?,
        })
    }

    fn into_record(self) -> Result<AuditRecord, AuditError> {
        let timestamp = DateTime::parse_from_rfc3339(&self.recorded_at)
            .map_err(|e| {
                AuditError::Database(format!("bad recorded_at '{}': {}", self.recorded_at, e))
            })?
            .with_timezone(&Utc);
        let data: AuditEvent = serde_json::from_str(&self.payload)?;

        Ok(AuditRecord {
            id: self.id,
            timestamp,
            event_type: self.event_type,
            handle_id: self.handle_id,
            user_id: self.user_id,
            data,
        })
    }
}

impl AuditStore for SqliteAuditStore {
    fn insert(&self, record: &AuditRecord) -> Result<i64, AuditError> {
        let payload = serde_json::to_string(&record.data)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO audit_log (recorded_at, event_type, handle_id, user_id, payload)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.timestamp.to_rfc3339(),
                record.event_type,
                record.handle_id,
                record.user_id,
                payload,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditRecord>, AuditError> {
        let predicate = Predicate::from_filter(filter);
        let sql = predicate.where_sql();
        let mut values = predicate.values;
        values.push(Value::Integer(filter.page.limit.into()));
        values.push(Value::Integer(filter.page.offset.into()));

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM audit_log{sql} ORDER BY recorded_at DESC, id DESC LIMIT ? OFFSET ?"
        ))?;
        let rows = stmt
            .query_map(params_from_iter(values), StoredRow::read)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(StoredRow::into_record).collect()
    }

    fn count(&self, filter: &AuditFilter) -> Result<i64, AuditError> {
        let predicate = Predicate::from_filter(filter);
        let conn = self.conn()?;
        let total = conn.query_row(
            &format!("SELECT COUNT(*) FROM audit_log{}", predicate.where_sql()),
            params_from_iter(predicate.values),
            |row| row.get(0),
        )?;
        Ok(total)
    }
}
