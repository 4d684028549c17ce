use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::store::evaluate;
use super::{Claim, CooldownError, CooldownStore, UserId};

/// SQLite-backed cooldown store.
pub struct SqliteCooldownStore {
    conn: Mutex<Connection>,
}

impl SqliteCooldownStore {
    /// Open (or create) the cooldown table in the database at `path`.
    pub fn new(path: &Path) -> Result<Self, CooldownError> {
        let conn = Connection::open(path).map_err(|e| CooldownError::Database(e.to_string()))?;
        Self::from_connection(conn)
    }

    /// Create an in-memory SQLite cooldown store (useful for testing)
    pub fn in_memory() -> Result<Self, CooldownError> {
        let conn =
            Connection::open_in_memory().map_err(|e| CooldownError::Database(e.to_string()))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, CooldownError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS user_cooldowns (
                user_id INTEGER PRIMARY KEY,
                last_accepted TEXT NOT NULL
            );
            "#,
        )
        .map_err(|e| CooldownError::Database(e.to_string()))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn read_record(
        conn: &Connection,
        user_id: UserId,
    ) -> Result<Option<DateTime<Utc>>, CooldownError> {
        let raw: Option<String> = conn
            .query_row(
                "SELECT last_accepted FROM user_cooldowns WHERE user_id = ?",
                params![user_id.as_i64()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| CooldownError::Database(e.to_string()))?;

        Ok(raw.and_then(|s| match DateTime::parse_from_rfc3339(&s) {
            Ok(ts) => Some(ts.with_timezone(&Utc)),
            Err(e) => {
                // An unreadable record must not lock the identity out forever.
                tracing::warn!(
                    user_id = %user_id,
                    "Ignoring unparseable cooldown timestamp {:?}: {}",
                    s,
                    e
                );
                None
            }
        }))
    }
}

impl CooldownStore for SqliteCooldownStore {
    fn last_accepted(&self, user_id: UserId) -> Result<Option<DateTime<Utc>>, CooldownError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| CooldownError::Database("connection lock poisoned".to_string()))?;
        Self::read_record(&conn, user_id)
    }

    fn claim(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<Claim, CooldownError> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| CooldownError::Database("connection lock poisoned".to_string()))?;

        let tx = conn
            .transaction()
            .map_err(|e| CooldownError::Database(e.to_string()))?;

        let claim = evaluate(Self::read_record(&tx, user_id)?, now, window);

        if claim == Claim::Granted {
            tx.execute(
                r#"
                INSERT INTO user_cooldowns (user_id, last_accepted) VALUES (?1, ?2)
                ON CONFLICT(user_id) DO UPDATE SET last_accepted = excluded.last_accepted
                "#,
                params![user_id.as_i64(), now.to_rfc3339()],
            )
            .map_err(|e| CooldownError::Database(e.to_string()))?;
        }

        tx.commit()
            .map_err(|e| CooldownError::Database(e.to_string()))?;

        Ok(claim)
    }
}
