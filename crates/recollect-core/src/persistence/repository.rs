//! SQLite-backed interaction records

use std::path::Path;

use uuid::Uuid;

use super::records::{InteractionRecord, InteractionRecords};
use crate::error::PersistenceError;
use crate::interaction::EventId;

#[cfg(feature = "sqlite")]
use super::schema::{Schema, SCHEMA_VERSION};
#[cfg(feature = "sqlite")]
use chrono::SecondsFormat;

/// Interaction records stored in a SQLite database
#[cfg(feature = "sqlite")]
pub struct SqliteInteractionRecords {
    conn: std::sync::Mutex<rusqlite::Connection>,
}

#[cfg(feature = "sqlite")]
impl SqliteInteractionRecords {
    /// Open (or create) the database at `path`
    pub fn new(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let conn = rusqlite::Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> Result<Self, PersistenceError> {
        let conn = rusqlite::Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: rusqlite::Connection) -> Result<Self, PersistenceError> {
        initialize(&conn)?;
        Ok(Self {
            conn: std::sync::Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, rusqlite::Connection>, PersistenceError> {
        self.conn
            .lock()
            .map_err(|e| PersistenceError::Poisoned(e.to_string()))
    }
}

#[cfg(feature = "sqlite")]
fn initialize(conn: &rusqlite::Connection) -> Result<(), PersistenceError> {
    let current_version = get_schema_version(conn).unwrap_or(0);

    if current_version == 0 {
        conn.execute_batch(Schema::create_tables())?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version < SCHEMA_VERSION {
        for version in current_version..SCHEMA_VERSION {
            if let Some(migration) = Schema::migration(version, version + 1) {
                conn.execute_batch(migration)?;
            }
        }
        set_schema_version(conn, SCHEMA_VERSION)?;
    }

    Ok(())
}

#[cfg(feature = "sqlite")]
fn get_schema_version(conn: &rusqlite::Connection) -> Option<u32> {
    conn.query_row(
        "SELECT version FROM schema_version ORDER BY applied_at DESC LIMIT 1",
        [],
        |row| row.get(0),
    )
    .ok()
}

#[cfg(feature = "sqlite")]
fn set_schema_version(conn: &rusqlite::Connection, version: u32) -> Result<(), PersistenceError> {
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Raw column values, decoded outside the rusqlite row callback
#[cfg(feature = "sqlite")]
struct Row {
    id: String,
    user_id: String,
    event_id: String,
    artifact_id: Option<String>,
    kind: String,
    metadata: String,
    timestamp: String,
    created_at: String,
}

#[cfg(feature = "sqlite")]
impl Row {
    fn read(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            event_id: row.get(2)?,
            artifact_id: row.get(3)?,
            kind: row.get(4)?,
            metadata: row.get(5)?,
            timestamp: row.get(6)?,
            created_at: row.get(7)?,
        })
    }

    fn decode(self) -> Result<InteractionRecord, PersistenceError> {
        use crate::interaction::ArtifactId;
        use chrono::{DateTime, Utc};

        fn uuid(column: &str, s: &str) -> Result<Uuid, PersistenceError> {
            Uuid::parse_str(s).map_err(|e| PersistenceError::CorruptRow(format!("{}: {}", column, e)))
        }

        fn time(column: &str, s: &str) -> Result<DateTime<Utc>, PersistenceError> {
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| PersistenceError::CorruptRow(format!("{}: {}", column, e)))
        }

        Ok(InteractionRecord {
            id: uuid("id", &self.id)?,
            user_id: uuid("user_id", &self.user_id)?,
            event_id: EventId(uuid("event_id", &self.event_id)?),
            artifact_id: self
                .artifact_id
                .map(|s| uuid("artifact_id", &s).map(ArtifactId))
                .transpose()?,
            kind: self
                .kind
                .parse()
                .map_err(|e| PersistenceError::CorruptRow(format!("kind: {}", e)))?,
            metadata: serde_json::from_str(&self.metadata)?,
            timestamp: time("timestamp", &self.timestamp)?,
            created_at: time("created_at", &self.created_at)?,
        })
    }
}

#[cfg(feature = "sqlite")]
impl InteractionRecords for SqliteInteractionRecords {
    // Fixed-width timestamps keep the TEXT column sortable
    fn upsert(&self, record: &InteractionRecord) -> Result<(), PersistenceError> {
        let metadata_json = serde_json::to_string(&record.metadata)?;

        self.conn()?.execute(
            r#"
            INSERT OR REPLACE INTO interactions
            (id, user_id, event_id, artifact_id, kind, metadata, timestamp, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            rusqlite::params![
                record.id.to_string(),
                record.user_id.to_string(),
                record.event_id.to_string(),
                record.artifact_id.map(|a| a.to_string()),
                record.kind.as_str(),
                metadata_json,
                record.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
                record.created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
            ],
        )?;

        Ok(())
    }

    fn get_all_by_event_id_by_user_id(
        &self,
        event_id: EventId,
        user_id: Uuid,
    ) -> Result<Vec<InteractionRecord>, PersistenceError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, user_id, event_id, artifact_id, kind, metadata, timestamp, created_at
            FROM interactions
            WHERE event_id = ?1 AND user_id = ?2
            ORDER BY timestamp ASC, id ASC
            "#,
        )?;

        let rows = stmt
            .query_map([event_id.to_string(), user_id.to_string()], Row::read)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter().map(Row::decode).collect()
    }

    fn delete_all_by_event_id_by_user_id(
        &self,
        event_id: EventId,
        user_id: Uuid,
    ) -> Result<usize, PersistenceError> {
        let deleted = self.conn()?.execute(
            "DELETE FROM interactions WHERE event_id = ?1 AND user_id = ?2",
            [event_id.to_string(), user_id.to_string()],
        )?;
        Ok(deleted)
    }
}

// Stub implementation when sqlite feature is not enabled
#[cfg(not(feature = "sqlite"))]
pub struct SqliteInteractionRecords;

#[cfg(not(feature = "sqlite"))]
impl SqliteInteractionRecords {
    pub fn new(_path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        Err(PersistenceError::Database(
            "SQLite support not enabled. Enable the 'sqlite' feature.".to_string(),
        ))
    }

    pub fn in_memory() -> Result<Self, PersistenceError> {
        Self::new(":memory:")
    }
}

#[cfg(not(feature = "sqlite"))]
impl InteractionRecords for SqliteInteractionRecords {
    fn upsert(&self, _record: &InteractionRecord) -> Result<(), PersistenceError> {
        Err(PersistenceError::Database("SQLite support not enabled".to_string()))
    }

    fn get_all_by_event_id_by_user_id(
        &self,
        _event_id: EventId,
        _user_id: Uuid,
    ) -> Result<Vec<InteractionRecord>, PersistenceError> {
        Err(PersistenceError::Database("SQLite support not enabled".to_string()))
    }

    fn delete_all_by_event_id_by_user_id(
        &self,
        _event_id: EventId,
        _user_id: Uuid,
    ) -> Result<usize, PersistenceError> {
        Err(PersistenceError::Database("SQLite support not enabled".to_string()))
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::interaction::{ArtifactId, InteractionKind, Metadata};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn record(user_id: Uuid, event_id: EventId, secs: i64) -> InteractionRecord {
        let mut metadata = Metadata::new();
        metadata.insert("query".into(), json!("galaxy rotation curves"));
        InteractionRecord {
            id: Uuid::new_v4(),
            user_id,
            event_id,
            artifact_id: Some(ArtifactId(Uuid::new_v4())),
            kind: InteractionKind::MarkGood,
            metadata,
            timestamp: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
            created_at: Utc.timestamp_opt(1_700_000_100, 0).unwrap(),
        }
    }

    #[test]
    fn test_repository_creation() {
        let repo = SqliteInteractionRecords::in_memory().unwrap();
        let found = repo
            .get_all_by_event_id_by_user_id(EventId::new(), Uuid::new_v4())
            .unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_upsert_round_trips_and_replaces() {
        let repo = SqliteInteractionRecords::in_memory().unwrap();
        let (user, event) = (Uuid::new_v4(), EventId::new());
        let mut r = record(user, event, 0);
        repo.upsert(&r).unwrap();

        let found = repo.get_all_by_event_id_by_user_id(event, user).unwrap();
        assert_eq!(found, vec![r.clone()]);

        r.kind = InteractionKind::MarkBad;
        repo.upsert(&r).unwrap();
        let found = repo.get_all_by_event_id_by_user_id(event, user).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, InteractionKind::MarkBad);
    }

    #[test]
    fn test_delete_scoped_to_event_and_user() {
        let repo = SqliteInteractionRecords::in_memory().unwrap();
        let (alice, bob, event) = (Uuid::new_v4(), Uuid::new_v4(), EventId::new());
        repo.upsert(&record(alice, event, 2)).unwrap();
        repo.upsert(&record(alice, event, 1)).unwrap();
        repo.upsert(&record(bob, event, 0)).unwrap();

        let found = repo.get_all_by_event_id_by_user_id(event, alice).unwrap();
        assert!(found[0].timestamp < found[1].timestamp);

        assert_eq!(repo.delete_all_by_event_id_by_user_id(event, alice).unwrap(), 2);
        assert!(repo.get_all_by_event_id_by_user_id(event, alice).unwrap().is_empty());
        assert_eq!(repo.get_all_by_event_id_by_user_id(event, bob).unwrap().len(), 1);
    }

    #[test]
    fn test_reopen_keeps_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recollect.db");
        let (user, event) = (Uuid::new_v4(), EventId::new());

        SqliteInteractionRecords::new(&path)
            .unwrap()
            .upsert(&record(user, event, 0))
            .unwrap();

        let reopened = SqliteInteractionRecords::new(&path).unwrap();
        assert_eq!(reopened.get_all_by_event_id_by_user_id(event, user).unwrap().len(), 1);
    }
}
