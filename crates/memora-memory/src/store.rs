//! Memory Store – SQLite-backed [`StorageGateway`].
//!
//! Persists the personal profile row and the append-only log of image
//! memories to a local SQLite database.
//!
//! # Storage layout
//!
//! `personal_profile` has an open schema: one column per personal field,
//! named after the field.  Only the first row is read.
//!
//! `image_memories` is the append-only memory log:
//!
//! | column            | type    | description                              |
//! |-------------------|---------|------------------------------------------|
//! | id                | TEXT    | UUID v4 primary key                      |
//! | recorded_at       | TEXT    | RFC-3339 creation time (UTC)             |
//! | image file path   | TEXT    | Source image path                        |
//! | caption           | TEXT    | Image caption                            |
//! | scene             | TEXT    | Best scene guess                         |
//! | people_count      | INTEGER | Number of faces                          |
//! | objects           | TEXT    | Distinct object labels, JSON array       |
//! | text              | TEXT    | Extracted text fragments, JSON array     |
//!
//! Rows are never updated or deleted.  The connection sits behind a
//! [`Mutex`], so concurrent appends are serialized.
//!
//! # Example
//!
//! ```rust
//! use std::collections::BTreeSet;
//! use memora_memory::store::{SqliteStore, StorageGateway};
//! use memora_types::MemoryRecord;
//!
//! let store = SqliteStore::open_in_memory().unwrap();
//! let record = MemoryRecord::new("park.jpg", "a sunny park", "park", 2, BTreeSet::new(), vec![]);
//! store.append(&record).unwrap();
//!
//! assert_eq!(store.load_latest().unwrap().caption, "a sunny park");
//! ```

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use memora_types::{FieldValue, MemoraError, MemoryRecord, PersonalRecord};
use rusqlite::types::{Value, ValueRef};
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

const PROFILE_TABLE: &str = "personal_profile";
const MEMORY_TABLE: &str = "image_memories";

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can arise from memory store operations.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("No rows in {0}")]
    NoRows(String),
    #[error("Invalid field: {0}")]
    InvalidField(String),
    #[error("List column encoding error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Store lock poisoned")]
    Poisoned,
}

impl From<StorageError> for MemoraError {
    fn from(e: StorageError) -> Self {
        MemoraError::Storage(e.to_string())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// StorageGateway
// ─────────────────────────────────────────────────────────────────────────────

/// Persistence boundary for personal data and the memory log.
pub trait StorageGateway: Send + Sync {
    /// Load the single personal record row.
    fn load_personal(&self) -> Result<PersonalRecord, StorageError>;

    /// Append `record` as a new row.  Repeated images produce repeated rows.
    fn append(&self, record: &MemoryRecord) -> Result<(), StorageError>;

    /// Load the most recently appended memory record.
    fn load_latest(&self) -> Result<MemoryRecord, StorageError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// SqliteStore
// ─────────────────────────────────────────────────────────────────────────────

/// SQLite implementation of [`StorageGateway`].
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a persistent SQLite database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = Connection::open(path.as_ref())?;
        info!(path = %path.as_ref().display(), "opened memory store");
        Self::with_connection(conn)
    }

    /// Open a temporary in-memory database (useful for testing).
    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS image_memories (
                id                TEXT NOT NULL PRIMARY KEY,
                recorded_at       TEXT NOT NULL,
                \"image file path\" TEXT NOT NULL,
                caption           TEXT NOT NULL,
                scene             TEXT NOT NULL,
                people_count      INTEGER NOT NULL,
                objects           TEXT NOT NULL,
                text              TEXT NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::Poisoned)
    }

    /// Replace the personal profile with `record`.  Column order follows the
    /// record's field order.
    pub fn save_personal(&self, record: &PersonalRecord) -> Result<(), StorageError> {
        if record.is_empty() {
            return Err(StorageError::InvalidField("personal record has no fields".into()));
        }
        let mut columns = Vec::with_capacity(record.len());
        let mut seen = BTreeSet::new();
        for (name, _) in record.iter() {
            if name.trim().is_empty() {
                return Err(StorageError::InvalidField("empty field name".into()));
            }
            // SQLite column names are case-insensitive.
            if !seen.insert(name.to_lowercase()) {
                return Err(StorageError::InvalidField(format!(
                    "field {name:?} differs from another field only by letter case"
                )));
            }
            columns.push(quote_ident(name));
        }
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
        let values: Vec<Value> = record.iter().map(|(_, v)| to_sql_value(v)).collect();

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute_batch(&format!("DROP TABLE IF EXISTS {PROFILE_TABLE};"))?;
        tx.execute_batch(&format!(
            "CREATE TABLE {PROFILE_TABLE} ({});",
            columns.iter().map(|c| format!("{c} TEXT")).collect::<Vec<_>>().join(", ")
        ))?;
        tx.execute(
            &format!(
                "INSERT INTO {PROFILE_TABLE} ({}) VALUES ({})",
                columns.join(", "),
                placeholders.join(", ")
            ),
            params_from_iter(values),
        )?;
        tx.commit()?;
        debug!(fields = record.len(), "saved personal profile");
        Ok(())
    }

    /// Retrieve every memory record, oldest first.
    pub fn all_records(&self) -> Result<Vec<MemoryRecord>, StorageError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT id, recorded_at, \"image file path\", caption, scene, people_count, objects, text
             FROM {MEMORY_TABLE}
             ORDER BY rowid ASC"
        ))?;
        let rows = stmt.query_map([], row_to_raw)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(raw_to_record(row?)?);
        }
        Ok(records)
    }

    /// Number of rows in the memory log.
    pub fn count_records(&self) -> Result<usize, StorageError> {
        let conn = self.lock()?;
        let n: i64 =
            conn.query_row(&format!("SELECT COUNT(*) FROM {MEMORY_TABLE}"), [], |r| r.get(0))?;
        Ok(n as usize)
    }
}

impl StorageGateway for SqliteStore {
    fn load_personal(&self) -> Result<PersonalRecord, StorageError> {
        let conn = self.lock()?;
        let exists: Option<String> = conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![PROFILE_TABLE],
                |r| r.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Err(StorageError::NoRows(PROFILE_TABLE.into()));
        }

        let mut stmt = conn.prepare(&format!("SELECT * FROM {PROFILE_TABLE} LIMIT 1"))?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt.query([])?;
        let row = rows.next()?.ok_or_else(|| StorageError::NoRows(PROFILE_TABLE.into()))?;

        let mut record = PersonalRecord::new();
        for (i, name) in names.iter().enumerate() {
            record.push(name.clone(), from_sql_value(row.get_ref(i)?));
        }
        Ok(record)
    }

    fn append(&self, record: &MemoryRecord) -> Result<(), StorageError> {
        let objects = serde_json::to_string(&record.objects)?;
        let text = serde_json::to_string(&record.text)?;
        let conn = self.lock()?;
        conn.execute(
            &format!(
                "INSERT INTO {MEMORY_TABLE}
                     (id, recorded_at, \"image file path\", caption, scene, people_count, objects, text)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
            ),
            params![
                record.id.to_string(),
                record.recorded_at.to_rfc3339(),
                record.image_path,
                record.caption,
                record.scene,
                record.people_count,
                objects,
                text,
            ],
        )?;
        debug!(id = %record.id, image = %record.image_path, "appended memory record");
        Ok(())
    }

    fn load_latest(&self) -> Result<MemoryRecord, StorageError> {
        let conn = self.lock()?;
        let raw = conn
            .query_row(
                &format!(
                    "SELECT id, recorded_at, \"image file path\", caption, scene, people_count, objects, text
                     FROM {MEMORY_TABLE}
                     ORDER BY rowid DESC
                     LIMIT 1"
                ),
                [],
                row_to_raw,
            )
            .optional()?
            .ok_or_else(|| StorageError::NoRows(MEMORY_TABLE.into()))?;
        raw_to_record(raw)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row conversion helpers
// ─────────────────────────────────────────────────────────────────────────────

type RawRow = (String, String, String, String, String, u32, String, String);

fn row_to_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn raw_to_record(raw: RawRow) -> Result<MemoryRecord, StorageError> {
    let (id_str, ts_str, image_path, caption, scene, people_count, objects, text) = raw;
    let id = Uuid::parse_str(&id_str)
        .map_err(|e| StorageError::InvalidField(format!("id {id_str:?}: {e}")))?;
    let recorded_at = ts_str
        .parse::<DateTime<Utc>>()
        .map_err(|e| StorageError::InvalidField(format!("recorded_at {ts_str:?}: {e}")))?;
    Ok(MemoryRecord {
        id,
        recorded_at,
        image_path,
        caption,
        scene,
        people_count,
        objects: serde_json::from_str::<BTreeSet<String>>(&objects)?,
        text: serde_json::from_str::<Vec<String>>(&text)?,
    })
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn to_sql_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null => Value::Null,
        FieldValue::Integer(v) => Value::Integer(*v),
        FieldValue::Real(v) => Value::Real(*v),
        FieldValue::Text(v) => Value::Text(v.clone()),
    }
}

fn from_sql_value(value: ValueRef<'_>) -> FieldValue {
    match value {
        ValueRef::Null => FieldValue::Null,
        ValueRef::Integer(v) => FieldValue::Integer(v),
        ValueRef::Real(v) => FieldValue::Real(v),
        ValueRef::Text(b) | ValueRef::Blob(b) => {
            FieldValue::Text(String::from_utf8_lossy(b).into_owned())
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn record(image: &str, caption: &str) -> MemoryRecord {
        let objects: BTreeSet<String> = ["bench", "tree"].into_iter().map(String::from).collect();
        MemoryRecord::new(image, caption, "park", 2, objects, vec!["EXIT".into(), "Park Rd".into()])
    }

    #[test]
    fn append_and_load_latest_roundtrip() {
        let store = SqliteStore::open_in_memory().unwrap();
        let r = record("park.jpg", "a sunny park");
        store.append(&r).unwrap();
        let back = store.load_latest().unwrap();
        assert_eq!(back.id, r.id);
        assert_eq!(back.objects, r.objects);
        assert_eq!(back.text, r.text);
        assert_eq!(back.people_count, 2);
        assert_eq!(back.image_path, "park.jpg");
    }

    #[test]
    fn load_latest_returns_most_recent_append() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.append(&record("a.jpg", "first")).unwrap();
        store.append(&record("b.jpg", "second")).unwrap();
        assert_eq!(store.load_latest().unwrap().caption, "second");
    }

    #[test]
    fn repeated_image_appends_new_row() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.append(&record("same.jpg", "one")).unwrap();
        store.append(&record("same.jpg", "two")).unwrap();
        assert_eq!(store.count_records().unwrap(), 2);
        let all = store.all_records().unwrap();
        assert_eq!(all[0].caption, "one");
        assert_eq!(all[1].caption, "two");
    }

    #[test]
    fn load_latest_on_empty_log_is_no_rows() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(matches!(store.load_latest(), Err(StorageError::NoRows(_))));
    }

    #[test]
    fn empty_lists_roundtrip_as_empty() {
        let store = SqliteStore::open_in_memory().unwrap();
        let r = MemoryRecord::new("", "", "Unknown", 0, BTreeSet::new(), vec![]);
        store.append(&r).unwrap();
        let back = store.load_latest().unwrap();
        assert!(back.objects.is_empty());
        assert!(back.text.is_empty());
    }

    #[test]
    fn list_items_containing_the_display_separator_survive() {
        let store = SqliteStore::open_in_memory().unwrap();
        let objects: BTreeSet<String> =
            ["salt, pepper".to_string(), "table".to_string()].into_iter().collect();
        let r = MemoryRecord::new(
            "sign.jpg",
            "an exit sign",
            "hallway",
            0,
            objects.clone(),
            vec!["Hello, World".into(), "EXIT".into()],
        );
        store.append(&r).unwrap();

        let back = store.load_latest().unwrap();
        assert_eq!(back.text, ["Hello, World", "EXIT"]);
        assert_eq!(back.objects, objects);
        assert_eq!(back, r);
    }

    #[test]
    fn malformed_list_column_is_an_error() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.append(&record("a.jpg", "x")).unwrap();
        store
            .lock()
            .unwrap()
            .execute("UPDATE image_memories SET text = 'Hello, World'", [])
            .unwrap();
        assert!(matches!(store.load_latest(), Err(StorageError::Json(_))));
    }

    #[test]
    fn field_names_differing_only_by_case_rejected() {
        let store = SqliteStore::open_in_memory().unwrap();
        let personal = PersonalRecord::new().with("Name", "Anna").with("name", "Annie");
        let err = store.save_personal(&personal).unwrap_err();
        match err {
            StorageError::InvalidField(msg) => assert!(msg.contains("letter case"), "{msg}"),
            other => panic!("expected InvalidField, got {other:?}"),
        }
        assert!(matches!(store.load_personal(), Err(StorageError::NoRows(_))));
    }

    #[test]
    fn personal_record_roundtrip_keeps_column_order() {
        let store = SqliteStore::open_in_memory().unwrap();
        let personal = PersonalRecord::new()
            .with("Full Name", "Anna")
            .with("hobby", "gardening")
            .with("Age", FieldValue::Integer(81))
            .with("Notes", FieldValue::Null);
        store.save_personal(&personal).unwrap();

        let back = store.load_personal().unwrap();
        let names: Vec<&str> = back.iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["Full Name", "hobby", "Age", "Notes"]);
        assert_eq!(back.get("Age"), Some(&FieldValue::Integer(81)));
        assert_eq!(back.get("Notes"), Some(&FieldValue::Null));
    }

    #[test]
    fn save_personal_replaces_previous_schema() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.save_personal(&PersonalRecord::new().with("old", "x")).unwrap();
        store.save_personal(&PersonalRecord::new().with("name", "Anna")).unwrap();
        let back = store.load_personal().unwrap();
        assert_eq!(back.len(), 1);
        assert!(back.get("old").is_none());
    }

    #[test]
    fn quoted_column_names_survive() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .save_personal(&PersonalRecord::new().with("say \"hi\"", "hello"))
            .unwrap();
        let back = store.load_personal().unwrap();
        assert_eq!(back.get("say \"hi\""), Some(&FieldValue::from("hello")));
    }

    #[test]
    fn load_personal_without_profile_is_no_rows() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(matches!(store.load_personal(), Err(StorageError::NoRows(_))));
    }

    #[test]
    fn save_empty_personal_record_rejected() {
        let store = SqliteStore::open_in_memory().unwrap();
        let err = store.save_personal(&PersonalRecord::new()).unwrap_err();
        assert!(matches!(err, StorageError::InvalidField(_)));
    }

    #[test]
    fn persistent_store_survives_reopen() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("memora.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.append(&record("a.jpg", "kept")).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.load_latest().unwrap().caption, "kept");
    }

    #[test]
    fn concurrent_appends_are_serialized() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    store.append(&record(&format!("{i}.jpg"), "threaded")).unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.count_records().unwrap(), 8);
    }

    #[test]
    fn storage_error_converts_to_global_error() {
        let err: MemoraError = StorageError::NoRows("image_memories".into()).into();
        assert!(matches!(err, MemoraError::Storage(msg) if msg.contains("image_memories")));
    }
}
