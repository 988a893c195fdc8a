//! SQLite-backed [`RecordStore`].
//!
//! Schema mirrors the archival record model: `information_object` carries
//! the nested-set hierarchy (`lft`/`rgt`), `digital_object` the asset
//! records with their parent reference, `property` the named metadata.
//! Selection filters compose into a single conjunctive query ordered by id
//! so resume-after-name behaves identically across runs.
//!
//! A small id-to-object read cache sits in front of `get_object`; the engine
//! clears it after every mutation batch via `clear_caches`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::contract::{
    DigitalObject, HierarchyBounds, ObjectId, PropertyId, PropertyRecord, RecordStore,
    SelectionFilter, StoreError, UsageClass,
};

/// Fields for inserting a new digital-object record.
#[derive(Debug, Clone)]
pub struct NewDigitalObject {
    pub information_object_id: ObjectId,
    pub usage: UsageClass,
    pub parent_id: Option<ObjectId>,
    pub name: String,
    pub path: PathBuf,
}

struct Inner {
    conn: Connection,
    object_cache: HashMap<ObjectId, DigitalObject>,
}

pub struct SqliteStore {
    inner: Mutex<Inner>,
}

impl SqliteStore {
    /// Open (or create) the repository database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref())?;
        info!(path = %path.as_ref().display(), "Opened repository database");
        Self::from_connection(conn)
    }

    /// In-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        init_schema(&conn)?;
        Ok(SqliteStore {
            inner: Mutex::new(Inner {
                conn,
                object_cache: HashMap::new(),
            }),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|e| format!("record store lock poisoned: {e}").into())
    }

    /// Insert a described item with its hierarchy position.
    pub fn insert_information_object(
        &self,
        id: ObjectId,
        slug: &str,
        lft: i64,
        rgt: i64,
    ) -> Result<(), StoreError> {
        let guard = self.lock()?;
        guard.conn.execute(
            "INSERT INTO information_object (id, slug, lft, rgt) VALUES (?1, ?2, ?3, ?4)",
            params![id, slug, lft, rgt],
        )?;
        Ok(())
    }

    /// Insert a digital-object record and return it with its assigned id.
    pub fn create_object(&self, new: NewDigitalObject) -> Result<DigitalObject, StoreError> {
        let guard = self.lock()?;
        guard.conn.execute(
            "INSERT INTO digital_object (information_object_id, usage, parent_id, name, path)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                new.information_object_id,
                new.usage.as_str(),
                new.parent_id,
                new.name,
                new.path.to_string_lossy()
            ],
        )?;
        let id = guard.conn.last_insert_rowid();
        Ok(DigitalObject {
            id,
            information_object_id: new.information_object_id,
            usage: new.usage,
            parent_id: new.parent_id,
            name: new.name,
            path: new.path,
        })
    }

    /// Attach a named property to a digital object.
    pub fn insert_property(
        &self,
        object_id: ObjectId,
        name: &str,
        value: &str,
    ) -> Result<PropertyId, StoreError> {
        let guard = self.lock()?;
        guard.conn.execute(
            "INSERT INTO property (digital_object_id, name, value) VALUES (?1, ?2, ?3)",
            params![object_id, name, value],
        )?;
        Ok(guard.conn.last_insert_rowid())
    }
}

fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS information_object (
            id      INTEGER PRIMARY KEY,
            slug    TEXT NOT NULL UNIQUE,
            lft     INTEGER NOT NULL,
            rgt     INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS digital_object (
            id                      INTEGER PRIMARY KEY AUTOINCREMENT,
            information_object_id   INTEGER NOT NULL REFERENCES information_object(id),
            usage                   TEXT NOT NULL,
            parent_id               INTEGER REFERENCES digital_object(id),
            name                    TEXT NOT NULL,
            path                    TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS property (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            digital_object_id   INTEGER NOT NULL REFERENCES digital_object(id),
            name                TEXT NOT NULL,
            value               TEXT NOT NULL DEFAULT ''
        );
        CREATE INDEX IF NOT EXISTS idx_digital_object_parent
            ON digital_object(parent_id);
        CREATE INDEX IF NOT EXISTS idx_property_object
            ON property(digital_object_id);",
    )?;
    Ok(())
}

fn row_to_object(row: &rusqlite::Row<'_>) -> rusqlite::Result<DigitalObject> {
    let usage_text: String = row.get(2)?;
    let usage = UsageClass::parse(&usage_text).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            format!("unknown usage classification: {usage_text}").into(),
        )
    })?;
    let path: String = row.get(5)?;
    Ok(DigitalObject {
        id: row.get(0)?,
        information_object_id: row.get(1)?,
        usage,
        parent_id: row.get(3)?,
        name: row.get(4)?,
        path: PathBuf::from(path),
    })
}

const OBJECT_COLUMNS: &str = "id, information_object_id, usage, parent_id, name, path";

#[async_trait]
impl RecordStore for SqliteStore {
    async fn list_master_ids(
        &self,
        filter: SelectionFilter,
    ) -> Result<Vec<ObjectId>, StoreError> {
        let mut sql = String::from(
            "SELECT DISTINCT d.id
             FROM digital_object d
             JOIN information_object i ON d.information_object_id = i.id
             WHERE d.parent_id IS NULL",
        );
        let mut bind: Vec<i64> = Vec::new();

        if let Some(HierarchyBounds { lft, rgt }) = filter.bounds {
            sql.push_str(" AND i.lft >= ? AND i.rgt <= ?");
            bind.push(lft);
            bind.push(rgt);
        }

        if filter.externals_only {
            sql.push_str(&format!(" AND d.usage = '{}'", UsageClass::ExternalUri.as_str()));
        }

        if let Some(ids) = &filter.id_allowlist {
            if ids.is_empty() {
                // An empty allowlist selects nothing.
                sql.push_str(" AND 0");
            } else {
                let placeholders = vec!["?"; ids.len()].join(", ");
                sql.push_str(&format!(" AND d.id IN ({placeholders})"));
                bind.extend(ids.iter().copied());
            }
        }

        if filter.missing_derivatives_only {
            sql.push_str(
                " AND NOT EXISTS (SELECT 1 FROM digital_object c WHERE c.parent_id = d.id)",
            );
        }

        sql.push_str(" ORDER BY d.id ASC");
        debug!(sql = %sql, "Composed selection query");

        let guard = self.lock()?;
        let mut stmt = guard.conn.prepare(&sql)?;
        let ids = stmt
            .query_map(params_from_iter(bind), |row| row.get::<_, i64>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }

    async fn resolve_branch(&self, slug: String) -> Result<Option<HierarchyBounds>, StoreError> {
        let guard = self.lock()?;
        let bounds = guard
            .conn
            .query_row(
                "SELECT lft, rgt FROM information_object WHERE slug = ?1",
                params![slug],
                |row| {
                    Ok(HierarchyBounds {
                        lft: row.get(0)?,
                        rgt: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(bounds)
    }

    async fn get_object(&self, id: ObjectId) -> Result<Option<DigitalObject>, StoreError> {
        let mut guard = self.lock()?;
        if let Some(cached) = guard.object_cache.get(&id) {
            return Ok(Some(cached.clone()));
        }
        let object = guard
            .conn
            .query_row(
                &format!("SELECT {OBJECT_COLUMNS} FROM digital_object WHERE id = ?1"),
                params![id],
                row_to_object,
            )
            .optional()?;
        if let Some(object) = &object {
            guard.object_cache.insert(id, object.clone());
        }
        Ok(object)
    }

    async fn list_children(&self, parent_id: ObjectId) -> Result<Vec<DigitalObject>, StoreError> {
        let guard = self.lock()?;
        let mut stmt = guard.conn.prepare(&format!(
            "SELECT {OBJECT_COLUMNS} FROM digital_object WHERE parent_id = ?1 ORDER BY id"
        ))?;
        let children = stmt
            .query_map(params![parent_id], row_to_object)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(children)
    }

    async fn delete_object(&self, id: ObjectId) -> Result<(), StoreError> {
        let guard = self.lock()?;
        // Properties go with their record; this is a full delete, no
        // tombstone.
        guard.conn.execute(
            "DELETE FROM property WHERE digital_object_id = ?1",
            params![id],
        )?;
        guard
            .conn
            .execute("DELETE FROM digital_object WHERE id = ?1", params![id])?;
        Ok(())
    }

    async fn list_properties(
        &self,
        object_id: ObjectId,
    ) -> Result<Vec<PropertyRecord>, StoreError> {
        let guard = self.lock()?;
        let mut stmt = guard.conn.prepare(
            "SELECT id, digital_object_id, name, value FROM property
             WHERE digital_object_id = ?1 ORDER BY id",
        )?;
        let properties = stmt
            .query_map(params![object_id], |row| {
                Ok(PropertyRecord {
                    id: row.get(0)?,
                    object_id: row.get(1)?,
                    name: row.get(2)?,
                    value: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(properties)
    }

    async fn delete_property(&self, id: PropertyId) -> Result<(), StoreError> {
        let guard = self.lock()?;
        guard
            .conn
            .execute("DELETE FROM property WHERE id = ?1", params![id])?;
        Ok(())
    }

    async fn clear_caches(&self) {
        if let Ok(mut guard) = self.inner.lock() {
            guard.object_cache.clear();
        }
    }
}
