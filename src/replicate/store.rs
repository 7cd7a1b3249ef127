//! SQLite message store with (folder, internaldate, message) deduplication.

use log::info;
use rusqlite::types::ValueRef;
use rusqlite::{ffi, params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};

use super::types::{FlagSet, MessageRecord};
use crate::error::{Error, Result};

/// Kept byte-for-byte so store files stay interchangeable with other tools
/// writing the same layout.
const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS emails(folder TEXT NOT NULL, flags BLOB NOT NULL, internaldate INTEGER NOT NULL, message BLOB NOT NULL, UNIQUE(folder,internaldate,message))";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A row with the same folder, internal date and body already exists.
    Duplicate,
}

pub struct Store {
    path: Option<PathBuf>,
    conn: Connection,
}

impl Store {
    /// Open (creating if needed) a store file and ensure the schema.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    Error::Configuration(format!("cannot create {}: {}", parent.display(), e))
                })?;
            }
        }
        let conn = Connection::open(path)?;
        let store = Self {
            path: Some(path.to_path_buf()),
            conn,
        };
        store.ensure_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            path: None,
            conn: Connection::open_in_memory()?,
        };
        store.ensure_schema()?;
        Ok(store)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn ensure_schema(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Insert one record. A uniqueness violation is the expected
    /// "already have it" outcome, not an error.
    pub fn insert(&self, record: &MessageRecord) -> Result<InsertOutcome> {
        let result = self.conn.execute(
            "INSERT INTO emails VALUES(?1, ?2, ?3, ?4)",
            params![
                record.folder,
                record.flags.to_string(),
                record.internal_timestamp,
                record.body
            ],
        );
        match result {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                info!("Duplicate email, skipping");
                Ok(InsertOutcome::Duplicate)
            }
            Err(e) => Err(Error::StoreWrite(e)),
        }
    }

    /// Folder names that hold at least one record.
    pub fn distinct_folders(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT folder FROM emails GROUP BY folder")?;
        let folders = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(folders)
    }

    pub fn count(&self) -> Result<u64> {
        let n: i64 = self
            .conn
            .query_row("SELECT count(*) FROM emails", [], |row| row.get(0))?;
        Ok(n.max(0) as u64)
    }

    /// Every record in insertion order, one row loaded at a time.
    pub fn records(&self) -> Records<'_> {
        Records {
            store: self,
            last_rowid: i64::MIN,
            done: false,
        }
    }

    fn record_after(&self, rowid: i64) -> Result<Option<(i64, MessageRecord)>> {
        let row = self
            .conn
            .query_row(
                "SELECT rowid, folder, flags, internaldate, message FROM emails \
                 WHERE rowid > ?1 ORDER BY rowid LIMIT 1",
                params![rowid],
                |row| {
                    let flags = text_or_blob(row.get_ref(2)?);
                    let body = match row.get_ref(4)? {
                        ValueRef::Blob(b) | ValueRef::Text(b) => b.to_vec(),
                        _ => Vec::new(),
                    };
                    Ok((
                        row.get::<_, i64>(0)?,
                        MessageRecord {
                            folder: row.get(1)?,
                            flags: FlagSet::parse(&flags),
                            internal_timestamp: row.get(3)?,
                            body,
                        },
                    ))
                },
            )
            .optional()?;
        Ok(row)
    }
}

/// Flags may have been written as TEXT or BLOB.
fn text_or_blob(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Text(b) | ValueRef::Blob(b) => String::from_utf8_lossy(b).into_owned(),
        _ => String::new(),
    }
}

/// Lazy, single-pass iterator over stored records.
pub struct Records<'a> {
    store: &'a Store,
    last_rowid: i64,
    done: bool,
}

impl Iterator for Records<'_> {
    type Item = Result<MessageRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.store.record_after(self.last_rowid) {
            Ok(Some((rowid, record))) => {
                self.last_rowid = rowid;
                Some(Ok(record))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
