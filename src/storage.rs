//! Snapshot storage. Each store serialises itself to one JSON document per
//! key; backends only move documents around.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::{params, Connection};
use tracing::debug;

use crate::error::{Error, Result};

pub trait Storage {
    /// The stored document, or `None` if nothing was saved under `key`.
    fn load(&self, key: &str) -> Result<Option<String>>;

    fn save(&self, key: &str, document: &str) -> Result<()>;

    /// Stored keys starting with `prefix`, sorted.
    fn keys(&self, prefix: &str) -> Result<Vec<String>>;
}

fn validate_key(key: &str) -> Result<()> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.split('/').any(|part| part.is_empty() || part == "." || part == "..");
    if bad {
        return Err(Error::Storage(format!("invalid key '{}'", key)));
    }
    Ok(())
}

// One `<key>.json` file per document under a root directory
pub struct JsonFileStorage {
    root: PathBuf,
}

impl JsonFileStorage {
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", key))
    }

    fn collect_keys(&self, dir: &Path, keys: &mut Vec<String>) -> Result<()> {
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                self.collect_keys(&path, keys)?;
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Ok(relative) = path.with_extension("").strip_prefix(&self.root) {
                let key: Vec<String> = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                keys.push(key.join("/"));
            }
        }
        Ok(())
    }
}

impl Storage for JsonFileStorage {
    fn load(&self, key: &str) -> Result<Option<String>> {
        validate_key(key)?;
        match fs::read_to_string(self.path_for(key)) {
            Ok(body) => Ok(Some(body)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, key: &str, document: &str) -> Result<()> {
        validate_key(key)?;
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Readers only ever see a complete document
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, document)?;
        fs::rename(&tmp, &path)?;

        debug!(key, path = %path.display(), "wrote snapshot");
        Ok(())
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        self.collect_keys(&self.root, &mut keys)?;
        keys.retain(|k| k.starts_with(prefix));
        keys.sort();
        Ok(keys)
    }
}

// Snapshots kept as rows in a single SQLite table
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let storage = Self { conn };
        storage.init()?;
        Ok(storage)
    }

    pub fn open_in_memory() -> Result<Self> {
        let storage = Self {
            conn: Connection::open_in_memory()?,
        };
        storage.init()?;
        Ok(storage)
    }

    fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS snapshots (
                key TEXT PRIMARY KEY,
                body TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }
}

impl Storage for SqliteStorage {
    fn load(&self, key: &str) -> Result<Option<String>> {
        validate_key(key)?;
        let body = self.conn.query_row(
            "SELECT body FROM snapshots WHERE key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match body {
            Ok(body) => Ok(Some(body)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, key: &str, document: &str) -> Result<()> {
        validate_key(key)?;
        self.conn.execute(
            r#"
            INSERT INTO snapshots (key, body, updated_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at
            "#,
            params![key, document, Utc::now().to_rfc3339()],
        )?;
        debug!(key, "wrote snapshot row");
        Ok(())
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key FROM snapshots WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key")?;
        let keys = stmt
            .query_map(params![prefix], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(keys)
    }
}

#[derive(Default)]
pub struct MemoryStorage {
    documents: RefCell<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn load(&self, key: &str) -> Result<Option<String>> {
        validate_key(key)?;
        Ok(self.documents.borrow().get(key).cloned())
    }

    fn save(&self, key: &str, document: &str) -> Result<()> {
        validate_key(key)?;
        self.documents
            .borrow_mut()
            .insert(key.to_string(), document.to_string());
        Ok(())
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .documents
            .borrow()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}
