use crate::backend::DocumentBackend;
use crate::blocks::Block;
use crate::document::{Document, Preferences};
use crate::error::BackendError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use im::Vector;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

pub struct Migration {
    pub version: i64,
    pub name: &'static str,
    pub up: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "documents",
        up: "CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL DEFAULT '',
                blocks TEXT NOT NULL DEFAULT '[]',
                preferences TEXT NOT NULL DEFAULT '{}',
                banner TEXT,
                background_color TEXT,
                icon TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS documents_updated_at ON documents(updated_at);",
    },
    Migration {
        version: 2,
        name: "assets",
        up: "CREATE TABLE IF NOT EXISTS assets (
                hash TEXT PRIMARY KEY,
                path TEXT NOT NULL,
                mime_type TEXT NOT NULL,
                size INTEGER NOT NULL,
                original_name TEXT,
                created_at INTEGER DEFAULT (strftime('%s','now'))
            );",
    },
];

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSummary {
    pub id: String,
    pub title: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssetRecord {
    pub hash: String,
    pub path: String,
    pub mime_type: String,
    pub size: i64,
    pub original_name: Option<String>,
}

struct DocumentRow {
    id: String,
    title: String,
    blocks: String,
    preferences: String,
    banner: Option<String>,
    background_color: Option<String>,
    icon: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl DocumentRow {
    fn into_document(self) -> Result<Document, BackendError> {
        let blocks: Vector<Block> = serde_json::from_str(&self.blocks)?;
        let preferences: Preferences = serde_json::from_str(&self.preferences)?;
        Ok(Document {
            id: self.id,
            title: self.title,
            blocks,
            preferences,
            banner: self.banner,
            background_color: self.background_color,
            icon: self.icon,
            created_at: from_millis(self.created_at),
            updated_at: from_millis(self.updated_at),
        })
    }
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

impl Database {
    pub fn open(path: &Path) -> rusqlite::Result<Self> {
        Self::configure(Connection::open(path)?)
    }

    pub fn new_in_memory() -> rusqlite::Result<Self> {
        Self::configure(Connection::open_in_memory()?)
    }

    fn configure(conn: Connection) -> rusqlite::Result<Self> {
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        lock(&self.conn)
    }

    /// Runs `f` against the connection on tokio's blocking pool so the
    /// async backend never holds a worker thread during SQLite I/O.
    async fn with_conn_blocking<T, F>(&self, f: F) -> Result<T, BackendError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, BackendError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || f(&lock(&conn)))
            .await
            .map_err(|err| BackendError::Unavailable(err.to_string()))?
    }

    pub fn latest_migration_version() -> i64 {
        MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
    }

    pub fn current_schema_version(&self) -> rusqlite::Result<i64> {
        let conn = self.conn();
        let has_table: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = 'schema_migrations'",
            [],
            |row| row.get(0),
        )?;
        if !has_table {
            return Ok(0);
        }
        conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
    }

    pub fn run_migrations(&self) -> rusqlite::Result<()> {
        let current_version = self.current_schema_version()?;
        let mut conn = self.conn();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT DEFAULT CURRENT_TIMESTAMP
            );",
        )?;

        for migration in MIGRATIONS {
            if migration.version > current_version {
                let tx = conn.transaction()?;
                tx.execute_batch(migration.up)?;
                tx.execute(
                    "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
                    params![migration.version, migration.name],
                )?;
                tx.commit()?;
            }
        }

        Ok(())
    }

    pub fn get_document(&self, id: &str) -> Result<Option<Document>, BackendError> {
        read_document(&self.conn(), id)
    }

    pub fn upsert_document(&self, doc: &Document) -> Result<(), BackendError> {
        write_document(&self.conn(), doc)
    }

    pub fn list_documents(&self) -> rusqlite::Result<Vec<DocumentSummary>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT id, title, updated_at FROM documents ORDER BY updated_at DESC, id")?;
        let rows = stmt.query_map([], |row| {
            Ok(DocumentSummary {
                id: row.get(0)?,
                title: row.get(1)?,
                updated_at: from_millis(row.get(2)?),
            })
        })?;
        let summaries = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(summaries)
    }

    pub fn delete_document(&self, id: &str) -> rusqlite::Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM documents WHERE id = ?1", [id])?;
        Ok(affected > 0)
    }

    pub fn upsert_asset(
        &self,
        hash: &str,
        path: &str,
        mime_type: &str,
        size: i64,
        original_name: Option<&str>,
    ) -> rusqlite::Result<AssetRecord> {
        self.conn().execute(
            "INSERT INTO assets (hash, path, mime_type, size, original_name)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(hash) DO UPDATE SET
                original_name = COALESCE(assets.original_name, excluded.original_name)",
            params![hash, path, mime_type, size, original_name],
        )?;
        self.get_asset(hash)?
            .ok_or(rusqlite::Error::QueryReturnedNoRows)
    }

    pub fn get_asset(&self, hash: &str) -> rusqlite::Result<Option<AssetRecord>> {
        self.conn()
            .query_row(
                "SELECT hash, path, mime_type, size, original_name FROM assets WHERE hash = ?1",
                [hash],
                |row| {
                    Ok(AssetRecord {
                        hash: row.get(0)?,
                        path: row.get(1)?,
                        mime_type: row.get(2)?,
                        size: row.get(3)?,
                        original_name: row.get(4)?,
                    })
                },
            )
            .optional()
    }
}

fn read_document(conn: &Connection, id: &str) -> Result<Option<Document>, BackendError> {
    let row = conn
        .query_row(
            "SELECT id, title, blocks, preferences, banner, background_color, icon,
                    created_at, updated_at
             FROM documents WHERE id = ?1",
            [id],
            |row| {
                Ok(DocumentRow {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    blocks: row.get(2)?,
                    preferences: row.get(3)?,
                    banner: row.get(4)?,
                    background_color: row.get(5)?,
                    icon: row.get(6)?,
                    created_at: row.get(7)?,
                    updated_at: row.get(8)?,
                })
            },
        )
        .optional()?;
    row.map(DocumentRow::into_document).transpose()
}

fn write_document(conn: &Connection, doc: &Document) -> Result<(), BackendError> {
    let blocks = serde_json::to_string(&doc.blocks)?;
    let preferences = serde_json::to_string(&doc.preferences)?;
    conn.execute(
        "INSERT INTO documents
            (id, title, blocks, preferences, banner, background_color, icon, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(id) DO UPDATE SET
            title = excluded.title,
            blocks = excluded.blocks,
            preferences = excluded.preferences,
            banner = excluded.banner,
            background_color = excluded.background_color,
            icon = excluded.icon,
            updated_at = excluded.updated_at",
        params![
            doc.id,
            doc.title,
            blocks,
            preferences,
            doc.banner,
            doc.background_color,
            doc.icon,
            doc.created_at.timestamp_millis(),
            doc.updated_at.timestamp_millis(),
        ],
    )?;
    Ok(())
}

fn lock(conn: &Mutex<Connection>) -> MutexGuard<'_, Connection> {
    conn.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl DocumentBackend for Database {
    async fn fetch(&self, id: &str) -> Result<Document, BackendError> {
        let key = id.to_string();
        self.with_conn_blocking(move |conn| read_document(conn, &key))
            .await?
            .ok_or_else(|| BackendError::NotFound(id.to_string()))
    }

    async fn upsert(&self, document: &Document) -> Result<(), BackendError> {
        let doc = document.clone();
        self.with_conn_blocking(move |conn| write_document(conn, &doc))
            .await
    }
}
