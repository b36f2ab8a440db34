//! On-disk face store.
//!
//! One SQLite file holding the ordered `(name, embedding)` pairs. Each
//! embedding is stored as its little-endian `f32` bytes so values survive
//! a round trip bit-for-bit. Every write builds a fresh database next to
//! the target and renames it into place.

use crate::types::Embedding;
use rusqlite::{params, Connection, OpenFlags};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use thiserror::Error;

const FORMAT_VERSION: i64 = 1;

const SCHEMA: &str = "CREATE TABLE faces (
    position  INTEGER PRIMARY KEY,
    name      TEXT NOT NULL,
    embedding BLOB NOT NULL
);";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("corrupt face store: {0}")]
    Corrupt(String),
}

/// Contents read back from the store, in insertion order.
#[derive(Debug, Default)]
pub struct StoredFaces {
    pub names: Vec<String>,
    pub embeddings: Vec<Embedding>,
}

/// Handle to the face store file. Holds no open connection between calls.
#[derive(Debug, Clone)]
pub struct FaceStore {
    path: PathBuf,
}

impl FaceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read all stored faces, expecting `dimension`-length embeddings.
    ///
    /// Returns `Ok(None)` when the file does not exist.
    pub fn read(&self, dimension: usize) -> Result<Option<StoredFaces>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let conn = Connection::open_with_flags(&self.path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;

        let version: i64 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .map_err(|e| StoreError::Corrupt(format!("cannot read format version: {e}")))?;
        if version != FORMAT_VERSION {
            return Err(StoreError::Corrupt(format!(
                "unsupported format version {version} (expected {FORMAT_VERSION})"
            )));
        }

        let rows: Vec<(String, Vec<u8>)> = {
            let mut stmt = conn
                .prepare("SELECT name, embedding FROM faces ORDER BY position")
                .map_err(|e| StoreError::Corrupt(format!("faces table unreadable: {e}")))?;
            let rows: Vec<(String, Vec<u8>)> = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<Result<_, _>>()
                .map_err(|e| StoreError::Corrupt(format!("bad row: {e}")))?;
            rows
        };

        let mut faces = StoredFaces {
            names: Vec::with_capacity(rows.len()),
            embeddings: Vec::with_capacity(rows.len()),
        };
        for (i, (name, blob)) in rows.into_iter().enumerate() {
            if name.trim().is_empty() {
                return Err(StoreError::Corrupt(format!("row {i}: blank name")));
            }
            let embedding = decode_embedding(&blob, dimension)
                .map_err(|reason| StoreError::Corrupt(format!("row {i}: {reason}")))?;
            faces.names.push(name);
            faces.embeddings.push(embedding);
        }

        Ok(Some(faces))
    }

    /// Replace the store contents with the given aligned sequences.
    pub fn write(&self, names: &[String], embeddings: &[Embedding]) -> Result<(), StoreError> {
        debug_assert_eq!(names.len(), embeddings.len());

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let tmp = self.temp_path();
        remove_if_exists(&tmp)?;

        if let Err(e) = write_database(&tmp, names, embeddings) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e);
        }

        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    /// Delete the store file. Returns whether a file was removed.
    pub fn remove(&self) -> Result<bool, StoreError> {
        Ok(remove_if_exists(&self.path)?)
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(OsString::from)
            .unwrap_or_else(|| OsString::from("faces.db"));
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

fn write_database(path: &Path, names: &[String], embeddings: &[Embedding]) -> Result<(), StoreError> {
    let mut conn = Connection::open(path)?;
    conn.execute_batch(SCHEMA)?;
    conn.pragma_update(None, "user_version", FORMAT_VERSION)?;

    let tx = conn.transaction()?;
    {
        let mut stmt =
            tx.prepare("INSERT INTO faces (position, name, embedding) VALUES (?1, ?2, ?3)")?;
        for (i, (name, embedding)) in names.iter().zip(embeddings).enumerate() {
            stmt.execute(params![i as i64, name, encode_embedding(embedding)])?;
        }
    }
    tx.commit()?;

    conn.close().map_err(|(_, e)| StoreError::Sqlite(e))
}

fn remove_if_exists(path: &Path) -> std::io::Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

fn encode_embedding(embedding: &Embedding) -> Vec<u8> {
    embedding
        .values()
        .iter()
        .flat_map(|v| v.to_le_bytes())
        .collect()
}

fn decode_embedding(blob: &[u8], dimension: usize) -> Result<Embedding, String> {
    if blob.len() != dimension * 4 {
        return Err(format!(
            "embedding is {} bytes, expected {} ({dimension} x f32)",
            blob.len(),
            dimension * 4
        ));
    }
    let values = blob
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    Embedding::new(values).map_err(|e| e.to_string())
}
