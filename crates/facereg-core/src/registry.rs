//! Enrolled face registry.
//!
//! Names and embeddings are held as two parallel sequences behind a single
//! lock. Mutations replace the shared entry set copy-on-write, so a
//! [`Snapshot`] taken by a reader is a consistent point-in-time view that
//! never observes a half-applied `add`.

use crate::store::{FaceStore, StoreError};
use crate::types::{Embedding, NameCount};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("face store unavailable: {0}")]
    StorageUnavailable(#[source] StoreError),
}

#[derive(Debug, Default, Clone)]
struct Entries {
    names: Vec<String>,
    embeddings: Vec<Embedding>,
}

/// Immutable point-in-time view of the registry entries.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    entries: Arc<Entries>,
}

impl Snapshot {
    pub fn names(&self) -> &[String] {
        &self.entries.names
    }

    pub fn embeddings(&self) -> &[Embedding] {
        &self.entries.embeddings
    }

    pub fn len(&self) -> usize {
        self.entries.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.names.is_empty()
    }

    /// Iterate `(name, embedding)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Embedding)> {
        self.entries
            .names
            .iter()
            .map(String::as_str)
            .zip(self.entries.embeddings.iter())
    }
}

/// Durable mapping from person name to enrolled embeddings.
pub struct Registry {
    store: FaceStore,
    dimension: usize,
    entries: RwLock<Arc<Entries>>,
    /// Serializes store writes and deletes.
    io_lock: Mutex<()>,
}

impl Registry {
    /// Create an empty registry backed by `store`. Nothing is read.
    pub fn new(store: FaceStore, dimension: usize) -> Self {
        Self {
            store,
            dimension,
            entries: RwLock::new(Arc::default()),
            io_lock: Mutex::new(()),
        }
    }

    /// Create a registry and populate it from `store`.
    pub fn open(store: FaceStore, dimension: usize) -> Self {
        let registry = Self::new(store, dimension);
        registry.load();
        registry
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn store(&self) -> &FaceStore {
        &self.store
    }

    /// Replace the in-memory entries with the persisted ones.
    ///
    /// A missing store yields an empty registry. An unreadable or corrupt
    /// store is logged and also yields an empty registry; it never fails.
    /// Returns the number of entries loaded.
    pub fn load(&self) -> usize {
        let entries = match self.store.read(self.dimension) {
            Ok(Some(faces)) => Entries {
                names: faces.names,
                embeddings: faces.embeddings,
            },
            Ok(None) => {
                tracing::info!(path = %self.store.path().display(), "no face store yet; starting empty");
                Entries::default()
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.store.path().display(),
                    error = %e,
                    "face store unreadable; starting empty"
                );
                Entries::default()
            }
        };

        let count = entries.names.len();
        *self.write_entries() = Arc::new(entries);
        tracing::info!(count, "loaded registry");
        count
    }

    /// Persist the current entries, overwriting any previous store.
    ///
    /// In-memory state is untouched whether or not the write succeeds.
    pub fn save(&self) -> Result<(), RegistryError> {
        let _io = self.io_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let snapshot = self.snapshot();
        self.store
            .write(snapshot.names(), snapshot.embeddings())
            .map_err(RegistryError::StorageUnavailable)?;
        tracing::info!(
            count = snapshot.len(),
            path = %self.store.path().display(),
            "saved registry"
        );
        Ok(())
    }

    /// Append a new entry. The name is stored trimmed; duplicates are kept.
    pub fn add(&self, name: &str, embedding: Embedding) -> Result<(), RegistryError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RegistryError::InvalidInput("name must not be empty".into()));
        }
        if embedding.dimension() != self.dimension {
            return Err(RegistryError::InvalidInput(format!(
                "expected {}-dim embedding, got {}",
                self.dimension,
                embedding.dimension()
            )));
        }

        let mut guard = self.write_entries();
        let entries = Arc::make_mut(&mut guard);
        entries.names.push(name.to_string());
        entries.embeddings.push(embedding);
        tracing::debug!(name, total = entries.names.len(), "added embedding");
        Ok(())
    }

    /// Drop all entries and delete the persisted store, if any.
    ///
    /// The in-memory registry is emptied even when the delete fails.
    pub fn clear(&self) -> Result<(), RegistryError> {
        let _io = self.io_lock.lock().unwrap_or_else(PoisonError::into_inner);
        *self.write_entries() = Arc::default();
        let removed = self
            .store
            .remove()
            .map_err(RegistryError::StorageUnavailable)?;
        tracing::info!(removed_file = removed, "cleared registry");
        Ok(())
    }

    /// Distinct names with their embedding counts, in first-enrolled order.
    pub fn list_unique_names(&self) -> Vec<NameCount> {
        let snapshot = self.snapshot();
        let mut counts: HashMap<&str, usize> = HashMap::new();
        let mut order: Vec<&str> = Vec::new();
        for name in snapshot.names() {
            let count = counts.entry(name.as_str()).or_insert(0);
            if *count == 0 {
                order.push(name);
            }
            *count += 1;
        }
        order
            .into_iter()
            .map(|name| NameCount {
                name: name.to_string(),
                count: counts[name],
            })
            .collect()
    }

    /// Total number of entries, not distinct names.
    pub fn count(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Point-in-time view of both sequences together.
    pub fn snapshot(&self) -> Snapshot {
        let entries = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        Snapshot {
            entries: Arc::clone(&entries),
        }
    }

    fn write_entries(&self) -> std::sync::RwLockWriteGuard<'_, Arc<Entries>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("path", &self.store.path())
            .field("dimension", &self.dimension)
            .field("count", &self.count())
            .finish()
    }
}
