//! facereg-core — Face embedding registry and matching engine.
//!
//! Holds enrolled `(name, embedding)` pairs, persists them to a single
//! SQLite file, and identifies query embeddings by Euclidean
//! nearest-neighbour search against a tolerance.

pub mod matcher;
pub mod registry;
pub mod store;
pub mod types;

pub use matcher::{identify, EuclideanMatcher, MatchError, Matcher};
pub use registry::{Registry, RegistryError, Snapshot};
pub use store::{FaceStore, StoreError};
pub use types::{Embedding, EmbeddingError, MatchResult, NameCount, Tolerance, DEFAULT_TOLERANCE};
