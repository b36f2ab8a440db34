//! facereg-engine — Enrollment and live recognition on top of facereg-core.
//!
//! Wires an external face locator and embedding extractor to the registry
//! and matcher. Face detection and the embedding model stay behind the
//! [`FaceLocator`] and [`EmbeddingExtractor`] traits.

pub mod collaborators;
pub mod config;
pub mod engine;

pub use collaborators::{BoxError, EmbeddingExtractor, FaceLocator, FaceRegion};
pub use config::{Config, Downscale, InvalidDownscale};
pub use engine::{EnrollResult, Engine, EngineError, Recognition};
