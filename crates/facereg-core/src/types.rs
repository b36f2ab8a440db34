use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Default acceptance tolerance for the 128-dimensional dlib-style face model.
pub const DEFAULT_TOLERANCE: f32 = 0.6;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EmbeddingError {
    #[error("embedding has no values")]
    Empty,
    #[error("embedding value at index {index} is not finite")]
    NonFinite { index: usize },
}

/// Face embedding vector produced by an external extractor.
///
/// Immutable once constructed. Construction rejects empty vectors and
/// non-finite values; the dimensionality itself is checked by the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f32>", into = "Vec<f32>")]
pub struct Embedding {
    values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Result<Self, EmbeddingError> {
        if values.is_empty() {
            return Err(EmbeddingError::Empty);
        }
        if let Some(index) = values.iter().position(|v| !v.is_finite()) {
            return Err(EmbeddingError::NonFinite { index });
        }
        Ok(Self { values })
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    /// Compute Euclidean distance between two embeddings.
    ///
    /// Callers must ensure both embeddings share a dimension; extra
    /// trailing values on either side are ignored.
    pub fn euclidean_distance(&self, other: &Embedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

impl TryFrom<Vec<f32>> for Embedding {
    type Error = EmbeddingError;

    fn try_from(values: Vec<f32>) -> Result<Self, Self::Error> {
        Self::new(values)
    }
}

impl From<Embedding> for Vec<f32> {
    fn from(embedding: Embedding) -> Self {
        embedding.values
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("tolerance must be a finite, non-negative distance (got {0})")]
pub struct InvalidTolerance(pub f32);

/// Maximum distance accepted as a positive identification.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Tolerance(f32);

impl Tolerance {
    pub fn new(value: f32) -> Result<Self, InvalidTolerance> {
        if value.is_finite() && value >= 0.0 {
            Ok(Self(value))
        } else {
            Err(InvalidTolerance(value))
        }
    }

    pub fn get(self) -> f32 {
        self.0
    }

    /// Per-entry acceptance predicate: `distance <= tolerance`.
    pub fn accepts(self, distance: f32) -> bool {
        distance <= self.0
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self(DEFAULT_TOLERANCE)
    }
}

/// Identity decision for one query embedding. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchResult {
    Unknown,
    Identified {
        name: String,
        /// Display score in [0, 100], linear in distance. Not a probability.
        confidence: f32,
    },
}

impl MatchResult {
    /// Build an identification from the accepted best distance.
    pub fn identified(name: impl Into<String>, distance: f32) -> Self {
        Self::Identified {
            name: name.into(),
            confidence: confidence_from_distance(distance),
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Unknown => None,
            Self::Identified { name, .. } => Some(name),
        }
    }

    pub fn confidence(&self) -> f32 {
        match self {
            Self::Unknown => 0.0,
            Self::Identified { confidence, .. } => *confidence,
        }
    }

    pub fn is_identified(&self) -> bool {
        matches!(self, Self::Identified { .. })
    }
}

impl fmt::Display for MatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => f.write_str("Unknown Person"),
            Self::Identified { name, confidence } => write!(f, "{name} ({confidence:.1}%)"),
        }
    }
}

/// `(1 - distance) * 100`, clamped into [0, 100].
pub fn confidence_from_distance(distance: f32) -> f32 {
    ((1.0 - distance) * 100.0).clamp(0.0, 100.0)
}

/// A distinct enrolled name and how many embeddings it has.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameCount {
    pub name: String,
    pub count: usize,
}
