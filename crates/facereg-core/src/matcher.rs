//! Nearest-neighbour identity matching.

use crate::registry::{Registry, Snapshot};
use crate::types::{Embedding, MatchResult, Tolerance};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MatchError {
    #[error("query embedding is {got}-dim but enrolled embeddings are {expected}-dim")]
    DimensionMismatch { expected: usize, got: usize },
}

/// Strategy for deciding the identity of a query embedding against an
/// enrolled gallery.
pub trait Matcher {
    fn identify(
        &self,
        query: &Embedding,
        gallery: &Snapshot,
        tolerance: Tolerance,
    ) -> Result<MatchResult, MatchError>;
}

/// Euclidean nearest-neighbour matcher.
///
/// Stateless: every call depends only on its arguments.
#[derive(Debug, Clone, Copy, Default)]
pub struct EuclideanMatcher;

impl Matcher for EuclideanMatcher {
    fn identify(
        &self,
        query: &Embedding,
        gallery: &Snapshot,
        tolerance: Tolerance,
    ) -> Result<MatchResult, MatchError> {
        if gallery.is_empty() {
            return Ok(MatchResult::Unknown);
        }

        let distances = face_distances(query, gallery)?;
        let matches = compare_faces(&distances, tolerance);

        // First-encountered minimum: ties go to the earliest enrolled entry.
        let mut best = 0;
        for (i, d) in distances.iter().enumerate().skip(1) {
            if *d < distances[best] {
                best = i;
            }
        }

        if matches[best] {
            Ok(MatchResult::identified(
                gallery.names()[best].as_str(),
                distances[best],
            ))
        } else {
            Ok(MatchResult::Unknown)
        }
    }
}

/// Euclidean distance from `query` to every enrolled embedding, in order.
pub fn face_distances(query: &Embedding, gallery: &Snapshot) -> Result<Vec<f32>, MatchError> {
    gallery
        .embeddings()
        .iter()
        .map(|known| {
            if known.dimension() != query.dimension() {
                return Err(MatchError::DimensionMismatch {
                    expected: known.dimension(),
                    got: query.dimension(),
                });
            }
            Ok(query.euclidean_distance(known))
        })
        .collect()
}

/// Per-entry acceptance flags: `distances[i] <= tolerance`.
pub fn compare_faces(distances: &[f32], tolerance: Tolerance) -> Vec<bool> {
    distances.iter().map(|d| tolerance.accepts(*d)).collect()
}

/// Identify `query` against the current state of `registry`.
pub fn identify(
    query: &Embedding,
    registry: &Registry,
    tolerance: Tolerance,
) -> Result<MatchResult, MatchError> {
    EuclideanMatcher.identify(query, &registry.snapshot(), tolerance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FaceStore;

    fn emb(values: &[f32]) -> Embedding {
        Embedding::new(values.to_vec()).unwrap()
    }

    fn registry_with(dir: &tempfile::TempDir, entries: &[(&str, &[f32])]) -> Registry {
        let dim = entries.first().map(|(_, v)| v.len()).unwrap_or(2);
        let registry = Registry::new(FaceStore::new(dir.path().join("faces.db")), dim);
        for (name, values) in entries {
            registry.add(name, emb(values)).unwrap();
        }
        registry
    }

    fn tol(v: f32) -> Tolerance {
        Tolerance::new(v).unwrap()
    }

    #[test]
    fn test_empty_registry_is_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry_with(&dir, &[]);
        for t in [0.0, 0.6, 100.0] {
            // Even a query of a different dimension is not an error: nothing is compared.
            let result = identify(&emb(&[1.0, 2.0, 3.0]), &registry, tol(t)).unwrap();
            assert_eq!(result, MatchResult::Unknown);
            assert_eq!(result.confidence(), 0.0);
        }
    }

    #[test]
    fn test_identifies_nearest_within_tolerance() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry_with(&dir, &[("Alice", &[0.3, 0.0]), ("Bob", &[0.0, 0.5])]);
        let query = emb(&[0.0, 0.0]);

        let result = identify(&query, &registry, tol(0.6)).unwrap();
        assert_eq!(result.name(), Some("Alice"));
        assert!((result.confidence() - 70.0).abs() < 1e-3, "got {}", result.confidence());
    }

    #[test]
    fn test_unknown_when_best_exceeds_tolerance() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry_with(&dir, &[("Alice", &[0.3, 0.0]), ("Bob", &[0.0, 0.5])]);
        let result = identify(&emb(&[0.0, 0.0]), &registry, tol(0.2)).unwrap();
        assert_eq!(result, MatchResult::Unknown);
        assert_eq!(result.confidence(), 0.0);
    }

    #[test]
    fn test_tie_goes_to_earliest_entry() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry_with(
            &dir,
            &[("Far", &[2.0, 0.0]), ("First", &[0.4, 0.0]), ("Second", &[-0.4, 0.0])],
        );
        let result = identify(&emb(&[0.0, 0.0]), &registry, tol(0.6)).unwrap();
        assert_eq!(result.name(), Some("First"));
    }

    #[test]
    fn test_best_match_last_in_gallery() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry_with(
            &dir,
            &[("decoy1", &[0.0, 1.0, 0.0]), ("decoy2", &[0.0, 0.0, 1.0]), ("match", &[1.0, 0.0, 0.0])],
        );
        let result = identify(&emb(&[1.0, 0.0, 0.0]), &registry, tol(0.6)).unwrap();
        assert_eq!(result.name(), Some("match"));
        assert_eq!(result.confidence(), 100.0);
    }

    #[test]
    fn test_confidence_clamped_for_large_tolerance() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry_with(&dir, &[("Alice", &[3.0, 4.0])]);
        let result = identify(&emb(&[0.0, 0.0]), &registry, tol(10.0)).unwrap();
        assert_eq!(result.name(), Some("Alice"));
        assert_eq!(result.confidence(), 0.0);
    }

    #[test]
    fn test_dimension_mismatch_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry_with(&dir, &[("Alice", &[1.0, 0.0])]);
        let err = identify(&emb(&[1.0, 0.0, 0.0]), &registry, tol(0.6)).unwrap_err();
        assert_eq!(err, MatchError::DimensionMismatch { expected: 2, got: 3 });
    }

    #[test]
    fn test_distances_and_flags_are_separate() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry_with(&dir, &[("A", &[0.3, 0.0]), ("B", &[0.0, 0.5]), ("C", &[0.0, 0.9])]);
        let distances = face_distances(&emb(&[0.0, 0.0]), &registry.snapshot()).unwrap();
        assert_eq!(distances.len(), 3);
        assert!((distances[1] - 0.5).abs() < 1e-6);
        assert_eq!(compare_faces(&distances, tol(0.6)), vec![true, true, false]);
    }
}
