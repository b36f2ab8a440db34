//! Interfaces to the face locator and embedding extractor.
//!
//! Both are external models; the engine only sees regions and embeddings.

use facereg_core::Embedding;
use image::RgbImage;
use serde::{Deserialize, Serialize};

/// Boxed error returned by collaborator implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Face region in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceRegion {
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub left: u32,
}

impl FaceRegion {
    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }

    /// Map a region found on a frame shrunk by `downscale` back to
    /// full-frame coordinates. Factors outside (0, 1] leave it unchanged.
    pub fn upscale(&self, downscale: f32) -> Self {
        if !(downscale.is_finite() && downscale > 0.0 && downscale <= 1.0) {
            return *self;
        }
        let up = |v: u32| (v as f32 / downscale).round() as u32;
        Self {
            top: up(self.top),
            right: up(self.right),
            bottom: up(self.bottom),
            left: up(self.left),
        }
    }
}

/// Finds zero or more faces in a frame.
pub trait FaceLocator {
    fn locate(&mut self, frame: &RgbImage) -> Result<Vec<FaceRegion>, BoxError>;
}

/// Computes an embedding for one face region.
///
/// Returns `Ok(None)` when the region does not resolve to a usable face.
pub trait EmbeddingExtractor {
    fn extract(&mut self, frame: &RgbImage, region: &FaceRegion) -> Result<Option<Embedding>, BoxError>;
}
