use crate::collaborators::{BoxError, EmbeddingExtractor, FaceLocator, FaceRegion};
use crate::config::{Config, Downscale};
use facereg_core::{
    EuclideanMatcher, FaceStore, MatchError, MatchResult, Matcher, Registry, RegistryError,
    Tolerance,
};
use image::imageops::{self, FilterType};
use image::RgbImage;
use std::borrow::Cow;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("face locator failed: {0}")]
    Locator(#[source] BoxError),
    #[error("embedding extractor failed: {0}")]
    Extractor(#[source] BoxError),
    #[error("no face detected in frame")]
    NoFaceDetected,
    #[error("{0} faces detected; enrollment needs exactly one")]
    MultipleFaces(usize),
    #[error("could not extract an embedding from the detected face")]
    NoEmbedding,
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("match error: {0}")]
    Match(#[from] MatchError),
}

/// Result of an enrollment operation.
#[derive(Debug, Clone)]
pub struct EnrollResult {
    /// Name as stored (trimmed).
    pub name: String,
    pub region: FaceRegion,
    /// Registry entry count after the enrollment.
    pub total: usize,
}

/// One face found in a frame and the identity decision for it.
#[derive(Debug, Clone, PartialEq)]
pub struct Recognition {
    /// Region in full-frame coordinates.
    pub region: FaceRegion,
    pub result: MatchResult,
}

/// Drives enrollment and recognition over a locator, an extractor and a
/// shared registry.
pub struct Engine<L, X> {
    locator: L,
    extractor: X,
    registry: Arc<Registry>,
    matcher: EuclideanMatcher,
    tolerance: Tolerance,
    downscale: Downscale,
    process_every: usize,
    frames_seen: usize,
    last: Vec<Recognition>,
}

impl<L: FaceLocator, X: EmbeddingExtractor> Engine<L, X> {
    /// Open the registry at `config.store_path` and build an engine around it.
    pub fn new(config: &Config, locator: L, extractor: X) -> Self {
        let registry = Registry::open(FaceStore::new(&config.store_path), config.embedding_dim);
        Self::with_registry(config, Arc::new(registry), locator, extractor)
    }

    /// Build an engine over an already-open registry.
    pub fn with_registry(config: &Config, registry: Arc<Registry>, locator: L, extractor: X) -> Self {
        Self {
            locator,
            extractor,
            registry,
            matcher: EuclideanMatcher,
            tolerance: config.tolerance,
            downscale: config.downscale,
            process_every: config.process_every.max(1),
            frames_seen: 0,
            last: Vec::new(),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn tolerance(&self) -> Tolerance {
        self.tolerance
    }

    /// Enroll the single face in `frame` under `name` and persist the registry.
    ///
    /// Frames with zero or several faces are rejected before anything is
    /// extracted. If the save fails the new entry stays in memory and the
    /// storage error is returned.
    pub fn enroll(&mut self, name: &str, frame: &RgbImage) -> Result<EnrollResult, EngineError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RegistryError::InvalidInput("name must not be empty".into()).into());
        }

        let regions = self.locator.locate(frame).map_err(EngineError::Locator)?;
        let region = match regions.as_slice() {
            [] => return Err(EngineError::NoFaceDetected),
            [region] => *region,
            many => return Err(EngineError::MultipleFaces(many.len())),
        };

        let embedding = self
            .extractor
            .extract(frame, &region)
            .map_err(EngineError::Extractor)?
            .ok_or(EngineError::NoEmbedding)?;

        self.registry.add(name, embedding)?;
        let total = self.registry.count();
        tracing::info!(name, total, "enroll: face registered");

        self.registry.save()?;

        Ok(EnrollResult {
            name: name.to_string(),
            region,
            total,
        })
    }

    /// Identify every face in `frame`.
    ///
    /// Only every `process_every`-th call runs the locator and extractor;
    /// the calls in between return the previous results unchanged, so
    /// regions and names always come from the same frame.
    pub fn recognize(&mut self, frame: &RgbImage) -> Result<&[Recognition], EngineError> {
        if self.frames_seen % self.process_every == 0 {
            self.last = self.recognize_frame(frame)?;
        }
        self.frames_seen = self.frames_seen.wrapping_add(1);
        Ok(&self.last)
    }

    fn recognize_frame(&mut self, frame: &RgbImage) -> Result<Vec<Recognition>, EngineError> {
        let small = shrink(frame, self.downscale);
        let regions = self.locator.locate(&small).map_err(EngineError::Locator)?;

        // Every face in this frame is matched against the same registry state.
        let snapshot = self.registry.snapshot();

        let mut recognitions = Vec::with_capacity(regions.len());
        for region in regions {
            let Some(embedding) = self
                .extractor
                .extract(&small, &region)
                .map_err(EngineError::Extractor)?
            else {
                tracing::debug!(?region, "recognize: no embedding for located face; skipping");
                continue;
            };

            let result = self.matcher.identify(&embedding, &snapshot, self.tolerance)?;
            recognitions.push(Recognition {
                region: region.upscale(self.downscale.get()),
                result,
            });
        }

        tracing::debug!(
            faces = recognitions.len(),
            identified = recognitions.iter().filter(|r| r.result.is_identified()).count(),
            known = snapshot.len(),
            "recognize: frame processed"
        );
        Ok(recognitions)
    }
}

/// Resize `frame` by `factor`; a factor of 1 leaves it untouched.
fn shrink(frame: &RgbImage, factor: Downscale) -> Cow<'_, RgbImage> {
    let factor = factor.get();
    if factor >= 1.0 {
        return Cow::Borrowed(frame);
    }
    let width = ((frame.width() as f32 * factor).round() as u32).max(1);
    let height = ((frame.height() as f32 * factor).round() as u32).max(1);
    Cow::Owned(imageops::resize(frame, width, height, FilterType::Triangle))
}
