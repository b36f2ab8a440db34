use facereg_core::Tolerance;
use std::path::PathBuf;
use thiserror::Error;

/// Default embedding dimensionality (dlib ResNet face model).
pub const DEFAULT_EMBEDDING_DIM: usize = 128;

#[derive(Error, Debug, Clone, PartialEq)]
#[error("downscale factor must be finite and in (0, 1] (got {0})")]
pub struct InvalidDownscale(pub f32);

/// Factor by which frames are shrunk before locating faces. Always in (0, 1].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Downscale(f32);

impl Downscale {
    pub fn new(value: f32) -> Result<Self, InvalidDownscale> {
        if value.is_finite() && value > 0.0 && value <= 1.0 {
            Ok(Self(value))
        } else {
            Err(InvalidDownscale(value))
        }
    }

    pub fn get(self) -> f32 {
        self.0
    }
}

impl Default for Downscale {
    fn default() -> Self {
        Self(0.25)
    }
}

/// Engine configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the face store file.
    pub store_path: PathBuf,
    /// Maximum Euclidean distance accepted as a positive identification.
    pub tolerance: Tolerance,
    /// Dimensionality of embeddings produced by the extractor.
    pub embedding_dim: usize,
    /// Scale factor applied to frames before locating faces during recognition.
    pub downscale: Downscale,
    /// Run recognition on every Nth frame; other frames reuse the last results.
    pub process_every: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: default_data_dir().join("faces.db"),
            tolerance: Tolerance::default(),
            embedding_dim: DEFAULT_EMBEDDING_DIM,
            downscale: Downscale::default(),
            process_every: 2,
        }
    }
}

impl Config {
    /// Load configuration from `FACEREG_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let store_path = std::env::var("FACEREG_STORE_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.store_path);

        let tolerance = match env_parse::<f32>("FACEREG_TOLERANCE") {
            Some(raw) => Tolerance::new(raw).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "ignoring FACEREG_TOLERANCE; using default");
                defaults.tolerance
            }),
            None => defaults.tolerance,
        };

        let downscale = match env_parse::<f32>("FACEREG_DOWNSCALE") {
            Some(raw) => Downscale::new(raw).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "ignoring FACEREG_DOWNSCALE; using default");
                defaults.downscale
            }),
            None => defaults.downscale,
        };

        Self {
            store_path,
            tolerance,
            embedding_dim: env_parse::<usize>("FACEREG_EMBEDDING_DIM")
                .filter(|d| *d > 0)
                .unwrap_or(defaults.embedding_dim),
            downscale,
            process_every: env_parse::<usize>("FACEREG_PROCESS_EVERY")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.process_every),
        }
    }
}

fn default_data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("facereg")
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
