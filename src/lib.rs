pub mod audio;
pub mod config;
pub mod dataset;
pub mod describe;
pub mod features;
pub mod pipeline;
pub mod segment;

pub use audio::AudioUnit;
pub use config::PipelineConfig;
pub use dataset::{Dataset, DatasetEntry, DatasetFormat, Tokenizer};
pub use features::{DescriptorSet, FeatureExtractor};
pub use pipeline::{DatasetBuilder, MediaExtractor, PipelineReport};
pub use segment::{Segment, Segmenter};

/// Error types for the phin dataset pipeline
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),
    #[error("Decode failure: {0}")]
    Decode(String),
    #[error("Persistence failure: {0}")]
    Persistence(String),
    #[error("Tokenizer error: {0}")]
    Tokenizer(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for the phin dataset pipeline
pub type Result<T> = std::result::Result<T, Error>;
