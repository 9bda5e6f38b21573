//! Pipeline configuration
//!
//! All tunable parameters for segmentation, feature extraction and dataset
//! export live here and are validated once, before any audio is touched.
//! Components receive the validated configuration explicitly; there is no
//! ambient global state.

use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Configuration for the audio-to-dataset pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Analysis sample rate in Hz. Source material at a different rate must
    /// be resampled before it enters the pipeline.
    pub sample_rate: u32,
    /// Nominal segment length in seconds
    pub segment_length_secs: f64,
    /// Overlap ratio between consecutive segments, in [0, 1)
    pub overlap: f64,
    /// FFT window size in samples
    pub n_fft: usize,
    /// Hop length between analysis frames
    pub hop_length: usize,
    /// Maximum token sequence length for the tokenized export (truncate,
    /// never pad)
    pub max_token_len: usize,
    /// Root directory for all pipeline output
    pub output_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 22050,
            segment_length_secs: 30.0,
            overlap: 0.5,
            n_fft: 2048,
            hop_length: 512,
            max_token_len: 1024,
            output_dir: PathBuf::from("processed_data"),
        }
    }
}

impl PipelineConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfiguration` if:
    /// * The sample rate is zero
    /// * The segment length is not positive
    /// * The overlap is outside [0, 1)
    /// * The derived step between segment starts would be zero
    /// * The STFT parameters are degenerate
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(Error::InvalidConfiguration(
                "sample rate must be positive".into(),
            ));
        }
        if !(self.segment_length_secs > 0.0) {
            return Err(Error::InvalidConfiguration(format!(
                "segment length must be positive, got {}",
                self.segment_length_secs
            )));
        }
        if !(0.0..1.0).contains(&self.overlap) {
            return Err(Error::InvalidConfiguration(format!(
                "overlap must be in [0, 1), got {}",
                self.overlap
            )));
        }
        if self.step_samples() < 1 {
            return Err(Error::InvalidConfiguration(
                "segment step rounds to zero samples".into(),
            ));
        }
        if self.n_fft < 2 || self.hop_length == 0 {
            return Err(Error::InvalidConfiguration(format!(
                "invalid STFT parameters: n_fft={}, hop_length={}",
                self.n_fft, self.hop_length
            )));
        }
        if self.max_token_len == 0 {
            return Err(Error::InvalidConfiguration(
                "max token length must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Nominal segment length in samples
    pub fn segment_samples(&self) -> usize {
        (self.segment_length_secs * self.sample_rate as f64).round() as usize
    }

    /// Step between consecutive segment start offsets in samples
    pub fn step_samples(&self) -> usize {
        (self.segment_length_secs * self.sample_rate as f64 * (1.0 - self.overlap)).round() as usize
    }

    /// Directory that receives extracted audio and written segments
    pub fn segment_dir(&self) -> PathBuf {
        self.output_dir.join("audio_segments")
    }

    /// Create the output directory layout.
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(self.segment_dir())?;
        Ok(())
    }

    /// Default destination for the JSON dataset
    pub fn json_dataset_path(&self) -> PathBuf {
        self.output_dir.join("phin_training_dataset.json")
    }

    /// Default destination for the tokenized JSONL dataset
    pub fn jsonl_dataset_path(&self) -> PathBuf {
        self.output_dir.join("litgpt_phin_dataset.jsonl")
    }

    /// Replace the output root, keeping the rest of the configuration.
    pub fn with_output_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.output_dir = dir.as_ref().to_path_buf();
        self
    }
}
