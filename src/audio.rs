//! Audio I/O and the uniform audio-unit abstraction
//!
//! This module provides WAV reading and writing plus `AudioUnit`, the common
//! shape every downstream stage consumes. A unit is any audio path with a
//! decoded waveform and a known rate — an original recording and a written
//! segment look identical to the rest of the pipeline.

use crate::{Error, Result};
use ndarray::Array1;
use std::path::{Path, PathBuf};

/// Read audio from a WAV file
///
/// # Arguments
///
/// * `path` - Path to the WAV file
/// * `sample_rate` - Expected sample rate of the audio
///
/// # Returns
///
/// Audio data as a 1D array of f32 samples
///
/// # Errors
///
/// Returns an error if:
/// * The file cannot be opened
/// * The file format is invalid
/// * The sample rate doesn't match (resampling is an upstream concern)
/// * The audio data cannot be read
pub fn read_audio<P: AsRef<Path>>(path: P, sample_rate: u32) -> Result<Array1<f32>> {
    let mut reader = hound::WavReader::open(path).map_err(|e| Error::Decode(e.to_string()))?;

    if reader.spec().sample_rate != sample_rate {
        return Err(Error::Decode(format!(
            "Audio file has sample rate {}, but {} was requested",
            reader.spec().sample_rate,
            sample_rate
        )));
    }

    let samples: Vec<f32> = reader
        .samples::<i16>()
        .map(|s| s.map_err(|e| Error::Decode(e.to_string())))
        .map(|s| s.map(|v| v as f32 / 32768.0))
        .collect::<Result<Vec<f32>>>()?;

    Ok(Array1::from_vec(samples))
}

/// Save audio to a 16-bit mono WAV file
///
/// # Errors
///
/// Returns an error if:
/// * The file cannot be created
/// * The audio data cannot be written
/// * The WAV file cannot be finalized
pub fn save_audio<P: AsRef<Path>>(path: P, audio: &Array1<f32>, sample_rate: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer =
        hound::WavWriter::create(path, spec).map_err(|e| Error::Persistence(e.to_string()))?;

    for &sample in audio.iter() {
        let sample = (sample * 32768.0).max(-32768.0).min(32767.0) as i16;
        writer
            .write_sample(sample)
            .map_err(|e| Error::Persistence(e.to_string()))?;
    }

    writer
        .finalize()
        .map_err(|e| Error::Persistence(e.to_string()))?;

    Ok(())
}

/// One audio unit: a path plus its fully decoded waveform.
///
/// Immutable once loaded. Whether the path is an original recording or a
/// generated segment is irrelevant to consumers.
#[derive(Debug, Clone)]
pub struct AudioUnit {
    path: PathBuf,
    samples: Array1<f32>,
    sample_rate: u32,
}

impl AudioUnit {
    /// Load a unit from a WAV file at the configured analysis rate.
    ///
    /// # Errors
    ///
    /// Returns `Error::SourceUnavailable` if the path does not exist and
    /// `Error::Decode` if it cannot be read as WAV at the expected rate.
    pub fn load<P: AsRef<Path>>(path: P, sample_rate: u32) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::SourceUnavailable(path.display().to_string()));
        }
        let samples = read_audio(path, sample_rate)?;
        Ok(Self {
            path: path.to_path_buf(),
            samples,
            sample_rate,
        })
    }

    /// Build a unit from an already decoded waveform.
    pub fn from_samples<P: AsRef<Path>>(path: P, samples: Array1<f32>, sample_rate: u32) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            samples,
            sample_rate,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn samples(&self) -> &Array1<f32> {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Total number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds, derived from sample count and rate
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// File name component of the path
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// File stem (base name without extension)
    pub fn base_name(&self) -> String {
        self.path
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn wav_round_trip_preserves_length_and_rate() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tone.wav");
        let samples: Array1<f32> = Array1::from_vec(
            (0..2205)
                .map(|i| 0.4 * (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 22050.0).sin())
                .collect(),
        );
        save_audio(&path, &samples, 22050).unwrap();

        let unit = AudioUnit::load(&path, 22050).unwrap();
        assert_eq!(unit.len(), 2205);
        assert_eq!(unit.sample_rate(), 22050);
        assert!((unit.duration_secs() - 0.1).abs() < 1e-9);
        assert_eq!(unit.base_name(), "tone");
        assert_eq!(unit.file_name(), "tone.wav");
    }

    #[test]
    fn missing_file_is_source_unavailable() {
        let err = AudioUnit::load("no/such/file.wav", 22050).unwrap_err();
        assert!(matches!(err, crate::Error::SourceUnavailable(_)));
    }

    #[test]
    fn rate_mismatch_is_decode_failure() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wrong_rate.wav");
        save_audio(&path, &Array1::zeros(100), 16000).unwrap();

        let err = AudioUnit::load(&path, 22050).unwrap_err();
        assert!(matches!(err, crate::Error::Decode(_)));
    }
}
