//! Windowed audio segmentation
//!
//! Splits a long waveform into fixed-length overlapping windows under a
//! minimum-coverage policy and persists each accepted window as its own WAV
//! artifact. The windowing math is pure and separately testable; writing is
//! a side effect of [`Segmenter::run`].

use crate::audio::{save_audio, AudioUnit};
use crate::config::PipelineConfig;
use crate::{Error, Result};
use log::{debug, error, info};
use ndarray::s;
use std::path::{Path, PathBuf};

/// Fraction of the nominal segment length a trailing window must retain.
pub const MIN_COVERAGE: f64 = 0.8;

/// One accepted window of a source waveform.
///
/// Holds only provenance (source path and offsets), not the parent samples;
/// the window's own waveform is already materialized on disk at
/// `output_path` once the segmenter has run.
#[derive(Debug, Clone)]
pub struct Segment {
    /// Start offset in samples, inclusive
    pub start: usize,
    /// End offset in samples, exclusive
    pub end: usize,
    /// Zero-based index in segment order
    pub index: usize,
    /// Path of the source recording this window was cut from
    pub source: PathBuf,
    /// Path of the written segment artifact
    pub output_path: PathBuf,
}

impl Segment {
    /// Window length in samples
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

/// Result of one segmentation run: the segments that were written plus the
/// number of windows whose write failed.
#[derive(Debug)]
pub struct SegmentationOutcome {
    pub segments: Vec<Segment>,
    pub write_failures: usize,
}

/// Compute the accepted window bounds for a waveform.
///
/// Start offsets advance by `round(len_s * sr * (1 - overlap))` samples. A
/// trailing window shorter than the nominal length is kept only while it
/// covers at least 80% of it; the walk stops at the first window that
/// cannot. A waveform shorter than one nominal segment yields an empty
/// sequence.
///
/// # Errors
///
/// Returns `Error::InvalidConfiguration` if the segment length or overlap is
/// out of range, or if the step would round to zero samples.
pub fn segment_bounds(
    total_samples: usize,
    sample_rate: u32,
    segment_length_secs: f64,
    overlap: f64,
) -> Result<Vec<(usize, usize)>> {
    if !(segment_length_secs > 0.0) {
        return Err(Error::InvalidConfiguration(format!(
            "segment length must be positive, got {segment_length_secs}"
        )));
    }
    if !(0.0..1.0).contains(&overlap) {
        return Err(Error::InvalidConfiguration(format!(
            "overlap must be in [0, 1), got {overlap}"
        )));
    }

    let segment_samples = (segment_length_secs * sample_rate as f64).round() as usize;
    let step_samples = (segment_length_secs * sample_rate as f64 * (1.0 - overlap)).round() as usize;
    if step_samples < 1 {
        return Err(Error::InvalidConfiguration(
            "segment step rounds to zero samples".into(),
        ));
    }

    let mut bounds = Vec::new();
    if total_samples < segment_samples {
        return Ok(bounds);
    }

    let min_len = (MIN_COVERAGE * segment_samples as f64).floor() as usize;
    let mut start = 0usize;
    while start < total_samples {
        let end = (start + segment_samples).min(total_samples);
        if end - start < min_len {
            break;
        }
        bounds.push((start, end));
        start += step_samples;
    }

    Ok(bounds)
}

/// Splits waveforms into overlapping windows and writes them to the
/// configured segment directory.
pub struct Segmenter {
    segment_length_secs: f64,
    overlap: f64,
    segment_dir: PathBuf,
}

impl Segmenter {
    /// Create a segmenter from a validated pipeline configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfiguration` for out-of-range segment
    /// length, overlap or a zero step.
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            segment_length_secs: config.segment_length_secs,
            overlap: config.overlap,
            segment_dir: config.segment_dir(),
        })
    }

    /// Directory receiving written segment artifacts
    pub fn segment_dir(&self) -> &Path {
        &self.segment_dir
    }

    /// Compute the window bounds for a unit without writing anything.
    pub fn plan(&self, unit: &AudioUnit) -> Result<Vec<(usize, usize)>> {
        segment_bounds(
            unit.len(),
            unit.sample_rate(),
            self.segment_length_secs,
            self.overlap,
        )
    }

    /// Segment a unit and write each accepted window as
    /// `{base}_seg_{NNN}.wav` under the segment directory.
    ///
    /// A failed window write is logged and counted, never fatal; the run
    /// returns whatever segments succeeded. Segment indices count written
    /// artifacts, so naming stays contiguous and strictly increasing.
    ///
    /// # Errors
    ///
    /// Returns an error only for invalid windowing configuration.
    pub fn run(&self, unit: &AudioUnit) -> Result<SegmentationOutcome> {
        let bounds = self.plan(unit)?;
        let base = unit.base_name();

        let mut segments: Vec<Segment> = Vec::with_capacity(bounds.len());
        let mut write_failures = 0usize;

        for (start, end) in bounds {
            let index = segments.len();
            let filename = format!("{base}_seg_{index:03}.wav");
            let output_path = self.segment_dir.join(&filename);

            debug!(
                "Writing segment {} of {}: samples {}..{}",
                index,
                unit.path().display(),
                start,
                end
            );

            let window = unit.samples().slice(s![start..end]).to_owned();
            match save_audio(&output_path, &window, unit.sample_rate()) {
                Ok(()) => segments.push(Segment {
                    start,
                    end,
                    index,
                    source: unit.path().to_path_buf(),
                    output_path,
                }),
                Err(e) => {
                    error!("Failed to write segment {}: {}", output_path.display(), e);
                    write_failures += 1;
                }
            }
        }

        info!(
            "Segmented {} into {} segments ({} write failures)",
            unit.path().display(),
            segments.len(),
            write_failures
        );

        Ok(SegmentationOutcome {
            segments,
            write_failures,
        })
    }
}
