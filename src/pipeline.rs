//! Batch orchestration
//!
//! Wires segmentation, feature extraction, description synthesis and
//! dataset assembly over a list of audio units. Which units feed the
//! pipeline is the caller's choice: original recordings, the segment paths
//! produced by [`DatasetBuilder::segment_sources`], or any mix of the two.
//!
//! Per-unit failures never abort the batch. Feature extraction fans out on
//! a rayon worker pool and the assembly step re-imposes input order by
//! index, so dataset order is deterministic regardless of worker
//! completion order.

use crate::audio::AudioUnit;
use crate::config::PipelineConfig;
use crate::dataset::{Dataset, DatasetEntry, DatasetFormat, Tokenizer};
use crate::describe;
use crate::features::FeatureExtractor;
use crate::segment::Segmenter;
use crate::{Error, Result};
use log::{error, info, warn};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// External media-extraction collaborator: resolves a remote URL to a local
/// WAV file at the requested destination. May fail per URL.
pub trait MediaExtractor {
    fn extract(&self, url: &str, dest: &Path) -> Result<PathBuf>;
}

/// Failure accounting for one batch run. Batch operations never silently
/// drop units; everything skipped or degraded is counted here.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    /// Units that produced a dataset entry
    pub processed: usize,
    /// Units skipped because their source was missing
    pub skipped_sources: usize,
    /// Units that fell back to the minimal description
    pub feature_failures: usize,
    /// Segment artifacts whose write failed
    pub segment_write_failures: usize,
    /// Entries exported without a token sequence
    pub tokenizer_skips: usize,
}

enum UnitOutcome {
    Entry { entry: DatasetEntry, degraded: bool },
    Skipped,
}

/// End-to-end builder for the phin training corpus.
pub struct DatasetBuilder {
    config: PipelineConfig,
    extractor: FeatureExtractor,
}

impl DatasetBuilder {
    /// Create a builder, validating the configuration and creating the
    /// output directory layout up front.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfiguration` for a bad configuration and an
    /// IO error if the output directories cannot be created.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        config.ensure_dirs()?;
        let extractor = FeatureExtractor::new(&config)?;
        Ok(Self { config, extractor })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Resolve a list of remote URLs to local WAV files through the media
    /// extraction collaborator. Outputs are named `phin_audio_{NNN}.wav`
    /// with a 1-based, 3-digit zero-padded index. Per-URL failures are
    /// logged and skipped.
    pub fn fetch_sources(
        &self,
        urls: &[String],
        media: &dyn MediaExtractor,
    ) -> (Vec<PathBuf>, usize) {
        let mut fetched = Vec::new();
        let mut failures = 0usize;

        for (i, url) in urls.iter().enumerate() {
            info!("Fetching source {}/{}: {}", i + 1, urls.len(), url);
            let dest = self
                .config
                .segment_dir()
                .join(format!("phin_audio_{:03}.wav", i + 1));
            match media.extract(url, &dest) {
                Ok(path) => fetched.push(path),
                Err(e) => {
                    error!("Failed to extract audio from {url}: {e}");
                    failures += 1;
                }
            }
        }

        (fetched, failures)
    }

    /// Segment each source into overlapping windows, returning the written
    /// segment paths in source-then-segment order plus a report of skipped
    /// sources and failed writes.
    ///
    /// # Errors
    ///
    /// Returns an error only for invalid windowing configuration.
    pub fn segment_sources(&self, sources: &[PathBuf]) -> Result<(Vec<PathBuf>, PipelineReport)> {
        let segmenter = Segmenter::new(&self.config)?;
        let mut report = PipelineReport::default();
        let mut segment_paths = Vec::new();

        for source in sources {
            let unit = match AudioUnit::load(source, self.config.sample_rate) {
                Ok(unit) => unit,
                Err(Error::SourceUnavailable(msg)) => {
                    warn!("Skipping missing source: {msg}");
                    report.skipped_sources += 1;
                    continue;
                }
                Err(e) => {
                    error!("Skipping unreadable source {}: {e}", source.display());
                    report.skipped_sources += 1;
                    continue;
                }
            };

            let outcome = segmenter.run(&unit)?;
            report.segment_write_failures += outcome.write_failures;
            segment_paths.extend(outcome.segments.into_iter().map(|s| s.output_path));
        }

        Ok((segment_paths, report))
    }

    /// Build the dataset over a list of audio paths.
    ///
    /// Units are processed in parallel; the assembled dataset preserves the
    /// input path order exactly. A missing path is skipped and counted; an
    /// unreadable or degenerate unit still yields an entry carrying the
    /// minimal fallback description.
    pub fn build(&self, paths: &[PathBuf]) -> (Dataset, PipelineReport) {
        let mut outcomes: Vec<(usize, UnitOutcome)> = paths
            .par_iter()
            .enumerate()
            .map(|(i, path)| (i, self.process_unit(path)))
            .collect();
        // Workers finish in arbitrary order; dataset order is contractual.
        outcomes.sort_by_key(|(i, _)| *i);

        let mut dataset = Dataset::new();
        let mut report = PipelineReport::default();
        for (_, outcome) in outcomes {
            match outcome {
                UnitOutcome::Entry { entry, degraded } => {
                    if degraded {
                        report.feature_failures += 1;
                    }
                    report.processed += 1;
                    dataset.push(entry);
                }
                UnitOutcome::Skipped => report.skipped_sources += 1,
            }
        }

        info!(
            "Assembled dataset: {} entries, {} skipped, {} fallback descriptions",
            report.processed, report.skipped_sources, report.feature_failures
        );
        (dataset, report)
    }

    /// Export an assembled dataset in the requested format.
    ///
    /// # Returns
    ///
    /// The number of tokenizer skips (always 0 for the JSON format).
    ///
    /// # Errors
    ///
    /// Fails only if the destination cannot be opened for writing.
    pub fn export(
        &self,
        dataset: &Dataset,
        format: DatasetFormat,
        destination: &Path,
        tokenizer: &dyn Tokenizer,
    ) -> Result<usize> {
        match format {
            DatasetFormat::Json => {
                dataset.write_json(destination)?;
                Ok(0)
            }
            DatasetFormat::JsonlTokenized => {
                dataset.write_jsonl_tokenized(destination, tokenizer, self.config.max_token_len)
            }
        }
    }

    fn process_unit(&self, path: &Path) -> UnitOutcome {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let unit = match AudioUnit::load(path, self.config.sample_rate) {
            Ok(unit) => unit,
            Err(Error::SourceUnavailable(msg)) => {
                warn!("Skipping missing unit: {msg}");
                return UnitOutcome::Skipped;
            }
            Err(e) => {
                // Undecodable but present: the entry still ships with the
                // best available content.
                error!("Decode failure for {}: {e}", path.display());
                return UnitOutcome::Entry {
                    entry: DatasetEntry {
                        audio_path: path.display().to_string(),
                        text: describe::fallback_text(&filename),
                        filename,
                        duration: 0.0,
                        sample_rate: self.config.sample_rate,
                    },
                    degraded: true,
                };
            }
        };

        let (text, degraded) = match self.extractor.extract(&unit) {
            Ok(desc) => (describe::synthesize(&desc, &filename), false),
            Err(e) => {
                error!("Feature extraction failed for {}: {e}", path.display());
                (describe::fallback_text(&filename), true)
            }
        };

        UnitOutcome::Entry {
            entry: DatasetEntry {
                audio_path: path.display().to_string(),
                text,
                filename,
                duration: unit.duration_secs(),
                sample_rate: unit.sample_rate(),
            },
            degraded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::save_audio;
    use ndarray::Array1;
    use tempfile::TempDir;

    fn tone(duration_secs: f32, sample_rate: u32, freq: f32) -> Array1<f32> {
        let total = (duration_secs * sample_rate as f32) as usize;
        Array1::from_vec(
            (0..total)
                .map(|i| {
                    0.5 * (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin()
                })
                .collect(),
        )
    }

    fn builder(dir: &TempDir) -> DatasetBuilder {
        let config = PipelineConfig {
            sample_rate: 8000,
            segment_length_secs: 1.0,
            overlap: 0.5,
            n_fft: 512,
            hop_length: 128,
            ..PipelineConfig::default()
        }
        .with_output_dir(dir.path().join("out"));
        DatasetBuilder::new(config).unwrap()
    }

    #[test]
    fn build_preserves_input_order_and_counts_failures() {
        let dir = TempDir::new().unwrap();
        let builder = builder(&dir);

        let good_a = dir.path().join("first.wav");
        save_audio(&good_a, &tone(2.0, 8000, 220.0), 8000).unwrap();
        let good_b = dir.path().join("second.wav");
        save_audio(&good_b, &tone(1.5, 8000, 330.0), 8000).unwrap();
        // Present but not a WAV file at all.
        let corrupt = dir.path().join("corrupt.wav");
        std::fs::write(&corrupt, b"not audio").unwrap();
        let missing = dir.path().join("missing.wav");

        let paths = vec![good_a, corrupt.clone(), missing, good_b];
        let (dataset, report) = builder.build(&paths);

        assert_eq!(dataset.len(), 3);
        assert_eq!(report.processed, 3);
        assert_eq!(report.skipped_sources, 1);
        assert_eq!(report.feature_failures, 1);

        let names: Vec<&str> = dataset
            .entries()
            .iter()
            .map(|e| e.filename.as_str())
            .collect();
        assert_eq!(names, vec!["first.wav", "corrupt.wav", "second.wav"]);

        let fallback = &dataset.entries()[1];
        assert_eq!(fallback.text, "Thai phin music recording: corrupt.wav");
        assert_eq!(fallback.duration, 0.0);
    }

    #[test]
    fn segment_sources_feeds_build() {
        let dir = TempDir::new().unwrap();
        let builder = builder(&dir);

        let source = dir.path().join("take.wav");
        save_audio(&source, &tone(2.5, 8000, 220.0), 8000).unwrap();

        let (segments, report) = builder.segment_sources(&[source]).unwrap();
        assert_eq!(report.segment_write_failures, 0);
        assert_eq!(segments.len(), 4);
        assert!(segments[0].ends_with("take_seg_000.wav"));

        let (dataset, report) = builder.build(&segments);
        assert_eq!(dataset.len(), 4);
        assert_eq!(report.skipped_sources, 0);
        for (entry, path) in dataset.entries().iter().zip(&segments) {
            assert_eq!(entry.filename, path.file_name().unwrap().to_string_lossy());
            assert!((entry.duration - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn fetch_sources_names_outputs_and_skips_failures() {
        struct FakeMedia;
        impl MediaExtractor for FakeMedia {
            fn extract(&self, url: &str, dest: &Path) -> crate::Result<PathBuf> {
                if url.contains("bad") {
                    return Err(Error::SourceUnavailable(url.to_string()));
                }
                std::fs::write(dest, b"stub").unwrap();
                Ok(dest.to_path_buf())
            }
        }

        let dir = TempDir::new().unwrap();
        let builder = builder(&dir);
        let urls = vec![
            "https://example.com/one".to_string(),
            "https://example.com/bad".to_string(),
            "https://example.com/three".to_string(),
        ];

        let (fetched, failures) = builder.fetch_sources(&urls, &FakeMedia);
        assert_eq!(failures, 1);
        assert_eq!(fetched.len(), 2);
        assert!(fetched[0].ends_with("phin_audio_001.wav"));
        assert!(fetched[1].ends_with("phin_audio_003.wav"));
    }
}
