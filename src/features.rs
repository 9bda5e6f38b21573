//! Acoustic and musical feature extraction
//!
//! Computes the descriptor set for one audio unit: tempo estimate, 12-bin
//! chroma profile with dominant pitch-class labels, spectral centroid,
//! zero-crossing rate, and the four categorical heuristics (style, mode,
//! noise level, dynamic range). The heuristic thresholds are a compatibility
//! contract with the existing corpus and must not drift.

use crate::audio::AudioUnit;
use crate::config::PipelineConfig;
use crate::{Error, Result};
use log::debug;
use ndarray_stats::QuantileExt;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

/// Number of chroma pitch-class bins
pub const PITCH_CLASSES: usize = 12;

/// Thai note symbols for dominant-pitch labels. Chroma bins at index 7 and
/// above have no symbol and are dropped from the label list.
pub const THAI_NOTES: [&str; 7] = ["ซ", "ร", "ม", "ฟ", "ซ", "ล", "ท"];

/// Reference frequency for pitch-class mapping (middle C)
const C4_HZ: f32 = 261.6256;

/// Tempo search range in BPM
const TEMPO_MIN_BPM: f64 = 60.0;
const TEMPO_MAX_BPM: f64 = 200.0;

/// Tempo reported when the onset envelope is too short or flat to analyze
const TEMPO_FALLBACK_BPM: f64 = 120.0;

/// Playing-style classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleClass {
    DynamicExpressive,
    TraditionalFolk,
    Contemporary,
}

impl StyleClass {
    pub fn label(&self) -> &'static str {
        match self {
            StyleClass::DynamicExpressive => "dynamic and expressive",
            StyleClass::TraditionalFolk => "traditional folk",
            StyleClass::Contemporary => "contemporary",
        }
    }
}

/// Musical-mode classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeClass {
    Pentatonic,
    Heptatonic,
}

impl ModeClass {
    pub fn label(&self) -> &'static str {
        match self {
            ModeClass::Pentatonic => "pentatonic",
            ModeClass::Heptatonic => "heptatonic",
        }
    }
}

/// Background-noise classification from the zero-crossing rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseLevel {
    Low,
    Moderate,
    High,
}

impl NoiseLevel {
    pub fn label(&self) -> &'static str {
        match self {
            NoiseLevel::Low => "Low",
            NoiseLevel::Moderate => "Moderate",
            NoiseLevel::High => "High",
        }
    }
}

/// Dynamic-range classification from peak-to-mean amplitude ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DynamicRange {
    Wide,
    Moderate,
    Narrow,
}

impl DynamicRange {
    pub fn label(&self) -> &'static str {
        match self {
            DynamicRange::Wide => "Wide",
            DynamicRange::Moderate => "Moderate",
            DynamicRange::Narrow => "Narrow",
        }
    }
}

/// The bundle of features derived from one audio unit.
///
/// Computed fresh per unit, never mutated after creation.
#[derive(Debug, Clone)]
pub struct DescriptorSet {
    pub tempo_bpm: f64,
    pub duration_secs: f64,
    pub sample_rate: u32,
    /// Up to three dominant pitch-class labels, highest energy first
    pub dominant_notes: Vec<&'static str>,
    pub spectral_centroid_hz: f64,
    pub zero_crossing_rate: f64,
    pub style: StyleClass,
    pub mode: ModeClass,
    pub noise: NoiseLevel,
    pub dynamic_range: DynamicRange,
}

/// Population standard deviation of the chroma-bin means
pub fn chroma_std(chroma: &[f32; PITCH_CLASSES]) -> f32 {
    let mean = chroma.iter().sum::<f32>() / PITCH_CLASSES as f32;
    let var = chroma.iter().map(|c| (c - mean) * (c - mean)).sum::<f32>() / PITCH_CLASSES as f32;
    var.sqrt()
}

/// Classify playing style from the averaged chroma profile.
pub fn classify_style(chroma: &[f32; PITCH_CLASSES]) -> StyleClass {
    if chroma_std(chroma) > 0.3 {
        return StyleClass::DynamicExpressive;
    }
    let low = chroma[..3].iter().sum::<f32>() / 3.0;
    let high = chroma[3..].iter().sum::<f32>() / (PITCH_CLASSES - 3) as f32;
    if low > high {
        StyleClass::TraditionalFolk
    } else {
        StyleClass::Contemporary
    }
}

/// Rank all chroma bins by mean energy, highest first. Ties resolve to the
/// lower bin index so repeated runs on identical input agree.
fn ranked_bins(chroma: &[f32; PITCH_CLASSES]) -> [usize; PITCH_CLASSES] {
    let mut order = [0usize; PITCH_CLASSES];
    for (i, slot) in order.iter_mut().enumerate() {
        *slot = i;
    }
    order.sort_by(|&a, &b| {
        chroma[b]
            .partial_cmp(&chroma[a])
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });
    order
}

/// The three highest-energy chroma bin indices, highest first.
pub fn dominant_note_indices(chroma: &[f32; PITCH_CLASSES]) -> [usize; 3] {
    let order = ranked_bins(chroma);
    [order[0], order[1], order[2]]
}

/// Dominant-note labels: the top three bins mapped through [`THAI_NOTES`],
/// dropping bins with no symbol (index 7 and above).
pub fn dominant_note_labels(chroma: &[f32; PITCH_CLASSES]) -> Vec<&'static str> {
    dominant_note_indices(chroma)
        .iter()
        .filter_map(|&i| THAI_NOTES.get(i).copied())
        .collect()
}

/// Classify musical mode from the interval between the two strongest bins.
pub fn classify_mode(chroma: &[f32; PITCH_CLASSES]) -> ModeClass {
    let order = ranked_bins(chroma);
    let interval = order[0].abs_diff(order[1]);
    if interval == 2 || interval == 4 {
        ModeClass::Pentatonic
    } else {
        ModeClass::Heptatonic
    }
}

/// Classify background noise from the mean zero-crossing rate.
pub fn classify_noise_level(zcr_mean: f64) -> NoiseLevel {
    if zcr_mean < 0.05 {
        NoiseLevel::Low
    } else if zcr_mean < 0.1 {
        NoiseLevel::Moderate
    } else {
        NoiseLevel::High
    }
}

/// Peak-to-mean dynamic range in dB. `None` for silent input, where the
/// log ratio is undefined.
pub fn dynamic_range_db(peak: f32, mean_abs: f32) -> Option<f64> {
    if peak <= 0.0 || mean_abs <= 0.0 {
        return None;
    }
    Some(20.0 * (peak as f64).log10() - 20.0 * (mean_abs as f64).log10())
}

/// Classify dynamic range. Silent input reports `Narrow` rather than
/// evaluating an undefined log ratio.
pub fn classify_dynamic_range(peak: f32, mean_abs: f32) -> DynamicRange {
    match dynamic_range_db(peak, mean_abs) {
        Some(db) if db > 20.0 => DynamicRange::Wide,
        Some(db) if db > 10.0 => DynamicRange::Moderate,
        _ => DynamicRange::Narrow,
    }
}

/// Extracts a [`DescriptorSet`] from decoded waveforms.
///
/// The FFT plan and analysis window are built once and reused across units.
pub struct FeatureExtractor {
    sample_rate: u32,
    n_fft: usize,
    hop_length: usize,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
}

impl FeatureExtractor {
    /// Create an extractor from a validated pipeline configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfiguration` for degenerate STFT parameters.
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        config.validate()?;
        let n_fft = config.n_fft;
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(n_fft);
        let window: Vec<f32> = (0..n_fft)
            .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / (n_fft - 1) as f32).cos()))
            .collect();
        Ok(Self {
            sample_rate: config.sample_rate,
            n_fft,
            hop_length: config.hop_length,
            fft,
            window,
        })
    }

    /// Compute the descriptor set for one unit.
    ///
    /// # Errors
    ///
    /// Returns an error if the unit's waveform is empty or its rate does not
    /// match the analysis rate. Degenerate-but-decodable input (silence) is
    /// handled with safe default classifications, never an error.
    pub fn extract(&self, unit: &AudioUnit) -> Result<DescriptorSet> {
        if unit.is_empty() {
            return Err(Error::Decode(format!(
                "empty waveform: {}",
                unit.path().display()
            )));
        }
        if unit.sample_rate() != self.sample_rate {
            return Err(Error::Decode(format!(
                "unit sample rate {} does not match analysis rate {}",
                unit.sample_rate(),
                self.sample_rate
            )));
        }

        let samples = unit.samples();
        let magnitudes = self.stft_magnitudes(samples.as_slice().unwrap_or(&[]));

        let chroma = self.chroma_profile(&magnitudes);
        let centroid = self.mean_spectral_centroid(&magnitudes);
        let zcr = self.mean_zero_crossing_rate(samples.as_slice().unwrap_or(&[]));
        let tempo = self.estimate_tempo(&magnitudes);

        let abs = samples.mapv(f32::abs);
        let peak = abs.max().map(|&v| v).unwrap_or(0.0);
        let mean_abs = abs.mean().unwrap_or(0.0);

        debug!(
            "Extracted features for {}: tempo={:.1}, centroid={:.1}, zcr={:.3}",
            unit.path().display(),
            tempo,
            centroid,
            zcr
        );

        Ok(DescriptorSet {
            tempo_bpm: tempo,
            duration_secs: unit.duration_secs(),
            sample_rate: self.sample_rate,
            dominant_notes: dominant_note_labels(&chroma),
            spectral_centroid_hz: centroid,
            zero_crossing_rate: zcr,
            style: classify_style(&chroma),
            mode: classify_mode(&chroma),
            noise: classify_noise_level(zcr),
            dynamic_range: classify_dynamic_range(peak, mean_abs),
        })
    }

    /// STFT magnitude frames. Frames start every `hop_length` samples and
    /// are zero-padded to `n_fft` at the tail; each frame holds
    /// `n_fft / 2 + 1` magnitude bins.
    fn stft_magnitudes(&self, samples: &[f32]) -> Vec<Vec<f32>> {
        let n_freqs = self.n_fft / 2 + 1;
        let n_frames = (samples.len() / self.hop_length).max(1);
        let mut buffer: Vec<Complex<f32>> = vec![Complex::new(0.0, 0.0); self.n_fft];
        let mut frames = Vec::with_capacity(n_frames);

        for frame_idx in 0..n_frames {
            let start = frame_idx * self.hop_length;
            for i in 0..self.n_fft {
                let sample = samples.get(start + i).copied().unwrap_or(0.0);
                buffer[i] = Complex::new(sample * self.window[i], 0.0);
            }
            self.fft.process(&mut buffer);
            frames.push(buffer[..n_freqs].iter().map(|c| c.norm()).collect());
        }

        frames
    }

    /// 12-bin chroma profile: per-frame pitch-class energy, max-normalized
    /// per frame, averaged over time.
    fn chroma_profile(&self, magnitudes: &[Vec<f32>]) -> [f32; PITCH_CLASSES] {
        let mut profile = [0.0f32; PITCH_CLASSES];
        if magnitudes.is_empty() {
            return profile;
        }

        let bin_hz = self.sample_rate as f32 / self.n_fft as f32;
        for frame in magnitudes {
            let mut bins = [0.0f32; PITCH_CLASSES];
            for (k, &mag) in frame.iter().enumerate().skip(1) {
                let freq = k as f32 * bin_hz;
                if freq < 20.0 {
                    continue;
                }
                let pitch = (12.0 * (freq / C4_HZ).log2()).round() as i32;
                let class = pitch.rem_euclid(PITCH_CLASSES as i32) as usize;
                bins[class] += mag * mag;
            }
            let max = bins.iter().cloned().fold(0.0f32, f32::max);
            if max > 0.0 {
                for (slot, bin) in profile.iter_mut().zip(bins.iter()) {
                    *slot += bin / max;
                }
            }
        }

        for slot in profile.iter_mut() {
            *slot /= magnitudes.len() as f32;
        }
        profile
    }

    /// Mean spectral centroid in Hz over all frames. Frames with no energy
    /// contribute 0 Hz.
    fn mean_spectral_centroid(&self, magnitudes: &[Vec<f32>]) -> f64 {
        if magnitudes.is_empty() {
            return 0.0;
        }
        let bin_hz = self.sample_rate as f64 / self.n_fft as f64;
        let mut total = 0.0f64;
        for frame in magnitudes {
            let mut weighted = 0.0f64;
            let mut energy = 0.0f64;
            for (k, &mag) in frame.iter().enumerate() {
                weighted += k as f64 * bin_hz * mag as f64;
                energy += mag as f64;
            }
            if energy > 0.0 {
                total += weighted / energy;
            }
        }
        total / magnitudes.len() as f64
    }

    /// Mean zero-crossing rate over `n_fft`-sized frames advancing by the
    /// hop length. Sign changes are counted as strict polarity flips, so
    /// silence contributes none.
    fn mean_zero_crossing_rate(&self, samples: &[f32]) -> f64 {
        let n_frames = (samples.len() / self.hop_length).max(1);
        let mut total = 0.0f64;
        for frame_idx in 0..n_frames {
            let start = frame_idx * self.hop_length;
            let end = (start + self.n_fft).min(samples.len());
            if end <= start + 1 {
                continue;
            }
            let frame = &samples[start..end];
            let crossings = frame
                .windows(2)
                .filter(|pair| pair[0] * pair[1] < 0.0)
                .count();
            total += crossings as f64 / frame.len() as f64;
        }
        total / n_frames as f64
    }

    /// Dominant tempo estimate from the onset envelope.
    ///
    /// The envelope is the positive spectral flux between consecutive
    /// frames; its autocorrelation is searched over the 60-200 BPM lag
    /// range. Envelopes too short or flat to autocorrelate fall back to
    /// 120 BPM.
    fn estimate_tempo(&self, magnitudes: &[Vec<f32>]) -> f64 {
        let mut envelope: Vec<f64> = Vec::with_capacity(magnitudes.len().saturating_sub(1));
        for pair in magnitudes.windows(2) {
            let flux: f64 = pair[1]
                .iter()
                .zip(pair[0].iter())
                .map(|(&cur, &prev)| f64::from((cur - prev).max(0.0)))
                .sum();
            envelope.push(flux);
        }

        let frames_per_sec = self.sample_rate as f64 / self.hop_length as f64;
        let lag_min = (frames_per_sec * 60.0 / TEMPO_MAX_BPM).round() as usize;
        let lag_max = (frames_per_sec * 60.0 / TEMPO_MIN_BPM).round() as usize;
        let lag_min = lag_min.max(1);

        if envelope.len() <= lag_max || envelope.iter().sum::<f64>() <= 0.0 {
            return TEMPO_FALLBACK_BPM;
        }

        let mean = envelope.iter().sum::<f64>() / envelope.len() as f64;
        for value in envelope.iter_mut() {
            *value -= mean;
        }

        let mut best_lag = 0usize;
        let mut best_corr = f64::MIN;
        for lag in lag_min..=lag_max {
            let corr: f64 = envelope[lag..]
                .iter()
                .zip(envelope.iter())
                .map(|(a, b)| a * b)
                .sum::<f64>()
                / (envelope.len() - lag) as f64;
            if corr > best_corr {
                best_corr = corr;
                best_lag = lag;
            }
        }

        if best_lag == 0 || best_corr <= 0.0 {
            return TEMPO_FALLBACK_BPM;
        }
        60.0 * frames_per_sec / best_lag as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array1;

    fn flat_chroma(value: f32) -> [f32; PITCH_CLASSES] {
        [value; PITCH_CLASSES]
    }

    #[test]
    fn style_is_pure_in_chroma_std() {
        // std 0.5: half the bins at 0, half at 1.
        let mut chroma = [0.0f32; PITCH_CLASSES];
        for bin in chroma.iter_mut().take(6) {
            *bin = 1.0;
        }
        assert!((chroma_std(&chroma) - 0.5).abs() < 1e-6);
        assert_eq!(classify_style(&chroma), StyleClass::DynamicExpressive);
    }

    #[test]
    fn style_folk_when_low_bins_dominate() {
        let mut chroma = flat_chroma(0.1);
        chroma[0] = 0.3;
        chroma[1] = 0.3;
        chroma[2] = 0.3;
        assert!(chroma_std(&chroma) <= 0.3);
        assert_eq!(classify_style(&chroma), StyleClass::TraditionalFolk);
    }

    #[test]
    fn style_contemporary_otherwise() {
        assert_eq!(classify_style(&flat_chroma(0.2)), StyleClass::Contemporary);
    }

    #[test]
    fn dominant_notes_are_deterministic_and_ordered() {
        let mut chroma = flat_chroma(0.1);
        chroma[4] = 0.9;
        chroma[2] = 0.8;
        chroma[9] = 0.7;
        let first = dominant_note_indices(&chroma);
        assert_eq!(first, [4, 2, 9]);
        assert_eq!(dominant_note_indices(&chroma), first);
        // Bin 9 has no Thai symbol and is dropped from the labels.
        assert_eq!(dominant_note_labels(&chroma), vec!["ซ", "ม"]);
    }

    #[test]
    fn mode_intervals_of_two_or_four_are_pentatonic() {
        let mut chroma = flat_chroma(0.0);
        chroma[5] = 1.0;
        chroma[3] = 0.9;
        assert_eq!(classify_mode(&chroma), ModeClass::Pentatonic);

        let mut chroma = flat_chroma(0.0);
        chroma[1] = 1.0;
        chroma[5] = 0.9;
        assert_eq!(classify_mode(&chroma), ModeClass::Pentatonic);

        let mut chroma = flat_chroma(0.0);
        chroma[0] = 1.0;
        chroma[7] = 0.9;
        assert_eq!(classify_mode(&chroma), ModeClass::Heptatonic);
    }

    #[test]
    fn noise_level_thresholds() {
        assert_eq!(classify_noise_level(0.01), NoiseLevel::Low);
        assert_eq!(classify_noise_level(0.05), NoiseLevel::Moderate);
        assert_eq!(classify_noise_level(0.099), NoiseLevel::Moderate);
        assert_eq!(classify_noise_level(0.1), NoiseLevel::High);
    }

    #[test]
    fn dynamic_range_thresholds() {
        // peak/mean ratio of 100 is 40 dB.
        assert_eq!(classify_dynamic_range(1.0, 0.01), DynamicRange::Wide);
        // ratio of ~3.16 is 10-20 dB.
        assert_eq!(classify_dynamic_range(1.0, 0.3), DynamicRange::Moderate);
        assert_eq!(classify_dynamic_range(0.5, 0.4), DynamicRange::Narrow);
    }

    #[test]
    fn silent_input_reports_narrow_without_panicking() {
        assert_eq!(dynamic_range_db(0.0, 0.0), None);
        assert_eq!(classify_dynamic_range(0.0, 0.0), DynamicRange::Narrow);
    }

    #[test]
    fn silent_waveform_extracts_safe_defaults() {
        let config = PipelineConfig::default();
        let extractor = FeatureExtractor::new(&config).unwrap();
        let unit = AudioUnit::from_samples("silence.wav", Array1::zeros(44100), 22050);

        let desc = extractor.extract(&unit).unwrap();
        assert_eq!(desc.dynamic_range, DynamicRange::Narrow);
        assert_eq!(desc.noise, NoiseLevel::Low);
        assert_eq!(desc.zero_crossing_rate, 0.0);
        assert_eq!(desc.tempo_bpm, TEMPO_FALLBACK_BPM);
    }

    #[test]
    fn tone_has_low_zcr_and_plausible_centroid() {
        let config = PipelineConfig::default();
        let extractor = FeatureExtractor::new(&config).unwrap();
        let samples: Array1<f32> = Array1::from_vec(
            (0..44100)
                .map(|i| 0.5 * (2.0 * PI * 440.0 * i as f32 / 22050.0).sin())
                .collect(),
        );
        let unit = AudioUnit::from_samples("a4.wav", samples, 22050);

        let desc = extractor.extract(&unit).unwrap();
        // A 440 Hz tone crosses zero 880 times per second.
        assert!(desc.zero_crossing_rate < 0.05);
        assert_eq!(desc.noise, NoiseLevel::Low);
        assert!(desc.spectral_centroid_hz > 0.0);
        assert!((desc.duration_secs - 2.0).abs() < 1e-9);
        assert!(desc.dominant_notes.len() <= 3);
        assert!(desc
            .dominant_notes
            .iter()
            .all(|n| THAI_NOTES.contains(n)));
    }

    #[test]
    fn empty_waveform_is_decode_error() {
        let config = PipelineConfig::default();
        let extractor = FeatureExtractor::new(&config).unwrap();
        let unit = AudioUnit::from_samples("empty.wav", Array1::zeros(0), 22050);
        assert!(matches!(
            extractor.extract(&unit),
            Err(crate::Error::Decode(_))
        ));
    }
}
