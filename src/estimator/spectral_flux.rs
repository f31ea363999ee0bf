//! Real-time spectral-flux beat tracker.
//!
//! Per buffer: slide the analysis window, take a Hann-windowed real FFT and
//! compute log-compressed spectral flux. The flux is pooled down to at most
//! [`MAX_ODF_RATE`] frames per second to form the onset detection function
//! (ODF). On the ODF clock:
//!
//! - onsets are local maxima above an adaptive mean threshold
//! - tempo is the autocorrelation peak of the ODF history in 60-200 BPM,
//!   weighted by a log-Gaussian prior around 120 BPM
//! - beats are predicted one period apart and phase-locked to onsets
//!
//! All buffers are allocated in [`SpectralFluxEstimator::new`]; `analyze`
//! does not allocate.

use std::sync::Arc;

use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};

use super::{EstimatorParams, TempoEstimator};
use crate::EstimatorFault;

const MIN_BPM: f32 = 60.0;
const MAX_BPM: f32 = 200.0;
const PRIOR_BPM: f32 = 120.0;
const PRIOR_WIDTH_OCTAVES: f32 = 1.0;

/// Upper bound on ODF frames per second; keeps autocorrelation cost bounded
/// for very small buffers.
const MAX_ODF_RATE: f32 = 200.0;

const HISTORY_SECONDS: f32 = 6.0;
const TEMPO_UPDATE_SECONDS: f32 = 0.5;
const THRESHOLD_SECONDS: f32 = 0.25;
const THRESHOLD_SCALE: f32 = 1.5;
const THRESHOLD_DELTA: f32 = 0.01;

/// Log compression factor applied to magnitudes before differencing.
const COMPRESSION: f32 = 10.0;

/// Onsets within this fraction of a period of a predicted beat pull the phase.
const PHASE_TOLERANCE: f64 = 0.2;
const PHASE_GAIN: f64 = 0.25;

/// Fixed-capacity circular history of ODF values.
struct OnsetHistory {
    values: Vec<f32>,
    next: usize,
    len: usize,
}

impl OnsetHistory {
    fn new(capacity: usize) -> Self {
        Self {
            values: vec![0.0; capacity.max(1)],
            next: 0,
            len: 0,
        }
    }

    fn capacity(&self) -> usize {
        self.values.len()
    }

    fn len(&self) -> usize {
        self.len
    }

    fn push(&mut self, value: f32) {
        let capacity = self.capacity();
        self.values[self.next] = value;
        self.next = (self.next + 1) % capacity;
        self.len = (self.len + 1).min(capacity);
    }

    /// Value `age` frames ago (0 = newest).
    fn recent(&self, age: usize) -> f32 {
        if age >= self.len {
            return 0.0;
        }
        let capacity = self.capacity();
        self.values[(self.next + capacity - 1 - age) % capacity]
    }

    fn mean_recent(&self, count: usize) -> f32 {
        let count = count.min(self.len);
        if count == 0 {
            return 0.0;
        }
        (0..count).map(|age| self.recent(age)).sum::<f32>() / count as f32
    }

    /// Copies the history oldest-first into `out`, returning the count.
    fn copy_ordered(&self, out: &mut [f32]) -> usize {
        let n = self.len.min(out.len());
        for (i, slot) in out.iter_mut().take(n).enumerate() {
            *slot = self.recent(n - 1 - i);
        }
        n
    }
}

/// Default [`TempoEstimator`]: spectral-flux onsets, autocorrelation tempo.
///
/// # Example
///
/// ```
/// use beat_osc::estimator::{EstimatorParams, SpectralFluxEstimator, TempoEstimator};
///
/// let params = EstimatorParams::for_buffer_size(512, 44_100);
/// let mut estimator = SpectralFluxEstimator::new(params);
///
/// let silence = vec![0.0f32; 512];
/// assert!(!estimator.analyze(&silence).unwrap());
/// assert_eq!(estimator.current_tempo(), 0.0);
/// ```
pub struct SpectralFluxEstimator {
    hop_size: usize,
    fft: Arc<dyn RealToComplex<f32>>,
    window: Vec<f32>,
    hann: Vec<f32>,
    fft_input: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    previous_magnitudes: Vec<f32>,

    /// Hops pooled into one ODF frame.
    pool_size: usize,
    pooled: f32,
    pooled_hops: usize,
    odf_rate: f32,

    history: OnsetHistory,
    ordered: Vec<f32>,
    correlation: Vec<f32>,
    prior: Vec<f32>,
    lag_min: usize,
    lag_max: usize,
    threshold_frames: usize,
    update_frames: u64,
    odf_frames: u64,

    tempo_bpm: f32,
    period: Option<f64>,
    next_beat: Option<f64>,
}

impl SpectralFluxEstimator {
    /// Creates an estimator for the given window/hop/sample rate.
    pub fn new(params: EstimatorParams) -> Self {
        let hop_size = params.hop_size.max(1);
        let window_size = params.window_size.max(hop_size).max(2);

        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(window_size);
        let fft_input = fft.make_input_vec();
        let spectrum = fft.make_output_vec();
        let scratch = fft.make_scratch_vec();
        let bins = spectrum.len();

        let hann = (0..window_size)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * i as f32 / window_size as f32;
                0.5 - 0.5 * phase.cos()
            })
            .collect();

        let hop_rate = params.sample_rate.max(1) as f32 / hop_size as f32;
        let pool_size = ((hop_rate / MAX_ODF_RATE).ceil() as usize).max(1);
        let odf_rate = hop_rate / pool_size as f32;

        let lag_min = ((60.0 * odf_rate / MAX_BPM).floor() as usize).max(1);
        let lag_max = ((60.0 * odf_rate / MIN_BPM).ceil() as usize).max(lag_min + 2);
        let history_len = ((HISTORY_SECONDS * odf_rate).ceil() as usize).max(2 * lag_max + 2);

        let prior = (0..=lag_max)
            .map(|lag| {
                if lag == 0 {
                    return 0.0;
                }
                let bpm = 60.0 * odf_rate / lag as f32;
                let octaves = (bpm / PRIOR_BPM).log2() / PRIOR_WIDTH_OCTAVES;
                (-0.5 * octaves * octaves).exp()
            })
            .collect();

        tracing::debug!(
            window_size,
            hop_size,
            pool_size,
            odf_rate,
            lag_min,
            lag_max,
            "spectral flux estimator created"
        );

        Self {
            hop_size,
            fft,
            window: vec![0.0; window_size],
            hann,
            fft_input,
            spectrum,
            scratch,
            previous_magnitudes: vec![0.0; bins],
            pool_size,
            pooled: 0.0,
            pooled_hops: 0,
            odf_rate,
            history: OnsetHistory::new(history_len),
            ordered: vec![0.0; history_len],
            correlation: vec![0.0; lag_max + 1],
            prior,
            lag_min,
            lag_max,
            threshold_frames: ((THRESHOLD_SECONDS * odf_rate).ceil() as usize).max(3),
            update_frames: ((TEMPO_UPDATE_SECONDS * odf_rate).round() as u64).max(1),
            odf_frames: 0,
            tempo_bpm: 0.0,
            period: None,
            next_beat: None,
        }
    }

    fn slide_window(&mut self, buffer: &[f32]) {
        let window_len = self.window.len();
        let hop = buffer.len();
        if window_len > hop {
            self.window.copy_within(hop.., 0);
            self.window[window_len - hop..].copy_from_slice(buffer);
        } else {
            self.window.copy_from_slice(&buffer[hop - window_len..]);
        }
    }

    fn spectral_flux(&mut self) -> Result<f32, EstimatorFault> {
        for ((dst, &sample), &weight) in self
            .fft_input
            .iter_mut()
            .zip(&self.window)
            .zip(&self.hann)
        {
            *dst = sample * weight;
        }

        self.fft
            .process_with_scratch(&mut self.fft_input, &mut self.spectrum, &mut self.scratch)
            .map_err(|e| EstimatorFault::Internal(e.to_string()))?;

        let mut flux = 0.0;
        for (bin, previous) in self.spectrum.iter().zip(self.previous_magnitudes.iter_mut()) {
            let magnitude = (1.0 + COMPRESSION * bin.norm()).ln();
            flux += (magnitude - *previous).max(0.0);
            *previous = magnitude;
        }

        Ok(flux / self.previous_magnitudes.len() as f32)
    }

    /// Peak at the previous ODF frame, above the adaptive threshold.
    fn detect_onset(&self) -> bool {
        if self.history.len() < 3 {
            return false;
        }
        let current = self.history.recent(0);
        let peak = self.history.recent(1);
        let before = self.history.recent(2);
        let threshold =
            THRESHOLD_SCALE * self.history.mean_recent(self.threshold_frames) + THRESHOLD_DELTA;

        peak > before && peak >= current && peak > threshold
    }

    fn update_tempo(&mut self) {
        let n = self.history.copy_ordered(&mut self.ordered);
        if n < 2 * self.lag_max {
            return;
        }

        let series = &mut self.ordered[..n];
        let mean = series.iter().sum::<f32>() / n as f32;
        series.iter_mut().for_each(|v| *v -= mean);

        let mut best_lag = 0;
        let mut best_score = 0.0f32;
        for lag in self.lag_min..=self.lag_max {
            let score = autocorrelation(series, lag) * self.prior[lag];
            self.correlation[lag] = score;
            if score > best_score {
                best_score = score;
                best_lag = lag;
            }
        }
        if best_lag == 0 {
            return;
        }

        let mut period = best_lag as f64;
        if best_lag > self.lag_min && best_lag < self.lag_max {
            let left = f64::from(self.correlation[best_lag - 1]);
            let centre = f64::from(self.correlation[best_lag]);
            let right = f64::from(self.correlation[best_lag + 1]);
            let curvature = left - 2.0 * centre + right;
            if curvature < 0.0 {
                period += (0.5 * (left - right) / curvature).clamp(-0.5, 0.5);
            }
        }

        self.period = Some(period);
        self.tempo_bpm = (60.0 * f64::from(self.odf_rate) / period) as f32;
    }

    /// Advances the beat predictor by one ODF frame.
    fn track_beat(&mut self, onset: bool) -> bool {
        let Some(period) = self.period else {
            return false;
        };
        let now = (self.odf_frames - 1) as f64;
        let onset_at = now - 1.0;

        let Some(mut next) = self.next_beat else {
            if onset {
                self.next_beat = Some(onset_at + period);
                return true;
            }
            return false;
        };

        if onset {
            let to_previous = onset_at - (next - period);
            let to_next = onset_at - next;
            let error = if to_previous.abs() < to_next.abs() {
                to_previous
            } else {
                to_next
            };
            if error.abs() <= PHASE_TOLERANCE * period {
                next += PHASE_GAIN * error;
            }
        }

        let mut beat = false;
        if now + 0.5 >= next {
            beat = true;
            next += period;
            if next <= now {
                next = now + period;
            }
        }
        self.next_beat = Some(next);
        beat
    }
}

fn autocorrelation(series: &[f32], lag: usize) -> f32 {
    let n = series.len();
    if lag >= n {
        return 0.0;
    }
    let sum: f32 = series[lag..].iter().zip(series).map(|(a, b)| a * b).sum();
    sum / (n - lag) as f32
}

impl TempoEstimator for SpectralFluxEstimator {
    fn analyze(&mut self, buffer: &[f32]) -> Result<bool, EstimatorFault> {
        if buffer.len() != self.hop_size {
            return Err(EstimatorFault::BufferSize {
                expected: self.hop_size,
                actual: buffer.len(),
            });
        }
        if let Some(index) = buffer.iter().position(|s| !s.is_finite()) {
            return Err(EstimatorFault::NonFiniteSample { index });
        }

        self.slide_window(buffer);
        let flux = self.spectral_flux()?;

        self.pooled = self.pooled.max(flux);
        self.pooled_hops += 1;
        if self.pooled_hops < self.pool_size {
            return Ok(false);
        }

        self.history.push(self.pooled);
        self.pooled = 0.0;
        self.pooled_hops = 0;
        self.odf_frames += 1;

        if self.odf_frames % self.update_frames == 0 {
            self.update_tempo();
        }

        let onset = self.detect_onset();
        Ok(self.track_beat(onset))
    }

    fn current_tempo(&self) -> f32 {
        self.tempo_bpm
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockSource;

    fn run(estimator: &mut SpectralFluxEstimator, samples: &[f32], hop: usize) -> usize {
        samples
            .chunks_exact(hop)
            .filter(|buffer| estimator.analyze(buffer).unwrap())
            .count()
    }

    #[test]
    fn test_history_ordering() {
        let mut history = OnsetHistory::new(3);
        for v in [1.0, 2.0, 3.0, 4.0] {
            history.push(v);
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.recent(0), 4.0);
        assert_eq!(history.recent(2), 2.0);
        assert_eq!(history.recent(3), 0.0);

        let mut out = [0.0; 3];
        assert_eq!(history.copy_ordered(&mut out), 3);
        assert_eq!(out, [2.0, 3.0, 4.0]);
        assert!((history.mean_recent(2) - 3.5).abs() < 1e-6);
    }

    #[test]
    fn test_autocorrelation_periodic() {
        let series: Vec<f32> = (0..40).map(|i| if i % 4 == 0 { 1.0 } else { -0.25 }).collect();
        assert!(autocorrelation(&series, 4) > autocorrelation(&series, 3));
        assert_eq!(autocorrelation(&series, 40), 0.0);
    }

    #[test]
    fn test_silence_has_no_beats() {
        let params = EstimatorParams::for_buffer_size(512, 44_100);
        let mut estimator = SpectralFluxEstimator::new(params);

        let mut mock = MockSource::new(44_100, 1);
        mock.generate_silence(5_000);

        assert_eq!(run(&mut estimator, mock.samples(), 512), 0);
        assert_eq!(estimator.current_tempo(), 0.0);
    }

    #[test]
    fn test_click_track_tempo_and_beats() {
        let params = EstimatorParams::for_buffer_size(512, 44_100);
        let mut estimator = SpectralFluxEstimator::new(params);

        let mut mock = MockSource::new(44_100, 1);
        mock.generate_clicks(120.0, 12_000);

        let beats = run(&mut estimator, mock.samples(), 512);
        let tempo = estimator.current_tempo();
        assert!((tempo - 120.0).abs() < 4.0, "tempo was {tempo}");
        assert!(beats >= 10, "only {beats} beats");
    }

    #[test]
    fn test_click_track_small_buffers_pool() {
        let params = EstimatorParams::for_buffer_size(128, 44_100);
        let mut estimator = SpectralFluxEstimator::new(params);
        assert_eq!(estimator.pool_size, 2);

        let mut mock = MockSource::new(44_100, 1);
        mock.generate_clicks(120.0, 12_000);

        let beats = run(&mut estimator, mock.samples(), 128);
        let tempo = estimator.current_tempo();
        assert!((tempo - 120.0).abs() < 4.0, "tempo was {tempo}");
        assert!(beats >= 10, "only {beats} beats");
    }

    #[test]
    fn test_rejects_wrong_size() {
        let mut estimator = SpectralFluxEstimator::new(EstimatorParams::for_buffer_size(64, 44_100));
        assert_eq!(
            estimator.analyze(&[0.0; 32]),
            Err(EstimatorFault::BufferSize {
                expected: 64,
                actual: 32
            })
        );
    }

    #[test]
    fn test_rejects_non_finite() {
        let mut estimator = SpectralFluxEstimator::new(EstimatorParams::for_buffer_size(4, 44_100));
        assert_eq!(
            estimator.analyze(&[0.0, 0.1, f32::NAN, 0.0]),
            Err(EstimatorFault::NonFiniteSample { index: 2 })
        );
    }

    #[test]
    fn test_tiny_buffer_does_not_panic() {
        let mut estimator = SpectralFluxEstimator::new(EstimatorParams::for_buffer_size(1, 44_100));
        for i in 0..1000 {
            let sample = if i % 100 == 0 { 1.0 } else { 0.0 };
            estimator.analyze(&[sample]).unwrap();
        }
    }
}
