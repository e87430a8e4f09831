use std::sync::Arc;

use num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};
use serde::Serialize;

use super::design::CoefficientSet;
use super::publisher::{CoefficientReader, SharedCoefficients};
use crate::constants::NORMALIZATION_EPSILON;
use crate::error::{FilterError, Result};

/// One display point of a magnitude response
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpectrumPoint {
    pub frequency_hz: f64,
    pub magnitude_db: f64,
}

/// Magnitude response over the lower half of the transform
#[derive(Debug, Clone, PartialEq)]
pub struct MagnitudeSpectrum {
    points: Vec<SpectrumPoint>,
}

impl MagnitudeSpectrum {
    pub fn points(&self) -> &[SpectrumPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SpectrumPoint> {
        self.points.iter()
    }

    /// Magnitude of the bin nearest to `frequency_hz`
    pub fn magnitude_at(&self, frequency_hz: f64) -> Option<f64> {
        self.points
            .iter()
            .min_by(|a, b| {
                (a.frequency_hz - frequency_hz)
                    .abs()
                    .total_cmp(&(b.frequency_hz - frequency_hz).abs())
            })
            .map(|p| p.magnitude_db)
    }

    /// Bin with the largest magnitude
    pub fn peak(&self) -> Option<SpectrumPoint> {
        self.points
            .iter()
            .copied()
            .max_by(|a, b| a.magnitude_db.total_cmp(&b.magnitude_db))
    }
}

/// Convert a linear gain to decibels, never going below `floor_db`
pub fn gain_to_db(gain: f64, floor_db: f64) -> f64 {
    if gain > 0.0 {
        (20.0 * gain.log10()).max(floor_db)
    } else {
        floor_db
    }
}

/// Frequency response of the active coefficient set, for display
///
/// Reads the same publisher as the audio path through its own reader.
/// Bins are labelled with the rate the analyzed set was designed for, so
/// the curve stays correct across stream rate changes; `sample_rate` only
/// applies to untagged sets. Magnitudes are scaled by the transform size and normalized to the peak
/// bin, so the curve tops out at 0 dB; a peak below `NORMALIZATION_EPSILON`
/// skips normalization and the curve sits at the floor.
pub struct SpectralAnalyzer {
    reader: CoefficientReader,
    fft: Arc<dyn RealToComplex<f64>>,
    input: Vec<f64>,
    output: Vec<Complex<f64>>,
    scratch: Vec<Complex<f64>>,
    magnitudes: Vec<f64>,
    fft_size: usize,
    sample_rate: f64,
    floor_db: f64,
    last_analyzed: Option<SharedCoefficients>,
}

impl SpectralAnalyzer {
    /// Create an analyzer
    ///
    /// # Errors
    /// Returns `FilterError::Config` if `fft_size` is not a power of two of
    /// at least 2, or `sample_rate` is not positive.
    pub fn new(
        reader: CoefficientReader,
        sample_rate: f64,
        fft_size: usize,
        floor_db: f64,
    ) -> Result<Self> {
        if fft_size < 2 || !fft_size.is_power_of_two() {
            return Err(FilterError::Config(format!(
                "FFT size must be a power of two >= 2, got {}",
                fft_size
            )));
        }
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(FilterError::Config(format!(
                "sample rate must be positive, got {}",
                sample_rate
            )));
        }

        let mut planner = RealFftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(fft_size);

        Ok(Self {
            input: fft.make_input_vec(),
            output: fft.make_output_vec(),
            scratch: fft.make_scratch_vec(),
            magnitudes: vec![0.0; fft_size / 2],
            fft,
            reader,
            fft_size,
            sample_rate,
            floor_db,
            last_analyzed: None,
        })
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn floor_db(&self) -> f64 {
        self.floor_db
    }

    /// Whether the published set differs from the last one analyzed
    pub fn is_stale(&mut self) -> bool {
        let current = self.reader.current();
        match &self.last_analyzed {
            Some(last) => !Arc::ptr_eq(last, current),
            None => true,
        }
    }

    /// Analyze the currently published coefficient set
    pub fn analyze(&mut self) -> MagnitudeSpectrum {
        let snapshot = Arc::clone(self.reader.current());
        let spectrum = self.analyze_coefficients(&snapshot);
        self.last_analyzed = Some(snapshot);
        spectrum
    }

    /// Analyze only if a new set was published since the last analysis
    pub fn analyze_if_changed(&mut self) -> Option<MagnitudeSpectrum> {
        if self.is_stale() {
            Some(self.analyze())
        } else {
            None
        }
    }

    /// Analyze an arbitrary coefficient set
    ///
    /// Taps beyond the transform size are ignored.
    pub fn analyze_coefficients(&mut self, coefficients: &CoefficientSet) -> MagnitudeSpectrum {
        self.input.fill(0.0);
        for (slot, &tap) in self.input.iter_mut().zip(coefficients.taps()) {
            *slot = tap;
        }

        if let Err(e) = self
            .fft
            .process_with_scratch(&mut self.input, &mut self.output, &mut self.scratch)
        {
            log::warn!("Spectrum transform failed: {}", e);
            self.magnitudes.fill(0.0);
        } else {
            let scale = self.fft_size as f64;
            for (mag, bin) in self.magnitudes.iter_mut().zip(&self.output) {
                *mag = bin.norm() / scale;
            }
        }

        let peak = self.magnitudes.iter().copied().fold(0.0f64, f64::max);
        if peak > NORMALIZATION_EPSILON {
            for mag in self.magnitudes.iter_mut() {
                *mag /= peak;
            }
        }

        let sample_rate = coefficients.sample_rate().unwrap_or(self.sample_rate);
        let bin_hz = sample_rate / self.fft_size as f64;
        let points = self
            .magnitudes
            .iter()
            .enumerate()
            .map(|(k, &mag)| SpectrumPoint {
                frequency_hz: k as f64 * bin_hz,
                magnitude_db: gain_to_db(mag, self.floor_db),
            })
            .collect();

        MagnitudeSpectrum { points }
    }
}
