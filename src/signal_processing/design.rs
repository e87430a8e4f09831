use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{
    MAX_NORMALIZED_CUTOFF, MIN_NORMALIZED_CUTOFF, MIN_TAP_COUNT, NORMALIZATION_EPSILON,
};
use crate::error::{FilterError, Result};

/// Response shape produced by the windowed-sinc designer
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum FilterType {
    /// Passes content below the cutoff
    #[default]
    Lowpass,
    /// Spectral inversion of the lowpass kernel
    Highpass,
}

impl FilterType {
    /// Map a host choice-parameter value (0 = lowpass, 1 = highpass)
    ///
    /// Values are rounded to the nearest index; anything at or above 0.5
    /// selects highpass.
    pub fn from_choice_index(value: f32) -> Self {
        if value.round() >= 1.0 {
            FilterType::Highpass
        } else {
            FilterType::Lowpass
        }
    }

    pub fn choice_index(&self) -> f32 {
        match self {
            FilterType::Lowpass => 0.0,
            FilterType::Highpass => 1.0,
        }
    }
}

impl fmt::Display for FilterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterType::Lowpass => write!(f, "lowpass"),
            FilterType::Highpass => write!(f, "highpass"),
        }
    }
}

impl FromStr for FilterType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lowpass" | "lp" | "low" => Ok(FilterType::Lowpass),
            "highpass" | "hp" | "high" => Ok(FilterType::Highpass),
            other => Err(format!("invalid filter type: {}", other)),
        }
    }
}

/// Immutable description of one filter design request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterSpec {
    cutoff_hz: f64,
    filter_type: FilterType,
    tap_count: usize,
    sample_rate: f64,
}

impl FilterSpec {
    /// Create a validated filter specification
    ///
    /// # Arguments
    /// * `cutoff_hz` - Cutoff frequency in Hz (clamped into range at design time)
    /// * `filter_type` - Lowpass or highpass
    /// * `tap_count` - Number of taps (odd, at least 3)
    /// * `sample_rate` - Audio sample rate in Hz
    ///
    /// # Errors
    /// Returns `FilterError::Config` for an even or too-small tap count, a
    /// non-positive sample rate, or a non-finite cutoff.
    pub fn new(
        cutoff_hz: f64,
        filter_type: FilterType,
        tap_count: usize,
        sample_rate: f64,
    ) -> Result<Self> {
        validate_tap_count(tap_count)?;

        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(FilterError::Config(format!(
                "sample rate must be positive, got {}",
                sample_rate
            )));
        }

        if !cutoff_hz.is_finite() {
            return Err(FilterError::Config(format!(
                "cutoff must be finite, got {}",
                cutoff_hz
            )));
        }

        Ok(Self {
            cutoff_hz,
            filter_type,
            tap_count,
            sample_rate,
        })
    }

    pub fn cutoff_hz(&self) -> f64 {
        self.cutoff_hz
    }

    pub fn filter_type(&self) -> FilterType {
        self.filter_type
    }

    pub fn tap_count(&self) -> usize {
        self.tap_count
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Cutoff divided by sample rate, clamped strictly inside (0, Nyquist)
    pub fn normalized_cutoff(&self) -> f64 {
        (self.cutoff_hz / self.sample_rate).clamp(MIN_NORMALIZED_CUTOFF, MAX_NORMALIZED_CUTOFF)
    }

    /// Copy of this spec with a different cutoff
    pub fn with_cutoff(self, cutoff_hz: f64) -> Result<Self> {
        Self::new(cutoff_hz, self.filter_type, self.tap_count, self.sample_rate)
    }

    /// Copy of this spec with a different filter type
    pub fn with_type(self, filter_type: FilterType) -> Self {
        Self {
            filter_type,
            ..self
        }
    }
}

/// Check that a tap count is usable for a symmetric windowed-sinc design
pub fn validate_tap_count(tap_count: usize) -> Result<()> {
    if tap_count < MIN_TAP_COUNT || tap_count.is_multiple_of(2) {
        return Err(FilterError::Config(format!(
            "tap count must be odd and at least {}, got {}",
            MIN_TAP_COUNT, tap_count
        )));
    }
    Ok(())
}

/// Fully computed, immutable set of FIR taps
///
/// Index 0 weights the newest sample in the delay line. Sets produced by
/// [`design`] also record the sample rate they were designed for.
#[derive(Debug, Clone, PartialEq)]
pub struct CoefficientSet {
    taps: Vec<f64>,
    sample_rate: Option<f64>,
}

impl CoefficientSet {
    /// Wrap an arbitrary tap vector
    ///
    /// # Errors
    /// Returns `FilterError::Config` if the vector is empty or holds
    /// non-finite values.
    pub fn from_taps(taps: Vec<f64>) -> Result<Self> {
        if taps.is_empty() {
            return Err(FilterError::Config("coefficient set is empty".into()));
        }
        if let Some(bad) = taps.iter().find(|t| !t.is_finite()) {
            return Err(FilterError::Config(format!(
                "coefficient set contains non-finite tap {}",
                bad
            )));
        }
        Ok(Self {
            taps,
            sample_rate: None,
        })
    }

    /// A single unit tap: output equals input
    pub fn identity() -> Self {
        Self {
            taps: vec![1.0],
            sample_rate: None,
        }
    }

    /// All-zero taps of the given length (mutes the output)
    pub fn zeros(len: usize) -> Self {
        Self {
            taps: vec![0.0; len.max(1)],
            sample_rate: None,
        }
    }

    pub fn taps(&self) -> &[f64] {
        &self.taps
    }

    /// Sample rate the set was designed for, if known
    pub fn sample_rate(&self) -> Option<f64> {
        self.sample_rate
    }

    /// Tag the set with the sample rate its taps assume
    pub fn with_sample_rate(mut self, sample_rate: f64) -> Self {
        self.sample_rate = Some(sample_rate);
        self
    }

    pub fn len(&self) -> usize {
        self.taps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.taps.is_empty()
    }

    /// Center index `M = (len - 1) / 2`
    pub fn center(&self) -> usize {
        (self.taps.len() - 1) / 2
    }

    /// Group delay in samples for a linear-phase set
    pub fn group_delay_samples(&self) -> usize {
        self.center()
    }

    pub fn sum(&self) -> f64 {
        self.taps.iter().sum()
    }

    /// Euclidean norm of the tap vector
    pub fn energy(&self) -> f64 {
        self.taps.iter().map(|t| t * t).sum::<f64>().sqrt()
    }
}

impl AsRef<[f64]> for CoefficientSet {
    fn as_ref(&self) -> &[f64] {
        &self.taps
    }
}

/// Hamming window centered on tap 0, spanning `[-M, M]`
fn hamming(i: f64, tap_count: usize) -> f64 {
    0.54 + 0.46 * (2.0 * PI * i / (tap_count - 1) as f64).cos()
}

fn ideal_lowpass(i: f64, fc: f64) -> f64 {
    if i == 0.0 {
        fc / PI
    } else {
        (fc / PI) * ((fc * i).sin() / (fc * i))
    }
}

fn ideal_highpass(i: f64, fc: f64) -> f64 {
    if i == 0.0 {
        1.0 - fc / PI
    } else {
        -ideal_lowpass(i, fc)
    }
}

/// Design windowed-sinc FIR taps for a filter specification
///
/// Pure and deterministic: the only allocation is the returned tap vector.
/// Lowpass sets are scaled to unity DC gain (tap sum of 1), highpass sets
/// to unit energy. Either scaling is skipped when its divisor is below
/// `NORMALIZATION_EPSILON`.
pub fn design(spec: &FilterSpec) -> CoefficientSet {
    let tap_count = spec.tap_count();
    let m = ((tap_count - 1) / 2) as isize;
    let fc = spec.normalized_cutoff();

    let ideal = match spec.filter_type() {
        FilterType::Lowpass => ideal_lowpass,
        FilterType::Highpass => ideal_highpass,
    };

    let mut taps = vec![0.0f64; tap_count];
    for i in -m..=m {
        let x = i as f64;
        taps[(m + i) as usize] = ideal(x, fc) * hamming(x, tap_count);
    }

    let divisor = match spec.filter_type() {
        FilterType::Lowpass => taps.iter().sum::<f64>(),
        FilterType::Highpass => taps.iter().map(|t| t * t).sum::<f64>().sqrt(),
    };

    if divisor.abs() > NORMALIZATION_EPSILON {
        for tap in taps.iter_mut() {
            *tap /= divisor;
        }
    }

    CoefficientSet {
        taps,
        sample_rate: Some(spec.sample_rate()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn spec(cutoff_hz: f64, filter_type: FilterType) -> FilterSpec {
        FilterSpec::new(cutoff_hz, filter_type, 65, 44100.0).unwrap()
    }

    #[test]
    fn test_design_length_matches_tap_count() {
        for taps in [3, 5, 31, 65, 127] {
            let s = FilterSpec::new(1000.0, FilterType::Lowpass, taps, 48000.0).unwrap();
            assert_eq!(design(&s).len(), taps);
        }
    }

    #[test]
    fn test_design_is_symmetric() {
        for filter_type in [FilterType::Lowpass, FilterType::Highpass] {
            let coeffs = design(&spec(2500.0, filter_type));
            let m = coeffs.center();
            for i in 1..=m {
                assert_abs_diff_eq!(coeffs.taps()[m - i], coeffs.taps()[m + i], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_lowpass_unity_dc_gain() {
        for cutoff in [100.0, 1000.0, 5000.0, 15000.0] {
            let coeffs = design(&spec(cutoff, FilterType::Lowpass));
            assert_abs_diff_eq!(coeffs.sum(), 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_concrete_lowpass_sum() {
        let coeffs = design(&spec(1000.0, FilterType::Lowpass));
        assert_eq!(coeffs.len(), 65);
        assert!((coeffs.sum() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_highpass_unit_energy() {
        for cutoff in [500.0, 5000.0, 19000.0] {
            let coeffs = design(&spec(cutoff, FilterType::Highpass));
            assert_abs_diff_eq!(coeffs.energy(), 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_highpass_center_tap_dominates() {
        let coeffs = design(&spec(5000.0, FilterType::Highpass));
        let m = coeffs.center();
        let center = coeffs.taps()[m];
        assert!(center > 0.0);
        assert!(coeffs.taps()[m - 1] < 0.0);
        assert!(
            coeffs
                .taps()
                .iter()
                .enumerate()
                .all(|(i, &t)| i == m || t.abs() < center)
        );
    }

    fn assert_taps_close(a: &CoefficientSet, b: &CoefficientSet) {
        assert_eq!(a.len(), b.len());
        for (x, y) in a.taps().iter().zip(b.taps()) {
            assert_abs_diff_eq!(*x, *y, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_cutoff_clamps_at_nyquist() {
        let at_limit = design(&spec(0.499 * 44100.0, FilterType::Lowpass));
        let beyond = design(&spec(30000.0, FilterType::Lowpass));
        assert_taps_close(&at_limit, &beyond);
        assert_abs_diff_eq!(spec(30000.0, FilterType::Lowpass).normalized_cutoff(), 0.499);
    }

    #[test]
    fn test_cutoff_clamps_at_zero() {
        let at_limit = design(&spec(0.001 * 44100.0, FilterType::Lowpass));
        assert_taps_close(&at_limit, &design(&spec(0.0, FilterType::Lowpass)));
        assert_taps_close(&at_limit, &design(&spec(-250.0, FilterType::Lowpass)));
        assert_abs_diff_eq!(spec(-250.0, FilterType::Lowpass).normalized_cutoff(), 0.001);
    }

    #[test]
    fn test_design_is_deterministic() {
        let s = spec(3333.0, FilterType::Highpass);
        assert_eq!(design(&s), design(&s));
    }

    #[test]
    fn test_filter_spec_rejects_bad_tap_count() {
        for taps in [0, 1, 2, 4, 64] {
            assert!(FilterSpec::new(1000.0, FilterType::Lowpass, taps, 44100.0).is_err());
        }
    }

    #[test]
    fn test_filter_spec_rejects_bad_sample_rate() {
        assert!(FilterSpec::new(1000.0, FilterType::Lowpass, 65, 0.0).is_err());
        assert!(FilterSpec::new(1000.0, FilterType::Lowpass, 65, -44100.0).is_err());
        assert!(FilterSpec::new(1000.0, FilterType::Lowpass, 65, f64::NAN).is_err());
        assert!(FilterSpec::new(f64::INFINITY, FilterType::Lowpass, 65, 44100.0).is_err());
    }

    #[test]
    fn test_coefficient_set_from_taps() {
        assert!(CoefficientSet::from_taps(vec![]).is_err());
        assert!(CoefficientSet::from_taps(vec![0.5, f64::NAN]).is_err());
        let set = CoefficientSet::from_taps(vec![0.25, 0.5, 0.25]).unwrap();
        assert_eq!(set.center(), 1);
        assert_abs_diff_eq!(set.sum(), 1.0);
    }

    #[test]
    fn test_design_records_sample_rate() {
        let set = design(&FilterSpec::new(1000.0, FilterType::Highpass, 65, 48000.0).unwrap());
        assert_eq!(set.sample_rate(), Some(48000.0));
        assert_eq!(CoefficientSet::identity().sample_rate(), None);
        assert_eq!(
            CoefficientSet::zeros(3).with_sample_rate(22050.0).sample_rate(),
            Some(22050.0)
        );
    }

    #[test]
    fn test_filter_type_parsing() {
        assert_eq!("lowpass".parse::<FilterType>().unwrap(), FilterType::Lowpass);
        assert_eq!("HighPass".parse::<FilterType>().unwrap(), FilterType::Highpass);
        assert_eq!("hp".parse::<FilterType>().unwrap(), FilterType::Highpass);
        assert!("bandpass".parse::<FilterType>().is_err());
    }

    #[test]
    fn test_filter_type_choice_index() {
        assert_eq!(FilterType::from_choice_index(0.0), FilterType::Lowpass);
        assert_eq!(FilterType::from_choice_index(1.0), FilterType::Highpass);
        assert_eq!(FilterType::from_choice_index(0.4), FilterType::Lowpass);
        assert_eq!(
            FilterType::from_choice_index(FilterType::Highpass.choice_index()),
            FilterType::Highpass
        );
    }
}
