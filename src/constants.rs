//! Numeric constants for filter design and analysis stability
//!
//! These guard the windowed-sinc design and the spectral analyzer against
//! degenerate inputs (cutoffs at DC/Nyquist, silent coefficient sets).

/// Lower bound of the normalized cutoff (cutoff / sample rate).
pub const MIN_NORMALIZED_CUTOFF: f64 = 0.001;

/// Upper bound of the normalized cutoff, kept strictly below Nyquist.
pub const MAX_NORMALIZED_CUTOFF: f64 = 0.499;

/// Normalization divisors below this magnitude are skipped.
/// Applies to the lowpass tap sum, the highpass tap energy and the
/// analyzer's peak bin.
pub const NORMALIZATION_EPSILON: f64 = 1e-6;

/// Default decibel floor for the magnitude response.
pub const DEFAULT_FLOOR_DB: f64 = -80.0;

/// Default symmetric output limit applied after convolution.
pub const DEFAULT_OUTPUT_LIMIT: f32 = 0.95;

/// Minimum number of taps a designed filter may have.
pub const MIN_TAP_COUNT: usize = 3;
