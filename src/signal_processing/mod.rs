pub mod convolution;
pub mod delay_line;
pub mod design;
pub mod publisher;
pub mod spectrum;

pub use convolution::{ConvolutionEngine, OutputClip};
pub use delay_line::DelayLine;
pub use design::{CoefficientSet, FilterSpec, FilterType, design, validate_tap_count};
pub use publisher::{CoefficientPublisher, CoefficientReader, SharedCoefficients};
pub use spectrum::{MagnitudeSpectrum, SpectralAnalyzer, SpectrumPoint, gain_to_db};
