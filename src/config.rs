//! Configuration for the firscope filter core.
//!
//! Every section has working defaults, so a TOML file only needs the keys
//! it changes:
//!
//! ```toml
//! [filter]
//! tap_count = 101
//! default_cutoff_hz = 2500.0
//! clip_output = false
//!
//! [analyzer]
//! fft_size = 2048
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::constants::{DEFAULT_FLOOR_DB, DEFAULT_OUTPUT_LIMIT};
use crate::error::{FilterError, Result};
use crate::signal_processing::{FilterType, OutputClip, validate_tap_count};

/// System-wide configuration
///
/// # Example
/// ```
/// use firscope::config::FirscopeConfig;
///
/// let mut config = FirscopeConfig::default();
/// config.filter.tap_count = 101;
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FirscopeConfig {
    /// Filter design and parameter ranges
    pub filter: FilterConfig,
    /// Stream format
    pub audio: AudioConfig,
    /// Frequency response display
    pub analyzer: AnalyzerConfig,
}

/// Filter design configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Number of FIR taps (odd, at least 3)
    pub tap_count: usize,
    /// Lowest cutoff the parameter accepts in Hz
    pub cutoff_min_hz: f32,
    /// Highest cutoff the parameter accepts in Hz
    pub cutoff_max_hz: f32,
    /// Cutoff used until the first parameter change
    pub default_cutoff_hz: f32,
    /// Filter type used until the first parameter change
    pub default_type: FilterType,
    /// Whether the type parameter is exposed; lowpass-only when false
    pub type_choice: bool,
    /// Clamp the filtered output to `[-output_limit, output_limit]`
    pub clip_output: bool,
    /// Symmetric output limit used when `clip_output` is set
    pub output_limit: f32,
}

/// Audio stream configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Frames per processing block
    pub block_size: usize,
    /// Number of channels
    pub channels: u16,
}

/// Spectral analyzer configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Transform size (power of two, not smaller than the tap count)
    pub fft_size: usize,
    /// Display refresh rate in Hz
    pub refresh_hz: f32,
    /// Lowest magnitude reported, in dB
    pub floor_db: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            tap_count: 65,
            cutoff_min_hz: 50.0,
            cutoff_max_hz: 20000.0,
            default_cutoff_hz: 1000.0,
            default_type: FilterType::Lowpass,
            type_choice: true,
            clip_output: true,
            output_limit: DEFAULT_OUTPUT_LIMIT,
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            block_size: 512,
            channels: 2,
        }
    }
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            fft_size: 1024,
            refresh_hz: 30.0,
            floor_db: DEFAULT_FLOOR_DB,
        }
    }
}

impl FilterConfig {
    /// Output policy for the convolution engine
    pub fn output_clip(&self) -> OutputClip {
        if self.clip_output {
            OutputClip::Limit(self.output_limit)
        } else {
            OutputClip::Off
        }
    }

    /// Clamp a cutoff into the configured parameter range
    pub fn clamp_cutoff(&self, cutoff_hz: f32) -> f32 {
        cutoff_hz.clamp(self.cutoff_min_hz, self.cutoff_max_hz)
    }

    pub fn validate(&self) -> Result<()> {
        validate_tap_count(self.tap_count)?;

        if self.cutoff_min_hz.is_nan()
            || self.cutoff_min_hz <= 0.0
            || !self.cutoff_max_hz.is_finite()
            || self.cutoff_min_hz > self.cutoff_max_hz
        {
            return Err(FilterError::Config(format!(
                "cutoff range must be positive and ordered, got {}..{} Hz",
                self.cutoff_min_hz, self.cutoff_max_hz
            )));
        }

        if !self.default_cutoff_hz.is_finite() {
            return Err(FilterError::Config(format!(
                "default cutoff must be finite, got {}",
                self.default_cutoff_hz
            )));
        }

        if self.clip_output && (self.output_limit.is_nan() || self.output_limit <= 0.0) {
            return Err(FilterError::Config(format!(
                "output limit must be positive, got {}",
                self.output_limit
            )));
        }

        Ok(())
    }
}

impl AudioConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(FilterError::Config("sample rate must be positive".into()));
        }
        if self.block_size == 0 {
            return Err(FilterError::Config("block size must be positive".into()));
        }
        if self.channels == 0 {
            return Err(FilterError::Config("channel count must be positive".into()));
        }
        Ok(())
    }
}

impl AnalyzerConfig {
    pub fn validate(&self, tap_count: usize) -> Result<()> {
        if !self.fft_size.is_power_of_two() || self.fft_size < tap_count {
            return Err(FilterError::Config(format!(
                "FFT size must be a power of two >= tap count ({}), got {}",
                tap_count, self.fft_size
            )));
        }
        if self.refresh_hz.is_nan() || self.refresh_hz <= 0.0 {
            return Err(FilterError::Config(format!(
                "analyzer refresh rate must be positive, got {}",
                self.refresh_hz
            )));
        }
        Ok(())
    }
}

impl FirscopeConfig {
    /// Check every section; configuration errors are fatal before streaming
    pub fn validate(&self) -> Result<()> {
        self.filter.validate()?;
        self.audio.validate()?;
        self.analyzer.validate(self.filter.tap_count)?;
        Ok(())
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        log::debug!("Loaded config from {}", path.as_ref().display());
        Self::from_toml_str(&text)
    }
}
