use crate::config::FirscopeConfig;
use crate::control::{ControlHandle, ControlWorker, FilterState, ParameterChange, ParameterId};
use crate::error::{FilterError, Result};
use crate::signal_processing::{
    CoefficientPublisher, ConvolutionEngine, SharedCoefficients, SpectralAnalyzer, design,
};

/// Top-level filter core
///
/// Owns the coefficient publisher and the control worker. `prepare` hands
/// out a [`ConvolutionEngine`] for the audio thread; parameter changes and
/// analyzers are served from the control side.
pub struct FirProcessor {
    config: FirscopeConfig,
    publisher: CoefficientPublisher,
    worker: ControlWorker,
    sample_rate: u32,
}

impl FirProcessor {
    /// Validate `config` and design the default filter at the configured rate
    pub fn new(config: FirscopeConfig) -> Result<Self> {
        config.validate()?;

        let sample_rate = config.audio.sample_rate;
        let state = FilterState::from_config(&config.filter);
        let spec = state.spec(config.filter.tap_count, sample_rate as f64)?;
        let publisher = CoefficientPublisher::new(design(&spec));
        let worker = ControlWorker::spawn(
            &config.filter,
            sample_rate as f64,
            publisher.clone(),
            state,
        )?;

        log::info!(
            "FIR core ready: {} taps, {} at {:.1} Hz, {} Hz",
            config.filter.tap_count,
            state.filter_type,
            state.cutoff_hz,
            sample_rate
        );

        Ok(Self {
            config,
            publisher,
            worker,
            sample_rate,
        })
    }

    /// Configure for a stream and return its convolution engine
    ///
    /// A sample rate change redesigns the current state at the new rate
    /// before the engine is built.
    pub fn prepare(
        &mut self,
        sample_rate: u32,
        block_size: usize,
        channels: usize,
    ) -> Result<ConvolutionEngine> {
        if sample_rate == 0 || block_size == 0 || channels == 0 {
            return Err(FilterError::Config(format!(
                "invalid stream format: {} Hz, {} frames, {} channels",
                sample_rate, block_size, channels
            )));
        }

        if sample_rate != self.sample_rate {
            self.worker.handle().set_sample_rate(sample_rate as f64)?;
            self.sample_rate = sample_rate;
            log::info!("Redesigned for {} Hz", sample_rate);
        }

        log::debug!(
            "Prepared engine: {} channels, block size {}",
            channels,
            block_size
        );

        Ok(ConvolutionEngine::new(
            self.publisher.subscribe(),
            channels,
            self.config.filter.tap_count,
            self.config.filter.output_clip(),
        ))
    }

    /// Record a parameter change; never blocks
    pub fn set_parameter(&self, id: ParameterId, value: f32) -> bool {
        self.worker.handle().set_parameter(ParameterChange { id, value })
    }

    /// Record a parameter change addressed by its string id
    pub fn set_parameter_by_name(&self, name: &str, value: f32) -> Result<bool> {
        let id: ParameterId = name.parse()?;
        Ok(self.set_parameter(id, value))
    }

    /// Latest requested state
    pub fn state(&self) -> FilterState {
        self.worker.handle().state()
    }

    pub fn restore_state(&self, state: FilterState) {
        self.worker.handle().restore(state);
    }

    /// Handle for other control threads (UI, stdin)
    pub fn control(&self) -> ControlHandle {
        self.worker.handle().clone()
    }

    /// Wait until every recorded change has been published
    pub fn sync(&self) -> Result<()> {
        self.worker.handle().sync()
    }

    /// New analyzer following this processor's coefficients
    pub fn analyzer(&self) -> Result<SpectralAnalyzer> {
        SpectralAnalyzer::new(
            self.publisher.subscribe(),
            self.sample_rate as f64,
            self.config.analyzer.fft_size,
            self.config.analyzer.floor_db,
        )
    }

    /// Most recently published coefficient set
    pub fn coefficients(&self) -> SharedCoefficients {
        self.publisher.latest()
    }

    pub fn publisher(&self) -> &CoefficientPublisher {
        &self.publisher
    }

    /// Group delay of the linear-phase filter, in samples
    pub fn latency_samples(&self) -> usize {
        self.config.filter.tap_count / 2
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn config(&self) -> &FirscopeConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal_processing::{FilterSpec, FilterType};

    #[test]
    fn test_default_design_is_published() {
        let processor = FirProcessor::new(FirscopeConfig::default()).unwrap();
        let expected = design(&FilterSpec::new(1000.0, FilterType::Lowpass, 65, 44100.0).unwrap());
        assert_eq!(*processor.coefficients(), expected);
        assert_eq!(processor.latency_samples(), 32);
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut config = FirscopeConfig::default();
        config.filter.tap_count = 10;
        assert!(FirProcessor::new(config).is_err());
    }

    #[test]
    fn test_prepare_rejects_empty_stream() {
        let mut processor = FirProcessor::new(FirscopeConfig::default()).unwrap();
        assert!(processor.prepare(44100, 512, 0).is_err());
        assert!(processor.prepare(0, 512, 2).is_err());
    }

    #[test]
    fn test_prepare_redesigns_for_new_rate() {
        let mut processor = FirProcessor::new(FirscopeConfig::default()).unwrap();
        processor.set_parameter(ParameterId::Cutoff, 3000.0);
        processor.sync().unwrap();

        let engine = processor.prepare(48000, 256, 2).unwrap();
        assert_eq!(engine.channels(), 2);
        assert_eq!(processor.sample_rate(), 48000);

        let expected = design(&FilterSpec::new(3000.0, FilterType::Lowpass, 65, 48000.0).unwrap());
        assert_eq!(*processor.coefficients(), expected);

        // Later changes are designed at the new rate too
        processor.set_parameter(ParameterId::Type, 1.0);
        processor.sync().unwrap();
        let expected = design(&FilterSpec::new(3000.0, FilterType::Highpass, 65, 48000.0).unwrap());
        assert_eq!(*processor.coefficients(), expected);
    }

    #[test]
    fn test_set_parameter_by_name() {
        let processor = FirProcessor::new(FirscopeConfig::default()).unwrap();
        assert!(processor.set_parameter_by_name("cutoff", 800.0).unwrap());
        assert!(processor.set_parameter_by_name("q", 1.0).is_err());
        assert_eq!(processor.state().cutoff_hz, 800.0);
    }
}
