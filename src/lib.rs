pub mod audio;
pub mod config;
pub mod constants;
pub mod control;
pub mod error;
pub mod output;
pub mod processor;
pub mod signal_processing;
pub mod wav;

pub use config::FirscopeConfig;
pub use control::{ControlHandle, FilterState, ParameterChange, ParameterId};
pub use error::{FilterError, Result};
pub use processor::FirProcessor;
pub use wav::save_wav;
