mod csv;
mod json;
mod text;

use crate::signal_processing::SpectrumPoint;

pub use self::csv::CsvFormatter;
pub use self::json::JsonFormatter;
pub use self::text::TextFormatter;

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Csv,
}

/// Line-oriented rendering of responses and coefficient sets
pub trait Formatter: Send {
    fn format_point(&self, point: &SpectrumPoint) -> String;

    fn format_tap(&self, index: usize, tap: f64) -> String;

    fn response_header(&self) -> Option<&'static str> {
        None
    }

    fn taps_header(&self) -> Option<&'static str> {
        None
    }
}

pub fn create_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
        OutputFormat::Csv => Box::new(CsvFormatter),
    }
}
