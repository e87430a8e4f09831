use super::Formatter;
use crate::signal_processing::SpectrumPoint;

pub struct TextFormatter;

impl Formatter for TextFormatter {
    fn format_point(&self, point: &SpectrumPoint) -> String {
        format!(
            "{:>9.1} Hz {:>7.2} dB",
            point.frequency_hz, point.magnitude_db
        )
    }

    fn format_tap(&self, index: usize, tap: f64) -> String {
        format!("h[{:>4}] = {:>12.9}", index, tap)
    }
}
