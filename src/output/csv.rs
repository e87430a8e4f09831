use super::Formatter;
use crate::signal_processing::SpectrumPoint;

pub struct CsvFormatter;

impl Formatter for CsvFormatter {
    fn format_point(&self, point: &SpectrumPoint) -> String {
        format!("{:.3},{:.3}", point.frequency_hz, point.magnitude_db)
    }

    fn format_tap(&self, index: usize, tap: f64) -> String {
        format!("{},{:.9}", index, tap)
    }

    fn response_header(&self) -> Option<&'static str> {
        Some("frequency_hz,magnitude_db")
    }

    fn taps_header(&self) -> Option<&'static str> {
        Some("index,tap")
    }
}
