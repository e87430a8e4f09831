use serde::Serialize;

use super::Formatter;
use crate::signal_processing::SpectrumPoint;

#[derive(Serialize)]
struct TapRow {
    index: usize,
    tap: f64,
}

/// One JSON object per line
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format_point(&self, point: &SpectrumPoint) -> String {
        to_json_line(point)
    }

    fn format_tap(&self, index: usize, tap: f64) -> String {
        to_json_line(&TapRow { index, tap })
    }
}

fn to_json_line<T: Serialize>(row: &T) -> String {
    serde_json::to_string(row).unwrap_or_else(|e| {
        log::warn!("JSON serialization failed: {}", e);
        String::from("null")
    })
}
