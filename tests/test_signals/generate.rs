use std::f32::consts::PI;

/// Mono sine wave
pub fn sine(freq_hz: f32, amplitude: f32, sample_rate: u32, frames: usize) -> Vec<f32> {
    (0..frames)
        .map(|i| amplitude * (2.0 * PI * freq_hz * i as f32 / sample_rate as f32).sin())
        .collect()
}

/// Interleave equal-length channels into frames
#[allow(dead_code)]
pub fn interleave(channels: &[Vec<f32>]) -> Vec<f32> {
    let frames = channels.iter().map(Vec::len).min().unwrap_or(0);
    let mut out = Vec::with_capacity(frames * channels.len());
    for i in 0..frames {
        for channel in channels {
            out.push(channel[i]);
        }
    }
    out
}

pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
}

/// Output level relative to input in dB, ignoring the first `settle` samples
#[allow(dead_code)]
pub fn gain_db(input: &[f32], output: &[f32], settle: usize) -> f32 {
    20.0 * (rms(&output[settle..]) / rms(&input[settle..])).log10()
}
