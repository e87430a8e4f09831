use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use hound::WavReader;

use crate::error::{FilterError, Result};

/// Block-wise supplier of interleaved audio
pub trait AudioSource: Send {
    /// Next block of interleaved samples, `None` once exhausted
    fn next_buffer(&mut self) -> Result<Option<Vec<f32>>>;
    fn sample_rate(&self) -> u32;
    fn channels(&self) -> u16;
}

/// A WAV file decoded to interleaved `f32`, served in blocks of frames
pub struct WavFileSource {
    samples: Vec<f32>,
    position: usize,
    block_frames: usize,
    channels: u16,
    sample_rate: u32,
}

impl WavFileSource {
    /// Open and decode `path`
    ///
    /// Integer formats are scaled to `[-1.0, 1.0)`.
    pub fn new<P: AsRef<Path>>(path: P, block_frames: usize) -> Result<Self> {
        if block_frames == 0 {
            return Err(FilterError::Config("block size must be positive".into()));
        }

        let reader = WavReader::open(path.as_ref())?;
        let spec = reader.spec();

        if spec.channels == 0 {
            return Err(FilterError::Config("WAV file has no channels".into()));
        }

        let samples = Self::read_samples(reader, &spec)?;

        log::debug!(
            "Opened {}: {} Hz, {} channels, {} frames",
            path.as_ref().display(),
            spec.sample_rate,
            spec.channels,
            samples.len() / spec.channels as usize
        );

        Ok(Self {
            samples,
            position: 0,
            block_frames,
            channels: spec.channels,
            sample_rate: spec.sample_rate,
        })
    }

    fn read_samples(
        mut reader: WavReader<BufReader<File>>,
        spec: &hound::WavSpec,
    ) -> Result<Vec<f32>> {
        let samples = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<std::result::Result<Vec<_>, _>>()?,
            hound::SampleFormat::Int => {
                let max_val = 2_i64.pow(spec.bits_per_sample as u32 - 1) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / max_val))
                    .collect::<std::result::Result<Vec<_>, _>>()?
            }
        };
        Ok(samples)
    }

    /// Total number of frames in the file
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    /// All decoded samples, interleaved
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }
}

impl AudioSource for WavFileSource {
    fn next_buffer(&mut self) -> Result<Option<Vec<f32>>> {
        if self.position >= self.samples.len() {
            return Ok(None);
        }

        let chunk_size = self.block_frames * self.channels as usize;
        let end = (self.position + chunk_size).min(self.samples.len());
        let chunk = self.samples[self.position..end].to_vec();
        self.position = end;

        Ok(Some(chunk))
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wav::save_wav;

    #[test]
    fn test_reads_blocks_of_frames() {
        let path = std::env::temp_dir().join(format!("firscope_source_{}.wav", std::process::id()));
        let samples: Vec<f32> = (0..30).map(|i| i as f32 / 30.0).collect();
        save_wav(&path, &samples, 22050, 3).unwrap();

        let mut source = WavFileSource::new(&path, 4).unwrap();
        assert_eq!(source.channels(), 3);
        assert_eq!(source.sample_rate(), 22050);
        assert_eq!(source.frames(), 10);

        let mut collected = Vec::new();
        let mut blocks = 0;
        while let Some(block) = source.next_buffer().unwrap() {
            assert_eq!(block.len() % 3, 0);
            collected.extend(block);
            blocks += 1;
        }
        assert_eq!(blocks, 3);
        assert_eq!(collected, samples);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_missing_file_is_wav_error() {
        let result = WavFileSource::new("/nonexistent/firscope.wav", 64);
        assert!(matches!(result, Err(FilterError::Wav(_))));
    }
}
