use super::delay_line::DelayLine;
use super::publisher::CoefficientReader;

/// Post-convolution output policy
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputClip {
    /// Pass the FIR output through unchanged
    Off,
    /// Clamp to `[-level, level]`
    Limit(f32),
}

impl OutputClip {
    #[inline]
    pub fn apply(self, sample: f32) -> f32 {
        match self {
            OutputClip::Off => sample,
            OutputClip::Limit(level) => sample.clamp(-level, level),
        }
    }
}

/// Streaming FIR convolution for one audio stream
///
/// Lives on the real-time audio thread. Each block picks up the latest
/// published coefficient set once, then filters every channel in place.
/// After construction nothing here allocates, locks or frees.
pub struct ConvolutionEngine {
    reader: CoefficientReader,
    delay_lines: Vec<DelayLine>,
    clip: OutputClip,
}

impl ConvolutionEngine {
    /// Create an engine for `channels` channels
    ///
    /// # Arguments
    /// * `reader` - Subscription to the coefficient publisher
    /// * `channels` - Number of channels to filter
    /// * `max_taps` - Delay line capacity reserved per channel; published
    ///   sets must not be longer
    /// * `clip` - Output limiting policy
    pub fn new(
        mut reader: CoefficientReader,
        channels: usize,
        max_taps: usize,
        clip: OutputClip,
    ) -> Self {
        let len = reader.current().len();
        let capacity = max_taps.max(len);
        let delay_lines = (0..channels)
            .map(|_| DelayLine::with_capacity(len, capacity))
            .collect();

        Self {
            reader,
            delay_lines,
            clip,
        }
    }

    pub fn channels(&self) -> usize {
        self.delay_lines.len()
    }

    pub fn clip(&self) -> OutputClip {
        self.clip
    }

    /// Length of the coefficient set the delay lines are sized for
    pub fn active_tap_count(&self) -> usize {
        self.delay_lines
            .first()
            .map(DelayLine::len)
            .unwrap_or_else(|| self.reader.last_seen().len())
    }

    /// Zero every channel's history (e.g. on transport stop)
    pub fn reset(&mut self) {
        for line in &mut self.delay_lines {
            line.clear();
        }
    }

    /// Filter one block of planar audio in place
    ///
    /// Channels beyond the engine's channel count are silenced.
    pub fn process_planar(&mut self, channels: &mut [&mut [f32]]) {
        let clip = self.clip;
        let taps = self.reader.current().taps();

        for line in &mut self.delay_lines {
            if line.len() != taps.len() {
                line.reset(taps.len());
            }
        }

        for (index, channel) in channels.iter_mut().enumerate() {
            match self.delay_lines.get_mut(index) {
                Some(line) => {
                    for sample in channel.iter_mut() {
                        *sample = clip.apply(line.process(*sample, taps));
                    }
                }
                None => channel.fill(0.0),
            }
        }
    }

    /// Filter one block of interleaved audio in place
    ///
    /// `channels` is the frame width of `data`; channels beyond the
    /// engine's channel count are silenced.
    pub fn process_interleaved(&mut self, data: &mut [f32], channels: usize) {
        if channels == 0 {
            return;
        }

        let clip = self.clip;
        let taps = self.reader.current().taps();

        for line in &mut self.delay_lines {
            if line.len() != taps.len() {
                line.reset(taps.len());
            }
        }

        for frame in data.chunks_mut(channels) {
            for (index, sample) in frame.iter_mut().enumerate() {
                *sample = match self.delay_lines.get_mut(index) {
                    Some(line) => clip.apply(line.process(*sample, taps)),
                    None => 0.0,
                };
            }
        }
    }

    /// Filter a single channel's block in place
    pub fn process_channel(&mut self, channel: usize, samples: &mut [f32]) {
        let clip = self.clip;
        let taps = self.reader.current().taps();

        let Some(line) = self.delay_lines.get_mut(channel) else {
            samples.fill(0.0);
            return;
        };

        if line.len() != taps.len() {
            line.reset(taps.len());
        }

        for sample in samples.iter_mut() {
            *sample = clip.apply(line.process(*sample, taps));
        }
    }
}
