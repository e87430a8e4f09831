use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use audio_thread_priority::RtPriorityHandle;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::error::{FilterError, Result};
use crate::signal_processing::ConvolutionEngine;

/// Plays a decoded buffer through the filter on the default output device
///
/// The output callback copies the next frames into the device buffer and
/// filters them in place with the convolution engine.
pub struct AudioPlayback {
    stream: cpal::Stream,
    position: Arc<AtomicUsize>,
    finished: Arc<AtomicBool>,
    frames: usize,
    _rt_handle: Option<RtPriorityHandle>,
}

impl AudioPlayback {
    /// Start playback
    ///
    /// # Arguments
    /// * `samples` - Interleaved audio with `channels` channels
    /// * `engine` - Engine prepared for `channels` channels
    /// * `block_size` - Requested device buffer size in frames
    pub fn new(
        samples: Arc<Vec<f32>>,
        channels: u16,
        sample_rate: u32,
        block_size: usize,
        mut engine: ConvolutionEngine,
    ) -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| FilterError::AudioDevice("No output device found".into()))?;

        match device.description() {
            Ok(desc) => log::info!("Output device: {:?}", desc),
            Err(_) => log::info!("Output device: Unknown"),
        }

        let stream_config = cpal::StreamConfig {
            channels,
            sample_rate,
            buffer_size: cpal::BufferSize::Fixed(block_size as u32),
        };

        let width = channels as usize;
        let frames = samples.len() / width;
        let position = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicBool::new(false));

        let cb_position = Arc::clone(&position);
        let cb_finished = Arc::clone(&finished);
        let mut frame = 0usize;

        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let start = (frame * width).min(samples.len());
                    let n = data.len().min(samples.len() - start);

                    data[..n].copy_from_slice(&samples[start..start + n]);
                    data[n..].fill(0.0);
                    engine.process_interleaved(data, width);

                    frame += n / width;
                    cb_position.store(frame, Ordering::Relaxed);
                    if n < data.len() {
                        cb_finished.store(true, Ordering::Release);
                    }
                },
                |err| log::error!("Audio stream error: {}", err),
                None,
            )
            .map_err(|e| FilterError::AudioStream(format!("{}", e)))?;

        // Attempt to promote to real-time priority
        let rt_handle =
            audio_thread_priority::promote_current_thread_to_real_time(block_size as u32, sample_rate);

        let rt_handle = match rt_handle {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::warn!("Could not set real-time priority: {}", e);
                None
            }
        };

        stream
            .play()
            .map_err(|e| FilterError::AudioStream(format!("{}", e)))?;

        Ok(Self {
            stream,
            position,
            finished,
            frames,
            _rt_handle: rt_handle,
        })
    }

    /// Frames handed to the device so far
    pub fn position(&self) -> usize {
        self.position.load(Ordering::Relaxed)
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }
}

impl Drop for AudioPlayback {
    fn drop(&mut self) {
        let _ = self.stream.pause();
    }
}
