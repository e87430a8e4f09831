pub mod playback;
pub mod source;

pub use playback::AudioPlayback;
pub use source::{AudioSource, WavFileSource};
