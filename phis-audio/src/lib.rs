// Audio capabilities for the broadcast pipeline

// Shared audio utilities
pub(crate) mod utils;

pub mod wav;

pub use wav::{encode_pcm16, parse_wav, probe_wav, WavError, WavInfo};

#[cfg(feature = "tts")]
pub mod tts;

#[cfg(feature = "tts")]
pub use tts::{LocalTts, TtsConfig, TtsEngine};
