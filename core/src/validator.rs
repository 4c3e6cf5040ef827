//! Structural QA gates for translations and synthesized audio.
//!
//! Both predicates are pure: same inputs, same verdict. They check shape,
//! never quality.

use crate::capabilities::AudioHandle;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QaViolation {
    #[error("translation is empty")]
    EmptyTranslation,

    #[error("translation is identical to the source text")]
    PassThrough,

    #[error("translation has {words} words, expected {min}..={max}")]
    WordCount { words: usize, min: usize, max: usize },

    #[error("no audio artifact")]
    MissingAudio,

    #[error("audio is {size} bytes, expected more than {min}")]
    AudioTooSmall { size: u64, min: u64 },

    #[error("audio lasts {actual:?}, expected at least {min:?}")]
    AudioTooShort { actual: Duration, min: Duration },
}

/// Translation gate: non-empty, not a pass-through, word count within range
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationQa {
    pub min_words: usize,
    pub max_words: usize,
}

impl Default for TranslationQa {
    fn default() -> Self {
        Self {
            min_words: 20,
            max_words: 500,
        }
    }
}

impl TranslationQa {
    pub fn validate(&self, source: &str, translated: &str) -> Result<(), QaViolation> {
        let out = translated.trim();
        if out.is_empty() {
            return Err(QaViolation::EmptyTranslation);
        }
        if out == source.trim() {
            return Err(QaViolation::PassThrough);
        }
        let words = out.split_whitespace().count();
        if words < self.min_words || words > self.max_words {
            return Err(QaViolation::WordCount {
                words,
                min: self.min_words,
                max: self.max_words,
            });
        }
        Ok(())
    }

    pub fn is_valid(&self, source: &str, translated: &str) -> bool {
        self.validate(source, translated).is_ok()
    }
}

/// Audio gate: artifact present, byte size above a floor, duration above a floor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioQa {
    /// Size must be strictly greater than this
    pub min_bytes: u64,
    pub min_duration_secs: f64,
}

impl Default for AudioQa {
    fn default() -> Self {
        Self {
            min_bytes: 100,
            min_duration_secs: 1.0,
        }
    }
}

impl AudioQa {
    pub fn validate(&self, audio: Option<&AudioHandle>) -> Result<(), QaViolation> {
        let audio = audio.ok_or(QaViolation::MissingAudio)?;
        if audio.byte_size() <= self.min_bytes {
            return Err(QaViolation::AudioTooSmall {
                size: audio.byte_size(),
                min: self.min_bytes,
            });
        }
        let min = Duration::from_secs_f64(self.min_duration_secs.max(0.0));
        if audio.duration() < min {
            return Err(QaViolation::AudioTooShort {
                actual: audio.duration(),
                min,
            });
        }
        Ok(())
    }

    pub fn is_valid(&self, audio: Option<&AudioHandle>) -> bool {
        self.validate(audio).is_ok()
    }
}
