//! RIFF/WAVE header probing.
//!
//! Walks the chunk list for `fmt ` and `data` to get the format and the
//! payload length, from which the playback duration follows.

use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WavError {
    #[error("not a RIFF/WAVE file")]
    NotWave,

    #[error("missing {0} chunk")]
    MissingChunk(&'static str),

    #[error("unsupported format: {0}")]
    Unsupported(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavInfo {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    /// Bytes of sample data actually present
    pub data_len: u32,
}

impl WavInfo {
    /// `None` when the header's rate does not fit in 32 bits
    pub fn byte_rate(&self) -> Option<u32> {
        self.sample_rate
            .checked_mul(u32::from(self.channels))?
            .checked_mul(u32::from(self.bits_per_sample))
            .map(|bits| bits / 8)
    }

    pub fn duration(&self) -> Duration {
        match self.byte_rate() {
            None | Some(0) => Duration::ZERO,
            Some(rate) => Duration::from_secs_f64(f64::from(self.data_len) / f64::from(rate)),
        }
    }
}

fn read_u16(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

/// Parse the header of an in-memory WAV file
pub fn parse_wav(buf: &[u8]) -> Result<WavInfo, WavError> {
    if buf.len() < 12 || &buf[0..4] != b"RIFF" || &buf[8..12] != b"WAVE" {
        return Err(WavError::NotWave);
    }

    let mut idx = 12;
    let mut format: Option<(u32, u16, u16)> = None;
    while idx + 8 <= buf.len() {
        let chunk_id = &buf[idx..idx + 4];
        let sz = read_u32(buf, idx + 4) as usize;
        let body = idx + 8;

        if chunk_id == b"fmt " {
            if body + 16 > buf.len() {
                return Err(WavError::MissingChunk("fmt"));
            }
            let audio_format = read_u16(buf, body);
            if audio_format != 1 && audio_format != 0xFFFE {
                return Err(WavError::Unsupported(format!("format tag {audio_format}")));
            }
            let channels = read_u16(buf, body + 2);
            let sample_rate = read_u32(buf, body + 4);
            let bits = read_u16(buf, body + 14);
            let fits = sample_rate
                .checked_mul(u32::from(channels))
                .and_then(|r| r.checked_mul(u32::from(bits)))
                .is_some();
            if !fits {
                return Err(WavError::Unsupported(format!(
                    "{sample_rate} Hz x {channels} ch x {bits} bit overflows the byte rate"
                )));
            }
            format = Some((sample_rate, channels, bits));
        } else if chunk_id == b"data" {
            let (sample_rate, channels, bits_per_sample) =
                format.ok_or(WavError::MissingChunk("fmt"))?;
            // streamed writers leave the size as 0 or 0xFFFFFFFF
            let available = buf.len() - body;
            let data_len = if sz == 0 || sz > available { available } else { sz };
            return Ok(WavInfo {
                sample_rate,
                channels,
                bits_per_sample,
                data_len: data_len as u32,
            });
        }

        // chunks are word aligned
        idx = body.saturating_add(sz).saturating_add(sz & 1);
    }

    Err(WavError::MissingChunk("data"))
}

/// Read and parse a WAV file from disk
pub fn probe_wav(path: impl AsRef<Path>) -> Result<WavInfo, WavError> {
    let buf = std::fs::read(path)?;
    parse_wav(&buf)
}

/// Serialize 16-bit PCM samples as a canonical WAV file
pub fn encode_pcm16(sample_rate: u32, channels: u16, samples: &[i16]) -> Vec<u8> {
    let data_len = (samples.len() * 2) as u32;
    let byte_rate = sample_rate * u32::from(channels) * 2;
    let mut out = Vec::with_capacity(44 + data_len as usize);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&(channels * 2).to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    for s in samples {
        out.extend_from_slice(&s.to_le_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_from_header() {
        let wav = encode_pcm16(16_000, 1, &vec![0i16; 24_000]);
        let info = parse_wav(&wav).unwrap();
        assert_eq!(info.sample_rate, 16_000);
        assert_eq!(info.channels, 1);
        assert_eq!(info.data_len, 48_000);
        assert_eq!(info.duration(), Duration::from_millis(1500));
    }

    #[test]
    fn test_skips_unknown_chunks() {
        let mut wav = encode_pcm16(8_000, 1, &vec![0i16; 8_000]);
        // insert an odd-sized LIST chunk (plus pad byte) between fmt and data
        let list: Vec<u8> = [&b"LIST"[..], &3u32.to_le_bytes()[..], &b"abc"[..], &[0u8][..]].concat();
        wav.splice(36..36, list);
        let info = parse_wav(&wav).unwrap();
        assert_eq!(info.duration(), Duration::from_secs(1));
    }

    #[test]
    fn test_streamed_size_clamped() {
        let mut wav = encode_pcm16(16_000, 1, &vec![0i16; 16_000]);
        wav[40..44].copy_from_slice(&u32::MAX.to_le_bytes());
        let info = parse_wav(&wav).unwrap();
        assert_eq!(info.data_len, 32_000);
    }

    #[test]
    fn test_rejects_non_wave() {
        assert!(matches!(parse_wav(b"ID3\x03mp3 data here"), Err(WavError::NotWave)));
        let header_only = &encode_pcm16(16_000, 1, &[])[..36];
        assert!(matches!(
            parse_wav(header_only),
            Err(WavError::MissingChunk("data"))
        ));
    }

    #[test]
    fn test_oversized_format_rejected() {
        let mut wav = encode_pcm16(16_000, 1, &vec![0i16; 100]);
        // 4 GHz sample rate with 8 channels of 32-bit audio
        wav[22..24].copy_from_slice(&8u16.to_le_bytes());
        wav[24..28].copy_from_slice(&4_000_000_000u32.to_le_bytes());
        wav[34..36].copy_from_slice(&32u16.to_le_bytes());
        assert!(matches!(parse_wav(&wav), Err(WavError::Unsupported(_))));

        let info = WavInfo {
            sample_rate: u32::MAX,
            channels: 2,
            bits_per_sample: 16,
            data_len: 1_000,
        };
        assert_eq!(info.byte_rate(), None);
        assert_eq!(info.duration(), Duration::ZERO);
    }
}
