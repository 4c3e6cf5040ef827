//! Local text-to-speech synthesizer
//!
//! Implements the `Synthesizer` capability with local CLI engines:
//! - Prefer Piper (higher quality, requires a voice model)
//! - Fall back to espeak-ng (widely available)
//! - With neither present, synthesis fails terminally
//!
//! Output is a WAV file in `audio_dir`, optionally transcoded to MP3 with ffmpeg
//! for WhatsApp delivery. Duration always comes from the WAV header.
//!
//! Engine processes are spawned with `kill_on_drop`, so a synthesis that hits
//! its timeout takes the running piper/espeak/ffmpeg child down with it.
//!
//! Env overrides:
//! - PIPER_BIN, PIPER_VOICE
//! - ESPEAK_BIN, ESPEAK_VOICE
//! - FFMPEG_BIN, TTS_MP3
//! - TTS_TIMEOUT_MS, TTS_AUDIO_DIR, TTS_SAMPLE_RATE

use crate::utils::gen_id;
use crate::wav::probe_wav;
use async_trait::async_trait;
use phis_core::capabilities::{AudioHandle, CapabilityError, CapabilityResult, Synthesizer};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, SystemTime};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::task;
use tokio::time::timeout;
use tracing::{debug, info, warn};

#[derive(Clone, Debug)]
pub struct TtsConfig {
    pub audio_dir: PathBuf,
    pub timeout_ms: u64,
    pub sample_rate: u32,
    /// Speech rate multiplier (0.5–2.0)
    pub rate: f32,
    pub piper_bin: Option<PathBuf>,
    pub piper_voice: Option<PathBuf>,
    pub espeak_bin: Option<PathBuf>,
    pub espeak_voice: Option<String>,
    pub ffmpeg_bin: Option<PathBuf>,
    pub transcode_mp3: bool,
}

impl Default for TtsConfig {
    fn default() -> Self {
        let audio_dir = std::env::var("TTS_AUDIO_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("temp_audio"));
        let timeout_ms = std::env::var("TTS_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(60_000);
        let sample_rate = std::env::var("TTS_SAMPLE_RATE")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(22_050);
        let transcode_mp3 = std::env::var("TTS_MP3")
            .map(|v| !matches!(v.as_str(), "0" | "false" | "no"))
            .unwrap_or(true);

        Self {
            audio_dir,
            timeout_ms,
            sample_rate,
            rate: 1.0,
            piper_bin: get_from_env_or_path("PIPER_BIN", "piper"),
            piper_voice: std::env::var("PIPER_VOICE").ok().map(PathBuf::from),
            espeak_bin: get_from_env_or_path("ESPEAK_BIN", "espeak-ng")
                .or_else(|| get_from_path("espeak")),
            espeak_voice: std::env::var("ESPEAK_VOICE").ok().filter(|s| !s.is_empty()),
            ffmpeg_bin: get_from_env_or_path("FFMPEG_BIN", "ffmpeg"),
            transcode_mp3,
        }
    }
}

fn get_from_env_or_path(env_key: &str, default_bin: &str) -> Option<PathBuf> {
    if let Ok(p) = std::env::var(env_key) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return Some(pb);
        }
    }
    get_from_path(default_bin)
}

fn get_from_path(bin: &str) -> Option<PathBuf> {
    if bin.contains(std::path::MAIN_SEPARATOR) {
        let p = PathBuf::from(bin);
        return if p.exists() { Some(p) } else { None };
    }
    let paths_os = std::env::var_os("PATH")?;
    std::env::split_paths(&paths_os)
        .map(|dir| dir.join(bin))
        .find(|candidate| candidate.exists())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtsEngine {
    Piper,
    Espeak,
}

impl TtsEngine {
    pub fn as_str(&self) -> &'static str {
        match self {
            TtsEngine::Piper => "piper",
            TtsEngine::Espeak => "espeak-ng",
        }
    }
}

pub struct LocalTts {
    cfg: TtsConfig,
}

impl LocalTts {
    pub fn new(cfg: TtsConfig) -> Self {
        match (&cfg.piper_bin, &cfg.espeak_bin) {
            (Some(p), _) => info!(target: "tts", bin = ?p, voice = ?cfg.piper_voice, "Using Piper"),
            (None, Some(e)) => info!(target: "tts", bin = ?e, "Using espeak-ng"),
            (None, None) => warn!(target: "tts", "No TTS engine detected; synthesis will fail"),
        }
        if cfg.transcode_mp3 && cfg.ffmpeg_bin.is_none() {
            warn!(target: "tts", "ffmpeg not found; audio will be sent as WAV");
        }
        Self { cfg }
    }

    pub fn from_env() -> Self {
        Self::new(TtsConfig::default())
    }

    pub fn engine(&self) -> Option<TtsEngine> {
        if self.cfg.piper_bin.is_some() {
            Some(TtsEngine::Piper)
        } else if self.cfg.espeak_bin.is_some() {
            Some(TtsEngine::Espeak)
        } else {
            None
        }
    }

    pub fn audio_dir(&self) -> &Path {
        &self.cfg.audio_dir
    }

    /// Delete generated audio older than `max_age`; returns how many files went
    pub async fn prune_older_than(&self, max_age: Duration) -> std::io::Result<usize> {
        let dir = self.cfg.audio_dir.clone();
        task::spawn_blocking(move || prune_dir(&dir, max_age))
            .await
            .map_err(std::io::Error::other)?
    }
}

fn prune_dir(dir: &Path, max_age: Duration) -> std::io::Result<usize> {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };
    let now = SystemTime::now();
    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        let is_audio = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("wav" | "mp3")
        );
        if !is_audio {
            continue;
        }
        let age = entry
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .and_then(|t| now.duration_since(t).ok())
            .unwrap_or_default();
        if age >= max_age && std::fs::remove_file(&path).is_ok() {
            removed += 1;
        }
    }
    if removed > 0 {
        info!(target: "tts", dir = ?dir, removed, "Pruned old audio");
    }
    Ok(removed)
}

#[async_trait]
impl Synthesizer for LocalTts {
    async fn synthesize(&self, text: &str) -> CapabilityResult<AudioHandle> {
        if text.trim().is_empty() {
            return Err(CapabilityError::ValidationFailed("empty text".into()));
        }
        let engine = self
            .engine()
            .ok_or_else(|| CapabilityError::Terminal("no TTS engine available".into()))?;

        let limit = Duration::from_millis(self.cfg.timeout_ms);
        match timeout(limit, synthesize_with(&self.cfg, engine, text)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(target: "tts", timeout_ms = self.cfg.timeout_ms, "Synthesis timed out");
                Err(CapabilityError::Timeout(limit))
            }
        }
    }
}

async fn synthesize_with(
    cfg: &TtsConfig,
    engine: TtsEngine,
    text: &str,
) -> CapabilityResult<AudioHandle> {
    tokio::fs::create_dir_all(&cfg.audio_dir)
        .await
        .map_err(io_error)?;
    let id = gen_id();
    let wav_path = cfg.audio_dir.join(format!("phis_{id}.wav"));

    let started = std::time::Instant::now();
    match engine {
        TtsEngine::Piper => synth_with_piper(cfg, text, &wav_path).await?,
        TtsEngine::Espeak => synth_with_espeak(cfg, text, &wav_path).await?,
    }

    let probe_path = wav_path.clone();
    let info = task::spawn_blocking(move || probe_wav(&probe_path))
        .await
        .map_err(|e| CapabilityError::Transient(e.to_string()))?
        .map_err(|e| CapabilityError::ValidationFailed(format!("engine output unreadable: {e}")))?;
    debug!(
        target: "tts",
        engine = engine.as_str(),
        synthesis_ms = started.elapsed().as_millis() as u64,
        duration_ms = info.duration().as_millis() as u64,
        "WAV written"
    );

    let path = match cfg.ffmpeg_bin.as_deref().filter(|_| cfg.transcode_mp3) {
        Some(ffmpeg) => match transcode_to_mp3(ffmpeg, &wav_path).await {
            Ok(mp3) => mp3,
            Err(e) => {
                warn!(target: "tts", error = %e, "MP3 transcode failed; keeping WAV");
                wav_path
            }
        },
        None => wav_path,
    };

    let byte_size = tokio::fs::metadata(&path).await.map_err(io_error)?.len();
    Ok(AudioHandle::new(path, byte_size, info.duration()))
}

fn io_error(e: std::io::Error) -> CapabilityError {
    match e.kind() {
        std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
            CapabilityError::Terminal(e.to_string())
        }
        _ => CapabilityError::Transient(e.to_string()),
    }
}

async fn synth_with_piper(cfg: &TtsConfig, text: &str, out_wav: &Path) -> CapabilityResult<()> {
    let piper = cfg
        .piper_bin
        .as_ref()
        .ok_or_else(|| CapabilityError::Terminal("Piper binary not found".into()))?;
    let voice = cfg
        .piper_voice
        .as_ref()
        .filter(|v| v.exists())
        .ok_or_else(|| CapabilityError::Terminal("Piper voice not found; set PIPER_VOICE".into()))?;

    let mut cmd = Command::new(piper);
    cmd.arg("-m").arg(voice);
    cmd.arg("-f").arg(out_wav);
    let length_scale = (1.0f32 / cfg.rate).clamp(0.5, 2.0);
    cmd.arg("--length_scale").arg(format!("{:.2}", length_scale));
    cmd.stdin(Stdio::piped());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.kill_on_drop(true);

    debug!(target: "tts", command = ?cmd, "Running piper");
    let mut child = cmd.spawn().map_err(io_error)?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(text.as_bytes()).await.map_err(io_error)?;
        // closing stdin ends piper's input
        drop(stdin);
    }
    let output = child.wait_with_output().await.map_err(io_error)?;
    if !output.status.success() {
        return Err(CapabilityError::Transient(format!(
            "Piper failed: {}",
            String::from_utf8_lossy(&output.stderr)
        )));
    }
    Ok(())
}

async fn synth_with_espeak(cfg: &TtsConfig, text: &str, out_wav: &Path) -> CapabilityResult<()> {
    let espeak = cfg
        .espeak_bin
        .as_ref()
        .ok_or_else(|| CapabilityError::Terminal("espeak-ng not found".into()))?;
    let mut cmd = Command::new(espeak);
    let wpm = (160.0 * cfg.rate).round().clamp(80.0, 450.0) as i32;
    if let Some(voice) = &cfg.espeak_voice {
        cmd.arg("-v").arg(voice);
    }
    cmd.arg("-s").arg(wpm.to_string());
    cmd.arg("-w").arg(out_wav);
    cmd.arg(text);
    cmd.kill_on_drop(true);

    debug!(target: "tts", command = ?cmd, "Running espeak-ng");
    let output = cmd.output().await.map_err(io_error)?;
    if !output.status.success() {
        return Err(CapabilityError::Transient(format!(
            "espeak-ng failed: {}",
            String::from_utf8_lossy(&output.stderr)
        )));
    }
    Ok(())
}

/// Convert to MP3 next to the WAV and remove the WAV on success
async fn transcode_to_mp3(ffmpeg: &Path, wav_path: &Path) -> std::io::Result<PathBuf> {
    let mp3_path = wav_path.with_extension("mp3");
    let output = Command::new(ffmpeg)
        .args(["-y", "-loglevel", "error", "-i"])
        .arg(wav_path)
        .arg(&mp3_path)
        .kill_on_drop(true)
        .output()
        .await?;
    if !output.status.success() {
        return Err(std::io::Error::other(format!(
            "ffmpeg exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr)
        )));
    }
    if let Err(e) = tokio::fs::remove_file(wav_path).await {
        debug!(target: "tts", error = %e, "Could not remove intermediate WAV");
    }
    Ok(mp3_path)
}
