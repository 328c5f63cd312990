//! Speech player: translate TTS → MP3 artifact → rodio playback.
//!
//! Pipeline:
//! 1. Text → chunks of at most 200 chars (word boundaries)
//! 2. Chunk → MP3 bytes from the translate_tts endpoint
//! 3. Chunks concatenated into `<folder>/<timestamp>-<seq>.mp3`
//! 4. File → rodio Decoder → Sink, blocking until playback ends

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use reqwest::Client;
use rodio::{Decoder, OutputStreamBuilder, Sink};
use tracing::{debug, info, warn};

use crate::config::SpeechConfig;
use crate::error::SpeechError;

/// Longest text the translate_tts endpoint accepts per request.
const MAX_CHUNK_CHARS: usize = 200;

#[async_trait]
pub trait Speaker: Send + Sync {
    /// Synthesize and play `text`, returning the written audio file.
    async fn speak(&self, text: &str) -> Result<PathBuf, SpeechError>;
}

pub struct TranslateSpeaker {
    client: Client,
    tts_url: String,
    language: String,
    folder: PathBuf,
    playback: bool,
    sequence: AtomicU64,
}

impl TranslateSpeaker {
    pub fn new(config: &SpeechConfig) -> Result<Self, SpeechError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        let playback = config.playback && output_available();

        Ok(Self {
            client,
            tts_url: config.tts_url.clone(),
            language: config.language.clone(),
            folder: config.folder.clone(),
            playback,
            sequence: AtomicU64::new(0),
        })
    }

    fn next_artifact_path(&self) -> PathBuf {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        self.folder.join(format!("{stamp}-{seq:03}.mp3"))
    }

    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, SpeechError> {
        let chunks = chunk_text(text, MAX_CHUNK_CHARS);
        if chunks.is_empty() {
            return Err(SpeechError::EmptyText);
        }

        let total = chunks.len().to_string();
        let mut audio = Vec::new();
        for (idx, chunk) in chunks.iter().enumerate() {
            let idx = idx.to_string();
            let textlen = chunk.chars().count().to_string();
            let resp = self
                .client
                .get(&self.tts_url)
                .query(&[
                    ("ie", "UTF-8"),
                    ("client", "tw-ob"),
                    ("total", total.as_str()),
                    ("idx", idx.as_str()),
                    ("textlen", textlen.as_str()),
                    ("tl", self.language.as_str()),
                    ("q", chunk.as_str()),
                ])
                .send()
                .await?;

            if !resp.status().is_success() {
                return Err(SpeechError::Status(resp.status()));
            }
            audio.extend_from_slice(&resp.bytes().await?);
        }
        debug!("Synthesized {} chunks, {} bytes", chunks.len(), audio.len());
        Ok(audio)
    }
}

#[async_trait]
impl Speaker for TranslateSpeaker {
    async fn speak(&self, text: &str) -> Result<PathBuf, SpeechError> {
        let t_gen = Instant::now();
        let audio = self.synthesize(text).await?;
        let gen_ms = t_gen.elapsed().as_secs_f64() * 1000.0;

        tokio::fs::create_dir_all(&self.folder)
            .await
            .map_err(|source| SpeechError::Write {
                path: self.folder.clone(),
                source,
            })?;
        let path = self.next_artifact_path();
        tokio::fs::write(&path, &audio)
            .await
            .map_err(|source| SpeechError::Write {
                path: path.clone(),
                source,
            })?;

        if !self.playback {
            debug!("Playback disabled, wrote {}", path.display());
            return Ok(path);
        }

        let t_play = Instant::now();
        let play_path = path.clone();
        tokio::task::spawn_blocking(move || play_file(&play_path))
            .await
            .map_err(|e| SpeechError::Playback(format!("playback task failed: {e}")))??;

        info!(
            "Spoke {} ({gen_ms:.0}ms synth, {:.1}s playback)",
            path.display(),
            t_play.elapsed().as_secs_f64()
        );
        Ok(path)
    }
}

/// Check once that a default output device exists.
fn output_available() -> bool {
    match OutputStreamBuilder::open_default_stream() {
        Ok(mut stream) => {
            stream.log_on_drop(false);
            true
        }
        Err(e) => {
            warn!("No audio output available ({e}); audio files will be written but not played");
            false
        }
    }
}

/// Decode and play one audio file to completion on the default device.
fn play_file(path: &Path) -> Result<(), SpeechError> {
    let mut stream = OutputStreamBuilder::open_default_stream()
        .map_err(|e| SpeechError::Playback(format!("failed to open audio output: {e}")))?;
    stream.log_on_drop(false);

    let file = File::open(path)
        .map_err(|e| SpeechError::Playback(format!("failed to open {}: {e}", path.display())))?;
    let source = Decoder::new(BufReader::new(file)).map_err(|source| SpeechError::Decode {
        path: path.to_path_buf(),
        source,
    })?;

    let sink = Sink::connect_new(stream.mixer());
    sink.append(source);
    sink.sleep_until_end();
    Ok(())
}

/// Split text into chunks of at most `max_chars` characters, breaking on
/// whitespace. Words longer than `max_chars` are cut.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let mut word = word;
        let mut word_len = word.chars().count();

        while word_len > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let split = word
                .char_indices()
                .nth(max_chars)
                .map_or(word.len(), |(i, _)| i);
            chunks.push(word[..split].to_string());
            word = &word[split..];
            word_len -= max_chars;
        }
        if word.is_empty() {
            continue;
        }

        let needed = if current.is_empty() { word_len } else { current_len + 1 + word_len };
        if needed > max_chars {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
