//! Speech-to-text fallback via the whisper CLI over a local audio asset.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::{ToolsConfig, WhisperConfig};
use crate::error::Result;
use crate::store::ContentStore;
use crate::transcript::{TranscriptRecord, TranscriptSegment, VideoId};

/// Result of one transcription attempt.
#[derive(Debug, Clone)]
pub enum TranscribeOutcome {
    /// A new record was written.
    Transcribed(TranscriptRecord),
    /// A record already existed; nothing ran.
    Cached(TranscriptRecord),
    /// The audio asset precondition is not met.
    MissingAudio,
    Failed(String),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechTranscriber: Send + Sync {
    async fn transcribe(&self, id: &VideoId) -> Result<TranscribeOutcome>;
}

/// Whisper CLI JSON output shape.
#[derive(Debug, Deserialize)]
struct WhisperOutput {
    #[serde(default)]
    text: String,
    #[serde(default)]
    segments: Vec<WhisperSegment>,
}

#[derive(Debug, Deserialize)]
struct WhisperSegment {
    start: f64,
    end: f64,
    text: String,
}

fn normalize_segments(raw: Vec<WhisperSegment>) -> Vec<TranscriptSegment> {
    raw.into_iter()
        .filter_map(|seg| {
            let text = seg.text.trim().to_string();
            if text.is_empty() {
                return None;
            }
            Some(TranscriptSegment {
                start: seg.start,
                duration: (seg.end - seg.start).max(0.0),
                text,
            })
        })
        .collect()
}

fn py_bool(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

pub struct WhisperCliTranscriber {
    ffmpeg_path: String,
    whisper_path: String,
    config: WhisperConfig,
    store: Arc<ContentStore>,
}

impl WhisperCliTranscriber {
    pub fn new(tools: &ToolsConfig, config: WhisperConfig, store: Arc<ContentStore>) -> Self {
        Self {
            ffmpeg_path: tools.ffmpeg_path.clone(),
            whisper_path: tools.whisper_path.clone(),
            config,
            store,
        }
    }

    /// Override the configured model and language (single-video CLI surface).
    pub fn with_overrides(mut self, model: Option<String>, language: Option<String>) -> Self {
        if let Some(model) = model {
            self.config.model = model;
        }
        if let Some(language) = language {
            self.config.language = language;
        }
        self
    }

    /// Convert the mp3 asset to the mono 16 kHz WAV the model expects.
    async fn convert_to_wav(&self, src: &Path, dst: &Path) -> std::result::Result<(), String> {
        let output = Command::new(&self.ffmpeg_path)
            .arg("-y")
            .arg("-i")
            .arg(src)
            .args(["-ac", "1"])
            .args(["-ar", "16000"])
            .arg(dst)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| format!("Failed to execute ffmpeg: {}", e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = stderr.trim();
            return Err(if detail.is_empty() {
                "ffmpeg conversion failed".to_string()
            } else {
                detail.to_string()
            });
        }

        Ok(())
    }

    /// Fixed decoding configuration for every transcription run.
    fn whisper_args(&self, wav: &Path, out_dir: &Path, word_timestamps: bool) -> Vec<String> {
        let temperatures = self
            .config
            .temperatures
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(",");

        let mut args = vec![
            wav.to_string_lossy().to_string(),
            "--model".to_string(),
            self.config.model.clone(),
            "--language".to_string(),
            self.config.language.clone(),
            "--task".to_string(),
            "transcribe".to_string(),
            "--output_dir".to_string(),
            out_dir.to_string_lossy().to_string(),
            "--output_format".to_string(),
            "json".to_string(),
            "--temperature".to_string(),
            temperatures,
            "--beam_size".to_string(),
            self.config.beam_size.to_string(),
            "--patience".to_string(),
            self.config.patience.to_string(),
            "--condition_on_previous_text".to_string(),
            py_bool(self.config.condition_on_previous_text).to_string(),
            "--no_speech_threshold".to_string(),
            self.config.no_speech_threshold.to_string(),
            "--logprob_threshold".to_string(),
            self.config.logprob_threshold.to_string(),
            "--compression_ratio_threshold".to_string(),
            self.config.compression_ratio_threshold.to_string(),
            "--fp16".to_string(),
            "False".to_string(),
            "--verbose".to_string(),
            "False".to_string(),
        ];

        if word_timestamps {
            args.push("--word_timestamps".to_string());
            args.push("True".to_string());
        }

        args
    }

    async fn run_whisper(
        &self,
        wav: &Path,
        out_dir: &Path,
    ) -> std::result::Result<WhisperOutput, String> {
        let mut word_timestamps = self.config.word_timestamps;

        loop {
            let output = Command::new(&self.whisper_path)
                .args(self.whisper_args(wav, out_dir, word_timestamps))
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .output()
                .await
                .map_err(|e| format!("Failed to execute whisper: {}", e))?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr).to_string();
                // Older runtimes reject the word-timing option; retry once
                // without it rather than failing the whole operation.
                if word_timestamps && stderr.contains("word_timestamps") {
                    debug!("Runtime rejected word timestamps, retrying without");
                    word_timestamps = false;
                    continue;
                }
                let detail = stderr.trim();
                return Err(if detail.is_empty() {
                    "whisper run failed".to_string()
                } else {
                    detail.to_string()
                });
            }

            let stem = wav
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
            let json_path = out_dir.join(format!("{}.json", stem));
            let content = std::fs::read_to_string(&json_path)
                .map_err(|e| format!("Failed to read whisper output: {}", e))?;

            return serde_json::from_str(&content)
                .map_err(|e| format!("Failed to parse whisper output: {}", e));
        }
    }
}

#[async_trait]
impl SpeechTranscriber for WhisperCliTranscriber {
    async fn transcribe(&self, id: &VideoId) -> Result<TranscribeOutcome> {
        if let Some(record) = self.store.load_transcript(id).await? {
            debug!("Transcript already exists for {}", id);
            return Ok(TranscribeOutcome::Cached(record));
        }

        let audio_path = self.store.audio_path(id);
        if !audio_path.exists() {
            warn!("Missing audio asset for {}", id);
            return Ok(TranscribeOutcome::MissingAudio);
        }

        // Scoped working dir: the WAV and the model's JSON output are
        // removed on every exit path, including interrupts.
        let workdir = tempfile::tempdir()?;
        let wav_path = workdir.path().join(format!("{}.wav", id));

        info!("Preparing audio for {}", id);
        if let Err(e) = self.convert_to_wav(&audio_path, &wav_path).await {
            warn!("ffmpeg failed for {}: {}", id, e);
            return Ok(TranscribeOutcome::Failed(e));
        }

        info!(
            "Transcribing {} (model {}, language {})",
            id, self.config.model, self.config.language
        );
        let output = match self.run_whisper(&wav_path, workdir.path()).await {
            Ok(output) => output,
            Err(e) => {
                warn!("Whisper failed for {}: {}", id, e);
                return Ok(TranscribeOutcome::Failed(e));
            }
        };

        let segments = normalize_segments(output.segments);
        if segments.is_empty() {
            // A record is only written for a non-empty result.
            return Ok(TranscribeOutcome::Failed(
                "whisper produced no segments".to_string(),
            ));
        }

        let record = TranscriptRecord::from_whisper(
            id.clone(),
            self.config.model.clone(),
            self.config.language.clone(),
            output.text.trim().to_string(),
            segments,
        );
        let saved = self.store.save_transcript(record).await?;

        info!(
            "Whisper transcript saved for {} ({} segments)",
            id,
            saved.segments.len()
        );
        Ok(TranscribeOutcome::Transcribed(saved))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transcriber() -> (WhisperCliTranscriber, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ContentStore::new(dir.path()).unwrap());
        let config = crate::config::Config::default();
        (
            WhisperCliTranscriber::new(&config.tools, config.whisper, store),
            dir,
        )
    }

    #[test]
    fn test_whisper_args_carry_decoding_configuration() {
        let (t, _dir) = transcriber();
        let args = t.whisper_args(Path::new("in.wav"), Path::new("out"), true);
        let rendered = args.join(" ");

        assert!(rendered.contains("--temperature 0,0.2,0.4,0.6"));
        assert!(rendered.contains("--beam_size 5"));
        assert!(rendered.contains("--no_speech_threshold 0.6"));
        assert!(rendered.contains("--logprob_threshold -1"));
        assert!(rendered.contains("--compression_ratio_threshold 2.4"));
        assert!(rendered.contains("--word_timestamps True"));
        assert!(rendered.contains("--language sr"));
    }

    #[test]
    fn test_whisper_args_without_word_timestamps() {
        let (t, _dir) = transcriber();
        let args = t.whisper_args(Path::new("in.wav"), Path::new("out"), false);
        assert!(!args.join(" ").contains("word_timestamps"));
    }

    #[test]
    fn test_normalize_segments_drops_empty_and_clamps_duration() {
        let raw = vec![
            WhisperSegment {
                start: 0.0,
                end: 2.0,
                text: "  govor  ".to_string(),
            },
            WhisperSegment {
                start: 2.0,
                end: 2.0,
                text: "   ".to_string(),
            },
            WhisperSegment {
                start: 5.0,
                end: 4.0,
                text: "kraj".to_string(),
            },
        ];

        let segments = normalize_segments(raw);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "govor");
        assert_eq!(segments[0].duration, 2.0);
        assert_eq!(segments[1].duration, 0.0);
    }

    #[test]
    fn test_whisper_output_json_parses() {
        let json = r#"{
            "text": " pun tekst ",
            "segments": [
                {"id": 0, "start": 0.0, "end": 3.2, "text": " pun ", "avg_logprob": -0.3},
                {"id": 1, "start": 3.2, "end": 5.0, "text": " tekst "}
            ],
            "language": "sr"
        }"#;

        let output: WhisperOutput = serde_json::from_str(json).unwrap();
        assert_eq!(output.segments.len(), 2);
        assert_eq!(normalize_segments(output.segments).len(), 2);
    }

    #[tokio::test]
    async fn test_missing_audio_short_circuits() {
        let (t, _dir) = transcriber();
        let outcome = t.transcribe(&VideoId::new("noaudio")).await.unwrap();
        assert!(matches!(outcome, TranscribeOutcome::MissingAudio));
    }

    #[tokio::test]
    async fn test_cached_record_short_circuits_before_audio_check() {
        let (t, _dir) = transcriber();
        let id = VideoId::new("cached1");
        let record = TranscriptRecord::from_whisper(
            id.clone(),
            "medium".to_string(),
            "sr".to_string(),
            "tekst".to_string(),
            vec![TranscriptSegment {
                start: 0.0,
                duration: 1.0,
                text: "tekst".to_string(),
            }],
        );
        t.store.save_transcript(record.clone()).await.unwrap();

        let outcome = t.transcribe(&id).await.unwrap();
        match outcome {
            TranscribeOutcome::Cached(cached) => assert_eq!(cached, record),
            other => panic!("expected cached outcome, got {:?}", other),
        }
    }
}
