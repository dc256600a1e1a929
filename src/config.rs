use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, TubeError};
use crate::pacing::Backoff;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Channel videos page handed to the enumeration tool.
    pub channel_url: String,
    pub store: StoreConfig,
    pub tools: ToolsConfig,
    pub captions: CaptionsConfig,
    pub audio: AudioConfig,
    pub whisper: WhisperConfig,
    pub pacing: PacingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Content store root; `audio/` and `transcripts/` live under it.
    pub root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Path to the yt-dlp binary.
    pub ytdlp_path: String,
    /// Path to the ffmpeg binary.
    pub ffmpeg_path: String,
    /// Path to the whisper CLI binary.
    pub whisper_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptionsConfig {
    /// Caption track preference order, most specific regional variant first.
    pub languages: Vec<String>,
    /// When true, a track outside the preference list counts as no
    /// transcript; when false the first available track is used.
    pub strict_language: bool,
    /// Base wait for rate-limit backoff.
    pub backoff_base_secs: u64,
    /// Backoff growth cap.
    pub backoff_cap_secs: u64,
    /// Bounded retry count for rate-limited attempts.
    pub backoff_max_attempts: u32,
    /// Upper bound of the random jitter added to each backoff wait.
    pub backoff_jitter_max_secs: u64,
}

impl CaptionsConfig {
    pub fn backoff(&self) -> Backoff {
        Backoff {
            base_secs: self.backoff_base_secs,
            cap_secs: self.backoff_cap_secs,
            max_attempts: self.backoff_max_attempts,
            jitter_max_secs: self.backoff_jitter_max_secs,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Download rate cap passed to the tool (e.g. "750K").
    pub limit_rate: String,
    /// Tool-internal randomized sleep between its own requests.
    pub sleep_interval_secs: u32,
    pub max_sleep_interval_secs: u32,
    /// Tool-internal retry counts, separate from the pipeline's retry layer.
    pub retries: u32,
    pub fragment_retries: u32,
    /// Tool-internal retry sleep policy (yt-dlp `--retry-sleep` syntax).
    pub retry_sleep: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperConfig {
    /// Model name passed to the whisper CLI.
    pub model: String,
    /// Forced transcription language tag.
    pub language: String,
    /// Temperature fallback ladder, tried in order.
    pub temperatures: Vec<f32>,
    pub beam_size: u32,
    pub patience: f32,
    pub condition_on_previous_text: bool,
    pub no_speech_threshold: f32,
    pub logprob_threshold: f32,
    pub compression_ratio_threshold: f32,
    /// Request word-level timing; dropped on retry if the runtime rejects it.
    pub word_timestamps: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacingConfig {
    /// Politeness pause interval between videos.
    pub between_videos_min_secs: f64,
    pub between_videos_max_secs: f64,
    /// Politeness pause interval before an audio download attempt.
    pub before_audio_min_secs: f64,
    pub before_audio_max_secs: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            channel_url: "https://www.youtube.com/@TragBiljke/videos".to_string(),
            store: StoreConfig {
                root: PathBuf::from("data"),
            },
            tools: ToolsConfig {
                ytdlp_path: "yt-dlp".to_string(),
                ffmpeg_path: "ffmpeg".to_string(),
                whisper_path: "whisper".to_string(),
            },
            captions: CaptionsConfig {
                languages: vec![
                    "sr-Latn".to_string(),
                    "sr".to_string(),
                    "sr-Cyrl".to_string(),
                    "bs".to_string(),
                    "hr".to_string(),
                ],
                strict_language: false,
                backoff_base_secs: 8,
                backoff_cap_secs: 300,
                backoff_max_attempts: 5,
                backoff_jitter_max_secs: 10,
            },
            audio: AudioConfig {
                limit_rate: "750K".to_string(),
                sleep_interval_secs: 1,
                max_sleep_interval_secs: 3,
                retries: 5,
                fragment_retries: 5,
                retry_sleep: "fragment:5".to_string(),
            },
            whisper: WhisperConfig {
                model: "medium".to_string(),
                language: "sr".to_string(),
                temperatures: vec![0.0, 0.2, 0.4, 0.6],
                beam_size: 5,
                patience: 1.0,
                condition_on_previous_text: true,
                no_speech_threshold: 0.6,
                logprob_threshold: -1.0,
                compression_ratio_threshold: 2.4,
                word_timestamps: true,
            },
            pacing: PacingConfig {
                between_videos_min_secs: 7.0,
                between_videos_max_secs: 12.0,
                before_audio_min_secs: 4.0,
                before_audio_max_secs: 8.0,
            },
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TubeError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| TubeError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| TubeError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| TubeError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let config = Config::default();
        let toml_text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_text).unwrap();

        assert_eq!(parsed.captions.languages[0], "sr-Latn");
        assert_eq!(parsed.captions.backoff_max_attempts, 5);
        assert_eq!(parsed.whisper.temperatures, vec![0.0, 0.2, 0.4, 0.6]);
        assert_eq!(parsed.pacing.between_videos_max_secs, 12.0);
    }

    #[test]
    fn test_backoff_built_from_captions_config() {
        let backoff = Config::default().captions.backoff();
        assert_eq!(backoff.base_secs, 8);
        assert_eq!(backoff.cap_secs, 300);
        assert_eq!(backoff.max_attempts, 5);
    }
}
