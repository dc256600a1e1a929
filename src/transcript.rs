use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque video identifier, sourced only from the video lister.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(String);

impl VideoId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Watch-page URL handed to the external extraction tool.
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.0)
    }
}

impl std::fmt::Display for VideoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for VideoId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// One transcript cue in playback order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Start offset in seconds from the beginning of the video.
    pub start: f64,
    /// Cue duration in seconds.
    pub duration: f64,
    pub text: String,
}

/// Where a persisted transcript came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptSource {
    Captions,
    Whisper,
}

impl std::fmt::Display for TranscriptSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranscriptSource::Captions => write!(f, "captions"),
            TranscriptSource::Whisper => write!(f, "whisper"),
        }
    }
}

/// Canonical persisted transcript document, one per video identifier.
///
/// Once written a record is immutable; its presence on disk is the
/// idempotence signal for the whole acquisition pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptRecord {
    pub video_id: VideoId,
    pub source: TranscriptSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<DateTime<Utc>>,
    pub text: String,
    pub segments: Vec<TranscriptSegment>,
}

impl TranscriptRecord {
    pub fn from_captions(
        video_id: VideoId,
        language: Option<String>,
        segments: Vec<TranscriptSegment>,
    ) -> Self {
        let text = joined_text(&segments);
        Self {
            video_id,
            source: TranscriptSource::Captions,
            model: None,
            language,
            fetched_at: Some(Utc::now()),
            text,
            segments,
        }
    }

    pub fn from_whisper(
        video_id: VideoId,
        model: String,
        language: String,
        text: String,
        segments: Vec<TranscriptSegment>,
    ) -> Self {
        Self {
            video_id,
            source: TranscriptSource::Whisper,
            model: Some(model),
            language: Some(language),
            fetched_at: Some(Utc::now()),
            text,
            segments,
        }
    }
}

/// On-disk transcript shapes accepted by the reader.
///
/// Early runs persisted a bare segment array; current runs persist the
/// provenance-wrapped record. Both load, writes always produce the record.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StoredTranscript {
    Record(TranscriptRecord),
    Segments(Vec<TranscriptSegment>),
}

impl StoredTranscript {
    /// Normalize either shape into the canonical record.
    pub fn into_record(self, video_id: &VideoId) -> TranscriptRecord {
        match self {
            StoredTranscript::Record(record) => record,
            StoredTranscript::Segments(segments) => TranscriptRecord {
                video_id: video_id.clone(),
                source: TranscriptSource::Captions,
                model: None,
                language: None,
                fetched_at: None,
                text: joined_text(&segments),
                segments,
            },
        }
    }
}

fn joined_text(segments: &[TranscriptSegment]) -> String {
    segments
        .iter()
        .map(|s| s.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
