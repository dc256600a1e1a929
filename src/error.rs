use thiserror::Error;

#[derive(Error, Debug)]
pub enum TubeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Video listing error: {0}")]
    Listing(String),

    #[error("Caption fetch error: {0}")]
    Captions(String),

    #[error("Audio fetch error: {0}")]
    Audio(String),

    #[error("Transcription error: {0}")]
    Transcriber(String),

    #[error("Content store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, TubeError>;
