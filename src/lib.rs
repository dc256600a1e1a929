//! Tubescribe - Resumable Channel Transcript Ingestion
//!
//! Enumerates a channel's videos, prefers platform-hosted captions, falls
//! back to audio download plus whisper transcription, and persists one
//! immutable transcript record per video so repeated runs converge without
//! repeating completed work.

pub mod audio;
pub mod captions;
pub mod classify;
pub mod cli;
pub mod config;
pub mod error;
pub mod lister;
pub mod pacing;
pub mod pipeline;
pub mod store;
pub mod transcriber;
pub mod transcript;
pub mod vtt;
pub mod ytdlp;
