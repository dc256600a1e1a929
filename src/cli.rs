use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full acquisition pipeline over the configured channel
    Run {
        /// Process at most this many videos
        #[arg(short, long)]
        limit: Option<usize>,

        /// Channel videos page (overrides the configured channel)
        #[arg(long)]
        channel: Option<String>,
    },

    /// List the channel's video identifiers without downloading anything
    List {
        /// Channel videos page (overrides the configured channel)
        #[arg(long)]
        channel: Option<String>,
    },

    /// Attempt a caption fetch for a single video
    Captions {
        /// Video identifier
        #[arg(short, long)]
        id: String,
    },

    /// Download the audio asset for a single video
    Audio {
        /// Video identifier
        #[arg(short, long)]
        id: String,
    },

    /// Run whisper transcription for a single video's audio asset
    Transcribe {
        /// Video identifier
        #[arg(short, long)]
        id: String,

        /// Whisper model name
        #[arg(short, long)]
        model: Option<String>,

        /// Forced transcription language
        #[arg(short, long)]
        language: Option<String>,
    },

    /// Write a default configuration file to the current directory
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
