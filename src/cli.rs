//! Command-line interface for chunkvox
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Resumable text-to-speech for long documents
#[derive(Parser, Debug)]
#[command(
    name = "chunkvox",
    version,
    about = "Resumable text-to-speech for long documents"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Text file to convert
    #[arg(value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress output (quiet mode)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: info logs, -vv: debug logs)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Directory for the audio files (default: tts_audio_output)
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Language code passed to the speech engine (e.g. en, de, fr)
    #[arg(short, long, value_name = "LANG")]
    pub language: Option<String>,

    /// Slow speech
    #[arg(long)]
    pub slow: bool,

    /// File name prefix for the audio files ("<prefix> 1.mp3", ...)
    #[arg(short, long, value_name = "PREFIX")]
    pub prefix: Option<String>,

    /// Pick a .txt file from the current directory
    #[arg(short, long)]
    pub interactive: bool,

    /// Maximum characters per chunk
    #[arg(long, value_name = "N")]
    pub max_chars: Option<usize>,

    /// Number of chunks synthesized at once
    #[arg(short, long, value_name = "N")]
    pub workers: Option<usize>,

    /// Process chunks one at a time
    #[arg(long)]
    pub no_parallel: bool,

    /// Delay before the first retry (e.g. 500ms, 2s); doubles per attempt
    #[arg(long, value_name = "DURATION", value_parser = parse_duration_ms)]
    pub retry_delay: Option<u64>,

    /// Resume an incomplete run without asking
    #[arg(long, short = 'y', conflicts_with = "fresh")]
    pub resume: bool,

    /// Ignore an incomplete run and start over
    #[arg(long)]
    pub fresh: bool,

    /// Show document statistics and exit
    #[arg(long)]
    pub info: bool,

    /// List saved runs and exit
    #[arg(long)]
    pub list: bool,

    /// Delete saved progress for FILE and exit (audio is kept)
    #[arg(long, requires = "file")]
    pub delete_progress: bool,

    /// Delete saved progress for FILE, or for every run when no file is given
    #[arg(long)]
    pub clean: bool,

    /// Remove saved runs that finished or whose document is gone
    #[arg(long)]
    pub cleanup_stale: bool,
}

/// Parse a duration string into milliseconds.
///
/// Bare numbers are milliseconds; anything else goes through `humantime`
/// (`500ms`, `2s`, `1m30s`).
fn parse_duration_ms(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if let Ok(ms) = s.parse::<u64>() {
        return Ok(ms);
    }
    humantime::parse_duration(s)
        .map(|d| d.as_millis() as u64)
        .map_err(|e| e.to_string())
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

impl Cli {
    /// True when one of the maintenance flags is set and no conversion runs.
    pub fn is_maintenance(&self) -> bool {
        self.info || self.list || self.delete_progress || self.clean || self.cleanup_stale
    }
}
