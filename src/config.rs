use crate::defaults;
use crate::error::{ChunkvoxError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub chunking: ChunkingConfig,
    pub synthesis: SynthesisConfig,
    pub workers: WorkersConfig,
    pub output: OutputConfig,
    pub state: StateConfig,
    pub display: DisplayConfig,
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChunkingConfig {
    pub max_chars: usize,
}

/// Speech synthesis configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SynthesisConfig {
    /// External TTS command. Text is written to its stdin.
    pub command: String,
    /// Arguments; `{lang}` and `{output}` are substituted per chunk.
    pub args: Vec<String>,
    /// Extra argument appended when slow speech is requested.
    pub slow_flag: String,
    pub language: String,
    pub slow: bool,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

/// Worker pool configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkersConfig {
    pub parallel: bool,
    pub max_workers: usize,
}

/// Output artifact configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: PathBuf,
    pub default_prefix: String,
    pub extension: String,
}

/// Checkpoint and boundary cache location
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StateConfig {
    /// Defaults to the platform data directory when unset.
    pub directory: Option<PathBuf>,
    /// Delete a run's record once it is marked completed.
    pub prune_completed: bool,
}

/// Live progress display configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DisplayConfig {
    pub refresh_ms: u64,
    pub eta_window: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: defaults::MAX_CHUNK_CHARS,
        }
    }
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            command: defaults::SYNTHESIS_COMMAND.to_string(),
            args: vec![
                "--lang".to_string(),
                "{lang}".to_string(),
                "--output".to_string(),
                "{output}".to_string(),
                "-".to_string(),
            ],
            slow_flag: defaults::SLOW_FLAG.to_string(),
            language: defaults::DEFAULT_LANGUAGE.to_string(),
            slow: false,
            max_retries: defaults::MAX_RETRIES,
            retry_delay_ms: defaults::RETRY_DELAY.as_millis() as u64,
        }
    }
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            max_workers: defaults::MAX_PARALLEL_CHUNKS,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(defaults::DEFAULT_OUTPUT_DIR),
            default_prefix: defaults::DEFAULT_PREFIX.to_string(),
            extension: defaults::AUDIO_EXTENSION.to_string(),
        }
    }
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            directory: None,
            prune_completed: true,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            refresh_ms: defaults::DISPLAY_REFRESH.as_millis() as u64,
            eta_window: defaults::ETA_WINDOW,
        }
    }
}

impl SynthesisConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl WorkersConfig {
    /// Number of workers actually spawned: one when parallelism is off.
    pub fn effective_workers(&self) -> usize {
        if self.parallel {
            self.max_workers.max(1)
        } else {
            1
        }
    }
}

impl StateConfig {
    /// Resolve the state directory, falling back to the platform data dir
    /// and finally to the working directory.
    pub fn resolve_directory(&self) -> PathBuf {
        self.directory.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(defaults::STATE_DIR_NAME)
        })
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Returns errors for invalid TOML.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(ChunkvoxError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(Self::default())
            }
            Err(e) => Err(ChunkvoxError::ConfigParse {
                message: format!("{}: {}", path.display(), e),
            }),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - CHUNKVOX_LANGUAGE → synthesis.language
    /// - CHUNKVOX_OUTPUT_DIR → output.directory
    /// - CHUNKVOX_STATE_DIR → state.directory
    /// - CHUNKVOX_WORKERS → workers.max_workers (ignored if not a number)
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(language) = std::env::var("CHUNKVOX_LANGUAGE")
            && !language.is_empty()
        {
            self.synthesis.language = language;
        }

        if let Ok(dir) = std::env::var("CHUNKVOX_OUTPUT_DIR")
            && !dir.is_empty()
        {
            self.output.directory = PathBuf::from(dir);
        }

        if let Ok(dir) = std::env::var("CHUNKVOX_STATE_DIR")
            && !dir.is_empty()
        {
            self.state.directory = Some(PathBuf::from(dir));
        }

        if let Ok(workers) = std::env::var("CHUNKVOX_WORKERS")
            && let Ok(n) = workers.trim().parse::<usize>()
        {
            self.workers.max_workers = n;
        }

        self
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.chunking.max_chars == 0 {
            return Err(ChunkvoxError::ConfigInvalidValue {
                key: "chunking.max_chars".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.workers.max_workers == 0 {
            return Err(ChunkvoxError::ConfigInvalidValue {
                key: "workers.max_workers".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.synthesis.max_retries == 0 {
            return Err(ChunkvoxError::ConfigInvalidValue {
                key: "synthesis.max_retries".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.synthesis.command.trim().is_empty() {
            return Err(ChunkvoxError::ConfigInvalidValue {
                key: "synthesis.command".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/chunkvox/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("chunkvox")
            .join("config.toml")
    }
}
