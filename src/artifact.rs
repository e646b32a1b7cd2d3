//! Naming of per-chunk audio artifacts.

use crate::defaults::{AUDIO_EXTENSION, DEFAULT_OUTPUT_DIR, DEFAULT_PREFIX};
use std::path::{Path, PathBuf};

/// Pick the artifact prefix for a run.
///
/// An explicit non-blank prefix wins. Otherwise a custom output directory
/// lends its name, so `--output-dir moby` yields `moby 1.mp3`, `moby 2.mp3`.
pub fn resolve_prefix(explicit: Option<&str>, output_dir: &Path) -> Option<String> {
    if let Some(prefix) = explicit.map(str::trim)
        && !prefix.is_empty()
    {
        return Some(prefix.to_string());
    }
    output_dir
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| *n != DEFAULT_OUTPUT_DIR)
        .map(str::to_string)
}

/// Maps chunk indices to artifact paths inside one output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactNamer {
    dir: PathBuf,
    prefix: Option<String>,
    fallback_prefix: String,
    extension: String,
}

impl ArtifactNamer {
    pub fn new(dir: impl Into<PathBuf>, prefix: Option<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix,
            fallback_prefix: DEFAULT_PREFIX.to_string(),
            extension: AUDIO_EXTENSION.to_string(),
        }
    }

    /// Override the prefix used when none is set (`chunk` by default).
    pub fn with_fallback_prefix(mut self, fallback: impl Into<String>) -> Self {
        self.fallback_prefix = fallback.into();
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Artifact file name for 0-based chunk `index`.
    pub fn file_name(&self, index: usize) -> String {
        let number = index + 1;
        match &self.prefix {
            Some(prefix) => format!("{prefix} {number}.{}", self.extension),
            None => format!("{}_{number}.{}", self.fallback_prefix, self.extension),
        }
    }

    pub fn path_for(&self, index: usize) -> PathBuf {
        self.dir.join(self.file_name(index))
    }

    /// Recover the 1-based chunk number from an artifact file name produced
    /// by this namer.
    pub fn chunk_number(&self, file_name: &str) -> Option<usize> {
        let stem = file_name.strip_suffix(&format!(".{}", self.extension))?;
        let digits = match &self.prefix {
            Some(prefix) => stem.strip_prefix(prefix.as_str())?.strip_prefix(' ')?,
            None => stem
                .strip_prefix(self.fallback_prefix.as_str())?
                .strip_prefix('_')?,
        };
        digits.parse::<usize>().ok().filter(|n| *n >= 1)
    }
}
