//! Error types for chunkvox.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChunkvoxError {
    // Configuration errors
    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Document errors
    #[error("Document not found: {path}")]
    DocumentNotFound { path: String },

    #[error("Document is not readable: {path}: {message}")]
    DocumentUnreadable { path: String, message: String },

    #[error("No text found in document: {path}")]
    EmptyDocument { path: String },

    // Output directory errors
    #[error("Cannot create output directory {path}: {message}")]
    OutputDirCreate { path: String, message: String },

    #[error("Output directory is not writable: {path}")]
    OutputDirNotWritable { path: String },

    // Checkpoint storage errors
    #[error("Checkpoint storage error: {message}")]
    CheckpointStorage { message: String },

    #[error("Checkpoint record is corrupt at {path}: {message}")]
    CheckpointCorrupt { path: String, message: String },

    // Synthesis errors
    #[error("Speech synthesis tool not found: {tool}")]
    SynthesisToolNotFound { tool: String },

    #[error("Speech synthesis failed: {message}")]
    SynthesisFailed { message: String },

    #[error("Speech synthesis cancelled")]
    SynthesisCancelled,

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

impl ChunkvoxError {
    /// Whether this error must terminate the run.
    ///
    /// Resource and filesystem failures are fatal. Synthesis failures are
    /// contained at chunk level by the scheduler.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            ChunkvoxError::SynthesisFailed { .. }
                | ChunkvoxError::SynthesisToolNotFound { .. }
                | ChunkvoxError::SynthesisCancelled
        )
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, ChunkvoxError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_config_invalid_value_display() {
        let error = ChunkvoxError::ConfigInvalidValue {
            key: "chunking.max_chars".to_string(),
            message: "must be positive".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid configuration value for chunking.max_chars: must be positive"
        );
    }

    #[test]
    fn test_document_not_found_display() {
        let error = ChunkvoxError::DocumentNotFound {
            path: "/books/moby.txt".to_string(),
        };
        assert_eq!(error.to_string(), "Document not found: /books/moby.txt");
    }

    #[test]
    fn test_output_dir_not_writable_display() {
        let error = ChunkvoxError::OutputDirNotWritable {
            path: "/readonly".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Output directory is not writable: /readonly"
        );
    }

    #[test]
    fn test_synthesis_failed_display() {
        let error = ChunkvoxError::SynthesisFailed {
            message: "429 Too Many Requests".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Speech synthesis failed: 429 Too Many Requests"
        );
    }

    #[test]
    fn test_synthesis_errors_are_not_fatal() {
        assert!(
            !ChunkvoxError::SynthesisFailed {
                message: "timeout".to_string()
            }
            .is_fatal()
        );
        assert!(!ChunkvoxError::SynthesisCancelled.is_fatal());
        assert!(
            !ChunkvoxError::SynthesisToolNotFound {
                tool: "gtts-cli".to_string()
            }
            .is_fatal()
        );
    }

    #[test]
    fn test_resource_errors_are_fatal() {
        assert!(
            ChunkvoxError::OutputDirCreate {
                path: "/x".to_string(),
                message: "denied".to_string()
            }
            .is_fatal()
        );
        assert!(
            ChunkvoxError::CheckpointStorage {
                message: "disk full".to_string()
            }
            .is_fatal()
        );
        let io_error: ChunkvoxError = io::Error::other("boom").into();
        assert!(io_error.is_fatal());
    }

    #[test]
    fn test_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: ChunkvoxError = io_error.into();
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_toml_error() {
        let toml_error = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let error: ChunkvoxError = toml_error.into();
        assert!(error.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_from_json_error() {
        let json_error = serde_json::from_str::<serde_json::Value>("{ nope").unwrap_err();
        let error: ChunkvoxError = json_error.into();
        assert!(error.to_string().starts_with("JSON error"));
    }

    #[test]
    fn test_error_source_chain_io() {
        let io_error = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let error: ChunkvoxError = io_error.into();

        let error_trait: &dyn std::error::Error = &error;
        assert!(error_trait.source().is_some());
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<ChunkvoxError>();
        assert_sync::<ChunkvoxError>();
    }
}
