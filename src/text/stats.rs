//! Document statistics shown before conversion and by `--info`.

use crate::error::{ChunkvoxError, Result};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentStats {
    pub size_bytes: u64,
    pub characters: usize,
    pub words: usize,
    pub lines: usize,
    /// Rough chunk count: `max(1, characters / max_chars)`.
    pub estimated_chunks: usize,
}

impl DocumentStats {
    pub fn from_text(text: &str, size_bytes: u64, max_chars: usize) -> Self {
        let characters = text.chars().count();
        Self {
            size_bytes,
            characters,
            words: text.split_whitespace().count(),
            lines: text.matches('\n').count() + 1,
            estimated_chunks: (characters / max_chars.max(1)).max(1),
        }
    }

    pub fn for_file(path: &Path, max_chars: usize) -> Result<Self> {
        let text = read_document(path)?;
        let size = std::fs::metadata(path)
            .map(|m| m.len())
            .unwrap_or(text.len() as u64);
        Ok(Self::from_text(&text, size, max_chars))
    }
}

/// Read a UTF-8 document, mapping failures to document errors.
pub fn read_document(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ChunkvoxError::DocumentNotFound {
            path: path.display().to_string(),
        },
        _ => ChunkvoxError::DocumentUnreadable {
            path: path.display().to_string(),
            message: e.to_string(),
        },
    })
}

/// Format a byte count with two decimals, e.g. `1.50 KB`.
pub fn format_file_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if size < 1024.0 {
            return format!("{size:.2} {unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.2} TB")
}

/// Group digits with commas, e.g. `12,345`.
pub fn format_count(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
