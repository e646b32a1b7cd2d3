//! Stable identifiers derived from document paths and content.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};

/// Hex length of a run key. 64 bits is plenty for per-user state.
const RUN_KEY_LEN: usize = 16;

/// SHA-256 of the document text, hex encoded.
pub fn content_hash(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

/// Resolve a document path to the form used for key derivation.
///
/// Canonicalizes when the file exists so `./book.txt` and `/home/u/book.txt`
/// map to the same run; otherwise makes the path absolute lexically.
pub fn normalize_document_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = std::fs::canonicalize(path) {
        return canonical;
    }
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

/// Deterministic identifier of one document's conversion run.
///
/// Derived only from the normalized document path, so a resumed run finds
/// its state without knowing the prefix or output folder chosen earlier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunKey(String);

impl RunKey {
    pub fn for_document(path: &Path) -> Self {
        let normalized = normalize_document_path(path);
        let digest = format!(
            "{:x}",
            Sha256::digest(normalized.as_os_str().as_encoded_bytes())
        );
        Self(digest[..RUN_KEY_LEN].to_string())
    }

    /// Rebuild a key read back from storage (file stem or record field).
    ///
    /// Returns `None` for strings that could not have been produced by
    /// [`RunKey::for_document`].
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.len() == RUN_KEY_LEN && raw.chars().all(|c| c.is_ascii_hexdigit()) {
            Some(Self(raw.to_ascii_lowercase()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_hash_is_stable_and_sensitive() {
        let a = content_hash("Call me Ishmael.");
        assert_eq!(a, content_hash("Call me Ishmael."));
        assert_ne!(a, content_hash("Call me Ishmael!"));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn run_key_is_deterministic() {
        let path = Path::new("/books/moby-dick.txt");
        assert_eq!(RunKey::for_document(path), RunKey::for_document(path));
        assert_eq!(RunKey::for_document(path).as_str().len(), 16);
    }

    #[test]
    fn run_key_differs_per_document() {
        assert_ne!(
            RunKey::for_document(Path::new("/books/a.txt")),
            RunKey::for_document(Path::new("/books/b.txt"))
        );
    }

    #[test]
    fn run_key_same_for_relative_and_absolute_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("doc.txt");
        std::fs::write(&file, "hello").unwrap();
        let dotted = dir.path().join(".").join("doc.txt");
        assert_eq!(RunKey::for_document(&file), RunKey::for_document(&dotted));
    }

    #[test]
    fn parse_round_trips_and_rejects_garbage() {
        let key = RunKey::for_document(Path::new("/books/a.txt"));
        assert_eq!(RunKey::parse(key.as_str()), Some(key));
        assert_eq!(RunKey::parse("not-a-key"), None);
        assert_eq!(RunKey::parse("zzzzzzzzzzzzzzzz"), None);
    }
}
