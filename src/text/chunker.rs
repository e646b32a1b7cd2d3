//! Sentence-aware splitting of a document into bounded chunks.
//!
//! Offsets are counted in Unicode scalar values so limits mean "characters"
//! regardless of script. Boundaries are the half-open `[start, end)` ranges
//! in the original text; chunk text is the trimmed slice of each range.

use super::boundary_cache::{BoundaryCache, BoundarySet};
use crate::keys::{RunKey, content_hash};
use tracing::{debug, info, warn};

/// Half-open character range `[start, end)` in the original document.
pub type Boundary = (usize, usize);

/// Compute chunk boundaries for `text`.
///
/// Each window of `max_chars` is cut after the last `". "` that lies past
/// the window midpoint. Failing that, the cut backs off to the last
/// whitespace; a window without whitespace is hard-cut at the limit.
/// Ranges whose text is only whitespace are omitted.
pub fn compute_boundaries(text: &str, max_chars: usize) -> Vec<Boundary> {
    let max_chars = max_chars.max(1);
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();

    let mut boundaries = Vec::new();
    let mut pos = 0;
    while pos < len {
        let start = pos;
        let window_end = (start + max_chars).min(len);
        let mut end = window_end;

        if end < len {
            let midpoint = start + max_chars / 2;
            match last_sentence_break(&chars, start, end) {
                Some(i) if i > midpoint => end = i + 2,
                _ => {
                    while end > start && !chars[end - 1].is_whitespace() {
                        end -= 1;
                    }
                    if end == start {
                        end = window_end;
                    }
                }
            }
        }

        if chars[start..end].iter().any(|c| !c.is_whitespace()) {
            boundaries.push((start, end));
        }
        pos = end;
    }
    boundaries
}

/// Index of the last `'.'` in `[start, end)` that is followed by a space
/// also inside the window.
fn last_sentence_break(chars: &[char], start: usize, end: usize) -> Option<usize> {
    if end < start + 2 {
        return None;
    }
    (start..end - 1)
        .rev()
        .find(|&i| chars[i] == '.' && chars[i + 1] == ' ')
}

/// Slice `text` by character ranges, trimming each piece.
///
/// Returns `None` if any range is inverted or runs past the end of the text,
/// which means the boundaries were computed for a different document.
pub fn slice_chunks(text: &str, boundaries: &[Boundary]) -> Option<Vec<String>> {
    let mut byte_at: Vec<usize> = text.char_indices().map(|(b, _)| b).collect();
    byte_at.push(text.len());
    let char_len = byte_at.len() - 1;

    boundaries
        .iter()
        .map(|&(start, end)| {
            if start > end || end > char_len {
                return None;
            }
            Some(text[byte_at[start]..byte_at[end]].trim().to_string())
        })
        .collect()
}

/// Splits documents into chunks, replaying cached boundaries when the
/// document content is unchanged.
#[derive(Debug, Clone, Default)]
pub struct Chunker {
    cache: Option<BoundaryCache>,
}

impl Chunker {
    /// Chunker that always recomputes boundaries.
    pub fn new() -> Self {
        Self { cache: None }
    }

    pub fn with_cache(cache: BoundaryCache) -> Self {
        Self { cache: Some(cache) }
    }

    pub fn cache(&self) -> Option<&BoundaryCache> {
        self.cache.as_ref()
    }

    /// Split `text` into ordered chunks of at most `max_chars` characters.
    ///
    /// With a cache and a `key`, boundaries stored for identical content are
    /// reused verbatim, even if `max_chars` differs from the value used when
    /// they were computed. Cache problems never fail the split.
    pub fn split(&self, text: &str, max_chars: usize, key: Option<&RunKey>) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let cached = self.cache.as_ref().zip(key);
        let hash = content_hash(text);

        if let Some((cache, key)) = cached
            && let Some(set) = cache.load(key)
        {
            if set.content_hash == hash {
                if let Some(chunks) = slice_chunks(text, &set.boundaries) {
                    debug!(chunks = chunks.len(), "reusing cached chunk boundaries");
                    return chunks;
                }
                warn!("cached boundaries do not fit document, recomputing");
            } else {
                info!("document content changed, discarding cached boundaries");
            }
            cache.remove(key);
        }

        let boundaries = compute_boundaries(text, max_chars);
        let chunks = slice_chunks(text, &boundaries).unwrap_or_default();

        if let Some((cache, key)) = cached {
            let set = BoundarySet {
                content_hash: hash,
                boundaries,
            };
            if let Err(e) = cache.store(key, &set) {
                warn!(error = %e, "could not save chunk boundaries");
            }
        }
        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        "abcd ".repeat(n)
    }

    #[test]
    fn empty_and_whitespace_yield_no_chunks() {
        let chunker = Chunker::new();
        assert!(chunker.split("", 100, None).is_empty());
        assert!(chunker.split("   \n\t  ", 100, None).is_empty());
    }

    #[test]
    fn short_text_is_single_trimmed_chunk() {
        let chunks = Chunker::new().split("  Hello world.  ", 100, None);
        assert_eq!(chunks, vec!["Hello world.".to_string()]);
    }

    #[test]
    fn splits_at_sentence_break_past_midpoint() {
        // "aaaa. " ends at char 6, past the midpoint of a 10-char window.
        let text = "aaaa aaaa. bbbbbbbbbb";
        let boundaries = compute_boundaries(text, 12);
        assert_eq!(boundaries[0], (0, 11));
        let chunks = slice_chunks(text, &boundaries).unwrap();
        assert_eq!(chunks[0], "aaaa aaaa.");
    }

    #[test]
    fn ignores_sentence_break_before_midpoint() {
        // The only ". " is at index 1, not past the midpoint (5), so the cut
        // backs off to whitespace instead.
        let text = "a. bbbb cccc dddd";
        let boundaries = compute_boundaries(text, 10);
        assert_eq!(boundaries[0], (0, 8));
    }

    #[test]
    fn hard_cuts_text_without_whitespace() {
        let text = "x".repeat(25);
        let chunks = Chunker::new().split(&text, 10, None);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].chars().count(), 10);
        assert_eq!(chunks[2].chars().count(), 5);
    }

    #[test]
    fn twelve_thousand_chars_make_three_chunks() {
        let text = words(2400);
        let chunks = Chunker::new().split(&text, 5000, None);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 5000));
        assert!(chunks.iter().all(|c| !c.is_empty()));
    }

    #[test]
    fn every_chunk_respects_limit() {
        let text = "One sentence here. Another one follows. ".repeat(200);
        for max in [17, 64, 333, 1000] {
            for chunk in Chunker::new().split(&text, max, None) {
                assert!(chunk.chars().count() <= max, "max {max}: {chunk:?}");
            }
        }
    }

    #[test]
    fn boundaries_cover_text_in_order() {
        let text = "First. Second sentence is longer. Third!\n\nFourth para. ".repeat(30);
        let boundaries = compute_boundaries(&text, 80);
        for pair in boundaries.windows(2) {
            assert!(pair[0].1 <= pair[1].0);
        }
        let joined: String = slice_chunks(&text, &boundaries).unwrap().join(" ");
        let original: Vec<&str> = text.split_whitespace().collect();
        let rebuilt: Vec<&str> = joined.split_whitespace().collect();
        assert_eq!(original, rebuilt);
    }

    #[test]
    fn counts_multibyte_characters_not_bytes() {
        let text = "é".repeat(12);
        let chunks = Chunker::new().split(&text, 5, None);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], "ééééé");
    }

    #[test]
    fn whitespace_only_range_is_dropped() {
        let text = format!("{}{}", "a".repeat(10), " ".repeat(20));
        let chunks = Chunker::new().split(&text, 10, None);
        assert_eq!(chunks, vec!["a".repeat(10)]);
    }

    #[test]
    fn slice_rejects_out_of_range_boundaries() {
        assert!(slice_chunks("short", &[(0, 99)]).is_none());
        assert!(slice_chunks("short", &[(3, 1)]).is_none());
    }

    #[test]
    fn cached_boundaries_survive_a_different_limit() {
        let dir = tempfile::tempdir().unwrap();
        let chunker = Chunker::with_cache(BoundaryCache::new(dir.path()));
        let key = RunKey::for_document(std::path::Path::new("/books/stable.txt"));
        let text = words(2400);

        let first = chunker.split(&text, 5000, Some(&key));
        let second = chunker.split(&text, 1000, Some(&key));
        assert_eq!(first, second);
        assert_eq!(second.len(), 3);
    }

    #[test]
    fn changed_content_invalidates_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = BoundaryCache::new(dir.path());
        let chunker = Chunker::with_cache(cache.clone());
        let key = RunKey::for_document(std::path::Path::new("/books/edited.txt"));

        let original = words(2400);
        chunker.split(&original, 5000, Some(&key));
        let stored = cache.load(&key).unwrap();

        let edited = format!("{original} extra words at the end.");
        let chunks = chunker.split(&edited, 1000, Some(&key));
        assert!(chunks.len() > 3);

        let restored = cache.load(&key).unwrap();
        assert_ne!(restored.content_hash, stored.content_hash);
        assert_eq!(restored.content_hash, content_hash(&edited));
    }

    #[test]
    fn corrupt_cache_falls_back_to_computing() {
        let dir = tempfile::tempdir().unwrap();
        let cache = BoundaryCache::new(dir.path());
        let key = RunKey::for_document(std::path::Path::new("/books/corrupt.txt"));
        std::fs::create_dir_all(dir.path()).unwrap();
        std::fs::write(cache.path_for(&key), "{{{ nope").unwrap();

        let chunks = Chunker::with_cache(cache).split("Hello there.", 100, Some(&key));
        assert_eq!(chunks, vec!["Hello there.".to_string()]);
    }
}
