//! Interactive selection of a text file to convert.

use crate::text::format_file_size;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A `.txt` file found under the search root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Find `.txt` files under `root`, recursively, sorted by path.
///
/// Hidden directories are skipped; unreadable entries are ignored.
pub fn find_text_files(root: &Path) -> Vec<Candidate> {
    let mut found: Vec<Candidate> = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"))
        })
        .map(|e| Candidate {
            size_bytes: e.metadata().map(|m| m.len()).unwrap_or(0),
            path: e.into_path(),
        })
        .collect();
    found.sort_by(|a, b| a.path.cmp(&b.path));
    found
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|n| n.starts_with('.'))
}

/// What the user typed at the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    File(PathBuf),
    Quit,
}

/// Interpret one answer: a 1-based number from the list, `q`, or a path.
///
/// Returns `None` for an out-of-range number or a path that is not a file.
pub fn parse_selection(answer: &str, candidates: &[Candidate]) -> Option<Selection> {
    let answer = answer.trim();
    if answer.eq_ignore_ascii_case("q") || answer.eq_ignore_ascii_case("quit") {
        return Some(Selection::Quit);
    }
    if let Ok(n) = answer.parse::<usize>() {
        return n
            .checked_sub(1)
            .and_then(|i| candidates.get(i))
            .map(|c| Selection::File(c.path.clone()));
    }
    let path = PathBuf::from(answer);
    path.is_file().then_some(Selection::File(path))
}

/// List candidates under `root` on `output` and read answers from `input`
/// until one is valid. EOF counts as quit.
pub fn pick_file<R: BufRead, W: Write>(
    root: &Path,
    input: &mut R,
    output: &mut W,
) -> std::io::Result<Option<PathBuf>> {
    let candidates = find_text_files(root);
    if candidates.is_empty() {
        writeln!(output, "No .txt files found under {}", root.display())?;
    } else {
        writeln!(output, "Text files:")?;
        for (i, c) in candidates.iter().enumerate() {
            let shown = c.path.strip_prefix(root).unwrap_or(&c.path);
            writeln!(
                output,
                "  [{}] {} ({})",
                i + 1,
                shown.display(),
                format_file_size(c.size_bytes)
            )?;
        }
    }

    loop {
        write!(output, "Choose a number, enter a path, or q to quit: ")?;
        output.flush()?;
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        match parse_selection(&line, &candidates) {
            Some(Selection::File(path)) => return Ok(Some(path)),
            Some(Selection::Quit) => return Ok(None),
            None => writeln!(output, "Not a valid choice: {}", line.trim())?,
        }
    }
}
