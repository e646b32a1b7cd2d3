//! Live progress rendering.
//!
//! The aggregator builds a frame of text lines and hands it to a
//! [`DisplaySink`]; sinks decide where it goes.

use super::progress::ProgressSnapshot;
use crate::output::{format_elapsed, rewind_lines};
use std::collections::HashSet;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

/// Pluggable progress output.
pub trait DisplaySink: Send + 'static {
    /// Show a full frame, replacing the previous one.
    fn render(&mut self, lines: &[String]);

    /// Called once after the last frame.
    fn finish(&mut self) {}

    fn name(&self) -> &'static str {
        "display"
    }
}

/// Build the lines of one frame.
///
/// `recent_completed` and `active` hold 0-based chunk indices; `active`
/// pairs each with how long it has been running.
pub fn render_lines(
    snapshot: &ProgressSnapshot,
    recent_completed: &[usize],
    active: &[(usize, Duration)],
) -> Vec<String> {
    let total = snapshot.total_chunks;
    let mut lines = Vec::with_capacity(recent_completed.len() + active.len() + 1);

    for index in recent_completed {
        lines.push(format!("✅ Chunk {}/{total} completed", index + 1));
    }
    for (index, elapsed) in active {
        lines.push(format!(
            "📝 Processing chunk {}/{total} ({})",
            index + 1,
            format_elapsed(*elapsed)
        ));
    }

    let eta = snapshot
        .eta
        .map(format_elapsed)
        .unwrap_or_else(|| "calculating...".to_string());
    let mut summary = format!(
        "Progress: {}/{total} | Session: {} | Total: {} | ETA: {eta}",
        snapshot.completed,
        format_elapsed(snapshot.session_elapsed),
        format_elapsed(snapshot.total_elapsed),
    );
    if snapshot.failed > 0 {
        summary.push_str(&format!(" | Failed: {}", snapshot.failed));
    }
    lines.push(summary);
    lines
}

/// Redraws the frame in place on stderr.
#[derive(Debug, Default)]
pub struct TerminalDisplay {
    drawn_lines: usize,
}

impl TerminalDisplay {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DisplaySink for TerminalDisplay {
    fn render(&mut self, lines: &[String]) {
        let mut frame = rewind_lines(self.drawn_lines);
        for line in lines {
            frame.push_str(line);
            frame.push('\n');
        }
        let mut stderr = std::io::stderr().lock();
        stderr.write_all(frame.as_bytes()).ok();
        stderr.flush().ok();
        self.drawn_lines = lines.len();
    }

    fn finish(&mut self) {
        self.drawn_lines = 0;
    }

    fn name(&self) -> &'static str {
        "terminal"
    }
}

/// Sends progress to `tracing`: newly completed chunks at info, the summary
/// at debug. For non-interactive runs.
#[derive(Debug, Default)]
pub struct LogDisplay {
    seen: HashSet<String>,
}

impl LogDisplay {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DisplaySink for LogDisplay {
    fn render(&mut self, lines: &[String]) {
        let Some((summary, body)) = lines.split_last() else {
            return;
        };
        for line in body.iter().filter(|l| l.starts_with('✅')) {
            if self.seen.insert(line.clone()) {
                info!("{line}");
            }
        }
        debug!("{summary}");
    }

    fn finish(&mut self) {
        self.seen.clear();
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Keeps every frame for inspection in tests.
#[derive(Debug, Clone, Default)]
pub struct CollectorDisplay {
    frames: Arc<Mutex<Vec<Vec<String>>>>,
    finished: Arc<Mutex<bool>>,
}

impl CollectorDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> Vec<Vec<String>> {
        self.frames.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn last_frame(&self) -> Option<Vec<String>> {
        self.frames
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .cloned()
    }

    pub fn is_finished(&self) -> bool {
        *self.finished.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl DisplaySink for CollectorDisplay {
    fn render(&mut self, lines: &[String]) {
        self.frames
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(lines.to_vec());
    }

    fn finish(&mut self) {
        *self.finished.lock().unwrap_or_else(|e| e.into_inner()) = true;
    }

    fn name(&self) -> &'static str {
        "collector"
    }
}
