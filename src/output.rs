//! Terminal helpers shared by the live display and the CLI.

use std::time::Duration;

/// Clear the current terminal line.
pub fn clear_line() {
    eprint!("\r\x1b[2K");
}

/// ANSI sequence moving the cursor up `n` lines and clearing to the end of
/// the screen. Empty for `n == 0`.
pub fn rewind_lines(n: usize) -> String {
    if n == 0 {
        String::new()
    } else {
        format!("\x1b[{n}F\x1b[J")
    }
}

/// Clear the whole screen and home the cursor.
pub fn clear_screen() {
    eprint!("\x1b[2J\x1b[H");
}

/// Compact elapsed-time format: `42s`, `3m 7s`, `2h 15m`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}
