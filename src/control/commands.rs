//! Text commands typed by the user while a conversion runs.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserCommand {
    Pause,
    Resume,
    /// Finish in-flight chunks, then stop (`s`, `q`).
    Stop,
    /// Stop now and redo in-flight chunks next time.
    ForceStop,
    /// Stop and delete all saved progress.
    StopAndDelete,
    Help,
    Clear,
}

impl UserCommand {
    /// Parse one input line. Case and surrounding whitespace are ignored.
    pub fn parse(input: &str) -> Option<Self> {
        let command = input.trim().to_ascii_lowercase();
        let parsed = match command.as_str() {
            "p" | "pause" => Self::Pause,
            "r" | "resume" => Self::Resume,
            "s" | "stop" | "q" | "quit" => Self::Stop,
            "f" | "force" | "fs" | "force-stop" => Self::ForceStop,
            "sd" | "stop-delete" | "delete" | "abort" => Self::StopAndDelete,
            "h" | "help" => Self::Help,
            "c" | "clear" => Self::Clear,
            _ => return None,
        };
        Some(parsed)
    }
}

pub const HELP_TEXT: &str = "\
p/pause     Pause after the current chunk
r/resume    Resume from pause
s/stop      Stop and save progress
q/quit      Stop and save progress
f/force     Force stop now (in-flight chunks are redone next run)
sd/delete   Stop and DELETE all progress
h/help      Show this help
c/clear     Clear the console";
