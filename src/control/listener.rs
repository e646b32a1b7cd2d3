//! Background thread reading user commands line by line.

use super::commands::UserCommand;
use super::controller::{CommandOutcome, ShutdownController};
use std::io::BufRead;
use std::thread::{self, JoinHandle};
use tracing::debug;

/// Feedback for one input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerEvent {
    Applied(UserCommand, CommandOutcome),
    Unknown(String),
}

/// Read commands from `reader` and apply them to `controller`.
///
/// The thread exits on EOF, on a read error, or after the line that follows
/// a stop. Since it blocks on input it is not joined on shutdown; callers
/// drop the handle.
pub fn spawn_command_listener<R, F>(
    reader: R,
    controller: ShutdownController,
    mut on_event: F,
) -> std::io::Result<JoinHandle<()>>
where
    R: BufRead + Send + 'static,
    F: FnMut(ListenerEvent) + Send + 'static,
{
    thread::Builder::new()
        .name("command-listener".to_string())
        .spawn(move || {
            for line in reader.lines() {
                let Ok(line) = line else {
                    break;
                };
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                match UserCommand::parse(trimmed) {
                    Some(command) => {
                        let outcome = controller.apply(command);
                        on_event(ListenerEvent::Applied(command, outcome));
                    }
                    None => on_event(ListenerEvent::Unknown(trimmed.to_string())),
                }
                if !controller.should_continue() {
                    break;
                }
            }
            debug!("command listener exiting");
        })
}
