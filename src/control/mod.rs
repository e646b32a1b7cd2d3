//! Cooperative pause/stop control.

pub mod cancel;
pub mod commands;
pub mod controller;
pub mod listener;

pub use cancel::CancelToken;
pub use commands::{HELP_TEXT, UserCommand};
pub use controller::{CommandOutcome, ControlState, ShutdownController, StopKind};
pub use listener::{ListenerEvent, spawn_command_listener};
