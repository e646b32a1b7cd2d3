//! Run state machine shared by the driver, workers and command listener.
//!
//! ```text
//! Running ⇄ Paused
//!    │        │
//!    └──▶ Stopping ──▶ Stopped
//! ```
//!
//! `force_stop` and `delete_on_exit` are only raised by a stop request.
//! The controller never touches chunk data; it only flips flags that the
//! scheduler and driver observe.

use super::cancel::CancelToken;
use super::commands::UserCommand;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlState {
    Running,
    Paused,
    Stopping,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopKind {
    /// Let in-flight chunks finish.
    Graceful,
    /// Discard in-flight chunks.
    Force,
    /// Let in-flight chunks finish, then delete all progress.
    Delete,
}

/// What applying a user command did, for feedback to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Paused,
    Resumed,
    StopRequested,
    ForceStopRequested,
    DeleteRequested,
    ShowHelp,
    ClearScreen,
    /// Not applicable in the current state (e.g. resume while running).
    NoChange,
    /// Processing has not started yet.
    Ignored,
}

#[derive(Debug)]
struct Inner {
    state: ControlState,
    force_stop: bool,
    delete_on_exit: bool,
    processing_started: bool,
}

#[derive(Debug, Clone)]
pub struct ShutdownController {
    shared: Arc<(Mutex<Inner>, Condvar)>,
    cancel: CancelToken,
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownController {
    pub fn new() -> Self {
        Self {
            shared: Arc::new((
                Mutex::new(Inner {
                    state: ControlState::Running,
                    force_stop: false,
                    delete_on_exit: false,
                    processing_started: false,
                }),
                Condvar::new(),
            )),
            cancel: CancelToken::new(),
        }
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.shared.0.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn notify(&self) {
        self.shared.1.notify_all();
    }

    /// Token fired by [`ShutdownController::interrupt`]; handed to the
    /// synthesis client so in-flight requests abort.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> ControlState {
        self.inner().state
    }

    /// Start accepting user commands.
    pub fn start_processing(&self) {
        self.inner().processing_started = true;
    }

    /// Whether new chunks may be dequeued.
    pub fn should_continue(&self) -> bool {
        matches!(
            self.inner().state,
            ControlState::Running | ControlState::Paused
        )
    }

    pub fn is_paused(&self) -> bool {
        self.inner().state == ControlState::Paused
    }

    pub fn is_force_stop(&self) -> bool {
        self.inner().force_stop || self.cancel.is_cancelled()
    }

    pub fn should_delete_progress(&self) -> bool {
        self.inner().delete_on_exit
    }

    pub fn pause(&self) -> bool {
        let mut inner = self.inner();
        if inner.state != ControlState::Running {
            return false;
        }
        inner.state = ControlState::Paused;
        drop(inner);
        info!("processing paused");
        self.notify();
        true
    }

    pub fn resume(&self) -> bool {
        let mut inner = self.inner();
        if inner.state != ControlState::Paused {
            return false;
        }
        inner.state = ControlState::Running;
        drop(inner);
        info!("processing resumed");
        self.notify();
        true
    }

    /// Enter `Stopping`, raising the flag that matches `kind`.
    ///
    /// A stop already in progress can be escalated (e.g. stop then force)
    /// but not after [`ShutdownController::finish`]. Returns false if
    /// nothing changed.
    pub fn request_stop(&self, kind: StopKind) -> bool {
        let mut inner = self.inner();
        if inner.state == ControlState::Stopped {
            return false;
        }
        let was_stopping = inner.state == ControlState::Stopping;
        let changed = match kind {
            StopKind::Graceful => !was_stopping,
            StopKind::Force => !std::mem::replace(&mut inner.force_stop, true),
            StopKind::Delete => !std::mem::replace(&mut inner.delete_on_exit, true),
        };
        inner.state = ControlState::Stopping;
        drop(inner);
        if changed {
            debug!(?kind, "stop requested");
        }
        self.notify();
        changed || !was_stopping
    }

    /// External interrupt: force stop and cancel in-flight synthesis.
    ///
    /// Returns whether processing had started. When it had not, nothing is
    /// in flight and the caller may exit right away.
    pub fn interrupt(&self) -> bool {
        let started = self.inner().processing_started;
        self.request_stop(StopKind::Force);
        self.cancel.cancel();
        started
    }

    /// Mark the run as fully stopped. Later stop requests are no-ops.
    pub fn finish(&self) {
        self.inner().state = ControlState::Stopped;
        self.notify();
    }

    /// Block the calling thread while paused.
    ///
    /// Returns immediately when running; wakes on resume or any stop.
    pub fn handle_pause(&self) {
        let (lock, cvar) = &*self.shared;
        let mut inner = lock.lock().unwrap_or_else(|e| e.into_inner());
        while inner.state == ControlState::Paused {
            inner = cvar.wait(inner).unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Apply a parsed user command.
    pub fn apply(&self, command: UserCommand) -> CommandOutcome {
        if !self.inner().processing_started {
            return CommandOutcome::Ignored;
        }
        match command {
            UserCommand::Pause => {
                if self.pause() {
                    CommandOutcome::Paused
                } else {
                    CommandOutcome::NoChange
                }
            }
            UserCommand::Resume => {
                if self.resume() {
                    CommandOutcome::Resumed
                } else {
                    CommandOutcome::NoChange
                }
            }
            UserCommand::Stop => {
                self.request_stop(StopKind::Graceful);
                CommandOutcome::StopRequested
            }
            UserCommand::ForceStop => {
                self.request_stop(StopKind::Force);
                CommandOutcome::ForceStopRequested
            }
            UserCommand::StopAndDelete => {
                self.request_stop(StopKind::Delete);
                CommandOutcome::DeleteRequested
            }
            UserCommand::Help => CommandOutcome::ShowHelp,
            UserCommand::Clear => CommandOutcome::ClearScreen,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::{Duration, Instant};

    fn started() -> ShutdownController {
        let controller = ShutdownController::new();
        controller.start_processing();
        controller
    }

    #[test]
    fn starts_running() {
        let c = ShutdownController::new();
        assert_eq!(c.state(), ControlState::Running);
        assert!(c.should_continue());
        assert!(!c.is_force_stop());
        assert!(!c.should_delete_progress());
    }

    #[test]
    fn commands_ignored_before_processing() {
        let c = ShutdownController::new();
        assert_eq!(c.apply(UserCommand::Stop), CommandOutcome::Ignored);
        assert!(c.should_continue());
    }

    #[test]
    fn pause_resume_cycle() {
        let c = started();
        assert_eq!(c.apply(UserCommand::Pause), CommandOutcome::Paused);
        assert!(c.is_paused());
        assert!(c.should_continue());
        assert_eq!(c.apply(UserCommand::Pause), CommandOutcome::NoChange);
        assert_eq!(c.apply(UserCommand::Resume), CommandOutcome::Resumed);
        assert_eq!(c.apply(UserCommand::Resume), CommandOutcome::NoChange);
    }

    #[test]
    fn graceful_stop_sets_no_flags() {
        let c = started();
        c.apply(UserCommand::Stop);
        assert_eq!(c.state(), ControlState::Stopping);
        assert!(!c.should_continue());
        assert!(!c.is_force_stop());
        assert!(!c.should_delete_progress());
    }

    #[test]
    fn force_and_delete_flags() {
        let c = started();
        c.apply(UserCommand::ForceStop);
        assert!(c.is_force_stop());

        let d = started();
        d.apply(UserCommand::StopAndDelete);
        assert!(d.should_delete_progress());
        assert!(!d.is_force_stop());
    }

    #[test]
    fn stop_can_escalate_until_finished() {
        let c = started();
        assert!(c.request_stop(StopKind::Graceful));
        assert!(!c.request_stop(StopKind::Graceful));
        assert!(c.request_stop(StopKind::Force));
        c.finish();
        assert!(!c.request_stop(StopKind::Delete));
        assert!(!c.should_delete_progress());
        assert_eq!(c.state(), ControlState::Stopped);
    }

    #[test]
    fn pause_does_not_set_stop_flags() {
        let c = started();
        c.pause();
        assert!(!c.is_force_stop());
        assert!(!c.should_delete_progress());
    }

    #[test]
    fn interrupt_cancels_token() {
        let c = ShutdownController::new();
        let token = c.cancel_token();
        c.interrupt();
        assert!(token.is_cancelled());
        assert!(c.is_force_stop());
        assert!(!c.should_continue());
    }

    #[test]
    fn interrupt_reports_whether_processing_started() {
        let idle = ShutdownController::new();
        assert!(!idle.interrupt());
        assert!(idle.is_force_stop());

        let busy = started();
        assert!(busy.interrupt());
        assert!(busy.is_force_stop());
    }

    #[test]
    fn handle_pause_returns_immediately_when_running() {
        let c = started();
        let start = Instant::now();
        c.handle_pause();
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn handle_pause_blocks_until_resume() {
        let c = started();
        c.pause();
        let worker = c.clone();
        let handle = thread::spawn(move || {
            worker.handle_pause();
            worker.state()
        });
        thread::sleep(Duration::from_millis(50));
        assert!(!handle.is_finished());
        c.resume();
        assert_eq!(handle.join().unwrap(), ControlState::Running);
    }

    #[test]
    fn stop_releases_paused_thread() {
        let c = started();
        c.pause();
        let worker = c.clone();
        let handle = thread::spawn(move || worker.handle_pause());
        thread::sleep(Duration::from_millis(50));
        c.apply(UserCommand::Stop);
        handle.join().unwrap();
        assert!(!c.should_continue());
    }
}
