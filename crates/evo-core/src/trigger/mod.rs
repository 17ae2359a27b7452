//! Restart triggers for the watch loop.
//!
//! A [`TriggerSource`] pushes payload-free [`RestartEvent`]s into a channel
//! owned by the supervisor, which does not need to know what produced them.

pub mod file_watch;
pub mod hotkey;

pub use file_watch::FileWatchTrigger;
pub use hotkey::HotkeyTrigger;

use crate::error::SessionResult;

/// "Restart requested now."
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartEvent;

pub type RestartSender = tokio::sync::mpsc::UnboundedSender<RestartEvent>;

/// Something that asks the supervisor to start a fresh session.
pub trait TriggerSource {
    /// Begin emitting events into `events`.
    ///
    /// Errors are [`crate::SessionError::TriggerSetupFailed`] and are fatal to
    /// the watch loop.
    fn start(&mut self, events: RestartSender) -> SessionResult<()>;

    /// Stop emitting events and release any OS registration.
    fn stop(&mut self);

    /// Human-readable description for logs and status lines.
    fn describe(&self) -> String;
}
