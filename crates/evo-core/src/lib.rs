//! evo-core: interactive process sessions for the evo developer tool.
//!
//! Spawns commands on a pseudo-terminal, relays the controlling terminal's
//! input, output and window size to them while holding it in raw mode, and
//! supervises either a single run or a watch loop that restarts the command
//! when a file is written or a hotkey is pressed.

pub mod console;
pub mod error;
pub mod input;
pub mod pty;
pub mod supervisor;
pub mod terminal;
pub mod trigger;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used items at crate root.
pub use console::Console;
pub use error::{RelayDirection, SessionError, SessionResult};
pub use pty::{PtySession, SessionExit, SessionSpec};
pub use supervisor::{
    interrupted, RestartNotice, RestartPolicy, Supervisor, SupervisorState, WatchReport,
};
pub use terminal::{RawModeController, RawModeGuard, WindowSize};
pub use trigger::{FileWatchTrigger, HotkeyTrigger, RestartEvent, TriggerSource};
