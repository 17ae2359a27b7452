//! Controlling-terminal access: raw mode and window size.
//!
//! [`RawModeController`] hands out [`RawModeGuard`]s. The first live guard
//! switches the terminal into raw mode, the last one dropped restores it, so
//! the terminal is never put into raw mode twice without a restore in between.
//! crossterm keeps the snapshot of the original termios internally and
//! reapplies it on restore.

use std::io::IsTerminal;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crossterm::terminal;
use portable_pty::PtySize;
use tracing::{debug, warn};

use crate::error::{SessionError, SessionResult};

/// Terminal geometry in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSize {
    pub rows: u16,
    pub cols: u16,
}

impl WindowSize {
    /// Used when the controlling terminal cannot report its size.
    pub const FALLBACK: WindowSize = WindowSize { rows: 24, cols: 80 };

    pub fn new(rows: u16, cols: u16) -> Self {
        Self { rows, cols }
    }
}

impl std::fmt::Display for WindowSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.cols, self.rows)
    }
}

impl From<WindowSize> for PtySize {
    fn from(size: WindowSize) -> Self {
        PtySize {
            rows: size.rows,
            cols: size.cols,
            pixel_width: 0,
            pixel_height: 0,
        }
    }
}

impl From<PtySize> for WindowSize {
    fn from(size: PtySize) -> Self {
        Self {
            rows: size.rows,
            cols: size.cols,
        }
    }
}

/// The operations the session core needs from the controlling terminal.
pub trait TerminalDevice: Send + Sync {
    /// Whether standard input is attached to a terminal.
    fn is_terminal(&self) -> bool;

    fn enable_raw(&self) -> std::io::Result<()>;

    fn disable_raw(&self) -> std::io::Result<()>;

    /// Current window size, read from the OS on every call.
    fn size(&self) -> std::io::Result<WindowSize>;
}

/// The process's own stdin/stdout terminal, driven through crossterm.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdioTerminal;

impl TerminalDevice for StdioTerminal {
    fn is_terminal(&self) -> bool {
        std::io::stdin().is_terminal()
    }

    fn enable_raw(&self) -> std::io::Result<()> {
        terminal::enable_raw_mode()
    }

    fn disable_raw(&self) -> std::io::Result<()> {
        terminal::disable_raw_mode()
    }

    fn size(&self) -> std::io::Result<WindowSize> {
        let (cols, rows) = terminal::size()?;
        Ok(WindowSize { rows, cols })
    }
}

/// Scoped, counted ownership of the terminal's raw mode.
pub struct RawModeController {
    device: Arc<dyn TerminalDevice>,
    holders: Mutex<usize>,
    entries: AtomicUsize,
    restores: AtomicUsize,
}

impl RawModeController {
    pub fn new(device: Arc<dyn TerminalDevice>) -> Arc<Self> {
        Arc::new(Self {
            device,
            holders: Mutex::new(0),
            entries: AtomicUsize::new(0),
            restores: AtomicUsize::new(0),
        })
    }

    /// Enter raw mode, or join the raw mode another guard already holds.
    ///
    /// Fails with [`SessionError::TerminalModeFailed`] when standard input is
    /// not a terminal or the mode switch is refused.
    pub fn acquire(self: &Arc<Self>) -> SessionResult<RawModeGuard> {
        let mut holders = self.holders.lock().unwrap_or_else(PoisonError::into_inner);
        if *holders == 0 {
            if !self.device.is_terminal() {
                return Err(SessionError::TerminalModeFailed(
                    "standard input is not a terminal".into(),
                ));
            }
            self.device.enable_raw().map_err(|e| {
                SessionError::TerminalModeFailed(format!("failed to enable raw terminal mode: {e}"))
            })?;
            self.entries.fetch_add(1, Ordering::SeqCst);
            debug!("entered raw mode");
        }
        *holders += 1;
        Ok(RawModeGuard {
            controller: Arc::clone(self),
        })
    }

    fn release(&self) {
        let mut holders = self.holders.lock().unwrap_or_else(PoisonError::into_inner);
        *holders = holders.saturating_sub(1);
        if *holders > 0 {
            return;
        }
        if let Err(e) = self.device.disable_raw() {
            warn!("{}", SessionError::RestoreFailed(e.to_string()));
        }
        self.restores.fetch_add(1, Ordering::SeqCst);
        debug!("restored terminal mode");
    }

    /// Whether any guard is currently alive.
    pub fn is_raw(&self) -> bool {
        *self.holders.lock().unwrap_or_else(PoisonError::into_inner) > 0
    }

    /// Number of times raw mode was entered.
    pub fn entries(&self) -> usize {
        self.entries.load(Ordering::SeqCst)
    }

    /// Number of times a restore was attempted.
    pub fn restores(&self) -> usize {
        self.restores.load(Ordering::SeqCst)
    }
}

/// RAII guard that restores the terminal to its original mode on drop.
pub struct RawModeGuard {
    controller: Arc<RawModeController>,
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        self.controller.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedTerminal;

    #[test]
    fn guard_restores_on_drop() {
        let term = ScriptedTerminal::new(WindowSize::new(24, 80));
        let controller = RawModeController::new(term.clone());

        let guard = controller.acquire().unwrap();
        assert!(term.is_raw());
        assert!(controller.is_raw());
        drop(guard);

        assert!(!term.is_raw());
        assert_eq!(controller.entries(), 1);
        assert_eq!(controller.restores(), 1);
    }

    #[test]
    fn overlapping_guards_share_one_entry() {
        let term = ScriptedTerminal::new(WindowSize::new(24, 80));
        let controller = RawModeController::new(term.clone());

        let first = controller.acquire().unwrap();
        let second = controller.acquire().unwrap();
        assert_eq!(controller.entries(), 1);

        drop(first);
        assert!(term.is_raw(), "second holder still needs raw mode");
        drop(second);

        assert!(!term.is_raw());
        assert_eq!(controller.entries(), 1);
        assert_eq!(controller.restores(), 1);
    }

    #[test]
    fn not_a_terminal_is_refused() {
        let term = ScriptedTerminal::detached();
        let controller = RawModeController::new(term.clone());

        let err = controller.acquire().err().unwrap();
        assert!(matches!(err, SessionError::TerminalModeFailed(_)));
        assert_eq!(controller.entries(), 0);
        assert!(!controller.is_raw());
    }

    #[test]
    fn failed_restore_is_still_counted() {
        let term = ScriptedTerminal::new(WindowSize::new(24, 80));
        term.fail_restore();
        let controller = RawModeController::new(term.clone());

        drop(controller.acquire().unwrap());

        assert_eq!(controller.entries(), controller.restores());
        assert!(!controller.is_raw());
    }

    #[test]
    fn guard_restores_during_unwind() {
        let term = ScriptedTerminal::new(WindowSize::new(24, 80));
        let controller = RawModeController::new(term.clone());

        let inner = Arc::clone(&controller);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _guard = inner.acquire().unwrap();
            panic!("session blew up");
        }));

        assert!(result.is_err());
        assert!(!term.is_raw());
        assert_eq!(controller.restores(), 1);
    }

    #[test]
    fn window_size_display_is_cols_by_rows() {
        assert_eq!(WindowSize::new(40, 120).to_string(), "120x40");
    }
}
