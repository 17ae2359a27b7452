//! In-memory stand-ins for the controlling terminal, used by unit tests.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::console::Console;
use crate::input::InputPump;
use crate::terminal::{TerminalDevice, WindowSize};

/// A terminal whose size and tty-ness are set by the test.
pub(crate) struct ScriptedTerminal {
    tty: bool,
    size: Mutex<WindowSize>,
    raw: AtomicBool,
    restore_fails: AtomicBool,
}

impl ScriptedTerminal {
    pub(crate) fn new(size: WindowSize) -> Arc<Self> {
        Arc::new(Self {
            tty: true,
            size: Mutex::new(size),
            raw: AtomicBool::new(false),
            restore_fails: AtomicBool::new(false),
        })
    }

    /// A terminal that reports stdin is not a tty.
    pub(crate) fn detached() -> Arc<Self> {
        Arc::new(Self {
            tty: false,
            size: Mutex::new(WindowSize::FALLBACK),
            raw: AtomicBool::new(false),
            restore_fails: AtomicBool::new(false),
        })
    }

    pub(crate) fn set_size(&self, size: WindowSize) {
        *self.size.lock().unwrap() = size;
    }

    pub(crate) fn is_raw(&self) -> bool {
        self.raw.load(Ordering::SeqCst)
    }

    pub(crate) fn fail_restore(&self) {
        self.restore_fails.store(true, Ordering::SeqCst);
    }
}

impl TerminalDevice for ScriptedTerminal {
    fn is_terminal(&self) -> bool {
        self.tty
    }

    fn enable_raw(&self) -> io::Result<()> {
        if self.raw.swap(true, Ordering::SeqCst) {
            return Err(io::Error::other("raw mode entered twice"));
        }
        Ok(())
    }

    fn disable_raw(&self) -> io::Result<()> {
        self.raw.store(false, Ordering::SeqCst);
        if self.restore_fails.load(Ordering::SeqCst) {
            return Err(io::Error::other("tcsetattr refused"));
        }
        Ok(())
    }

    fn size(&self) -> io::Result<WindowSize> {
        Ok(*self.size.lock().unwrap())
    }
}

/// Collects everything relayed out of a PTY.
#[derive(Clone, Default)]
pub(crate) struct SharedOutput(Arc<Mutex<Vec<u8>>>);

impl SharedOutput {
    pub(crate) fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for SharedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A console with no keyboard input and captured output.
pub(crate) fn scripted_console(terminal: Arc<ScriptedTerminal>, output: SharedOutput) -> Console {
    Console::new(
        terminal,
        InputPump::from_reader(io::empty()),
        Arc::new(move || Box::new(output.clone())),
    )
}
