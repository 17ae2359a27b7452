//! The terminal endpoints a session is relayed to.

use std::io::Write;
use std::sync::Arc;

use crate::input::InputPump;
use crate::terminal::{StdioTerminal, TerminalDevice};

/// Produces a fresh writer for each session's output relay.
pub type OutputFactory = Arc<dyn Fn() -> Box<dyn Write + Send> + Send + Sync>;

/// Controlling terminal, keyboard input and output sink, bundled.
#[derive(Clone)]
pub struct Console {
    terminal: Arc<dyn TerminalDevice>,
    input: InputPump,
    output: OutputFactory,
}

impl Console {
    /// The process's real stdin/stdout.
    pub fn stdio() -> Self {
        Self::new(
            Arc::new(StdioTerminal),
            InputPump::stdin(),
            Arc::new(|| Box::new(std::io::stdout())),
        )
    }

    pub fn new(terminal: Arc<dyn TerminalDevice>, input: InputPump, output: OutputFactory) -> Self {
        Self {
            terminal,
            input,
            output,
        }
    }

    pub fn terminal(&self) -> &Arc<dyn TerminalDevice> {
        &self.terminal
    }

    pub fn input(&self) -> &InputPump {
        &self.input
    }

    pub fn output(&self) -> Box<dyn Write + Send> {
        (self.output)()
    }
}
