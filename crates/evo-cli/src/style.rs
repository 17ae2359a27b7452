//! Colored output helpers.
//!
//! Styling is a pure function of the [`Palette`] passed in; nothing here
//! touches global state.

use std::io::IsTerminal;

use crossterm::style::{style, Color, Stylize};

/// Whether, and how, to color text written to stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    enabled: bool,
}

impl Palette {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Color unless `--no-color`, `NO_COLOR` is set, or stdout is not a tty.
    pub fn detect(no_color: bool) -> Self {
        let enabled =
            !no_color && std::env::var_os("NO_COLOR").is_none() && std::io::stdout().is_terminal();
        Self::new(enabled)
    }

    pub fn red(&self, text: &str) -> String {
        self.paint(text, Color::Red)
    }

    pub fn yellow(&self, text: &str) -> String {
        self.paint(text, Color::Yellow)
    }

    pub fn green(&self, text: &str) -> String {
        self.paint(text, Color::Green)
    }

    pub fn blue(&self, text: &str) -> String {
        self.paint(text, Color::Blue)
    }

    /// Dim gray italics, for quotes.
    pub fn quote(&self, text: &str) -> String {
        if !self.enabled {
            return text.to_string();
        }
        style(text)
            .with(Color::Rgb {
                r: 0x70,
                g: 0x70,
                b: 0x70,
            })
            .italic()
            .to_string()
    }

    fn paint(&self, text: &str, color: Color) -> String {
        if !self.enabled {
            return text.to_string();
        }
        style(text).with(color).to_string()
    }
}
