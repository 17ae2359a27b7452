use thiserror::Error;

/// Which way bytes were flowing when a relay failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayDirection {
    /// Controlling terminal input → PTY master.
    Input,
    /// PTY master → controlling terminal output.
    Output,
}

impl std::fmt::Display for RelayDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelayDirection::Input => f.write_str("stdin -> pty"),
            RelayDirection::Output => f.write_str("pty -> stdout"),
        }
    }
}

/// Errors produced by the session core.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to spawn session: {0}")]
    SpawnFailed(String),

    #[error("cannot switch terminal mode: {0}")]
    TerminalModeFailed(String),

    #[error("relay error ({direction}): {source}")]
    RelayIo {
        direction: RelayDirection,
        #[source]
        source: std::io::Error,
    },

    #[error("restart trigger setup failed: {0}")]
    TriggerSetupFailed(String),

    #[error("failed to restore terminal: {0}")]
    RestoreFailed(String),

    #[error("interrupted")]
    Interrupted,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SessionResult<T> = Result<T, SessionError>;
