//! Subcommand implementations.
//!
//! Each command returns the process exit code it wants; errors bubble up to
//! `main` which prints them and exits 1.

pub mod commit;
pub mod inspire;
pub mod make;
pub mod test_loop;

use anyhow::Result;
use evo_core::{Console, SessionError, SessionExit, SessionSpec, Supervisor};
use tracing::debug;

/// Exit code used when a run is stopped by SIGINT/SIGTERM.
pub const INTERRUPTED_EXIT: i32 = 130;

/// Run `spec` once on a pseudo-terminal attached to this terminal.
pub async fn run_interactive(spec: SessionSpec) -> Result<i32> {
    debug!(command = %spec, "running interactively");
    let mut supervisor = Supervisor::new(Console::stdio());
    match supervisor.run_once(&spec).await {
        Ok(exit) => Ok(exit_code(exit)),
        Err(SessionError::Interrupted) => Ok(INTERRUPTED_EXIT),
        Err(e) => Err(anyhow::Error::new(e).context(format!("failed to run `{spec}`"))),
    }
}

/// Map a child's exit status onto our own process exit code.
pub fn exit_code(exit: SessionExit) -> i32 {
    if exit.success {
        return 0;
    }
    match i32::try_from(exit.code) {
        Ok(0) | Err(_) => 1,
        Ok(code) => code,
    }
}
