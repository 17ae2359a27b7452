//! PTY sessions using portable-pty.
//!
//! A [`PtySession`] binds one child process to a pseudo-terminal, relays
//! bytes between the PTY master and the console on two dedicated threads,
//! and mirrors the controlling terminal's window size onto the PTY.

use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use portable_pty::{native_pty_system, Child, ChildKiller, CommandBuilder, ExitStatus, MasterPty};
use tracing::{debug, info, warn};

use crate::error::{RelayDirection, SessionError, SessionResult};
use crate::input::InputTap;
use crate::terminal::{TerminalDevice, WindowSize};

/// How often the input relay checks whether its session has ended.
const INPUT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long `wait` lets the output relay drain after the child exits.
/// A grandchild that inherited the PTY can keep it open indefinitely.
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// How often `wait` polls the child for an exit status.
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Linux reports EIO on the master once every slave descriptor is closed.
const EIO: i32 = 5;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

type SharedMaster = Arc<Mutex<Option<Box<dyn MasterPty + Send>>>>;

/// The child is reaped and signalled under this lock, so a kill can never
/// reach a pid that has already been reaped and possibly recycled.
type SharedChild = Arc<Mutex<Box<dyn Child + Send + Sync>>>;

/// What to run: program, arguments and working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

impl SessionSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I, cwd: impl Into<PathBuf>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            cwd: cwd.into(),
        }
    }
}

impl std::fmt::Display for SessionSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// How a session's child process terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionExit {
    pub code: u32,
    pub success: bool,
}

/// One child process bound to a pseudo-terminal.
pub struct PtySession {
    id: u64,
    master: SharedMaster,
    child: SharedChild,
    reader: Option<Box<dyn Read + Send>>,
    writer: Option<Box<dyn Write + Send>>,
    alive: Arc<AtomicBool>,
    input_relay: Option<JoinHandle<()>>,
    output_done: Option<mpsc::Receiver<()>>,
}

impl PtySession {
    /// Allocate a PTY of `size` and spawn `spec` on its slave side.
    pub fn start(spec: SessionSpec, size: WindowSize) -> SessionResult<Self> {
        if !spec.cwd.is_dir() {
            return Err(SessionError::SpawnFailed(format!(
                "working directory {} does not exist",
                spec.cwd.display()
            )));
        }

        let pair = native_pty_system()
            .openpty(size.into())
            .map_err(|e| SessionError::SpawnFailed(format!("failed to open PTY: {e}")))?;

        let mut cmd = CommandBuilder::new(&spec.program);
        cmd.args(&spec.args);
        cmd.cwd(&spec.cwd);

        let mut child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| SessionError::SpawnFailed(format!("failed to spawn `{spec}`: {e}")))?;
        // Our copy of the slave would keep the master from ever seeing EOF.
        drop(pair.slave);

        let handles = pair
            .master
            .try_clone_reader()
            .and_then(|reader| pair.master.take_writer().map(|writer| (reader, writer)));
        let (reader, writer) = match handles {
            Ok(handles) => handles,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(SessionError::SpawnFailed(format!(
                    "failed to attach to PTY master: {e}"
                )));
            }
        };

        let id = NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed);
        info!(session = id, command = %spec, pid = ?child.process_id(), %size, "session started");

        Ok(Self {
            id,
            master: Arc::new(Mutex::new(Some(pair.master))),
            child: Arc::new(Mutex::new(child)),
            reader: Some(reader),
            writer: Some(writer),
            alive: Arc::new(AtomicBool::new(true)),
            input_relay: None,
            output_done: None,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Start relaying `input` into the PTY and PTY output into `output`.
    ///
    /// Each direction runs on its own thread. An error in one direction is
    /// logged and stops that direction only.
    pub fn relay(&mut self, input: InputTap, output: Box<dyn Write + Send>) -> SessionResult<()> {
        let (Some(reader), Some(writer)) = (self.reader.take(), self.writer.take()) else {
            warn!(session = self.id, "relay already running");
            return Ok(());
        };

        let (done_tx, done_rx) = mpsc::channel();
        let id = self.id;
        thread::Builder::new()
            .name(format!("evo-pty-out-{id}"))
            .spawn(move || relay_output(id, reader, output, done_tx))?;
        self.output_done = Some(done_rx);

        let alive = Arc::clone(&self.alive);
        let handle = thread::Builder::new()
            .name(format!("evo-pty-in-{id}"))
            .spawn(move || relay_input(id, input, writer, alive))?;
        self.input_relay = Some(handle);

        debug!(session = id, "relay started");
        Ok(())
    }

    /// Copy the controlling terminal's current size onto the PTY.
    pub fn propagate_resize(&self, terminal: &dyn TerminalDevice) -> SessionResult<WindowSize> {
        self.resizer().propagate(terminal)
    }

    /// The PTY's window size, as the child would see it.
    pub fn size(&self) -> SessionResult<WindowSize> {
        let master = self.master.lock().unwrap_or_else(PoisonError::into_inner);
        let master = master
            .as_ref()
            .ok_or_else(|| SessionError::Io(std::io::Error::other("PTY already closed")))?;
        let size = master.get_size().map_err(|e| {
            SessionError::Io(std::io::Error::other(format!("PTY size query failed: {e}")))
        })?;
        Ok(size.into())
    }

    /// A handle for resizing the PTY from another task.
    pub fn resizer(&self) -> PtyResizer {
        PtyResizer {
            session: self.id,
            master: Arc::clone(&self.master),
        }
    }

    /// A handle for terminating the child from another task.
    pub fn killer(&self) -> SessionKiller {
        SessionKiller {
            session: self.id,
            child: Arc::clone(&self.child),
            alive: Arc::clone(&self.alive),
        }
    }

    /// Block until the child exits.
    ///
    /// The PTY descriptors are released whether or not the wait succeeded.
    pub fn wait(mut self) -> SessionResult<SessionExit> {
        let status = self.reap();
        self.release();

        let status = status?;
        let exit = SessionExit {
            code: status.exit_code(),
            success: status.success(),
        };
        info!(session = self.id, code = exit.code, success = exit.success, "session exited");
        Ok(exit)
    }

    fn reap(&self) -> std::io::Result<ExitStatus> {
        loop {
            {
                let mut child = self.child.lock().unwrap_or_else(PoisonError::into_inner);
                let polled = child.try_wait();
                if !matches!(polled, Ok(None)) {
                    self.alive.store(false, Ordering::Release);
                }
                if let Some(status) = polled? {
                    return Ok(status);
                }
            }
            thread::sleep(WAIT_POLL_INTERVAL);
        }
    }

    fn release(&mut self) {
        if let Some(done) = self.output_done.take() {
            if let Err(RecvTimeoutError::Timeout) = done.recv_timeout(OUTPUT_DRAIN_TIMEOUT) {
                warn!(session = self.id, "PTY output still open after child exit, detaching");
            }
        }
        if let Some(handle) = self.input_relay.take() {
            let _ = handle.join();
        }
        self.reader.take();
        self.writer.take();
        self.master
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        debug!(session = self.id, "PTY released");
    }
}

impl Drop for PtySession {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::Release);
    }
}

/// Resizes a session's PTY. Becomes a no-op once the session is released.
#[derive(Clone)]
pub struct PtyResizer {
    session: u64,
    master: SharedMaster,
}

impl PtyResizer {
    pub fn propagate(&self, terminal: &dyn TerminalDevice) -> SessionResult<WindowSize> {
        let size = terminal.size()?;
        self.apply(size)?;
        Ok(size)
    }

    pub fn apply(&self, size: WindowSize) -> SessionResult<()> {
        let master = self.master.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(master) = master.as_ref() else {
            return Ok(());
        };
        master.resize(size.into()).map_err(|e| {
            SessionError::Io(std::io::Error::other(format!("PTY resize failed: {e}")))
        })?;
        debug!(session = self.session, %size, "PTY resized");
        Ok(())
    }
}

/// Terminates a session's child process.
#[derive(Clone)]
pub struct SessionKiller {
    session: u64,
    child: SharedChild,
    alive: Arc<AtomicBool>,
}

impl SessionKiller {
    /// Kill the child if it is still running.
    ///
    /// Sends SIGHUP first and escalates to SIGKILL if the child is still
    /// around after a short grace period, so this may block briefly.
    pub fn kill(&self) {
        let mut child = self.child.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.alive.load(Ordering::Acquire) {
            return;
        }
        match child.kill() {
            Ok(()) => info!(session = self.session, "session killed"),
            Err(e) => debug!(session = self.session, "kill failed: {e}"),
        }
    }
}

fn relay_output(
    session: u64,
    mut reader: Box<dyn Read + Send>,
    mut output: Box<dyn Write + Send>,
    done: mpsc::Sender<()>,
) {
    let mut buf = [0u8; 8192];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if let Err(e) = output.write_all(&buf[..n]).and_then(|()| output.flush()) {
                    report_relay_error(session, RelayDirection::Output, e);
                    break;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) if e.raw_os_error() == Some(EIO) => break,
            Err(e) => {
                report_relay_error(session, RelayDirection::Output, e);
                break;
            }
        }
    }
    debug!(session, "output relay finished");
    let _ = done.send(());
}

fn relay_input(
    session: u64,
    input: InputTap,
    mut writer: Box<dyn Write + Send>,
    alive: Arc<AtomicBool>,
) {
    let mut open = true;
    while alive.load(Ordering::Acquire) {
        if !open {
            // Keep the writer until the child is gone: dropping it sends EOF.
            thread::sleep(INPUT_POLL_INTERVAL);
            continue;
        }
        match input.recv_timeout(INPUT_POLL_INTERVAL) {
            Ok(bytes) => {
                if let Err(e) = writer.write_all(&bytes).and_then(|()| writer.flush()) {
                    report_relay_error(session, RelayDirection::Input, e);
                    open = false;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                debug!(session, "input source detached");
                open = false;
            }
        }
    }
    debug!(session, "input relay finished");
}

fn report_relay_error(session: u64, direction: RelayDirection, source: std::io::Error) {
    warn!(session, "{}", SessionError::RelayIo { direction, source });
}
