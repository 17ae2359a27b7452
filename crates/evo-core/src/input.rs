//! Keyboard input routing.
//!
//! Standard input can only be read by one thread at a time, and a blocked
//! read cannot be cancelled. [`InputPump`] owns that single reader for the
//! whole process and forwards each chunk to the most recently attached
//! [`InputTap`]. Older taps are disconnected when a newer one attaches.

use std::io::Read;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{RelayDirection, SessionError};

type Source = Box<dyn Read + Send>;

#[derive(Default)]
struct Route {
    generation: u64,
    target: Option<mpsc::Sender<Vec<u8>>>,
}

struct PumpInner {
    /// Taken by the reader thread when it starts.
    source: Mutex<Option<Source>>,
    route: Mutex<Route>,
}

impl PumpInner {
    fn route(&self) -> MutexGuard<'_, Route> {
        self.route.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Process-wide reader of keyboard input.
#[derive(Clone)]
pub struct InputPump {
    inner: Arc<PumpInner>,
}

impl InputPump {
    /// Pump the process's standard input.
    pub fn stdin() -> Self {
        Self::from_reader(std::io::stdin())
    }

    pub fn from_reader(reader: impl Read + Send + 'static) -> Self {
        Self {
            inner: Arc::new(PumpInner {
                source: Mutex::new(Some(Box::new(reader))),
                route: Mutex::new(Route::default()),
            }),
        }
    }

    /// Route all further input to a new tap.
    ///
    /// The reader thread is started on the first attach, so nothing is
    /// consumed from stdin before a session wants it.
    pub fn attach(&self) -> InputTap {
        let (tx, rx) = mpsc::channel();
        let generation = {
            let mut route = self.inner.route();
            route.generation += 1;
            route.target = Some(tx);
            route.generation
        };
        self.ensure_started();
        InputTap {
            rx,
            generation,
            inner: Arc::clone(&self.inner),
        }
    }

    fn ensure_started(&self) {
        let source = self
            .inner
            .source
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(source) = source else {
            return;
        };
        let inner = Arc::clone(&self.inner);
        if let Err(e) = thread::Builder::new()
            .name("evo-stdin".into())
            .spawn(move || pump(inner, source))
        {
            warn!("failed to start stdin reader: {e}");
        }
    }
}

fn pump(inner: Arc<PumpInner>, mut source: Source) {
    let mut buf = [0u8; 1024];
    loop {
        match source.read(&mut buf) {
            Ok(0) => {
                debug!("stdin closed");
                break;
            }
            Ok(n) => {
                let route = inner.route();
                if let Some(tx) = &route.target {
                    let _ = tx.send(buf[..n].to_vec());
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!(
                    "{}",
                    SessionError::RelayIo {
                        direction: RelayDirection::Input,
                        source: e,
                    }
                );
                break;
            }
        }
    }
    // Dropping the sender tells the current tap its source is gone.
    inner.route().target = None;
}

/// One session's view of keyboard input.
pub struct InputTap {
    rx: mpsc::Receiver<Vec<u8>>,
    generation: u64,
    inner: Arc<PumpInner>,
}

impl InputTap {
    /// Wait up to `timeout` for the next chunk of input.
    ///
    /// `Disconnected` means the tap was superseded or stdin closed; it will
    /// never receive again.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Vec<u8>, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

impl Drop for InputTap {
    fn drop(&mut self) {
        let mut route = self.inner.route();
        if route.generation == self.generation {
            route.target = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const WAIT: Duration = Duration::from_secs(2);

    /// A reader fed from a channel, so the test decides when bytes arrive.
    struct ChannelReader(mpsc::Receiver<Vec<u8>>);

    impl Read for ChannelReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            match self.0.recv() {
                Ok(bytes) => {
                    buf[..bytes.len()].copy_from_slice(&bytes);
                    Ok(bytes.len())
                }
                Err(_) => Ok(0),
            }
        }
    }

    #[test]
    fn attached_tap_receives_input() {
        let pump = InputPump::from_reader(Cursor::new(b"make test\r".to_vec()));
        let tap = pump.attach();
        assert_eq!(tap.recv_timeout(WAIT).unwrap(), b"make test\r");
    }

    #[test]
    fn newest_tap_takes_over() {
        let (keys, rx) = mpsc::channel();
        let pump = InputPump::from_reader(ChannelReader(rx));

        let old = pump.attach();
        let new = pump.attach();
        keys.send(b"q".to_vec()).unwrap();

        assert_eq!(new.recv_timeout(WAIT).unwrap(), b"q");
        assert_eq!(
            old.recv_timeout(Duration::from_millis(50)),
            Err(RecvTimeoutError::Disconnected)
        );
    }

    #[test]
    fn dropping_a_stale_tap_keeps_the_current_route() {
        let (keys, rx) = mpsc::channel();
        let pump = InputPump::from_reader(ChannelReader(rx));

        let old = pump.attach();
        let new = pump.attach();
        drop(old);
        keys.send(b"y".to_vec()).unwrap();

        assert_eq!(new.recv_timeout(WAIT).unwrap(), b"y");
    }

    #[test]
    fn closed_stdin_disconnects_the_tap() {
        let pump = InputPump::from_reader(std::io::empty());
        let tap = pump.attach();
        assert_eq!(tap.recv_timeout(WAIT), Err(RecvTimeoutError::Disconnected));
    }
}
