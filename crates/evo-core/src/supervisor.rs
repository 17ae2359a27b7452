//! Session supervision: single-shot runs and the watch/restart loop.
//!
//! All decisions happen on one task. Session exits, restart events and the
//! shutdown signal arrive as futures/channels and are multiplexed with
//! `tokio::select!`; the relays and the child wait run elsewhere.

use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::select_all;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::console::Console;
use crate::error::{SessionError, SessionResult};
use crate::pty::{PtyResizer, PtySession, SessionExit, SessionKiller, SessionSpec};
use crate::terminal::{RawModeController, RawModeGuard, TerminalDevice, WindowSize};
use crate::trigger::TriggerSource;

/// Upper bound on reaping a stopped session. Past it the session is
/// detached and its wait task left to finish on its own.
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Called with the restart count just before each restarted session starts.
pub type RestartNotice = Box<dyn FnMut(usize) + Send>;

/// Where the supervisor is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Idle,
    Running,
    RestartRequested,
    Terminated,
}

/// What to do with a running session when a restart is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RestartPolicy {
    /// Kill and reap the running session before starting the next one.
    #[default]
    Replace,
    /// Start the next session right away and let the old one finish.
    Overlap,
}

impl FromStr for RestartPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "replace" => Ok(Self::Replace),
            "overlap" => Ok(Self::Overlap),
            other => Err(format!("unknown restart policy '{other}' (expected replace or overlap)")),
        }
    }
}

/// Counters from one watch loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchReport {
    pub sessions_started: usize,
    pub restarts: usize,
    pub failed_launches: usize,
}

/// Runs PTY sessions against a console.
pub struct Supervisor {
    console: Console,
    raw_mode: Arc<RawModeController>,
    policy: RestartPolicy,
    state: SupervisorState,
    restart_notice: Option<RestartNotice>,
}

impl Supervisor {
    pub fn new(console: Console) -> Self {
        let raw_mode = RawModeController::new(Arc::clone(console.terminal()));
        Self {
            console,
            raw_mode,
            policy: RestartPolicy::default(),
            state: SupervisorState::Idle,
            restart_notice: None,
        }
    }

    pub fn with_restart_policy(mut self, policy: RestartPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Have `notice` told about every restart in [`Supervisor::run_watch`].
    ///
    /// It runs after the replaced sessions are gone, so under
    /// [`RestartPolicy::Replace`] the terminal is back in cooked mode.
    pub fn on_restart(mut self, notice: impl FnMut(usize) + Send + 'static) -> Self {
        self.restart_notice = Some(Box::new(notice));
        self
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    pub fn raw_mode(&self) -> &Arc<RawModeController> {
        &self.raw_mode
    }

    /// Run `spec` once to completion, ending early on SIGINT/SIGTERM.
    pub async fn run_once(&mut self, spec: &SessionSpec) -> SessionResult<SessionExit> {
        self.run_once_until(spec, interrupted()).await
    }

    /// Run `spec` once to completion, or until `shutdown` resolves.
    ///
    /// On shutdown the child is killed, the terminal restored and
    /// [`SessionError::Interrupted`] returned.
    pub async fn run_once_until<F>(
        &mut self,
        spec: &SessionSpec,
        shutdown: F,
    ) -> SessionResult<SessionExit>
    where
        F: Future<Output = ()>,
    {
        self.transition(SupervisorState::Idle);
        let mut active = match self.launch(spec) {
            Ok(active) => active,
            Err(e) => {
                self.transition(SupervisorState::Terminated);
                return Err(e);
            }
        };
        self.transition(SupervisorState::Running);

        tokio::pin!(shutdown);
        let finished = tokio::select! {
            result = &mut active.exit => Some(flatten_join(result)),
            () = &mut shutdown => None,
        };

        let result = match finished {
            Some(result) => {
                drop(active);
                result
            }
            None => {
                warn!(session = active.id, "interrupted, stopping session");
                active.stop().await;
                Err(SessionError::Interrupted)
            }
        };
        self.transition(SupervisorState::Terminated);
        result
    }

    /// Run `spec` under `trigger` until `shutdown` resolves.
    ///
    /// A trigger that cannot be set up aborts immediately. Sessions that fail
    /// to launch or exit non-zero are logged and counted, and the loop keeps
    /// waiting for the next restart.
    pub async fn run_watch<F>(
        &mut self,
        spec: &SessionSpec,
        trigger: &mut dyn TriggerSource,
        shutdown: F,
    ) -> SessionResult<WatchReport>
    where
        F: Future<Output = ()>,
    {
        self.transition(SupervisorState::Idle);
        let (tx, mut rx) = mpsc::unbounded_channel();
        if let Err(e) = trigger.start(tx) {
            self.transition(SupervisorState::Terminated);
            return Err(e);
        }
        info!(trigger = %trigger.describe(), policy = ?self.policy, "watch loop started");

        tokio::pin!(shutdown);
        let mut report = WatchReport::default();
        let mut sessions: Vec<ActiveSession> = Vec::new();
        let mut triggers_open = true;
        self.start_iteration(spec, &mut sessions, &mut report);

        loop {
            let step = tokio::select! {
                () = &mut shutdown => WatchStep::Shutdown,
                event = rx.recv(), if triggers_open => match event {
                    Some(_) => WatchStep::Restart,
                    None => WatchStep::TriggerClosed,
                },
                (index, result) = next_exit(&mut sessions), if !sessions.is_empty() => {
                    WatchStep::Exited(index, result)
                }
            };

            match step {
                WatchStep::Shutdown => break,
                WatchStep::TriggerClosed => {
                    warn!("restart trigger stopped producing events");
                    triggers_open = false;
                }
                WatchStep::Restart => {
                    // Notifications that piled up meanwhile are one restart.
                    while rx.try_recv().is_ok() {}
                    report.restarts += 1;
                    self.transition(SupervisorState::RestartRequested);
                    if self.policy == RestartPolicy::Replace {
                        for session in sessions.drain(..) {
                            session.stop().await;
                        }
                    }
                    if let Some(notice) = self.restart_notice.as_mut() {
                        notice(report.restarts);
                    }
                    self.start_iteration(spec, &mut sessions, &mut report);
                }
                WatchStep::Exited(index, result) => {
                    let session = sessions.remove(index);
                    match result {
                        Ok(exit) if exit.success => {
                            info!(session = session.id, "session finished");
                        }
                        Ok(exit) => {
                            warn!(session = session.id, code = exit.code, "session failed");
                        }
                        Err(e) => warn!(session = session.id, "session ended with error: {e}"),
                    }
                }
            }
        }

        trigger.stop();
        for session in sessions.drain(..) {
            session.stop().await;
        }
        self.transition(SupervisorState::Terminated);
        info!(
            started = report.sessions_started,
            restarts = report.restarts,
            failed = report.failed_launches,
            "watch loop ended"
        );
        Ok(report)
    }

    fn start_iteration(
        &mut self,
        spec: &SessionSpec,
        sessions: &mut Vec<ActiveSession>,
        report: &mut WatchReport,
    ) {
        match self.launch(spec) {
            Ok(active) => {
                report.sessions_started += 1;
                sessions.push(active);
                self.transition(SupervisorState::Running);
            }
            Err(e) => {
                report.failed_launches += 1;
                warn!("could not start `{spec}`: {e}");
            }
        }
    }

    /// Start one session: PTY first, then raw mode, then relays.
    fn launch(&self, spec: &SessionSpec) -> SessionResult<ActiveSession> {
        let terminal = self.console.terminal();
        let initial = terminal.size().unwrap_or(WindowSize::FALLBACK);
        let mut session = PtySession::start(spec.clone(), initial)?;

        if let Err(e) = session.propagate_resize(terminal.as_ref()) {
            warn!(session = session.id(), "initial resize failed: {e}");
        }

        let raw = match self.raw_mode.acquire() {
            Ok(guard) => guard,
            Err(e) => {
                abandon(session);
                return Err(e);
            }
        };

        if let Err(e) = session.relay(self.console.input().attach(), self.console.output()) {
            abandon(session);
            return Err(e);
        }

        let resize_task = spawn_resize_listener(session.resizer(), Arc::clone(terminal));
        let id = session.id();
        let killer = session.killer();
        let exit = tokio::task::spawn_blocking(move || session.wait());

        Ok(ActiveSession {
            id,
            killer,
            exit,
            resize_task,
            _raw: raw,
        })
    }

    fn transition(&mut self, next: SupervisorState) {
        if self.state != next {
            debug!(from = ?self.state, to = ?next, "supervisor state");
            self.state = next;
        }
    }
}

enum WatchStep {
    Shutdown,
    Restart,
    TriggerClosed,
    Exited(usize, SessionResult<SessionExit>),
}

/// A launched session as the supervisor tracks it.
struct ActiveSession {
    id: u64,
    killer: SessionKiller,
    exit: JoinHandle<SessionResult<SessionExit>>,
    resize_task: Option<JoinHandle<()>>,
    // Declared last: released only after the child is gone.
    _raw: RawModeGuard,
}

impl ActiveSession {
    /// Kill the child, wait for it to be reaped, then release raw mode.
    async fn stop(mut self) {
        let killer = self.killer.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || killer.kill()).await {
            warn!(session = self.id, "kill task failed: {e}");
        }
        match tokio::time::timeout(STOP_TIMEOUT, &mut self.exit).await {
            Ok(result) => match flatten_join(result) {
                Ok(exit) => debug!(session = self.id, code = exit.code, "stopped session reaped"),
                Err(e) => warn!(session = self.id, "stopped session: {e}"),
            },
            Err(_) => warn!(session = self.id, "stopped session not reaped in time, detaching"),
        }
    }
}

impl Drop for ActiveSession {
    fn drop(&mut self) {
        self.killer.kill();
        if let Some(task) = self.resize_task.take() {
            task.abort();
        }
    }
}

async fn next_exit(sessions: &mut [ActiveSession]) -> (usize, SessionResult<SessionExit>) {
    let (result, index, _) = select_all(sessions.iter_mut().map(|s| &mut s.exit)).await;
    (index, flatten_join(result))
}

fn flatten_join(
    result: Result<SessionResult<SessionExit>, tokio::task::JoinError>,
) -> SessionResult<SessionExit> {
    result.map_err(|e| SessionError::Io(std::io::Error::other(format!("session wait task failed: {e}"))))?
}

/// Kill a session that never made it to running and reap it off-thread.
fn abandon(session: PtySession) {
    session.killer().kill();
    tokio::task::spawn_blocking(move || {
        let _ = session.wait();
    });
}

#[cfg(unix)]
fn spawn_resize_listener(
    resizer: PtyResizer,
    terminal: Arc<dyn TerminalDevice>,
) -> Option<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut winch = match signal(SignalKind::window_change()) {
        Ok(stream) => stream,
        Err(e) => {
            warn!("cannot listen for terminal resizes: {e}");
            return None;
        }
    };
    Some(tokio::spawn(async move {
        while winch.recv().await.is_some() {
            match resizer.propagate(terminal.as_ref()) {
                Ok(size) => debug!(%size, "terminal resized"),
                Err(e) => warn!("resize propagation failed: {e}"),
            }
        }
    }))
}

#[cfg(not(unix))]
fn spawn_resize_listener(
    _resizer: PtyResizer,
    _terminal: Arc<dyn TerminalDevice>,
) -> Option<JoinHandle<()>> {
    None
}

/// Resolves on the first SIGINT or SIGTERM delivered to the process.
pub async fn interrupted() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut term = match signal(SignalKind::terminate()) {
            Ok(stream) => stream,
            Err(e) => {
                warn!("cannot listen for SIGTERM: {e}");
                ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            () = ctrl_c() => {}
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    ctrl_c().await;
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("cannot listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{scripted_console, ScriptedTerminal, SharedOutput};
    use crate::trigger::{FileWatchTrigger, RestartEvent, RestartSender};
    use std::path::Path;
    use std::time::Duration;

    /// Fires a burst of restart events as soon as it is started.
    struct BurstTrigger {
        burst: usize,
        events: Option<RestartSender>,
        stopped: bool,
    }

    impl BurstTrigger {
        fn new(burst: usize) -> Self {
            Self {
                burst,
                events: None,
                stopped: false,
            }
        }
    }

    impl TriggerSource for BurstTrigger {
        fn start(&mut self, events: RestartSender) -> SessionResult<()> {
            for _ in 0..self.burst {
                events.send(RestartEvent).unwrap();
            }
            self.events = Some(events);
            Ok(())
        }

        fn stop(&mut self) {
            self.stopped = true;
            self.events = None;
        }

        fn describe(&self) -> String {
            "burst".into()
        }
    }

    fn supervisor(output: &SharedOutput) -> (Supervisor, Arc<ScriptedTerminal>) {
        let term = ScriptedTerminal::new(WindowSize::new(24, 80));
        let sup = Supervisor::new(scripted_console(term.clone(), output.clone()));
        (sup, term)
    }

    fn spec(dir: &Path, program: &str, args: &[&str]) -> SessionSpec {
        SessionSpec::new(program, args.iter().copied(), dir)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn single_shot_echo() {
        let dir = tempfile::tempdir().unwrap();
        let output = SharedOutput::default();
        let (mut sup, term) = supervisor(&output);

        let exit = sup.run_once(&spec(dir.path(), "echo", &["hi"])).await.unwrap();

        assert_eq!(exit, SessionExit { code: 0, success: true });
        assert!(output.contents().contains("hi"));
        assert_eq!(sup.state(), SupervisorState::Terminated);
        assert_eq!(sup.raw_mode().entries(), 1);
        assert_eq!(sup.raw_mode().restores(), 1);
        assert!(!term.is_raw());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn single_shot_reports_child_failure() {
        let dir = tempfile::tempdir().unwrap();
        let output = SharedOutput::default();
        let (mut sup, _term) = supervisor(&output);

        let exit = sup
            .run_once(&spec(dir.path(), "sh", &["-c", "exit 3"]))
            .await
            .unwrap();

        assert_eq!(exit.code, 3);
        assert!(!exit.success);
        assert_eq!(sup.raw_mode().entries(), sup.raw_mode().restores());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn spawn_failure_never_touches_the_terminal() {
        let dir = tempfile::tempdir().unwrap();
        let output = SharedOutput::default();
        let (mut sup, term) = supervisor(&output);

        let err = sup
            .run_once(&spec(dir.path(), "evo-no-such-program", &[]))
            .await
            .err()
            .unwrap();

        assert!(matches!(err, SessionError::SpawnFailed(_)));
        assert_eq!(sup.raw_mode().entries(), 0);
        assert!(!term.is_raw());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn no_terminal_means_no_session() {
        let dir = tempfile::tempdir().unwrap();
        let output = SharedOutput::default();
        let mut sup = Supervisor::new(scripted_console(ScriptedTerminal::detached(), output.clone()));

        let err = sup
            .run_once(&spec(dir.path(), "echo", &["never"]))
            .await
            .err()
            .unwrap();

        assert!(matches!(err, SessionError::TerminalModeFailed(_)));
        assert!(!output.contents().contains("never"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn interrupt_kills_child_and_restores() {
        let dir = tempfile::tempdir().unwrap();
        let output = SharedOutput::default();
        let (mut sup, term) = supervisor(&output);

        let shutdown = tokio::time::sleep(Duration::from_millis(200));
        let err = sup
            .run_once_until(&spec(dir.path(), "sleep", &["30"]), shutdown)
            .await
            .err()
            .unwrap();

        assert!(matches!(err, SessionError::Interrupted));
        assert_eq!(sup.raw_mode().entries(), 1);
        assert_eq!(sup.raw_mode().restores(), 1);
        assert!(!term.is_raw());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn watch_restarts_only_on_the_watched_file() {
        let dir = tempfile::tempdir().unwrap();
        let test_file = dir.path().join("test.go");
        let other_file = dir.path().join("other.go");
        std::fs::write(&test_file, "package t\n").unwrap();
        std::fs::write(&other_file, "package t\n").unwrap();

        let output = SharedOutput::default();
        let (mut sup, term) = supervisor(&output);
        let mut trigger = FileWatchTrigger::new(&test_file, Duration::from_millis(200));

        let writes = {
            let (test_file, other_file) = (test_file.clone(), other_file.clone());
            async move {
                tokio::time::sleep(Duration::from_millis(300)).await;
                std::fs::write(&other_file, "package t // other\n").unwrap();
                tokio::time::sleep(Duration::from_millis(500)).await;
                std::fs::write(&test_file, "package t // test\n").unwrap();
                tokio::time::sleep(Duration::from_millis(800)).await;
            }
        };

        let report = sup
            .run_watch(&spec(dir.path(), "echo", &["run"]), &mut trigger, writes)
            .await
            .unwrap();

        assert_eq!(report.restarts, 1);
        assert_eq!(report.sessions_started, 2);
        assert_eq!(report.failed_launches, 0);
        assert_eq!(sup.raw_mode().entries(), sup.raw_mode().restores());
        assert!(!term.is_raw());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn burst_of_events_is_one_restart() {
        let dir = tempfile::tempdir().unwrap();
        let output = SharedOutput::default();
        let (mut sup, _term) = supervisor(&output);
        let mut trigger = BurstTrigger::new(5);

        let report = sup
            .run_watch(
                &spec(dir.path(), "echo", &["run"]),
                &mut trigger,
                tokio::time::sleep(Duration::from_millis(500)),
            )
            .await
            .unwrap();

        assert_eq!(report.restarts, 1);
        assert_eq!(report.sessions_started, 2);
        assert!(trigger.stopped);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn replace_policy_kills_before_restarting() {
        let dir = tempfile::tempdir().unwrap();
        let output = SharedOutput::default();
        let (sup, term) = supervisor(&output);
        let mut sup = sup.with_restart_policy(RestartPolicy::Replace);
        let mut trigger = BurstTrigger::new(1);

        let report = sup
            .run_watch(
                &spec(dir.path(), "sleep", &["30"]),
                &mut trigger,
                tokio::time::sleep(Duration::from_millis(500)),
            )
            .await
            .unwrap();

        assert_eq!(report.sessions_started, 2);
        // The first session released raw mode before the second acquired it.
        assert_eq!(sup.raw_mode().entries(), 2);
        assert_eq!(sup.raw_mode().restores(), 2);
        assert!(!term.is_raw());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn overlap_policy_shares_raw_mode() {
        let dir = tempfile::tempdir().unwrap();
        let output = SharedOutput::default();
        let (sup, term) = supervisor(&output);
        let mut sup = sup.with_restart_policy(RestartPolicy::Overlap);
        let mut trigger = BurstTrigger::new(1);

        let report = sup
            .run_watch(
                &spec(dir.path(), "sleep", &["30"]),
                &mut trigger,
                tokio::time::sleep(Duration::from_millis(500)),
            )
            .await
            .unwrap();

        assert_eq!(report.sessions_started, 2);
        assert_eq!(sup.raw_mode().entries(), 1);
        assert_eq!(sup.raw_mode().restores(), 1);
        assert!(!term.is_raw());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_launches_do_not_stop_the_loop() {
        let dir = tempfile::tempdir().unwrap();
        let output = SharedOutput::default();
        let (mut sup, _term) = supervisor(&output);
        let mut trigger = BurstTrigger::new(1);

        let report = sup
            .run_watch(
                &spec(dir.path(), "evo-no-such-program", &[]),
                &mut trigger,
                tokio::time::sleep(Duration::from_millis(300)),
            )
            .await
            .unwrap();

        assert_eq!(report.sessions_started, 0);
        assert_eq!(report.failed_launches, 2);
        assert_eq!(report.restarts, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn trigger_setup_failure_aborts_watch() {
        let dir = tempfile::tempdir().unwrap();
        let output = SharedOutput::default();
        let (mut sup, _term) = supervisor(&output);
        let mut trigger =
            FileWatchTrigger::new(dir.path().join("missing.go"), Duration::from_millis(200));

        let err = sup
            .run_watch(
                &spec(dir.path(), "echo", &["run"]),
                &mut trigger,
                std::future::pending::<()>(),
            )
            .await
            .err()
            .unwrap();

        assert!(matches!(err, SessionError::TriggerSetupFailed(_)));
        assert_eq!(sup.raw_mode().entries(), 0);
        assert_eq!(sup.state(), SupervisorState::Terminated);
    }

    const IGNORES_HANGUP: &str = "trap '' HUP; while :; do sleep 0.1; done";

    #[tokio::test(flavor = "multi_thread")]
    async fn interrupt_stops_a_child_ignoring_hangup() {
        let dir = tempfile::tempdir().unwrap();
        let output = SharedOutput::default();
        let (mut sup, term) = supervisor(&output);

        let shutdown = tokio::time::sleep(Duration::from_millis(300));
        let result = tokio::time::timeout(
            Duration::from_secs(8),
            sup.run_once_until(&spec(dir.path(), "sh", &["-c", IGNORES_HANGUP]), shutdown),
        )
        .await
        .expect("interrupt must not wait for the child to give up");

        assert!(matches!(result, Err(SessionError::Interrupted)));
        assert!(!term.is_raw());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn replace_restart_stops_a_child_ignoring_hangup() {
        let dir = tempfile::tempdir().unwrap();
        let output = SharedOutput::default();
        let (mut sup, term) = supervisor(&output);
        let mut trigger = BurstTrigger::new(1);

        let report = tokio::time::timeout(
            Duration::from_secs(10),
            sup.run_watch(
                &spec(dir.path(), "sh", &["-c", IGNORES_HANGUP]),
                &mut trigger,
                tokio::time::sleep(Duration::from_millis(500)),
            ),
        )
        .await
        .expect("restart must not wait for the child to give up")
        .unwrap();

        assert_eq!(report.sessions_started, 2);
        assert_eq!(sup.raw_mode().entries(), sup.raw_mode().restores());
        assert!(!term.is_raw());
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread")]
    async fn window_change_resizes_the_running_session() {
        let dir = tempfile::tempdir().unwrap();
        let output = SharedOutput::default();
        let (mut sup, term) = supervisor(&output);

        let resize = {
            let term = Arc::clone(&term);
            async move {
                tokio::time::sleep(Duration::from_millis(400)).await;
                term.set_size(WindowSize::new(40, 120));
                let status = std::process::Command::new("kill")
                    .args(["-WINCH", &std::process::id().to_string()])
                    .status()
                    .unwrap();
                assert!(status.success());
            }
        };
        let run_spec = spec(dir.path(), "sh", &["-c", "stty size; sleep 1; stty size"]);
        let run = sup.run_once(&run_spec);
        let (exit, ()) = tokio::join!(run, resize);

        assert!(exit.unwrap().success);
        let out = output.contents();
        assert!(out.contains("24 80"), "got {out:?}");
        assert!(out.contains("40 120"), "got {out:?}");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn restart_notice_runs_once_per_restart() {
        let dir = tempfile::tempdir().unwrap();
        let output = SharedOutput::default();
        let (sup, _term) = supervisor(&output);
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut sup = sup.on_restart({
            let seen = Arc::clone(&seen);
            move |n| seen.lock().unwrap().push(n)
        });
        let mut trigger = BurstTrigger::new(3);

        let report = sup
            .run_watch(
                &spec(dir.path(), "echo", &["run"]),
                &mut trigger,
                tokio::time::sleep(Duration::from_millis(400)),
            )
            .await
            .unwrap();

        assert_eq!(report.restarts, 1);
        assert_eq!(*seen.lock().unwrap(), vec![1]);
    }

    #[test]
    fn restart_policy_parses() {
        assert_eq!("replace".parse::<RestartPolicy>(), Ok(RestartPolicy::Replace));
        assert_eq!(" Overlap ".parse::<RestartPolicy>(), Ok(RestartPolicy::Overlap));
        assert!("queue".parse::<RestartPolicy>().is_err());
    }
}
