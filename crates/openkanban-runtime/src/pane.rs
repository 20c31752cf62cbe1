use std::io::{ErrorKind, Read, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use portable_pty::{native_pty_system, Child, ChildKiller, CommandBuilder, MasterPty, PtySize};
use tokio::sync::mpsc;
use tracing::debug;

use openkanban_core::SessionId;

use crate::{RuntimeError, RuntimeResult, TerminalScreen, TerminalSnapshot};

const READ_CHUNK_SIZE: usize = 8 * 1024;
const TERM_GRACE: Duration = Duration::from_millis(1_500);
const KILL_GRACE: Duration = Duration::from_millis(1_000);
const EXIT_POLL: Duration = Duration::from_millis(50);

/// Notifications a pane posts from its background workers. The receiver is
/// the application event queue; the pane never touches UI state itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaneEvent {
    Output {
        session: SessionId,
    },
    Exit {
        session: SessionId,
        error: Option<String>,
    },
}

pub type PaneEventSink = Arc<dyn Fn(PaneEvent) + Send + Sync>;

/// A child agent process attached to its own pseudo-terminal and screen
/// grid. Panes go unstarted -> running -> terminated; a terminated pane is
/// discarded, never restarted.
pub struct Pane {
    session_id: SessionId,
    workdir: PathBuf,
    cols: u16,
    rows: u16,
    screen: Arc<Mutex<TerminalScreen>>,
    started: bool,
    running: Arc<AtomicBool>,
    master: Option<Box<dyn MasterPty + Send>>,
    stdin_tx: Option<mpsc::UnboundedSender<Vec<u8>>>,
    killer: Option<Box<dyn ChildKiller + Send + Sync>>,
    child_pid: Option<u32>,
}

impl Pane {
    pub fn new(session_id: SessionId, cols: u16, rows: u16, workdir: impl Into<PathBuf>) -> Self {
        Self {
            session_id,
            workdir: workdir.into(),
            cols: cols.max(1),
            rows: rows.max(1),
            screen: Arc::new(Mutex::new(TerminalScreen::new(cols, rows))),
            started: false,
            running: Arc::new(AtomicBool::new(false)),
            master: None,
            stdin_tx: None,
            killer: None,
            child_pid: None,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn workdir(&self) -> &PathBuf {
        &self.workdir
    }

    /// True between a successful start and the first observed child exit.
    pub fn running(&self) -> bool {
        self.started && self.running.load(Ordering::Acquire)
    }

    pub fn start(
        &mut self,
        program: &str,
        args: &[String],
        environment: &[(String, String)],
        events: PaneEventSink,
    ) -> RuntimeResult<()> {
        if self.started {
            return Err(RuntimeError::Internal(format!(
                "pane already started: {}",
                self.session_id
            )));
        }
        if program.trim().is_empty() {
            return Err(RuntimeError::Spawn(
                "agent command must not be empty".to_owned(),
            ));
        }

        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                cols: self.cols,
                rows: self.rows,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|error| RuntimeError::Spawn(format!("PTY allocation failed: {error}")))?;

        let mut command = CommandBuilder::new(program);
        command.cwd(&self.workdir);
        for arg in args {
            command.arg(arg);
        }
        command.env_clear();
        for (key, value) in environment {
            command.env(key, value);
        }

        let mut child = pair
            .slave
            .spawn_command(command)
            .map_err(|error| RuntimeError::Spawn(format!("spawn '{program}': {error}")))?;
        drop(pair.slave);

        let reader = match pair.master.try_clone_reader() {
            Ok(reader) => reader,
            Err(error) => {
                terminate_child(child);
                return Err(RuntimeError::Spawn(format!(
                    "PTY reader unavailable: {error}"
                )));
            }
        };
        let writer = match pair.master.take_writer() {
            Ok(writer) => writer,
            Err(error) => {
                terminate_child(child);
                return Err(RuntimeError::Spawn(format!(
                    "PTY writer unavailable: {error}"
                )));
            }
        };

        self.child_pid = child.process_id();
        self.killer = Some(child.clone_killer());
        self.master = Some(pair.master);
        self.started = true;
        self.running.store(true, Ordering::Release);

        let (stdin_tx, stdin_rx) = mpsc::unbounded_channel();
        self.stdin_tx = Some(stdin_tx);

        spawn_read_loop(
            reader,
            Arc::clone(&self.screen),
            Arc::clone(&self.running),
            self.session_id.clone(),
            events,
        );
        spawn_write_loop(writer, stdin_rx);
        spawn_wait_loop(child, Arc::clone(&self.running), self.session_id.clone());
        Ok(())
    }

    /// Queues bytes for the child. Never blocks the caller; a dedicated
    /// writer thread drains the queue in order.
    pub fn write(&self, bytes: &[u8]) -> RuntimeResult<()> {
        if !self.running() {
            return Err(RuntimeError::NotRunning(
                self.session_id.as_str().to_owned(),
            ));
        }
        let stdin_tx = self.stdin_tx.as_ref().ok_or_else(|| {
            RuntimeError::NotRunning(self.session_id.as_str().to_owned())
        })?;
        stdin_tx
            .send(bytes.to_vec())
            .map_err(|_| RuntimeError::Process("PTY writer is no longer available".to_owned()))
    }

    pub fn resize(&mut self, cols: u16, rows: u16) -> RuntimeResult<()> {
        let cols = cols.max(1);
        let rows = rows.max(1);
        self.cols = cols;
        self.rows = rows;

        if let Some(master) = &self.master {
            master
                .resize(PtySize {
                    cols,
                    rows,
                    pixel_width: 0,
                    pixel_height: 0,
                })
                .map_err(|error| RuntimeError::Process(format!("PTY resize failed: {error}")))?;
        }
        self.lock_screen()?.resize(cols, rows);
        Ok(())
    }

    pub fn snapshot(&self) -> RuntimeResult<TerminalSnapshot> {
        Ok(self.lock_screen()?.snapshot())
    }

    /// Terminates the child: SIGTERM, a bounded grace interval, then
    /// SIGKILL, then reap. Idempotent; releases the PTY master.
    pub fn close(&mut self) {
        self.stdin_tx = None;

        if self.running() {
            if let Some(pid) = self.child_pid {
                debug!(session = %self.session_id, pid, "terminating pane child");
                send_sigterm(pid);
            }
            if !self.wait_for_exit(TERM_GRACE) {
                if let Some(killer) = self.killer.as_mut() {
                    let _ = killer.kill();
                }
                self.wait_for_exit(KILL_GRACE);
            }
        }

        self.killer = None;
        self.master = None;
    }

    fn wait_for_exit(&self, grace: Duration) -> bool {
        let deadline = Instant::now() + grace;
        while Instant::now() < deadline {
            if !self.running.load(Ordering::Acquire) {
                return true;
            }
            std::thread::sleep(EXIT_POLL);
        }
        !self.running.load(Ordering::Acquire)
    }

    fn lock_screen(&self) -> RuntimeResult<std::sync::MutexGuard<'_, TerminalScreen>> {
        self.screen
            .lock()
            .map_err(|_| RuntimeError::Internal("terminal screen lock poisoned".to_owned()))
    }
}

fn terminate_child(mut child: Box<dyn Child + Send + Sync>) {
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(unix)]
fn send_sigterm(pid: u32) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
}

#[cfg(not(unix))]
fn send_sigterm(_pid: u32) {}

fn spawn_read_loop(
    mut reader: Box<dyn Read + Send>,
    screen: Arc<Mutex<TerminalScreen>>,
    running: Arc<AtomicBool>,
    session_id: SessionId,
    events: PaneEventSink,
) {
    std::thread::spawn(move || {
        let mut buffer = [0_u8; READ_CHUNK_SIZE];
        let exit_error = loop {
            match reader.read(&mut buffer) {
                Ok(0) => break None,
                Ok(read) => {
                    if let Ok(mut screen) = screen.lock() {
                        screen.process(&buffer[..read]);
                    }
                    events(PaneEvent::Output {
                        session: session_id.clone(),
                    });
                }
                Err(error) if error.kind() == ErrorKind::Interrupted => continue,
                // The master side reports EIO when the child hangs up.
                Err(error) if error.raw_os_error() == Some(5) => break None,
                Err(error) => break Some(error.to_string()),
            }
        };
        running.store(false, Ordering::Release);
        events(PaneEvent::Exit {
            session: session_id,
            error: exit_error,
        });
    });
}

fn spawn_write_loop(
    mut writer: Box<dyn Write + Send>,
    mut stdin_rx: mpsc::UnboundedReceiver<Vec<u8>>,
) {
    std::thread::spawn(move || {
        while let Some(input) = stdin_rx.blocking_recv() {
            if input.is_empty() {
                continue;
            }
            if writer.write_all(&input).is_err() {
                break;
            }
            if writer.flush().is_err() {
                break;
            }
        }
    });
}

fn spawn_wait_loop(
    mut child: Box<dyn Child + Send + Sync>,
    running: Arc<AtomicBool>,
    session_id: SessionId,
) {
    std::thread::spawn(move || {
        let _ = child.wait();
        running.store(false, Ordering::Release);
        debug!(session = %session_id, "pane child reaped");
    });
}
