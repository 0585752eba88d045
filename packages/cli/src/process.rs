// ABOUTME: Dev server process that stands in for the editor terminal
// ABOUTME: Captures output, records the exit code and announces the exit on the closed stream

use anyhow::{bail, Context};
use beacon_preview::{Terminal, TerminalId};
use futures::future::join_all;
use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Output lines kept for replay when the terminal is shown
pub const MAX_CAPTURED_LINES: usize = 1000;

/// How long to wait for output readers once the process is gone
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Reported when the process ended without an exit code (killed by a signal)
const UNKNOWN_EXIT_CODE: i32 = -1;

static NEXT_TERMINAL_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub stream: OutputStream,
    pub text: String,
}

pub struct ProcessTerminal {
    id: TerminalId,
    command_line: String,
    output: Mutex<VecDeque<OutputLine>>,
    /// Set once shown; from then on output is printed as it arrives
    attached: AtomicBool,
    exit: watch::Sender<Option<i32>>,
}

impl ProcessTerminal {
    /// Spawn `command` with `envs` added to its environment.
    ///
    /// When the process exits its code is recorded and the terminal's id is
    /// sent on `closed`.
    pub fn spawn(
        command: &[String],
        envs: &[(String, String)],
        closed: broadcast::Sender<TerminalId>,
    ) -> anyhow::Result<Arc<Self>> {
        let Some((program, args)) = command.split_first() else {
            bail!("No command given to run");
        };

        let mut cmd = Command::new(program);
        cmd.args(args)
            .envs(envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let command_line = command.join(" ");
        let mut child = cmd
            .spawn()
            .with_context(|| format!("Failed to start '{}'", command_line))?;
        info!("Spawned '{}' with PID: {:?}", command_line, child.id());

        let (exit, _) = watch::channel(None);
        let terminal = Arc::new(Self {
            id: NEXT_TERMINAL_ID.fetch_add(1, Ordering::Relaxed),
            command_line,
            output: Mutex::new(VecDeque::new()),
            attached: AtomicBool::new(false),
            exit,
        });

        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(capture_lines(stdout, OutputStream::Stdout, terminal.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(capture_lines(stderr, OutputStream::Stderr, terminal.clone()));
        }

        let watcher = terminal.clone();
        tokio::spawn(async move {
            let code = match child.wait().await {
                Ok(status) => status.code().unwrap_or(UNKNOWN_EXIT_CODE),
                Err(e) => {
                    warn!("Failed to wait for '{}': {}", watcher.command_line, e);
                    UNKNOWN_EXIT_CODE
                }
            };

            // Grandchildren may still hold the pipes open
            if tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, join_all(readers))
                .await
                .is_err()
            {
                debug!("Output of '{}' still open after exit", watcher.command_line);
            }

            info!("'{}' exited with code {}", watcher.command_line, code);
            watcher.exit.send_replace(Some(code));
            if closed.send(watcher.id).is_err() {
                debug!("Nobody listening for terminal {} closing", watcher.id);
            }
        });

        Ok(terminal)
    }

    pub fn command_line(&self) -> &str {
        &self.command_line
    }

    /// Snapshot of the captured output, oldest first
    pub fn captured(&self) -> Vec<OutputLine> {
        self.lock_output().iter().cloned().collect()
    }

    /// Wait for the process to exit and return its exit code
    pub async fn wait(&self) -> i32 {
        let mut exit = self.exit.subscribe();
        let code = match exit.wait_for(Option::is_some).await {
            Ok(code) => (*code).unwrap_or(UNKNOWN_EXIT_CODE),
            Err(_) => UNKNOWN_EXIT_CODE,
        };
        code
    }

    fn lock_output(&self) -> std::sync::MutexGuard<'_, VecDeque<OutputLine>> {
        self.output
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, line: OutputLine) {
        let mut output = self.lock_output();
        if self.attached.load(Ordering::SeqCst) {
            print_line(&line);
        }
        output.push_back(line);
        if output.len() > MAX_CAPTURED_LINES {
            output.pop_front();
        }
    }
}

impl Terminal for ProcessTerminal {
    fn id(&self) -> TerminalId {
        self.id
    }

    fn exit_status(&self) -> Option<i32> {
        *self.exit.borrow()
    }

    /// Replay what was captured so far, then stream further output
    fn show(&self) {
        let output = self.lock_output();
        if !self.attached.swap(true, Ordering::SeqCst) {
            output.iter().for_each(print_line);
        }
    }
}

fn capture_lines<R>(
    reader: R,
    stream: OutputStream,
    terminal: Arc<ProcessTerminal>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(text)) = lines.next_line().await {
            terminal.record(OutputLine { stream, text });
        }
    })
}

fn print_line(line: &OutputLine) {
    match line.stream {
        OutputStream::Stdout => println!("{}", line.text),
        OutputStream::Stderr => eprintln!("{}", line.text),
    }
}
