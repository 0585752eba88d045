// ABOUTME: Waits for a launched dev server's ports to accept connections, then opens a preview
// ABOUTME: Races the wait against the terminal closing and lets the user escalate on timeout

use futures::future::join_all;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use crate::host::{ProgressReporter, ProgressSurface, Terminal, TerminalId, UserPrompt};
use crate::launcher::PreviewLauncher;
use crate::probe::{ReachabilityProbe, TcpReachability};
use crate::retry::{retry_until, Deadline, ProbeFailure, DEFAULT_POLL_INTERVAL};
use crate::settings::PreviewSettings;
use crate::types::{PreviewError, PreviewResult, PreviewType, ProbeError, WaitOutcome};

/// Deadline used every time the user chooses to keep waiting
pub const ESCALATED_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Consecutive "keep waiting" choices honoured before the wait is abandoned
pub const MAX_ESCALATIONS: u32 = 20;

pub const KEEP_WAITING: &str = "Keep Waiting";
pub const SHOW_TERMINAL: &str = "Show Terminal";

pub const TERMINAL_EXITED_MESSAGE: &str =
    "The terminal running the app has exited. Run the app again to preview it.";

/// One "wait for these ports, then preview" invocation
#[derive(Clone)]
pub struct WaitRequest {
    pub port: u16,
    pub additional_ports: Vec<u16>,
    pub terminal: Option<Arc<dyn Terminal>>,
    /// Initial deadline; `timeoutOpenBrowser` when `None`
    pub timeout: Option<Duration>,
}

impl WaitRequest {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            additional_ports: Vec::new(),
            terminal: None,
            timeout: None,
        }
    }

    pub fn with_additional_ports(mut self, ports: impl IntoIterator<Item = u16>) -> Self {
        self.additional_ports.extend(ports);
        self
    }

    pub fn with_terminal(mut self, terminal: Arc<dyn Terminal>) -> Self {
        self.terminal = Some(terminal);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Primary port first, then the additional ports in the order given
    pub fn ports(&self) -> Vec<u16> {
        std::iter::once(self.port)
            .chain(self.additional_ports.iter().copied())
            .collect()
    }
}

enum WaitState {
    Probing { timeout: Duration },
    Ready,
    TimedOut { timeout: Duration },
    Done(WaitOutcome),
}

enum ProbeRound {
    Finished(Vec<bool>),
    TerminalClosed,
}

/// Reports elapsed share of the deadline as additive increments
struct ProgressTracker {
    deadline: Deadline,
    reported: Mutex<f64>,
    reporter: Box<dyn ProgressReporter>,
}

impl ProgressTracker {
    fn new(deadline: Deadline, reporter: Box<dyn ProgressReporter>) -> Self {
        Self {
            deadline,
            reported: Mutex::new(0.0),
            reporter,
        }
    }

    fn tick(&self) {
        let current = self.deadline.fraction() * 100.0;
        let mut reported = self
            .reported
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let increment = current - *reported;
        if increment > 0.0 {
            *reported = current;
            self.reporter.report(increment);
        }
    }
}

/// State for one bounded round of probing
struct WaitSession {
    ports: Vec<u16>,
    deadline: Deadline,
    progress: ProgressTracker,
}

impl WaitSession {
    fn new(ports: Vec<u16>, timeout: Duration, reporter: Box<dyn ProgressReporter>) -> Self {
        let deadline = Deadline::start(timeout);
        Self {
            ports,
            deadline,
            progress: ProgressTracker::new(deadline, reporter),
        }
    }
}

pub struct ReadinessOrchestrator {
    launcher: PreviewLauncher,
    prompt: Arc<dyn UserPrompt>,
    progress: Arc<dyn ProgressSurface>,
    terminal_events: broadcast::Sender<TerminalId>,
    probe: Arc<dyn ReachabilityProbe>,
    probe_host: String,
    default_timeout: Duration,
}

impl ReadinessOrchestrator {
    /// `terminal_events` is the host's terminal-closed stream; it is subscribed
    /// to at the start of every probing round.
    pub fn new(
        settings: &PreviewSettings,
        launcher: PreviewLauncher,
        prompt: Arc<dyn UserPrompt>,
        progress: Arc<dyn ProgressSurface>,
        terminal_events: broadcast::Sender<TerminalId>,
    ) -> Self {
        Self {
            launcher,
            prompt,
            progress,
            terminal_events,
            probe: Arc::new(TcpReachability::default()),
            probe_host: settings.probe_host.clone(),
            default_timeout: settings.timeout_open_browser,
        }
    }

    pub fn with_probe(mut self, probe: Arc<dyn ReachabilityProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// Wait until every requested port accepts connections, then open the
    /// preview for the primary port.
    ///
    /// Returns immediately with [`WaitOutcome::Suppressed`] when the preview type
    /// is `none`. Errors are limited to invalid ports, preview dispatch failures
    /// and probe failures that are not part of normal polling.
    pub async fn wait_for_ports_and_open(&self, request: WaitRequest) -> PreviewResult<WaitOutcome> {
        if matches!(self.launcher.preview_type(), PreviewType::None) {
            debug!("Preview type is none; not waiting for port {}", request.port);
            return Ok(WaitOutcome::Suppressed);
        }

        let ports = request.ports();
        if ports.contains(&0) {
            return Err(PreviewError::InvalidPort { port: 0 });
        }

        let mut escalations = 0u32;
        let mut state = WaitState::Probing {
            timeout: request.timeout.unwrap_or(self.default_timeout),
        };

        loop {
            state = match state {
                WaitState::Probing { timeout } => {
                    debug!("Waiting up to {:?} for ports {:?}", timeout, ports);
                    match self
                        .probe_round(&ports, timeout, request.terminal.as_deref())
                        .await?
                    {
                        ProbeRound::TerminalClosed => {
                            warn!(
                                "Terminal closed while waiting for port {}; not opening a preview",
                                request.port
                            );
                            WaitState::Done(WaitOutcome::Cancelled)
                        }
                        ProbeRound::Finished(_) if terminal_exited(&request) => {
                            warn!(
                                "Terminal exited while waiting for port {}; not opening a preview",
                                request.port
                            );
                            WaitState::Done(WaitOutcome::Cancelled)
                        }
                        ProbeRound::Finished(results) if results.iter().all(|open| *open) => {
                            WaitState::Ready
                        }
                        ProbeRound::Finished(_) => WaitState::TimedOut { timeout },
                    }
                }
                WaitState::Ready => {
                    let url = self.launcher.launch(request.port).await?;
                    info!("Port {} is ready; opened {}", request.port, url);
                    WaitState::Done(WaitOutcome::Opened { url })
                }
                WaitState::TimedOut { timeout } => {
                    self.after_timeout(&request, &ports, timeout, &mut escalations)
                        .await
                }
                WaitState::Done(outcome) => return Ok(outcome),
            };
        }
    }

    async fn probe_round(
        &self,
        ports: &[u16],
        timeout: Duration,
        terminal: Option<&dyn Terminal>,
    ) -> PreviewResult<ProbeRound> {
        let mut closed_events = self.terminal_events.subscribe();
        let reporter = self.progress.begin(&progress_title(ports));
        let session = WaitSession::new(ports.to_vec(), timeout, reporter);

        let waits = join_all(
            session
                .ports
                .iter()
                .map(|&port| self.wait_for_port(port, &session)),
        );

        let results = match terminal {
            Some(terminal) => tokio::select! {
                results = waits => results,
                _ = wait_for_terminal_close(&mut closed_events, terminal) => {
                    return Ok(ProbeRound::TerminalClosed);
                }
            },
            None => waits.await,
        };

        let open = results.into_iter().collect::<PreviewResult<Vec<bool>>>()?;
        Ok(ProbeRound::Finished(open))
    }

    async fn wait_for_port(&self, port: u16, session: &WaitSession) -> PreviewResult<bool> {
        let probe = &self.probe;
        let host = self.probe_host.as_str();

        let ready = retry_until(
            session.deadline.budget(),
            DEFAULT_POLL_INTERVAL,
            move || async move {
                session.progress.tick();
                match probe.probe(host, port).await {
                    Ok(true) => Ok(()),
                    Ok(false) => Err(ProbeFailure::Retry(ProbeError::NotReady {
                        host: host.to_string(),
                        port,
                    })),
                    Err(e) => Err(ProbeFailure::Retry(e)),
                }
            },
        )
        .await?;

        if ready.is_none() {
            debug!("Port {} did not open within {:?}", port, session.deadline.budget());
        }
        Ok(ready.is_some())
    }

    async fn after_timeout(
        &self,
        request: &WaitRequest,
        ports: &[u16],
        timeout: Duration,
        escalations: &mut u32,
    ) -> WaitState {
        let actions: &[&str] = if request.terminal.is_some() {
            &[KEEP_WAITING, SHOW_TERMINAL]
        } else {
            &[KEEP_WAITING]
        };
        let choice = self
            .prompt
            .show_warning(&timeout_message(ports, timeout), actions)
            .await;

        if terminal_exited(request) {
            self.prompt.show_error(TERMINAL_EXITED_MESSAGE).await;
            return WaitState::Done(WaitOutcome::TerminalExited);
        }

        match (choice.as_deref(), &request.terminal) {
            (Some(KEEP_WAITING), _) => {
                *escalations += 1;
                if *escalations > MAX_ESCALATIONS {
                    warn!(
                        "Stopped waiting for port {} after {} extensions",
                        request.port, MAX_ESCALATIONS
                    );
                    return WaitState::Done(WaitOutcome::Abandoned);
                }
                info!(
                    "Waiting another {:?} for port {}",
                    ESCALATED_TIMEOUT, request.port
                );
                WaitState::Probing {
                    timeout: ESCALATED_TIMEOUT,
                }
            }
            (Some(SHOW_TERMINAL), Some(terminal)) => {
                terminal.show();
                WaitState::Done(WaitOutcome::TerminalShown)
            }
            _ => {
                debug!("Timeout prompt for port {} dismissed", request.port);
                WaitState::Done(WaitOutcome::Abandoned)
            }
        }
    }
}

fn terminal_exited(request: &WaitRequest) -> bool {
    request
        .terminal
        .as_ref()
        .is_some_and(|terminal| terminal.exit_status().is_some())
}

/// Resolves once `terminal` is reported closed; never resolves if the stream ends
async fn wait_for_terminal_close(
    events: &mut broadcast::Receiver<TerminalId>,
    terminal: &dyn Terminal,
) {
    if terminal.exit_status().is_some() {
        return;
    }

    let id = terminal.id();
    loop {
        match events.recv().await {
            Ok(closed) if closed == id => return,
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                debug!("Missed {} terminal events", skipped);
                if terminal.exit_status().is_some() {
                    return;
                }
            }
            Err(RecvError::Closed) => std::future::pending::<()>().await,
        }
    }
}

fn join_ports(ports: &[u16]) -> String {
    ports
        .iter()
        .map(u16::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn progress_title(ports: &[u16]) -> String {
    match ports {
        [port] => format!("Waiting for port {}", port),
        _ => format!("Waiting for ports {}", join_ports(ports)),
    }
}

fn format_timeout(timeout: Duration) -> String {
    let millis = timeout.as_millis();
    if millis % 1000 == 0 {
        format!("{} seconds", millis / 1000)
    } else {
        format!("{} ms", millis)
    }
}

fn timeout_message(ports: &[u16], timeout: Duration) -> String {
    match ports {
        [port] => format!(
            "Port {} did not open within {}. Keep waiting?",
            port,
            format_timeout(timeout)
        ),
        _ => format!(
            "Ports {} did not all open within {}. Keep waiting?",
            join_ports(ports),
            format_timeout(timeout)
        ),
    }
}
