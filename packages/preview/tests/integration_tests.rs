// ABOUTME: Integration tests for the readiness orchestrator and preview dispatch
// ABOUTME: Covers real TCP readiness, terminal-close races, timeout prompts and escalation

use async_trait::async_trait;
use beacon_preview::{
    PreviewLauncher, PreviewResult, PreviewSettings, PreviewSurface, PreviewType, ProbeError,
    ProgressReporter, ProgressSurface, ReachabilityProbe, ReadinessOrchestrator, Terminal,
    TerminalId, UserPrompt, ViewerOptions, WaitOutcome, WaitRequest, DEFAULT_POLL_INTERVAL,
    ESCALATED_TIMEOUT, KEEP_WAITING, MAX_ESCALATIONS, SHOW_TERMINAL, TERMINAL_EXITED_MESSAGE,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing_test::traced_test;

struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _increment: f64) {}
}

struct NoopProgress;

impl ProgressSurface for NoopProgress {
    fn begin(&self, _title: &str) -> Box<dyn ProgressReporter> {
        Box::new(NoopReporter)
    }
}

#[derive(Default)]
struct FakeTerminal {
    id: TerminalId,
    exit_status: Mutex<Option<i32>>,
    shown: AtomicBool,
}

impl FakeTerminal {
    fn new(id: TerminalId) -> Arc<Self> {
        Arc::new(Self {
            id,
            ..Default::default()
        })
    }

    fn exit(&self, code: i32) {
        *self.exit_status.lock().unwrap() = Some(code);
    }
}

impl Terminal for FakeTerminal {
    fn id(&self) -> TerminalId {
        self.id
    }

    fn exit_status(&self) -> Option<i32> {
        *self.exit_status.lock().unwrap()
    }

    fn show(&self) {
        self.shown.store(true, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone)]
struct PromptCall {
    at: Instant,
    message: String,
    actions: Vec<String>,
}

/// Answers timeout prompts from a script; an empty script dismisses the prompt
#[derive(Default)]
struct ScriptedPrompt {
    answers: Mutex<VecDeque<Option<&'static str>>>,
    calls: Mutex<Vec<PromptCall>>,
    errors: Mutex<Vec<String>>,
    on_warning: Option<Box<dyn Fn() + Send + Sync>>,
}

impl ScriptedPrompt {
    fn answering(answers: impl IntoIterator<Item = Option<&'static str>>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().collect()),
            ..Default::default()
        }
    }

    fn calls(&self) -> Vec<PromptCall> {
        self.calls.lock().unwrap().clone()
    }

    fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }
}

#[async_trait]
impl UserPrompt for ScriptedPrompt {
    async fn show_warning(&self, message: &str, actions: &[&str]) -> Option<String> {
        self.calls.lock().unwrap().push(PromptCall {
            at: Instant::now(),
            message: message.to_string(),
            actions: actions.iter().map(|a| a.to_string()).collect(),
        });
        if let Some(hook) = &self.on_warning {
            hook();
        }
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .flatten()
            .map(str::to_string)
    }

    async fn show_error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }
}

#[derive(Default)]
struct RecordingSurface {
    external: Mutex<Vec<String>>,
    viewer: Mutex<Vec<String>>,
}

impl RecordingSurface {
    fn open_count(&self) -> usize {
        self.external.lock().unwrap().len() + self.viewer.lock().unwrap().len()
    }
}

#[async_trait]
impl PreviewSurface for RecordingSurface {
    async fn open_external(&self, url: &str) -> PreviewResult<()> {
        self.external.lock().unwrap().push(url.to_string());
        Ok(())
    }

    async fn open_viewer(&self, url: &str, _options: ViewerOptions) -> PreviewResult<()> {
        self.viewer.lock().unwrap().push(url.to_string());
        Ok(())
    }
}

/// Probe whose answer is decided by port and overall call number (starting at 1)
struct ScriptedProbe {
    calls: AtomicU32,
    answer: Box<dyn Fn(u16, u32) -> bool + Send + Sync>,
}

impl ScriptedProbe {
    fn never_open() -> Arc<Self> {
        Self::new(|_, _| false)
    }

    fn new(answer: impl Fn(u16, u32) -> bool + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            answer: Box::new(answer),
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReachabilityProbe for ScriptedProbe {
    async fn probe(&self, host: &str, port: u16) -> Result<bool, ProbeError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if (self.answer)(port, call) {
            Ok(true)
        } else {
            Err(ProbeError::NotReady {
                host: host.to_string(),
                port,
            })
        }
    }
}

struct Harness {
    orchestrator: ReadinessOrchestrator,
    events: broadcast::Sender<TerminalId>,
    surface: Arc<RecordingSurface>,
}

fn harness(
    settings: PreviewSettings,
    prompt: Arc<ScriptedPrompt>,
    probe: Option<Arc<dyn ReachabilityProbe>>,
) -> Harness {
    let surface = Arc::new(RecordingSurface::default());
    let launcher = PreviewLauncher::new(
        settings.preview_type.clone(),
        beacon_preview::url_resolver(&settings),
        surface.clone(),
    );
    let (events, _) = broadcast::channel(16);
    let mut orchestrator = ReadinessOrchestrator::new(
        &settings,
        launcher,
        prompt,
        Arc::new(NoopProgress),
        events.clone(),
    );
    if let Some(probe) = probe {
        orchestrator = orchestrator.with_probe(probe);
    }
    Harness {
        orchestrator,
        events,
        surface,
    }
}

fn external_settings() -> PreviewSettings {
    PreviewSettings {
        preview_type: PreviewType::External,
        probe_host: "127.0.0.1".to_string(),
        ..PreviewSettings::default()
    }
}

#[tokio::test]
async fn test_primary_port_opening_launches_preview_once() {
    let port = beacon_preview::suggest_port().unwrap();
    let prompt = Arc::new(ScriptedPrompt::default());
    let h = harness(external_settings(), prompt.clone(), None);

    // Server comes up a little after the wait starts
    let server = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(listener);
    });

    let outcome = h
        .orchestrator
        .wait_for_ports_and_open(WaitRequest::new(port).with_timeout(Duration::from_secs(5)))
        .await
        .unwrap();
    server.abort();

    let expected_url = format!("http://localhost:{}", port);
    assert_eq!(
        outcome,
        WaitOutcome::Opened {
            url: expected_url.clone()
        }
    );
    assert_eq!(h.surface.external.lock().unwrap().clone(), vec![expected_url]);
    assert_eq!(h.surface.open_count(), 1, "Preview should open exactly once");
    assert!(prompt.calls().is_empty(), "No prompt when the port opens in time");
}

#[tokio::test]
async fn test_opened_url_goes_through_resolver() {
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let settings = PreviewSettings {
        public_url_template: Some("https://{port}.preview.example.dev".to_string()),
        ..external_settings()
    };
    let h = harness(settings, Arc::new(ScriptedPrompt::default()), None);

    let outcome = h
        .orchestrator
        .wait_for_ports_and_open(WaitRequest::new(port))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        WaitOutcome::Opened {
            url: format!("https://{}.preview.example.dev", port)
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_keep_waiting_escalates_to_fixed_timeout() {
    let prompt = Arc::new(ScriptedPrompt::answering([Some(KEEP_WAITING), None]));
    let probe = ScriptedProbe::never_open();
    let h = harness(external_settings(), prompt.clone(), Some(probe.clone()));
    let started = Instant::now();

    let outcome = h
        .orchestrator
        .wait_for_ports_and_open(
            WaitRequest::new(3000).with_timeout(Duration::from_millis(200)),
        )
        .await
        .unwrap();

    assert_eq!(outcome, WaitOutcome::Abandoned);
    assert_eq!(h.surface.open_count(), 0);

    let calls = prompt.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].actions, vec![KEEP_WAITING.to_string()]);
    assert_eq!(
        calls[0].message,
        "Port 3000 did not open within 200 ms. Keep waiting?"
    );
    assert_eq!(
        calls[1].message,
        "Port 3000 did not open within 30 seconds. Keep waiting?"
    );

    let first_round = calls[0].at - started;
    assert!(first_round >= Duration::from_millis(200));
    assert!(first_round < Duration::from_millis(200) + DEFAULT_POLL_INTERVAL);

    // Second round is 30s flat, not doubled or added to the first deadline
    let second_round = calls[1].at - calls[0].at;
    assert!(second_round >= ESCALATED_TIMEOUT);
    assert!(second_round < ESCALATED_TIMEOUT + DEFAULT_POLL_INTERVAL);
}

#[tokio::test(start_paused = true)]
async fn test_repeated_keep_waiting_stays_at_escalated_timeout() {
    let prompt = Arc::new(ScriptedPrompt::answering([
        Some(KEEP_WAITING),
        Some(KEEP_WAITING),
        None,
    ]));
    let h = harness(
        external_settings(),
        prompt.clone(),
        Some(ScriptedProbe::never_open()),
    );

    h.orchestrator
        .wait_for_ports_and_open(WaitRequest::new(3000).with_timeout(Duration::from_secs(1)))
        .await
        .unwrap();

    let calls = prompt.calls();
    assert_eq!(calls.len(), 3);
    let third_round = calls[2].at - calls[1].at;
    assert!(third_round >= ESCALATED_TIMEOUT);
    assert!(third_round < ESCALATED_TIMEOUT + DEFAULT_POLL_INTERVAL);
}

#[tokio::test(start_paused = true)]
async fn test_escalation_is_capped() {
    let prompt = Arc::new(ScriptedPrompt::answering(
        std::iter::repeat(Some(KEEP_WAITING)).take(MAX_ESCALATIONS as usize + 5),
    ));
    let h = harness(
        external_settings(),
        prompt.clone(),
        Some(ScriptedProbe::never_open()),
    );

    let outcome = h
        .orchestrator
        .wait_for_ports_and_open(
            WaitRequest::new(3000).with_timeout(Duration::from_millis(100)),
        )
        .await
        .unwrap();

    assert_eq!(outcome, WaitOutcome::Abandoned);
    assert_eq!(prompt.calls().len(), MAX_ESCALATIONS as usize + 1);
}

#[tokio::test(start_paused = true)]
#[traced_test]
async fn test_terminal_close_cancels_quietly() {
    let prompt = Arc::new(ScriptedPrompt::default());
    let probe = ScriptedProbe::never_open();
    let h = harness(external_settings(), prompt.clone(), Some(probe.clone()));
    let terminal = FakeTerminal::new(7);

    let closer = {
        let terminal = terminal.clone();
        let events = h.events.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            terminal.exit(1);
            events.send(7).unwrap();
        })
    };

    let started = Instant::now();
    let outcome = h
        .orchestrator
        .wait_for_ports_and_open(
            WaitRequest::new(3000)
                .with_terminal(terminal.clone())
                .with_timeout(Duration::from_millis(1000)),
        )
        .await
        .unwrap();
    closer.await.unwrap();

    assert_eq!(outcome, WaitOutcome::Cancelled);
    assert!(started.elapsed() < Duration::from_millis(1000));
    assert_eq!(h.surface.open_count(), 0, "No preview after the terminal closed");
    assert!(prompt.calls().is_empty(), "No prompt after the terminal closed");
    assert!(prompt.errors().is_empty());
    assert!(logs_contain(
        "Terminal closed while waiting for port 3000; not opening a preview"
    ));
    assert!(!logs_contain("is ready"));
}

#[tokio::test(start_paused = true)]
async fn test_other_terminals_closing_is_ignored() {
    let prompt = Arc::new(ScriptedPrompt::default());
    let h = harness(
        external_settings(),
        prompt.clone(),
        Some(ScriptedProbe::never_open()),
    );
    let terminal = FakeTerminal::new(7);

    let events = h.events.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = events.send(99);
    });

    let outcome = h
        .orchestrator
        .wait_for_ports_and_open(
            WaitRequest::new(3000)
                .with_terminal(terminal)
                .with_timeout(Duration::from_millis(300)),
        )
        .await
        .unwrap();

    assert_eq!(outcome, WaitOutcome::Abandoned);
    let calls = prompt.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(
        calls[0].actions,
        vec![KEEP_WAITING.to_string(), SHOW_TERMINAL.to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn test_show_terminal_stops_waiting() {
    let prompt = Arc::new(ScriptedPrompt::answering([Some(SHOW_TERMINAL)]));
    let probe = ScriptedProbe::never_open();
    let h = harness(external_settings(), prompt.clone(), Some(probe.clone()));
    let terminal = FakeTerminal::new(3);

    let outcome = h
        .orchestrator
        .wait_for_ports_and_open(
            WaitRequest::new(3000)
                .with_terminal(terminal.clone())
                .with_timeout(Duration::from_millis(200)),
        )
        .await
        .unwrap();
    let calls_after = probe.calls();

    assert_eq!(outcome, WaitOutcome::TerminalShown);
    assert!(terminal.shown.load(Ordering::SeqCst));
    assert_eq!(prompt.calls().len(), 1);

    // Nothing keeps probing in the background
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(probe.calls(), calls_after);
}

#[tokio::test(start_paused = true)]
async fn test_terminal_exit_during_prompt_reports_error() {
    let terminal = FakeTerminal::new(5);
    let prompt = {
        let terminal = terminal.clone();
        Arc::new(ScriptedPrompt {
            on_warning: Some(Box::new(move || terminal.exit(0))),
            ..ScriptedPrompt::answering([Some(KEEP_WAITING)])
        })
    };
    let probe = ScriptedProbe::never_open();
    let h = harness(external_settings(), prompt.clone(), Some(probe.clone()));

    let outcome = h
        .orchestrator
        .wait_for_ports_and_open(
            WaitRequest::new(3000)
                .with_terminal(terminal.clone())
                .with_timeout(Duration::from_millis(200)),
        )
        .await
        .unwrap();
    let calls_after = probe.calls();

    assert_eq!(outcome, WaitOutcome::TerminalExited);
    assert_eq!(prompt.errors(), vec![TERMINAL_EXITED_MESSAGE.to_string()]);
    assert_eq!(prompt.calls().len(), 1, "Keep waiting must not re-enter probing");
    assert!(!terminal.shown.load(Ordering::SeqCst));

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(probe.calls(), calls_after);
}

#[tokio::test(start_paused = true)]
async fn test_terminal_exit_without_event_blocks_preview() {
    let terminal = FakeTerminal::new(9);
    let probe = {
        let terminal = terminal.clone();
        // The process dies on the second attempt but no close event is delivered
        ScriptedProbe::new(move |_, call| {
            if call == 2 {
                terminal.exit(137);
            }
            call >= 3
        })
    };
    let prompt = Arc::new(ScriptedPrompt::default());
    let h = harness(external_settings(), prompt.clone(), Some(probe));

    let outcome = h
        .orchestrator
        .wait_for_ports_and_open(
            WaitRequest::new(3000)
                .with_terminal(terminal)
                .with_timeout(Duration::from_secs(5)),
        )
        .await
        .unwrap();

    assert_eq!(outcome, WaitOutcome::Cancelled);
    assert_eq!(h.surface.open_count(), 0);
    assert!(prompt.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_already_exited_terminal_cancels() {
    let terminal = FakeTerminal::new(11);
    terminal.exit(1);
    let prompt = Arc::new(ScriptedPrompt::default());
    let h = harness(
        external_settings(),
        prompt.clone(),
        Some(ScriptedProbe::new(|_, _| true)),
    );

    let outcome = h
        .orchestrator
        .wait_for_ports_and_open(WaitRequest::new(3000).with_terminal(terminal))
        .await
        .unwrap();

    assert_eq!(outcome, WaitOutcome::Cancelled);
    assert_eq!(h.surface.open_count(), 0);
    assert!(prompt.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_every_port_must_open() {
    // Primary port is up, the debugger port never opens
    let probe = ScriptedProbe::new(|port, _| port == 3000);
    let prompt = Arc::new(ScriptedPrompt::default());
    let h = harness(external_settings(), prompt.clone(), Some(probe));

    let outcome = h
        .orchestrator
        .wait_for_ports_and_open(
            WaitRequest::new(3000)
                .with_additional_ports([9229])
                .with_timeout(Duration::from_millis(400)),
        )
        .await
        .unwrap();

    assert_eq!(outcome, WaitOutcome::Abandoned);
    assert_eq!(h.surface.open_count(), 0);
    let calls = prompt.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(
        calls[0].message,
        "Ports 3000, 9229 did not all open within 400 ms. Keep waiting?"
    );
}

#[tokio::test]
async fn test_external_about_blank_is_not_opened() {
    let surface = Arc::new(RecordingSurface::default());
    let launcher = PreviewLauncher::new(
        PreviewType::External,
        Arc::new(beacon_preview::LocalUrlResolver),
        surface.clone(),
    );

    launcher.open_browser("about:blank").await.unwrap();

    assert_eq!(surface.open_count(), 0);
}
