use beacon_cli::{ProcessTerminal, TerminalHost};
use beacon_preview::{
    is_unsafe_port, suggest_port, url_resolver, PreviewLauncher, PreviewSettings, PreviewType,
    ReadinessOrchestrator, Terminal, WaitOutcome, WaitRequest,
};
use colored::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::warn;

/// Capacity of the terminal-closed channel; one terminal per run
const CLOSED_EVENTS_CAPACITY: usize = 16;

pub struct RunOptions {
    pub port: Option<u16>,
    pub port_env: String,
    pub extra_ports: Vec<u16>,
    pub timeout: Option<u64>,
    pub preview_type: Option<PreviewType>,
    pub command: Vec<String>,
}

fn settings_with(preview_type: Option<PreviewType>) -> PreviewSettings {
    let mut settings = PreviewSettings::from_env();
    if let Some(preview_type) = preview_type {
        settings.preview_type = preview_type;
    }
    settings
}

fn launcher_for(settings: &PreviewSettings, host: Arc<TerminalHost>) -> PreviewLauncher {
    PreviewLauncher::new(settings.preview_type.clone(), url_resolver(settings), host)
}

pub async fn open_command(url: &str, preview_type: Option<PreviewType>) -> anyhow::Result<i32> {
    let settings = settings_with(preview_type);
    let launcher = launcher_for(&settings, Arc::new(TerminalHost::new()));

    launcher.open_browser(url).await?;
    Ok(0)
}

pub async fn run_command(options: RunOptions) -> anyhow::Result<i32> {
    let settings = settings_with(options.preview_type);

    let port = match options.port {
        Some(port) => port,
        None => suggest_port()?,
    };
    if is_unsafe_port(port) {
        warn!("Port {} is blocked by browsers; the preview may not load", port);
    }

    let (closed_events, _) = broadcast::channel(CLOSED_EVENTS_CAPACITY);
    let terminal = ProcessTerminal::spawn(
        &options.command,
        &[(options.port_env.clone(), port.to_string())],
        closed_events.clone(),
    )?;
    println!(
        "{} {} ({}={})",
        "Started".green().bold(),
        terminal.command_line(),
        options.port_env,
        port
    );

    let host = Arc::new(TerminalHost::new());
    let orchestrator = ReadinessOrchestrator::new(
        &settings,
        launcher_for(&settings, host.clone()),
        host.clone(),
        host,
        closed_events,
    );

    let mut request = WaitRequest::new(port)
        .with_additional_ports(options.extra_ports)
        .with_terminal(terminal.clone());
    if let Some(secs) = options.timeout {
        request = request.with_timeout(Duration::from_secs(secs));
    }

    match orchestrator.wait_for_ports_and_open(request).await {
        Ok(outcome) => report_outcome(&outcome),
        // The server keeps running even if the preview could not be shown
        Err(e) => eprintln!("{} {}", "Preview failed:".red().bold(), e),
    }

    terminal.show();
    let code = terminal.wait().await;
    if code != 0 {
        eprintln!(
            "{} '{}' exited with code {}",
            "✗".red(),
            terminal.command_line(),
            code
        );
    }
    Ok(code)
}

fn report_outcome(outcome: &WaitOutcome) {
    match outcome {
        WaitOutcome::Opened { url } => {
            println!("{} Previewing {}", "✓".green(), url);
        }
        WaitOutcome::Suppressed => {}
        WaitOutcome::Cancelled | WaitOutcome::TerminalExited => {
            println!("{} Server exited before it was ready", "✗".red());
        }
        WaitOutcome::Abandoned => {
            println!("{} Stopped waiting for the server", "•".yellow());
        }
        WaitOutcome::TerminalShown => {}
    }
}
