//! Beacon Preview - readiness waiting for locally launched dev servers
//!
//! This crate decides when a freshly started server is accepting connections
//! and then opens a preview of it exactly once. It also finds free local ports
//! to hand to a server before it starts.
//!
//! The embedding environment (an editor, or the `beacon` CLI) supplies the
//! progress display, prompts, terminal handles and preview surfaces through the
//! traits in [`host`].

pub mod host;
pub mod launcher;
pub mod ports;
pub mod probe;
pub mod readiness;
pub mod retry;
pub mod settings;
pub mod types;

// Re-export key types and functions for easier use
pub use host::{
    InternalPreview, LocalUrlResolver, ProgressReporter, ProgressSurface, PreviewSurface,
    TemplateUrlResolver, Terminal, TerminalId, UrlResolver, UserPrompt,
};
pub use launcher::{PreviewLauncher, BLANK_URL};
pub use ports::{is_unsafe_port, suggest_port, UNSAFE_PORTS};
pub use probe::{
    is_port_open, is_server_port_available, wait_until_server_port_is_available,
    ReachabilityProbe, TcpReachability, DEFAULT_CONNECT_TIMEOUT,
};
pub use readiness::{
    ReadinessOrchestrator, WaitRequest, ESCALATED_TIMEOUT, KEEP_WAITING, MAX_ESCALATIONS,
    SHOW_TERMINAL, TERMINAL_EXITED_MESSAGE,
};
pub use retry::{retry_until, Deadline, ProbeFailure, DEFAULT_POLL_INTERVAL};
pub use settings::PreviewSettings;
pub use types::{
    PreviewError, PreviewResult, PreviewType, ProbeError, ViewerOptions, WaitOutcome,
};

/// Build the URL resolver `settings` asks for.
///
/// Uses the public URL template when one is configured and valid, otherwise
/// plain `http://localhost:{port}`.
pub fn url_resolver(settings: &PreviewSettings) -> std::sync::Arc<dyn UrlResolver> {
    match settings
        .public_url_template
        .as_deref()
        .and_then(TemplateUrlResolver::new)
    {
        Some(resolver) => std::sync::Arc::new(resolver),
        None => {
            if let Some(template) = &settings.public_url_template {
                tracing::warn!(
                    "Ignoring public URL template '{}': it has no {} placeholder",
                    template,
                    TemplateUrlResolver::PLACEHOLDER
                );
            }
            std::sync::Arc::new(LocalUrlResolver)
        }
    }
}
