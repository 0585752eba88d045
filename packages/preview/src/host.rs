// ABOUTME: Interfaces the embedding environment provides to the preview core
// ABOUTME: Progress display, terminal handles, prompts, URL rewriting and preview surfaces

use async_trait::async_trait;

use crate::types::{PreviewResult, ViewerOptions};

/// Identity of a terminal, used to filter the shared terminal-closed stream
pub type TerminalId = u64;

/// Receives additive progress increments, in percentage points
pub trait ProgressReporter: Send + Sync {
    fn report(&self, increment: f64);
}

/// Creates a progress display for one readiness wait
pub trait ProgressSurface: Send + Sync {
    fn begin(&self, title: &str) -> Box<dyn ProgressReporter>;
}

/// The terminal a dev server was launched in
pub trait Terminal: Send + Sync {
    fn id(&self) -> TerminalId;

    /// Exit code once the terminal's process has exited. Polled, so it also
    /// catches terminals that exited before anyone subscribed to close events.
    fn exit_status(&self) -> Option<i32>;

    /// Bring the terminal in front of the user
    fn show(&self);
}

/// Notifications with selectable actions
#[async_trait]
pub trait UserPrompt: Send + Sync {
    /// Show `message` with the given action labels; returns the chosen label,
    /// or `None` when the prompt was dismissed.
    async fn show_warning(&self, message: &str, actions: &[&str]) -> Option<String>;

    async fn show_error(&self, message: &str);
}

/// Turns a local port into a URL that works in the current environment
pub trait UrlResolver: Send + Sync {
    fn resolve(&self, port: u16) -> String;
}

/// Editor-provided in-process preview, used ahead of the default viewer
#[async_trait]
pub trait InternalPreview: Send + Sync {
    async fn open(&self, url: &str) -> PreviewResult<()>;
}

/// Where previews end up
#[async_trait]
pub trait PreviewSurface: Send + Sync {
    /// Hand the URL to the system browser
    async fn open_external(&self, url: &str) -> PreviewResult<()>;

    /// In-process preview hook, if the host has one
    fn internal_preview(&self) -> Option<&dyn InternalPreview> {
        None
    }

    /// Default viewer
    async fn open_viewer(&self, url: &str, options: ViewerOptions) -> PreviewResult<()>;
}

/// `http://localhost:{port}`
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalUrlResolver;

impl UrlResolver for LocalUrlResolver {
    fn resolve(&self, port: u16) -> String {
        format!("http://localhost:{}", port)
    }
}

/// Rewrites ports through a template such as `https://{port}.preview.example.com`
/// for remote or proxied environments.
#[derive(Debug, Clone)]
pub struct TemplateUrlResolver {
    template: String,
}

impl TemplateUrlResolver {
    pub const PLACEHOLDER: &'static str = "{port}";

    /// Returns `None` when the template has no `{port}` placeholder
    pub fn new(template: impl Into<String>) -> Option<Self> {
        let template = template.into();
        template
            .contains(Self::PLACEHOLDER)
            .then_some(Self { template })
    }
}

impl UrlResolver for TemplateUrlResolver {
    fn resolve(&self, port: u16) -> String {
        self.template
            .replace(Self::PLACEHOLDER, &port.to_string())
    }
}
