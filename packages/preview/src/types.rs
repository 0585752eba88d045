use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// How a ready server is presented to the user
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PreviewType {
    /// Do not open anything; readiness waiting is skipped entirely
    None,
    /// Hand the URL to the system browser
    External,
    /// Show the URL in the host's own viewer
    #[default]
    Internal,
    /// Any other configured value; treated like `Internal`
    Unrecognized(String),
}

impl PreviewType {
    pub fn as_str(&self) -> &str {
        match self {
            PreviewType::None => "none",
            PreviewType::External => "external",
            PreviewType::Internal => "internal",
            PreviewType::Unrecognized(raw) => raw.as_str(),
        }
    }
}

impl FromStr for PreviewType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "none" => PreviewType::None,
            "external" => PreviewType::External,
            "internal" => PreviewType::Internal,
            _ => PreviewType::Unrecognized(s.trim().to_string()),
        })
    }
}

impl fmt::Display for PreviewType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Placement hints for the host's viewer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewerOptions {
    /// Open next to the active editor group
    pub beside: bool,
    /// Keep focus where it is
    pub preserve_focus: bool,
}

impl Default for ViewerOptions {
    fn default() -> Self {
        Self {
            beside: true,
            preserve_focus: true,
        }
    }
}

/// How a readiness wait ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Preview type is `none`; nothing was probed
    Suppressed,
    /// Every port answered and the preview was dispatched
    Opened { url: String },
    /// The terminal closed while waiting
    Cancelled,
    /// The user dismissed the timeout prompt, or the escalation cap was hit
    Abandoned,
    /// The user asked to see the terminal instead of waiting
    TerminalShown,
    /// The terminal had exited by the time the user answered the prompt
    TerminalExited,
}

/// Failure of a single reachability attempt
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("Timed out after {}ms connecting to {host}:{port}", .timeout.as_millis())]
    Timeout {
        host: String,
        port: u16,
        timeout: Duration,
    },

    #[error("Failed to connect to {host}:{port}: {source}")]
    Connect {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("{host}:{port} is not accepting connections yet")]
    NotReady { host: String, port: u16 },
}

/// Error types for preview operations
#[derive(Debug, thiserror::Error)]
pub enum PreviewError {
    #[error("Port {port} is not a valid TCP port")]
    InvalidPort { port: u16 },

    #[error("Failed to open {url}: {reason}")]
    OpenFailed { url: String, reason: String },

    #[error(transparent)]
    Probe(#[from] ProbeError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for preview operations
pub type PreviewResult<T> = Result<T, PreviewError>;
