// ABOUTME: Terminal implementation of the preview host interfaces
// ABOUTME: indicatif progress bars, inquire prompts and the system browser launcher

use async_trait::async_trait;
use beacon_preview::{
    PreviewError, PreviewResult, PreviewSurface, ProgressReporter, ProgressSurface, UserPrompt,
    ViewerOptions,
};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use inquire::Select;
use std::process::Stdio;
use std::sync::Mutex;
use tokio::process::Command;
use tracing::{debug, info, warn};

#[cfg(target_os = "macos")]
const BROWSER_COMMAND: Option<&str> = Some("open");

#[cfg(target_os = "linux")]
const BROWSER_COMMAND: Option<&str> = Some("xdg-open");

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
const BROWSER_COMMAND: Option<&str> = None;

/// Host that talks to the user through the current terminal
#[derive(Debug, Clone)]
pub struct TerminalHost {
    browser_command: Option<String>,
}

impl Default for TerminalHost {
    fn default() -> Self {
        Self {
            browser_command: BROWSER_COMMAND.map(str::to_string),
        }
    }
}

impl TerminalHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Launch URLs with `command` instead of the platform opener
    pub fn with_browser_command(mut self, command: impl Into<String>) -> Self {
        self.browser_command = Some(command.into());
        self
    }

    pub fn browser_command(&self) -> Option<&str> {
        self.browser_command.as_deref()
    }
}

/// Progress bar for one wait; cleared when the wait ends
struct BarReporter {
    bar: ProgressBar,
    total: Mutex<f64>,
}

impl BarReporter {
    fn new(title: &str) -> Self {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} {msg} [{bar:30.cyan/blue}] {pos}%")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        bar.set_message(title.to_string());
        Self {
            bar,
            total: Mutex::new(0.0),
        }
    }
}

impl ProgressReporter for BarReporter {
    fn report(&self, increment: f64) {
        let mut total = self
            .total
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *total = (*total + increment).clamp(0.0, 100.0);
        self.bar.set_position(total.round() as u64);
    }
}

impl Drop for BarReporter {
    fn drop(&mut self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressSurface for TerminalHost {
    fn begin(&self, title: &str) -> Box<dyn ProgressReporter> {
        Box::new(BarReporter::new(title))
    }
}

#[async_trait]
impl UserPrompt for TerminalHost {
    async fn show_warning(&self, message: &str, actions: &[&str]) -> Option<String> {
        let message = format!("{} {}", "Warning:".yellow().bold(), message);
        let options: Vec<String> = actions.iter().map(|a| a.to_string()).collect();

        // inquire blocks on stdin
        let answer = tokio::task::spawn_blocking(move || {
            Select::new(&message, options)
                .prompt()
                .map_err(|e| e.to_string())
        })
        .await;

        match answer {
            Ok(Ok(choice)) => Some(choice),
            Ok(Err(reason)) => {
                debug!("Prompt dismissed: {}", reason);
                None
            }
            Err(e) => {
                warn!("Prompt task failed: {}", e);
                None
            }
        }
    }

    async fn show_error(&self, message: &str) {
        eprintln!("{} {}", "Error:".red().bold(), message);
    }
}

#[async_trait]
impl PreviewSurface for TerminalHost {
    async fn open_external(&self, url: &str) -> PreviewResult<()> {
        let Some(command) = self.browser_command.as_deref() else {
            return Err(PreviewError::OpenFailed {
                url: url.to_string(),
                reason: "no browser launcher on this platform".to_string(),
            });
        };

        let status = Command::new(command)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await?;

        if !status.success() {
            return Err(PreviewError::OpenFailed {
                url: url.to_string(),
                reason: format!("{} exited with {}", command, status),
            });
        }

        info!("Opened browser to {}", url);
        Ok(())
    }

    async fn open_viewer(&self, url: &str, options: ViewerOptions) -> PreviewResult<()> {
        debug!("Viewer options for {}: {:?}", url, options);
        println!("{} {}", "Preview ready:".green().bold(), url.cyan().underline());
        Ok(())
    }
}
