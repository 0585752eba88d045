//! Terminal host for the Beacon preview core.
//!
//! Provides the pieces the `beacon` binary hands to the readiness
//! orchestrator: a progress/prompt/browser host for the current terminal and
//! a spawned dev server process that plays the role of the "terminal".

pub mod host;
pub mod logging;
pub mod process;

pub use host::TerminalHost;
pub use logging::init_logging;
pub use process::{OutputLine, OutputStream, ProcessTerminal, MAX_CAPTURED_LINES};

#[cfg(test)]
mod tests;
