// ABOUTME: Port state probes: client-side reachability and server-side bindability
// ABOUTME: Reachability means someone is listening; bindability means nobody is

use async_trait::async_trait;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tracing::debug;

use crate::retry::{retry_until, ProbeFailure, DEFAULT_POLL_INTERVAL};
use crate::types::ProbeError;

/// Per-connect timeout for the reachability probe
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Check whether a client can connect to `host:port`.
///
/// Resolves `Ok(true)` as soon as a connection is established; the stream is
/// dropped straight away. A refused connection or a connect that outlives
/// `timeout` is an error, which callers polling for readiness treat as "not yet".
pub async fn is_port_open(host: &str, port: u16, timeout: Duration) -> Result<bool, ProbeError> {
    match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(stream)) => {
            drop(stream);
            Ok(true)
        }
        Ok(Err(source)) => Err(ProbeError::Connect {
            host: host.to_string(),
            port,
            source,
        }),
        Err(_) => Err(ProbeError::Timeout {
            host: host.to_string(),
            port,
            timeout,
        }),
    }
}

/// Check whether a listener can be bound to `127.0.0.1:port`.
///
/// `true` means the port is currently unused. The test listener is released
/// before this returns.
pub async fn is_server_port_available(port: u16) -> bool {
    match TcpListener::bind(("127.0.0.1", port)).await {
        Ok(listener) => {
            drop(listener);
            true
        }
        Err(e) => {
            debug!("Port {} is not bindable: {}", port, e);
            false
        }
    }
}

/// Poll the bindability probe until `port` is free or `timeout` elapses
pub async fn wait_until_server_port_is_available(port: u16, timeout: Duration) -> bool {
    let result: Result<Option<()>, String> =
        retry_until(timeout, DEFAULT_POLL_INTERVAL, move || async move {
            if is_server_port_available(port).await {
                Ok(())
            } else {
                Err(ProbeFailure::Retry(format!("port {} still in use", port)))
            }
        })
        .await;

    matches!(result, Ok(Some(())))
}

/// Reachability check the readiness orchestrator polls through
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn probe(&self, host: &str, port: u16) -> Result<bool, ProbeError>;
}

/// Plain TCP connect probe
#[derive(Debug, Clone, Copy)]
pub struct TcpReachability {
    pub timeout: Duration,
}

impl Default for TcpReachability {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

#[async_trait]
impl ReachabilityProbe for TcpReachability {
    async fn probe(&self, host: &str, port: u16) -> Result<bool, ProbeError> {
        is_port_open(host, port, self.timeout).await
    }
}
