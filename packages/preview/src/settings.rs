use beacon_config::constants::{
    BEACON_PREVIEW_TYPE, BEACON_PROBE_HOST, BEACON_PUBLIC_URL_TEMPLATE,
    BEACON_TIMEOUT_OPEN_BROWSER,
};
use beacon_config::{parse_env_or_default, parse_env_or_default_with_validation, read_env_string};
use std::time::Duration;

use crate::types::PreviewType;

/// Default `timeoutOpenBrowser`, in seconds
pub const DEFAULT_TIMEOUT_OPEN_BROWSER_SECS: u64 = 10;

/// Upper bound accepted for `timeoutOpenBrowser`
pub const MAX_TIMEOUT_OPEN_BROWSER_SECS: u64 = 3600;

pub const DEFAULT_PROBE_HOST: &str = "localhost";

/// Read-only preview configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewSettings {
    /// `previewType`
    pub preview_type: PreviewType,
    /// `timeoutOpenBrowser`; initial readiness deadline
    pub timeout_open_browser: Duration,
    /// Host the reachability probe connects to
    pub probe_host: String,
    /// Optional `{port}` template for remote/proxied environments
    pub public_url_template: Option<String>,
}

impl Default for PreviewSettings {
    fn default() -> Self {
        Self {
            preview_type: PreviewType::default(),
            timeout_open_browser: Duration::from_secs(DEFAULT_TIMEOUT_OPEN_BROWSER_SECS),
            probe_host: DEFAULT_PROBE_HOST.to_string(),
            public_url_template: None,
        }
    }
}

impl PreviewSettings {
    /// Load settings from `BEACON_*` environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let preview_type = parse_env_or_default(BEACON_PREVIEW_TYPE, PreviewType::default());

        let timeout_secs = parse_env_or_default_with_validation(
            BEACON_TIMEOUT_OPEN_BROWSER,
            DEFAULT_TIMEOUT_OPEN_BROWSER_SECS,
            |secs| secs > 0 && secs <= MAX_TIMEOUT_OPEN_BROWSER_SECS,
        );

        Self {
            preview_type,
            timeout_open_browser: Duration::from_secs(timeout_secs),
            probe_host: read_env_string(BEACON_PROBE_HOST)
                .unwrap_or_else(|| DEFAULT_PROBE_HOST.to_string()),
            public_url_template: read_env_string(BEACON_PUBLIC_URL_TEMPLATE),
        }
    }
}
