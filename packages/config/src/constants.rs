// ABOUTME: Environment variable name constants
// ABOUTME: Centralized definitions of all environment variable names used across Beacon

// Preview Configuration
pub const BEACON_PREVIEW_TYPE: &str = "BEACON_PREVIEW_TYPE";
pub const BEACON_TIMEOUT_OPEN_BROWSER: &str = "BEACON_TIMEOUT_OPEN_BROWSER";

// Probe Configuration
pub const BEACON_PROBE_HOST: &str = "BEACON_PROBE_HOST";

// Remote / proxied environments
pub const BEACON_PUBLIC_URL_TEMPLATE: &str = "BEACON_PUBLIC_URL_TEMPLATE";

// Logging
pub const BEACON_LOG: &str = "BEACON_LOG";
pub const RUST_LOG: &str = "RUST_LOG";

// Handed to the launched dev server
pub const PORT: &str = "PORT";
