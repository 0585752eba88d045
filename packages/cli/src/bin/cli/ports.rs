use beacon_preview::{
    is_port_open, is_server_port_available, is_unsafe_port, suggest_port,
    wait_until_server_port_is_available, PreviewSettings,
};
use colored::*;
use std::time::Duration;

pub fn suggest_port_command(json: bool) -> anyhow::Result<i32> {
    let port = suggest_port()?;
    if json {
        println!("{}", serde_json::json!({ "port": port }));
    } else {
        println!("{}", port);
    }
    Ok(0)
}

pub async fn check_port_command(port: u16) -> anyhow::Result<i32> {
    if is_unsafe_port(port) {
        println!(
            "{} Browsers refuse to open port {}",
            "Note:".yellow().bold(),
            port
        );
    }

    if is_server_port_available(port).await {
        println!("{} Port {} is available", "✓".green(), port);
        Ok(0)
    } else {
        println!("{} Port {} is in use", "✗".red(), port);
        Ok(1)
    }
}

pub async fn probe_command(
    port: u16,
    host: Option<String>,
    timeout_ms: u64,
) -> anyhow::Result<i32> {
    let host = host.unwrap_or_else(|| PreviewSettings::from_env().probe_host);

    match is_port_open(&host, port, Duration::from_millis(timeout_ms)).await {
        Ok(true) => {
            println!("{} {}:{} is accepting connections", "✓".green(), host, port);
            Ok(0)
        }
        Ok(false) => {
            println!("{} {}:{} is not accepting connections", "✗".red(), host, port);
            Ok(1)
        }
        Err(e) => {
            println!("{} {}", "✗".red(), e);
            Ok(1)
        }
    }
}

pub async fn wait_free_command(port: u16, timeout_ms: u64) -> anyhow::Result<i32> {
    let timeout = Duration::from_millis(timeout_ms);

    if wait_until_server_port_is_available(port, timeout).await {
        println!("{} Port {} is free", "✓".green(), port);
        Ok(0)
    } else {
        println!(
            "{} Port {} was still in use after {}ms",
            "✗".red(),
            port,
            timeout_ms
        );
        Ok(1)
    }
}
