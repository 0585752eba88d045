use beacon_preview::PreviewType;
use clap::{Parser, Subcommand};
use colored::*;
use std::process;

mod cli;

#[derive(Parser)]
#[command(name = "beacon")]
#[command(about = "Beacon - wait for dev servers to come up and preview them")]
#[command(version)]
struct Cli {
    /// Log at debug level regardless of BEACON_LOG / RUST_LOG
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a free local port that browsers are willing to open
    SuggestPort {
        #[arg(long, help = "Print the port as JSON")]
        json: bool,
    },
    /// Check whether a local server could bind the port right now
    CheckPort {
        port: u16,
    },
    /// Check whether something is accepting connections on the port
    Probe {
        port: u16,
        #[arg(long, help = "Host to connect to (default: BEACON_PROBE_HOST or localhost)")]
        host: Option<String>,
        #[arg(long, default_value = "1000", help = "Connect timeout in milliseconds")]
        timeout_ms: u64,
    },
    /// Wait until the port is free to bind
    WaitFree {
        port: u16,
        #[arg(long, default_value = "10000", help = "How long to wait in milliseconds")]
        timeout_ms: u64,
    },
    /// Open a URL the way the configured preview type does
    Open {
        url: String,
        #[arg(long, help = "none, external or internal (default: BEACON_PREVIEW_TYPE)")]
        preview_type: Option<PreviewType>,
    },
    /// Start a dev server, wait for its ports and open a preview
    Run {
        #[arg(long, help = "Port to hand to the server (default: a free port)")]
        port: Option<u16>,
        #[arg(long, default_value = beacon_config::constants::PORT, help = "Environment variable the port is passed in")]
        port_env: String,
        #[arg(long = "extra-port", help = "Additional port that must open before previewing")]
        extra_ports: Vec<u16>,
        #[arg(
            long,
            value_parser = clap::value_parser!(u64).range(1..=3600),
            help = "Seconds to wait before asking (default: BEACON_TIMEOUT_OPEN_BROWSER or 10)"
        )]
        timeout: Option<u64>,
        #[arg(long, help = "none, external or internal (default: BEACON_PREVIEW_TYPE)")]
        preview_type: Option<PreviewType>,
        #[arg(last = true, required = true, help = "Command that starts the server")]
        command: Vec<String>,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    beacon_cli::init_logging(cli.verbose);

    match handle_command(cli.command).await {
        Ok(0) => {}
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            process::exit(1);
        }
    }
}

/// Runs the command and returns the process exit code
async fn handle_command(command: Commands) -> anyhow::Result<i32> {
    match command {
        Commands::SuggestPort { json } => cli::ports::suggest_port_command(json),
        Commands::CheckPort { port } => cli::ports::check_port_command(port).await,
        Commands::Probe {
            port,
            host,
            timeout_ms,
        } => cli::ports::probe_command(port, host, timeout_ms).await,
        Commands::WaitFree { port, timeout_ms } => {
            cli::ports::wait_free_command(port, timeout_ms).await
        }
        Commands::Open { url, preview_type } => {
            cli::preview::open_command(&url, preview_type).await
        }
        Commands::Run {
            port,
            port_env,
            extra_ports,
            timeout,
            preview_type,
            command,
        } => {
            cli::preview::run_command(cli::preview::RunOptions {
                port,
                port_env,
                extra_ports,
                timeout,
                preview_type,
                command,
            })
            .await
        }
    }
}
