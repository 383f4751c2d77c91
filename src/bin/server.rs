//! FlowCloser Server
//!
//! Runs the FlowCloser agent behind the HTTP API and the Instagram webhook.

use std::process;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use flowcloser_lib::agents::FlowCloser;
use flowcloser_lib::config::AppConfig;
use flowcloser_lib::server::{init_logging, AppState, FlowCloserServer};

#[derive(Parser)]
#[command(name = "flowcloser-server")]
#[command(about = "FlowCloser sales agent server")]
#[command(version)]
struct Args {
    /// Host to bind to (overrides HOST)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(args.verbose);
    print_banner();

    let mut config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            process::exit(1);
        }
    };
    config.server = config.server.clone().with_cli(args.host, args.port);

    info!(
        "Starting FlowCloser on {} (primary: {}, fallback: {})",
        config.server.bind_addr(),
        config.models.primary,
        config.models.fallback
    );

    let closer = match FlowCloser::from_config(&config) {
        Ok(closer) => closer,
        Err(e) => {
            error!("Failed to initialize FlowCloser: {:#}", e);
            process::exit(1);
        }
    };

    let server_config = config.server.clone();
    let state = AppState::new(Arc::new(closer), Arc::new(config));
    let server = FlowCloserServer::new(server_config, state);

    if let Err(e) = server.start().await {
        error!("Server failed: {}", e);
        process::exit(1);
    }
}

fn print_banner() {
    println!(
        r#"
  _____ _                 ____ _
 |  ___| | _____      __ / ___| | ___  ___  ___ _ __
 | |_  | |/ _ \ \ /\ / /| |   | |/ _ \/ __|/ _ \ '__|
 |  _| | | (_) \ V  V / | |___| | (_) \__ \  __/ |
 |_|   |_|\___/ \_/\_/   \____|_|\___/|___/\___|_|
    "#
    );

    println!("  FlowCloser sales agent");
    println!("  Version: {}", env!("CARGO_PKG_VERSION"));
    println!();
}
