mod adapter;
mod cli;
mod client;
mod host;
mod ipc;
mod sdk;

use std::time::Duration;

use clap::Parser;
use cli::{Cli, Command};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            socket,
            acquire_errors,
            preload_errors,
            present_errors,
            acquire_delay_ms,
            offline,
        } => {
            let config = host::HostConfig {
                socket,
                acquire_errors,
                preload_errors,
                present_errors,
                acquire_delay: (acquire_delay_ms > 0)
                    .then(|| Duration::from_millis(acquire_delay_ms)),
                offline,
            };
            if let Err(e) = host::run(config).await {
                tracing::error!(error = %e, "plugin host failed");
                eprintln!("fbinstantd serve: {e}");
                std::process::exit(1);
            }
        }
        Command::Client { socket, action } => {
            if let Err(e) = client::run(socket, action).await {
                tracing::error!(error = %e, "client failed");
                eprintln!("fbinstantd client: {e}");
                std::process::exit(1);
            }
        }
    }
}
