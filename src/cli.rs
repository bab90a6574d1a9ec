use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "fbinstantd", about = "FBInstant ad-lifecycle plugin for the mediation host")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the plugin host against the sandbox SDK
    Serve {
        /// Socket path (default: $XDG_RUNTIME_DIR/fbinstant/plugin.sock)
        #[arg(long)]
        socket: Option<PathBuf>,

        /// Fail instance acquisition for a placement (PLACEMENT=CODE, empty CODE for uncoded)
        #[arg(long = "acquire-error", value_name = "PLACEMENT=CODE", value_parser = parse_placement_code)]
        acquire_errors: Vec<(String, String)>,

        /// Fail preload for a placement (PLACEMENT=CODE)
        #[arg(long = "preload-error", value_name = "PLACEMENT=CODE", value_parser = parse_placement_code)]
        preload_errors: Vec<(String, String)>,

        /// Fail present for a placement (PLACEMENT=CODE)
        #[arg(long = "present-error", value_name = "PLACEMENT=CODE", value_parser = parse_placement_code)]
        present_errors: Vec<(String, String)>,

        /// Hold each instance acquisition pending for this many milliseconds
        #[arg(long, default_value_t = 0)]
        acquire_delay_ms: u64,

        /// Make SDK script loading fail
        #[arg(long)]
        offline: bool,
    },

    /// Send a single request to a running plugin host
    Client {
        /// Socket path (default: $XDG_RUNTIME_DIR/fbinstant/plugin.sock)
        #[arg(long)]
        socket: Option<PathBuf>,

        #[command(subcommand)]
        action: ClientAction,
    },
}

#[derive(Subcommand)]
pub enum ClientAction {
    /// Load the SDK script and initialize the SDK
    Initialize,
    /// Signal that game loading started
    LoadStart,
    /// Signal that game loading finished
    LoadStop,
    /// Show an interstitial ad
    ShowFullScreen {
        #[arg(long)]
        placement: String,
    },
    /// Show a rewarded ad ("interstitial" or "video")
    ShowRewarded {
        #[arg(long = "type")]
        ad_type: String,

        #[arg(long)]
        placement: String,
    },
}

/// Parse `PLACEMENT=CODE`. The code may be empty; the placement may not.
fn parse_placement_code(s: &str) -> Result<(String, String), String> {
    let (placement, code) = s
        .split_once('=')
        .ok_or_else(|| format!("expected PLACEMENT=CODE, got {s:?}"))?;
    if placement.is_empty() {
        return Err(format!("empty placement in {s:?}"));
    }
    Ok((placement.to_string(), code.to_string()))
}
