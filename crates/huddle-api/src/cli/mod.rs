//! CLI command definitions for the `huddle` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod status;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Real-time messaging server: direct chats, groups and live events.
#[derive(Parser)]
#[command(name = "huddle", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Default log filter for the chosen verbosity. `RUST_LOG` overrides it.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 if self.quiet => "error",
            0 => "info",
            1 => "info,huddle_core=debug,huddle_infra=debug,huddle_api=debug",
            _ => "trace",
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API and live channel server.
    Serve {
        /// Host to bind to (defaults to `host` in config.toml).
        #[arg(long, env = "HUDDLE_HOST")]
        host: Option<String>,

        /// Port to listen on (defaults to `port` in config.toml).
        #[arg(short, long, env = "HUDDLE_PORT")]
        port: Option<u16>,

        /// Also export tracing spans through OpenTelemetry (stdout).
        #[arg(long)]
        otel: bool,
    },

    /// Show user, chat and message counts.
    Status {
        /// Output machine-readable JSON instead of styled text.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}
