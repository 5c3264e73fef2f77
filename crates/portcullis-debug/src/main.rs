use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod policy;
mod validate;

#[derive(Parser)]
#[command(name = "portcullis-debug")]
#[command(about = "Debugging toolkit for Portcullis - evaluate policy decisions offline")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether an image URL may be fetched
    Image {
        /// Policy file to test
        #[arg(long)]
        policy: PathBuf,

        /// Absolute image URL
        #[arg(long)]
        url: String,

        /// Output format: json, text (default: text)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Check whether an inbound action may run
    Action {
        /// Policy file to test
        #[arg(long)]
        policy: PathBuf,

        /// Origin header (bare host or serialized origin)
        #[arg(long)]
        origin: String,

        /// Host header, enables the same-origin check
        #[arg(long)]
        host: Option<String>,

        /// Request body size in bytes
        #[arg(long)]
        body_bytes: u64,

        /// Output format: json, text (default: text)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Test a request described as JSON ({"url": ...} or {"origin": ..., "body_bytes": ...})
    Policy {
        /// Policy file to test
        policy: PathBuf,

        /// Request JSON file or inline JSON
        request: String,

        /// Output format: json, text (default: text)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Load a policy file and summarize it
    Validate {
        /// Policy file to validate
        policy: PathBuf,

        /// Output format: json, text (default: text)
        #[arg(long, default_value = "text")]
        format: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Stdout carries the report; logs go to stderr and stay quiet by default
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    match cli.command {
        Commands::Image {
            policy,
            url,
            format,
        } => {
            policy::image(&policy, &url, &format)?;
        }
        Commands::Action {
            policy,
            origin,
            host,
            body_bytes,
            format,
        } => {
            policy::action(&policy, &origin, host.as_deref(), body_bytes, &format)?;
        }
        Commands::Policy {
            policy,
            request,
            format,
        } => {
            policy::policy(&policy, &request, &format)?;
        }
        Commands::Validate { policy, format } => {
            validate::validate(&policy, &format)?;
        }
    }

    Ok(())
}
