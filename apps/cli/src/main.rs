use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use hidlink_core::TracingListener;
use hidlink_core::session::{HidlinkSession, PolicyConfig, SessionConfig};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "HID bridge dongle bring-up tool", long_about = None)]
struct Args {
    /// Serial device path (e.g. /dev/rfcomm0)
    #[arg(long)]
    device: Option<String>,

    /// Baud rate for the serial port
    #[arg(long, default_value_t = 115_200)]
    baud: u32,

    /// Shared key as 32 hex chars (takes precedence over --password)
    #[arg(long)]
    key_hex: Option<String>,

    /// Password to derive the shared key from
    #[arg(long)]
    password: Option<String>,

    /// Use the deadline retry policy instead of the counter policy
    #[arg(long)]
    deadline: bool,

    /// Report a stall instead of silently giving up (counter policy)
    #[arg(long)]
    report_stall: bool,

    /// Load session configuration from a TOML file
    #[arg(long)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn build_config(args: &Args) -> anyhow::Result<SessionConfig> {
    let mut config = match &args.config {
        Some(path) => SessionConfig::load_from_file(path)?,
        None => SessionConfig::default(),
    };
    if args.device.is_some() {
        config.device = args.device.clone();
    }
    config.baud = args.baud;
    if args.key_hex.is_some() {
        config.key_hex = args.key_hex.clone();
    }
    if args.password.is_some() {
        config.password = args.password.clone();
    }
    if args.deadline {
        config.policy = PolicyConfig::Deadline {
            short_ms: 1000,
            long_ms: 2000,
        };
    } else if args.report_stall {
        config.policy = PolicyConfig::Counter {
            update_limit: 50,
            retry_limit: 3,
            report_stall: true,
        };
    }
    Ok(config)
}

fn main() {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(if args.verbose {
                    tracing::Level::DEBUG.into()
                } else {
                    tracing::Level::INFO.into()
                })
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let config = match build_config(&args) {
        Ok(c) => c,
        Err(e) => {
            error!("Invalid configuration: {e}");
            std::process::exit(2);
        }
    };

    info!(device = ?config.device, "Starting hidlink bring-up");

    let listener = Arc::new(TracingListener);
    let mut first_attempt = true;
    loop {
        match HidlinkSession::from_config(&config, listener.clone()) {
            Ok(mut session) => {
                first_attempt = false;
                if let Err(e) = session.run() {
                    error!("Bring-up failed: {e}");
                    std::process::exit(1);
                }
                // Link dropped; a fresh connect restarts the sequence.
                info!("Link lost, waiting for device...");
            }
            Err(e) => {
                if first_attempt {
                    error!("Failed to open device: {e}");
                    std::process::exit(1);
                }
            }
        }
        thread::sleep(Duration::from_secs(1));
    }
}
