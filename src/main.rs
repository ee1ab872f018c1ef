//! Inputbridge - host display events to guest window-system input
//!
//! Replays a recorded trace of host events and guest calls through the
//! translation core and reports what the guest and the host would have seen.
//!
//! # Features
//! - Pointer clipping through a host grab on a capture surface
//! - Relative raw motion for clipped pointers
//! - Focus arbitration for `WM_TAKE_FOCUS` and XEmbed
//! - Window manager state synchronization with serial fencing
//! - TOML configuration

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use inputbridge_core::config::Config;
use inputbridge_core::geometry::Rect;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

mod trace;

/// Inputbridge - replay host display traces through the input core
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run in debug mode with verbose logging
    #[arg(short, long)]
    debug: bool,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,

    /// Print default configuration to stdout
    #[arg(long)]
    print_default_config: bool,

    /// Virtual screen size as WIDTHxHEIGHT
    #[arg(long, default_value = "1920x1080", value_parser = parse_screen)]
    screen: Rect,

    /// Trace to replay, one JSON step per line
    trace: Option<PathBuf>,
}

fn parse_screen(s: &str) -> Result<Rect, String> {
    let (width, height) = s
        .split_once('x')
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {s:?}"))?;
    let width: i32 = width.trim().parse().map_err(|e| format!("bad width: {e}"))?;
    let height: i32 = height.trim().parse().map_err(|e| format!("bad height: {e}"))?;
    if width <= 0 || height <= 0 {
        return Err(format!("screen must not be empty, got {s:?}"));
    }
    Ok(Rect::new(0, 0, width, height))
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Inputbridge v{} starting...", env!("CARGO_PKG_VERSION"));

    if args.print_default_config {
        println!("{}", Config::default_config_string());
        return Ok(());
    }

    if args.validate {
        // an explicit file has to parse; no fallback to defaults here
        let config = Config::load(args.config.as_deref())?;
        config.validate()?;
        info!("Configuration is valid");
        return Ok(());
    }

    let config = match Config::load(args.config.as_deref()) {
        Ok(cfg) => {
            info!("Configuration loaded successfully");
            cfg
        }
        Err(e) => {
            warn!("Failed to load config: {}, using defaults", e);
            Config::default()
        }
    };

    let Some(path) = args.trace else {
        bail!("no trace given; pass a trace file or --print-default-config");
    };

    info!(screen = %args.screen, "replaying {}", path.display());
    let summary = trace::run(&path, config, args.screen)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}
