// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use webcam_stream::backends::camera::CaptureBackendType;

mod cli;

#[derive(Parser)]
#[command(name = "webcam-stream")]
#[command(about = "Select webcam formats and stream frames")]
#[command(version = webcam_stream::constants::app_version())]
struct Cli {
    /// Capture backend (overrides the config file)
    #[arg(short, long, global = true)]
    backend: Option<BackendArg>,

    /// Config file (default: ~/.config/webcam-stream/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum BackendArg {
    V4l2,
    Mock,
}

impl From<BackendArg> for CaptureBackendType {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::V4l2 => CaptureBackendType::V4l2,
            BackendArg::Mock => CaptureBackendType::Mock,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List available capture devices
    List,

    /// Show the supported formats of a device
    Formats {
        /// Device name (from 'webcam-stream list')
        device: String,
    },

    /// Select a format and read frames
    Stream {
        #[command(flatten)]
        selection: cli::SelectionArgs,

        /// Stop after this many frames (default: run until Ctrl-C)
        #[arg(short = 'n', long)]
        frames: Option<u64>,

        /// Write every frame as a raw file into this directory
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Relay frames to a v4l2loopback device
    Relay {
        #[command(flatten)]
        selection: cli::SelectionArgs,

        /// Loopback device node (default: from config)
        #[arg(long)]
        sink: Option<PathBuf>,

        /// Stop after this many frames (default: run until Ctrl-C)
        #[arg(short = 'n', long)]
        frames: Option<u64>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set RUST_LOG to control the log level
    // Examples: RUST_LOG=debug, RUST_LOG=webcam_stream=debug
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let args = Cli::parse();

    let mut ctx = cli::Context::load(args.config)?;
    if let Some(backend) = args.backend {
        ctx.config.backend = backend.into();
    }

    match args.command {
        Commands::List => cli::list_devices(&ctx),
        Commands::Formats { device } => cli::show_formats(&ctx, &device),
        Commands::Stream {
            selection,
            frames,
            output,
        } => cli::stream(&mut ctx, selection, frames, output),
        Commands::Relay {
            selection,
            sink,
            frames,
        } => cli::relay(&mut ctx, selection, sink, frames),
    }
}
