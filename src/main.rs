// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use sign_camera::Config;
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "sign-camera")]
#[command(about = "Classify hand signs from camera shots and pictures")]
#[command(version = env!("GIT_VERSION"))]
#[command(subcommand_required = false)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the terminal interface (default)
    Terminal,

    /// List available cameras
    List,

    /// Classify a single picture
    Classify {
        /// Picture to send to the classifier
        image: PathBuf,
    },

    /// Classify continuously until Ctrl+C
    Watch {
        /// Capture device path (default: from config)
        #[arg(short, long, conflicts_with = "image")]
        camera: Option<String>,

        /// Classify this picture repeatedly instead of using a camera
        #[arg(short, long)]
        image: Option<PathBuf>,

        /// Delay between cycles in milliseconds (default: from config)
        #[arg(long)]
        interval: Option<u64>,

        /// Stop after this many cycles
        #[arg(short = 'n', long)]
        cycles: Option<u64>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=sign_camera=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    let config = Config::load();
    config.validate()?;

    match cli.command {
        Some(Commands::Terminal) | None => sign_camera::terminal::run(config),
        Some(Commands::List) => Ok(cli::list_cameras()?),
        Some(Commands::Classify { image }) => Ok(cli::classify(image, config)?),
        Some(Commands::Watch {
            camera,
            image,
            interval,
            cycles,
        }) => Ok(cli::watch(camera, image, interval, cycles, config)?),
    }
}
