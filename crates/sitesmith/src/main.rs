//! Sitesmith CLI - static-site asset pipeline with live reload.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "sitesmith")]
#[command(about = "Static-site asset pipeline with live reload")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to sitesmith.toml config file
    #[arg(short, long, default_value = "sitesmith.toml", global = true)]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Delete the output directory
    Clean,

    /// Clean, then build every asset
    Build {
        /// Output directory (defaults to config or "dist")
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Skip minification
        #[arg(long)]
        no_minify: bool,
    },

    /// Build, then serve with live reload (default)
    Dev {
        /// Port to listen on (defaults to config or 3000)
        #[arg(short, long)]
        port: Option<u16>,

        /// Do not open browser
        #[arg(long)]
        no_open: bool,
    },

    /// Preview a built site without watching
    Serve {
        /// Port to listen on (defaults to config or 3000)
        #[arg(short, long)]
        port: Option<u16>,

        /// Directory to serve, relative to the project root (defaults to the configured output)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Do not open browser
        #[arg(long)]
        no_open: bool,
    },

    /// Show the task plans
    Tasks,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    let loaded = config::load_config(&cli.config)?;

    // Execute command
    match cli.command.unwrap_or(Commands::Dev {
        port: None,
        no_open: false,
    }) {
        Commands::Clean => {
            commands::clean::run(loaded.site).await?;
        }
        Commands::Build { output, no_minify } => {
            let mut site = loaded.site;
            if let Some(output) = output {
                site.output_dir = output;
            }
            if no_minify {
                site.minify = false;
            }
            commands::build::run(site).await?;
        }
        Commands::Dev { port, no_open } => {
            commands::dev::run(loaded, port, !no_open).await?;
        }
        Commands::Serve { port, dir, no_open } => {
            commands::serve::run(loaded, port, dir, !no_open).await?;
        }
        Commands::Tasks => {
            commands::tasks::run();
        }
    }

    Ok(())
}
