//! Weaver - streams generated text into executed sandbox actions.
//!
//! This is the main entry point for the weaver CLI.

mod commands;

use clap::{Parser, Subcommand};
use commands::{handle_config, handle_parse, handle_run, handle_serve, init_logging, RunOptions};
use std::path::PathBuf;
use weaver_core::Config;

#[derive(Parser)]
#[command(name = "weaver")]
#[command(author, version, about = "Run the actions embedded in generated text", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print logs to stderr instead of the log file
    #[arg(long, global = true)]
    print_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a transcript and print its visible text and actions as JSON
    Parse {
        /// Transcript file
        file: PathBuf,
        /// Feed the transcript in chunks of this many bytes
        #[arg(long, default_value_t = 64)]
        chunk_size: usize,
    },
    /// Stream a transcript through the workbench and execute its actions
    Run {
        /// Transcript file
        file: PathBuf,
        /// Project directory served by the local sandbox
        #[arg(long)]
        root: Option<PathBuf>,
        /// Address (host:port) of a remote sandbox
        #[arg(long)]
        sandbox_url: Option<String>,
        /// Feed the transcript in chunks of this many bytes
        #[arg(long, default_value_t = 64)]
        chunk_size: usize,
    },
    /// Serve a project directory as a sandbox over TCP
    Serve {
        /// Project directory to serve
        #[arg(long, default_value = ".")]
        root: PathBuf,
        /// Address to bind to
        #[arg(short, long, default_value = "127.0.0.1:4800")]
        address: String,
    },
    /// Show configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cwd = std::env::current_dir()?;
    let project_dir = match &cli.command {
        Commands::Run {
            root: Some(root), ..
        } => root.clone(),
        Commands::Serve { root, .. } => root.clone(),
        _ => cwd,
    };
    let (config, sources) = Config::load(Some(&project_dir)).await?;

    let log_file = init_logging(cli.verbose, cli.print_logs, config.log_level());
    tracing::debug!(sources = ?sources, "Configuration loaded");

    let result = match cli.command {
        Commands::Parse { file, chunk_size } => handle_parse(&config, &file, chunk_size).await,
        Commands::Run {
            file,
            root,
            sandbox_url,
            chunk_size,
        } => {
            handle_run(
                config,
                RunOptions {
                    file,
                    root,
                    sandbox_url,
                    chunk_size,
                },
            )
            .await
        }
        Commands::Serve { root, address } => handle_serve(config, root, &address).await,
        Commands::Config => handle_config(&config, &sources),
    };

    if cli.verbose {
        if let Some(path) = log_file {
            eprintln!("Logs: {}", path.display());
        }
    }

    result
}
