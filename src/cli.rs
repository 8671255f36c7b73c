use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pipeline-lsp")]
#[command(version)]
#[command(about = "Language server and checker for CI pipeline and task files", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the language server (stdio unless a port is given)
    Serve {
        /// Serve over WebSocket on this port instead of stdio
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Report problems in pipeline or task files
    Check {
        /// Files to check
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Treat every file as a task configuration
        #[arg(long)]
        task: bool,

        /// Print problems as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the declared resources, jobs and groups of a file
    Outline {
        /// Path to the file
        file: PathBuf,

        /// Treat the file as a task configuration
        #[arg(long)]
        task: bool,
    },
}
