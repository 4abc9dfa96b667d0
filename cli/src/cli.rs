//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Lintel - lint files the way the editor integration does
#[derive(Parser)]
#[command(name = "lintel")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (default: ~/.lintel/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Lint files and print their diagnostics
    Check {
        /// Files to lint
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Print the lint config file governing a file
    Config {
        file: PathBuf,

        /// Print every config file up to the home directory, nearest first
        #[arg(long)]
        all: bool,
    },

    /// Print the ignore file governing a file
    Ignore { file: PathBuf },
}
