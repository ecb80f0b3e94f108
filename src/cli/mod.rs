//! CLI command definitions for taskzen
//!
//! This module defines the CLI structure using clap's derive macros.
//! Without a subcommand the binary serves MCP over stdio.

pub mod triage;

use clap::{Parser, Subcommand};
use triage::TriageArgs;

/// TaskZen assistant: MCP server and offline triage
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    /// Model name for text generation (overrides config)
    #[arg(short, long, global = true)]
    pub model: Option<String>,

    /// Start with the demo tags and tasks
    #[arg(long, global = true)]
    pub sample_data: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the MCP server (default if no subcommand given)
    Serve,

    /// Run panic-mode triage once over a JSON task file
    Triage(TriageArgs),
}
