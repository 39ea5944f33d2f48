use crate::config::DEFAULT_CONFIG_FILE;
use crate::template_matching::RegionType;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "glyph-relay")]
#[command(author, version, about = "Screen-glyph recognition and key relay", long_about = None)]
pub struct Args {
    /// Configuration file (JSON)
    #[arg(long, short = 'c', global = true, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Wait for triggers and run the glyph sequence and monitoring loop
    Run {
        /// Serial device of the keyboard bridge (overrides the config and
        /// auto-detection)
        #[arg(long, short = 'p')]
        port: Option<PathBuf>,

        /// Log key commands instead of sending them
        #[arg(long)]
        dry_run: bool,

        /// Replay PNG frames from a file or directory instead of the screen
        #[arg(long)]
        replay: Option<PathBuf>,
    },

    /// Classify image files (or every PNG in a directory) for one region type
    Classify {
        /// glyph, status, end or pm
        #[arg(long, short = 'r')]
        region: RegionType,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,

        /// Also append one row per file to this CSV
        #[arg(long, value_name = "FILE")]
        csv: Option<PathBuf>,

        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// List serial ports and mark the ones that look like a keyboard bridge
    ListPorts,

    /// Validate the configuration and print the resolved settings
    CheckConfig,
}
