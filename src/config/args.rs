//! CLI argument parsing using clap

use crate::error::BotError;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// random-arts-bot - Random Arts Bot
///
/// Runs the bot in the foreground or manages it as a Windows service
#[derive(Parser, Debug)]
#[command(name = "random-arts-bot")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Configuration file (default: search standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output (can be repeated for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode - only show errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Log output to file
    #[arg(long, global = true)]
    pub log: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, Default, PartialEq, Eq)]
pub enum Command {
    /// Run the bot in the foreground until Ctrl+C
    #[default]
    Run,

    /// Show the service name, display name and description
    Describe,

    /// Write a sample configuration file
    InitConfig {
        /// Where to write it (default: next to the executable)
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Install the Windows service (runs as LocalSystem)
    Install,

    /// Stop and remove the Windows service
    Uninstall,
}

impl Command {
    /// Whether this verb needs the configuration file to be usable
    pub fn requires_config(&self) -> bool {
        matches!(self, Command::Run | Command::Install)
    }

    /// Whether a startup problem must stop this verb from running
    ///
    /// Only fatal problems block, and only for verbs that use the
    /// configuration. `describe`, `init-config` and `uninstall` still run
    /// with a broken config file.
    pub fn is_blocked_by(&self, problem: &BotError) -> bool {
        problem.is_fatal() && self.requires_config()
    }
}

impl Args {
    /// Log level forced by verbose/quiet flags, if any
    pub fn log_level(&self) -> Option<tracing::Level> {
        if self.quiet {
            Some(tracing::Level::ERROR)
        } else {
            match self.verbose {
                0 => None,
                1 => Some(tracing::Level::DEBUG),
                _ => Some(tracing::Level::TRACE),
            }
        }
    }
}
