//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

/// commitwatch - announce every new commit exactly once
#[derive(Parser)]
#[command(
    name = "cw",
    about = "Watch GitHub repositories and announce every new commit exactly once",
    version = env!("CARGO_PKG_VERSION"),
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Write logs to the log file instead of stderr
    #[arg(long = "log-file", global = true)]
    pub log_file: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Watch until SIGINT/SIGTERM (default)
    Run,

    /// Run a single cycle, wait for it to finish, and exit
    Once,

    /// Show the current API request quota
    Quota,

    /// Show how many commits are recorded per watched key
    Log,
}

/// Path of the log file used with --log-file
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    let path = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("commitwatch")
        .join("logs")
        .join("commitwatch.log");
    debug!(?path, "get_log_path: returning path");
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand() {
        let cli = Cli::try_parse_from(["cw"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.log_file);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["cw", "once", "--log-level", "debug", "-c", "/tmp/cw.yml", "--log-file"]).unwrap();
        assert_eq!(cli.command, Some(Command::Once));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/cw.yml")));
        assert!(cli.log_file);
    }

    #[test]
    fn test_unknown_subcommand_rejected() {
        assert!(Cli::try_parse_from(["cw", "explode"]).is_err());
    }

    #[test]
    fn test_log_path() {
        assert!(get_log_path().ends_with("commitwatch/logs/commitwatch.log"));
    }
}
