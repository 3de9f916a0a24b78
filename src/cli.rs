use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Announce new issues from saved tracker filters.
#[derive(Debug, Parser)]
#[command(name = "filter-watch", version, about)]
pub struct Cli {
    /// Path to the TOML config (default: ~/.filter-watch/config.toml).
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Check all filters on the configured schedule (default).
    Run,
    /// Check all filters once and exit.
    Once,
}

impl Cli {
    pub fn command(&self) -> Command {
        self.command.unwrap_or(Command::Run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_run() {
        let cli = Cli::try_parse_from(["filter-watch"]).unwrap();
        assert_eq!(cli.command(), Command::Run);
        assert!(cli.config.is_none());
    }

    #[test]
    fn parses_once_with_config() {
        let cli =
            Cli::try_parse_from(["filter-watch", "once", "--config", "/etc/fw.toml"]).unwrap();
        assert_eq!(cli.command(), Command::Once);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/fw.toml")));
    }

    #[test]
    fn short_config_flag_before_subcommand() {
        let cli = Cli::try_parse_from(["filter-watch", "-c", "fw.toml", "run"]).unwrap();
        assert_eq!(cli.command(), Command::Run);
        assert_eq!(cli.config, Some(PathBuf::from("fw.toml")));
    }

    #[test]
    fn unknown_subcommand_fails() {
        assert!(Cli::try_parse_from(["filter-watch", "add"]).is_err());
    }
}
