//! Argument definitions.

use clap::{Args, Parser, Subcommand};
use reconflow_core::ScanType;
use std::path::PathBuf;

/// Run reconnaissance scans against tracked targets and follow their progress.
#[derive(Parser, Debug)]
#[command(name = "reconflow", version, about)]
pub struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Job store location, overriding the configuration
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Manage scan targets
    Targets(TargetsArgs),

    /// Manage API credentials
    Settings(SettingsArgs),

    /// Start a scan and wait for it to finish
    Scan(ScanArgs),

    /// Show one job
    Status {
        /// Job id
        job_id: String,
    },

    /// List jobs, newest first
    Jobs {
        /// Only jobs of this target
        #[arg(long)]
        target: Option<String>,
    },

    /// Show parsed subdomain and live host results for a target
    Results {
        /// Target id
        target_id: String,
    },

    /// List files in a domain's output directory
    Files {
        /// Target domain
        domain: String,
        /// Include this job's log
        #[arg(long)]
        job: Option<String>,
    },

    /// Inspect or initialise the configuration file
    Config(ConfigArgs),
}

#[derive(Args, Debug)]
pub struct TargetsArgs {
    #[command(subcommand)]
    pub command: TargetsCommand,
}

#[derive(Subcommand, Debug)]
pub enum TargetsCommand {
    /// Record a new target
    Add {
        /// Domain name
        domain: String,
        /// Display name
        #[arg(long)]
        name: Option<String>,
        /// Free-form scope description
        #[arg(long)]
        scope: Option<String>,
    },
    /// List targets
    List,
}

#[derive(Args, Debug)]
pub struct SettingsArgs {
    #[command(subcommand)]
    pub command: SettingsCommand,
}

#[derive(Subcommand, Debug)]
pub enum SettingsCommand {
    /// Store a value, e.g. `settings set shodan_api_key <key>`
    Set {
        /// Setting key
        key: String,
        /// Setting value
        value: String,
    },
    /// List settings with credentials masked
    List,
    /// Remove a setting
    Delete {
        /// Setting key
        key: String,
    },
}

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Target id
    pub target_id: String,

    /// Scan type, e.g. `passive`, `whois`, `dns_deep`
    pub scan_type: ScanType,

    /// Print progress events as they arrive
    #[arg(short, long)]
    pub follow: bool,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the effective configuration as TOML
    Show,
    /// Write the default configuration if no file exists yet
    Init,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_scan_parses_type_aliases() {
        let cli =
            Cli::try_parse_from(["reconflow", "scan", "t-1", "dns", "--follow"]).expect("parse");
        match cli.command {
            Command::Scan(args) => {
                assert_eq!(args.scan_type, ScanType::DnsDeep);
                assert!(args.follow);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_scan_rejects_unknown_type() {
        assert!(Cli::try_parse_from(["reconflow", "scan", "t-1", "nmap"]).is_err());
    }
}
