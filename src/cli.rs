/// CLI argument parsing

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

// Build timestamp injected at compile time
pub const VERSION_WITH_BUILD: &str = concat!(env!("CARGO_PKG_VERSION"), " (built: ", env!("BUILD_TIMESTAMP"), ")");

#[derive(Parser, Debug)]
#[command(name = "redeploy")]
#[command(author, version = VERSION_WITH_BUILD, about, long_about = None)]
pub struct Cli {
    /// Path to a config file (default: ./redeploy.toml, then the user config dir)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Project directory containing docker-compose.yml and the git checkout
    #[arg(short = 'C', long, global = true)]
    pub project_root: Option<PathBuf>,

    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Back up, stop, pull, rebuild, restart and health-check (default)
    Deploy(DeployArgs),

    /// Show container status and liveness verdict
    Status,

    /// View aggregated logs
    Logs {
        /// Follow log output
        #[arg(short, long)]
        follow: bool,

        /// Number of lines to show
        #[arg(short = 'n', long, default_value = "100")]
        tail: usize,
    },

    /// Backup operations
    Backup {
        #[command(subcommand)]
        command: BackupCommands,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Args, Debug, Default, Clone)]
pub struct DeployArgs {
    /// Print the planned steps without running anything
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the Docker daemon and filesystem checks. The daemon check tries the
    /// default socket (DOCKER_HOST) first, then `docker version` for non-default contexts
    #[arg(long)]
    pub skip_preflight: bool,

    /// Remote to pull from
    #[arg(long)]
    pub remote: Option<String>,

    /// Branch to pull
    #[arg(short, long)]
    pub branch: Option<String>,

    /// Wait between start and health check, e.g. "10s" or "1m"
    #[arg(long, value_parser = parse_delay)]
    pub settle_delay: Option<String>,
}

fn parse_delay(value: &str) -> Result<String, String> {
    humantime::parse_duration(value)
        .map(|_| value.to_string())
        .map_err(|e| e.to_string())
}

#[derive(Subcommand, Debug)]
pub enum BackupCommands {
    /// Create a backup without deploying
    Create,

    /// List backups, newest first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete all but the newest backups
    Prune {
        /// Number of backups to keep
        #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
        keep: u64,

        /// Show what would be removed
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,

    /// Write a default redeploy.toml in the current directory
    Init,
}
