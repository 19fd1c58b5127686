use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;

use redeploy_cli::cli::{BackupCommands, Cli, Commands, ConfigCommands, DeployArgs};
use redeploy_cli::core::health::{any_container_up, running_lines};
use redeploy_cli::core::{
    BackupManager, ComposeRuntime, ConfigOverrides, ConsoleReporter, ContainerRuntime,
    DeployConfig, DeploySequencer, GitCli, SequencerError,
};
use redeploy_cli::utils::logger::init_cli_logger;
use redeploy_cli::utils::{format_bytes, LOCAL_CONFIG_FILE};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_cli_logger(cli.verbose);

    let overrides = ConfigOverrides {
        project_root: cli.project_root.clone(),
        ..Default::default()
    };

    match cli.command {
        None => handle_deploy(cli.config, overrides, DeployArgs::default()).await?,
        Some(Commands::Deploy(args)) => handle_deploy(cli.config, overrides, args).await?,
        Some(Commands::Status) => {
            let config = load_config(cli.config, overrides)?;
            handle_status(&config).await?;
        }
        Some(Commands::Logs { follow, tail }) => {
            let config = load_config(cli.config, overrides)?;
            handle_logs(&config, follow, tail).await?;
        }
        Some(Commands::Backup { command }) => {
            let config = load_config(cli.config, overrides)?;
            handle_backup(config, command).await?;
        }
        Some(Commands::Config { command }) => handle_config(cli.config, overrides, command)?,
    }

    Ok(())
}

fn load_config(path: Option<PathBuf>, overrides: ConfigOverrides) -> Result<DeployConfig> {
    DeployConfig::load(path.as_deref())?
        .with_overrides(overrides)
        .context("Invalid configuration")
}

async fn handle_deploy(
    config_path: Option<PathBuf>,
    mut overrides: ConfigOverrides,
    args: DeployArgs,
) -> Result<()> {
    overrides.remote = args.remote;
    overrides.branch = args.branch;
    overrides.settle_delay = args.settle_delay;
    let config = load_config(config_path, overrides)?;

    let runtime = ComposeRuntime::new(&config.project_root);
    let git = GitCli::new(&config.project_root);
    let sequencer = DeploySequencer::new(config, runtime, git).with_preflight(!args.skip_preflight);

    if args.dry_run {
        println!("{}", "Deploy plan (dry run)".bold());
        for (step, description) in sequencer.plan() {
            println!("  {:<45} {}", step.to_string(), description.dimmed());
        }
        return Ok(());
    }

    println!("{}", "Starting backup and redeploy".bold());
    let mut reporter = ConsoleReporter::new();
    match sequencer.run(&mut reporter).await {
        Ok(report) => {
            let warnings = report.warnings();
            println!();
            if warnings.is_empty() {
                println!("{}", "✓ Deploy finished".green().bold());
            } else {
                println!(
                    "{}",
                    format!("⚠ Deploy finished with {} warning(s)", warnings.len())
                        .yellow()
                        .bold()
                );
            }
            Ok(())
        }
        Err(SequencerError::Unhealthy { reason, .. }) => {
            // logs were already printed by the reporter
            eprintln!("{} {}", "✗ Deploy failed:".red().bold(), reason);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("{} {}", "✗ Deploy aborted:".red().bold(), e);
            std::process::exit(1);
        }
    }
}

async fn handle_status(config: &DeployConfig) -> Result<()> {
    let runtime = ComposeRuntime::new(&config.project_root);
    let status = runtime.status().await?;

    println!("{}", status.trim_end());
    println!();
    if any_container_up(&status) {
        println!(
            "{} {} container(s) up",
            "✓".green(),
            running_lines(&status).len()
        );
    } else {
        println!("{} No running containers", "✗".red());
    }

    Ok(())
}

async fn handle_logs(config: &DeployConfig, follow: bool, tail: usize) -> Result<()> {
    let runtime = ComposeRuntime::new(&config.project_root);

    if follow {
        println!("Following logs... (Ctrl+C to stop)");
        runtime.follow_logs(tail).await?;
    } else {
        let logs = runtime.logs_tail(tail).await?;
        print!("{}", logs);
    }

    Ok(())
}

async fn handle_backup(config: DeployConfig, command: BackupCommands) -> Result<()> {
    let manager = BackupManager::new(config.backup_root_path());

    match command {
        BackupCommands::Create => {
            let runtime = ComposeRuntime::new(&config.project_root);
            let git = GitCli::new(&config.project_root);
            let sequencer = DeploySequencer::new(config, runtime, git);
            let mut reporter = ConsoleReporter::new();
            if let Err(e) = sequencer.snapshot_only(&mut reporter).await {
                eprintln!("{} {}", "✗ Backup failed:".red().bold(), e);
                std::process::exit(1);
            }
        }
        BackupCommands::List { json } => {
            let backups = manager.list_backups()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&backups)?);
            } else if backups.is_empty() {
                println!("No backups in {}", manager.backup_root().display());
            } else {
                println!("{:<28} {:<20} {:>12}", "Backup", "Created", "Size");
                println!("{}", "-".repeat(62));
                for backup in &backups {
                    println!(
                        "{:<28} {:<20} {:>12}",
                        backup.name,
                        backup.created.format("%Y-%m-%d %H:%M:%S"),
                        format_bytes(backup.size_bytes)
                    );
                }
            }
        }
        BackupCommands::Prune { keep, dry_run } => {
            let removed = manager.prune(keep as usize, dry_run)?;
            if removed.is_empty() {
                println!("Nothing to prune");
            }
            for path in &removed {
                if dry_run {
                    println!("would remove {}", path.display());
                } else {
                    println!("{} removed {}", "✓".green(), path.display());
                }
            }
        }
    }

    Ok(())
}

fn handle_config(
    path: Option<PathBuf>,
    overrides: ConfigOverrides,
    command: ConfigCommands,
) -> Result<()> {
    match command {
        ConfigCommands::Show => {
            let config = load_config(path, overrides)?;
            print!("{}", config.to_toml()?);
        }
        ConfigCommands::Init => {
            let target = path.unwrap_or_else(|| PathBuf::from(LOCAL_CONFIG_FILE));
            DeployConfig::write_default(&target)?;
            println!("{} Wrote {}", "✓".green(), target.display());
        }
    }

    Ok(())
}
