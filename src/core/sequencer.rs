/// Backup-then-redeploy sequence
///
/// Runs the deploy steps strictly in order. Each step yields one or more
/// [`StepOutcome`]s; the first `FailFast` or `FatalWithDiagnostics` stops
/// the run and nothing after it executes. Warnings never stop the run.

use chrono::Local;
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::core::backup::{BackupManager, ItemStatus};
use crate::core::config::DeployConfig;
use crate::core::docker::ContainerRuntime;
use crate::core::health::{any_container_up, database_present, running_lines};
use crate::core::reporter::Reporter;
use crate::core::vcs::SourceControl;
use crate::utils::{format_bytes, is_dir_writable, tail_lines, LOG_FOLLOW_COMMAND};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Preflight,
    Snapshot,
    StopServices,
    UpdateSource,
    RebuildAndStart,
    Settle,
    Liveness,
    DataIntegrity,
    Summary,
}

impl Step {
    /// The deploy sequence proper, in execution order
    pub const SEQUENCE: [Step; 8] = [
        Step::Snapshot,
        Step::StopServices,
        Step::UpdateSource,
        Step::RebuildAndStart,
        Step::Settle,
        Step::Liveness,
        Step::DataIntegrity,
        Step::Summary,
    ];

    /// 1-based position in [`Step::SEQUENCE`]; 0 for preflight
    pub fn number(&self) -> usize {
        Self::SEQUENCE
            .iter()
            .position(|s| s == self)
            .map(|i| i + 1)
            .unwrap_or(0)
    }

    pub fn title(&self) -> &'static str {
        match self {
            Step::Preflight => "Preflight checks",
            Step::Snapshot => "Creating backup",
            Step::StopServices => "Stopping services",
            Step::UpdateSource => "Updating source",
            Step::RebuildAndStart => "Rebuilding and starting containers",
            Step::Settle => "Waiting for services to start",
            Step::Liveness => "Checking service status",
            Step::DataIntegrity => "Checking data integrity",
            Step::Summary => "Deploy complete",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Preflight => write!(f, "[pre] {}", self.title()),
            _ => write!(f, "[{}/{}] {}", self.number(), Self::SEQUENCE.len(), self.title()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Success(String),
    Skipped(String),
    Warning(String),
    FailFast(String),
    FatalWithDiagnostics { reason: String, logs: String },
}

impl StepOutcome {
    /// The error that ends the run, for `FailFast` and `FatalWithDiagnostics`
    pub fn into_error(self, step: Step) -> Option<SequencerError> {
        match self {
            StepOutcome::FailFast(diagnostic) => Some(SequencerError::StepFailed { step, diagnostic }),
            StepOutcome::FatalWithDiagnostics { reason, logs } => {
                Some(SequencerError::Unhealthy { reason, logs })
            }
            _ => None,
        }
    }
}

/// Everything that happened during a run
#[derive(Debug, Clone, Default)]
pub struct DeployReport {
    pub backup_dir: Option<PathBuf>,
    pub entries: Vec<(Step, StepOutcome)>,
    pub pruned: Vec<PathBuf>,
}

impl DeployReport {
    pub fn warnings(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter_map(|(_, outcome)| match outcome {
                StepOutcome::Warning(msg) => Some(msg.as_str()),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Error)]
pub enum SequencerError {
    #[error("{step} failed: {diagnostic}")]
    StepFailed { step: Step, diagnostic: String },

    #[error("{reason}")]
    Unhealthy { reason: String, logs: String },
}

impl SequencerError {
    pub fn step(&self) -> Step {
        match self {
            SequencerError::StepFailed { step, .. } => *step,
            SequencerError::Unhealthy { .. } => Step::Liveness,
        }
    }
}

pub struct DeploySequencer<R, S> {
    config: DeployConfig,
    runtime: R,
    vcs: S,
    preflight: bool,
}

impl<R: ContainerRuntime, S: SourceControl> DeploySequencer<R, S> {
    pub fn new(config: DeployConfig, runtime: R, vcs: S) -> Self {
        Self {
            config,
            runtime,
            vcs,
            preflight: true,
        }
    }

    /// Enable or disable the daemon/filesystem checks run before the snapshot
    pub fn with_preflight(mut self, enabled: bool) -> Self {
        self.preflight = enabled;
        self
    }

    /// Human-readable description of what a run would do, without doing it
    pub fn plan(&self) -> Vec<(Step, String)> {
        let c = &self.config;
        let mut plan = Vec::new();
        if self.preflight {
            plan.push((
                Step::Preflight,
                format!("ping Docker daemon, check {} is writable", c.project_root.display()),
            ));
        }
        plan.extend([
            (
                Step::Snapshot,
                format!(
                    "copy {}, {}, {} into {}/backup_<timestamp>",
                    c.data_dir.display(),
                    c.logs_dir.display(),
                    c.config_file.display(),
                    c.backup_root_path().display()
                ),
            ),
            (Step::StopServices, "docker compose down".to_string()),
            (Step::UpdateSource, format!("git pull {} {}", c.remote, c.branch)),
            (
                Step::RebuildAndStart,
                "docker compose build --no-cache && docker compose up -d".to_string(),
            ),
            (Step::Settle, format!("wait {}", c.settle_delay)),
            (
                Step::Liveness,
                format!("docker compose ps, on failure show last {} log lines", c.log_tail_lines),
            ),
            (Step::DataIntegrity, format!("check {} exists", c.database_file_path().display())),
            (Step::Summary, "print backup location and log command".to_string()),
        ]);
        plan
    }

    /// Run the full sequence
    pub async fn run(&self, reporter: &mut dyn Reporter) -> Result<DeployReport, SequencerError> {
        let mut report = DeployReport::default();

        let steps = if self.preflight {
            std::iter::once(Step::Preflight).chain(Step::SEQUENCE).collect::<Vec<_>>()
        } else {
            Step::SEQUENCE.to_vec()
        };

        for step in steps {
            reporter.step_started(step);
            debug!(%step, "Starting step");

            let outcomes = self.run_step(step, &mut report).await;
            for outcome in outcomes {
                reporter.outcome(step, &outcome);
                report.entries.push((step, outcome.clone()));

                if let Some(err) = outcome.into_error(step) {
                    warn!(%step, error = %err, "Stopping deploy");
                    return Err(err);
                }
            }
        }

        info!(backup = ?report.backup_dir, "Deploy finished");
        Ok(report)
    }

    /// Run only the snapshot step
    pub async fn snapshot_only(
        &self,
        reporter: &mut dyn Reporter,
    ) -> Result<DeployReport, SequencerError> {
        let mut report = DeployReport::default();
        reporter.step_started(Step::Snapshot);
        for outcome in self.snapshot(&mut report) {
            reporter.outcome(Step::Snapshot, &outcome);
            report.entries.push((Step::Snapshot, outcome.clone()));
            if let Some(err) = outcome.into_error(Step::Snapshot) {
                return Err(err);
            }
        }
        Ok(report)
    }

    async fn run_step(&self, step: Step, report: &mut DeployReport) -> Vec<StepOutcome> {
        match step {
            Step::Preflight => self.preflight_checks().await,
            Step::Snapshot => self.snapshot(report),
            Step::StopServices => vec![self.stop_services().await],
            Step::UpdateSource => vec![self.update_source().await],
            Step::RebuildAndStart => self.rebuild_and_start().await,
            Step::Settle => vec![self.settle().await],
            Step::Liveness => vec![self.liveness().await],
            Step::DataIntegrity => vec![self.data_integrity()],
            Step::Summary => self.summary(report),
        }
    }

    async fn preflight_checks(&self) -> Vec<StepOutcome> {
        if let Err(e) = self.runtime.ping().await {
            return vec![StepOutcome::FailFast(format!("{:#}", e))];
        }
        let root = &self.config.project_root;
        if !is_dir_writable(root) {
            return vec![
                StepOutcome::Success("Docker daemon reachable".to_string()),
                StepOutcome::FailFast(format!("{} is not a writable directory", root.display())),
            ];
        }
        vec![
            StepOutcome::Success("Docker daemon reachable".to_string()),
            StepOutcome::Success(format!("{} is writable", root.display())),
        ]
    }

    fn snapshot(&self, report: &mut DeployReport) -> Vec<StepOutcome> {
        let manager = BackupManager::new(self.config.backup_root_path());
        let sources = vec![
            self.config.data_dir_path(),
            self.config.logs_dir_path(),
            self.config.config_file_path(),
        ];

        let snapshot = match manager.create_snapshot(&sources, Local::now()) {
            Ok(snapshot) => snapshot,
            Err(e) => return vec![StepOutcome::FailFast(e.to_string())],
        };
        report.backup_dir = Some(snapshot.dir.clone());

        let mut outcomes = vec![StepOutcome::Success(format!(
            "Backup directory: {}",
            snapshot.dir.display()
        ))];
        for item in &snapshot.items {
            outcomes.push(match item.status {
                ItemStatus::Copied { bytes } => StepOutcome::Success(format!(
                    "Backed up {} ({})",
                    item.source.display(),
                    format_bytes(bytes)
                )),
                ItemStatus::Skipped => {
                    StepOutcome::Skipped(format!("skipped: {} not found", item.source.display()))
                }
            });
        }
        outcomes
    }

    async fn stop_services(&self) -> StepOutcome {
        match self.runtime.down().await {
            Ok(()) => StepOutcome::Success("Services stopped".to_string()),
            Err(e) => StepOutcome::FailFast(format!("{:#}", e)),
        }
    }

    async fn update_source(&self) -> StepOutcome {
        let (remote, branch) = (&self.config.remote, &self.config.branch);
        match self.vcs.pull(remote, branch).await {
            Ok(()) => StepOutcome::Success(format!("Pulled {}/{}", remote, branch)),
            Err(e) => StepOutcome::FailFast(format!("{:#}", e)),
        }
    }

    async fn rebuild_and_start(&self) -> Vec<StepOutcome> {
        if let Err(e) = self.runtime.build_no_cache().await {
            return vec![StepOutcome::FailFast(format!("{:#}", e))];
        }
        let built = StepOutcome::Success("Images rebuilt without cache".to_string());
        match self.runtime.up_detached().await {
            Ok(()) => vec![built, StepOutcome::Success("Containers started".to_string())],
            Err(e) => vec![built, StepOutcome::FailFast(format!("{:#}", e))],
        }
    }

    async fn settle(&self) -> StepOutcome {
        let delay = self.config.settle_duration();
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("  {spinner} {msg}") {
            spinner.set_style(style);
        }
        spinner.enable_steady_tick(Duration::from_millis(120));

        let deadline = Instant::now() + delay;
        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let remaining = deadline - now;
            spinner.set_message(format!("{}s remaining", remaining.as_secs_f64().ceil() as u64));
            tokio::time::sleep(remaining.min(Duration::from_secs(1))).await;
        }
        spinner.finish_and_clear();

        StepOutcome::Success(format!("Waited {}", humantime::format_duration(delay)))
    }

    async fn liveness(&self) -> StepOutcome {
        let reason = match self.runtime.status().await {
            Ok(status) if any_container_up(&status) => {
                let running = running_lines(&status).len();
                return StepOutcome::Success(format!("{} container(s) up", running));
            }
            Ok(_) => "No running containers after deploy".to_string(),
            Err(e) => format!("Status query failed: {:#}", e),
        };

        let logs = match self.runtime.logs_tail(self.config.log_tail_lines).await {
            // compose applies --tail per service; cap the aggregate as well
            Ok(logs) => tail_lines(&logs, self.config.log_tail_lines),
            Err(e) => format!("<unable to fetch logs: {:#}>", e),
        };
        StepOutcome::FatalWithDiagnostics { reason, logs }
    }

    fn data_integrity(&self) -> StepOutcome {
        let db = self.config.database_file_path();
        if database_present(&db) {
            StepOutcome::Success(format!("Database present: {}", db.display()))
        } else {
            StepOutcome::Warning(format!("Database file not found: {}", db.display()))
        }
    }

    fn summary(&self, report: &mut DeployReport) -> Vec<StepOutcome> {
        let mut outcomes = Vec::new();
        if let Some(dir) = &report.backup_dir {
            outcomes.push(StepOutcome::Success(format!("Backup location: {}", dir.display())));
        }
        outcomes.push(StepOutcome::Success(format!(
            "Follow logs with: {}",
            LOG_FOLLOW_COMMAND
        )));

        if let Some(keep) = self.config.retention.keep {
            let manager = BackupManager::new(self.config.backup_root_path());
            match manager.prune(keep, false) {
                Ok(removed) if removed.is_empty() => {}
                Ok(removed) => {
                    outcomes.push(StepOutcome::Success(format!(
                        "Removed {} old backup(s), keeping {}",
                        removed.len(),
                        keep
                    )));
                    report.pruned = removed;
                }
                Err(e) => outcomes.push(StepOutcome::Warning(format!("Backup pruning failed: {}", e))),
            }
        }
        outcomes
    }
}
