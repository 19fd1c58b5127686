pub mod backup;
pub mod command;
pub mod config;
pub mod docker;
pub mod health;
pub mod reporter;
pub mod sequencer;
pub mod vcs;

pub use backup::BackupManager;
pub use config::{ConfigOverrides, DeployConfig};
pub use docker::{ComposeRuntime, ContainerRuntime};
pub use reporter::{ConsoleReporter, Reporter};
pub use sequencer::{DeployReport, DeploySequencer, SequencerError, Step, StepOutcome};
pub use vcs::{GitCli, SourceControl};
