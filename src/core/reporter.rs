/// Console rendering of deploy progress

use colored::Colorize;

use crate::core::sequencer::{Step, StepOutcome};

/// Receives progress events from the deploy sequence
pub trait Reporter {
    fn step_started(&mut self, step: Step);
    fn outcome(&mut self, step: Step, outcome: &StepOutcome);
}

/// Prints status lines with glyphs to stdout
#[derive(Debug, Default)]
pub struct ConsoleReporter;

impl ConsoleReporter {
    pub fn new() -> Self {
        Self
    }
}

impl Reporter for ConsoleReporter {
    fn step_started(&mut self, step: Step) {
        println!();
        println!("{}", step.to_string().bold());
    }

    fn outcome(&mut self, _step: Step, outcome: &StepOutcome) {
        match outcome {
            StepOutcome::Success(msg) => println!("  {} {}", "✓".green(), msg),
            StepOutcome::Skipped(msg) => println!("  {} {}", "-".dimmed(), msg.dimmed()),
            StepOutcome::Warning(msg) => println!("  {} {}", "⚠".yellow(), msg.yellow()),
            StepOutcome::FailFast(msg) => println!("  {} {}", "✗".red(), msg.red()),
            StepOutcome::FatalWithDiagnostics { reason, logs } => {
                println!("  {} {}", "✗".red(), reason.red());
                println!();
                println!("{}", "Recent logs:".bold());
                println!("{}", logs);
            }
        }
    }
}
