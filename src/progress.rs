//! Progress indicators for reconcile runs.

use envkit::{Error, PlannedStep, ProgressCallback, StepResult};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::ui;

/// Create a spinner with the standard pulse8 style
pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Finish a spinner with a success mark
pub fn finish_success(pb: &ProgressBar, msg: &str) {
    pb.finish_and_clear();
    ui::success(msg);
}

/// Finish a spinner with an error mark
pub fn finish_error(pb: &ProgressBar, msg: &str) {
    pb.finish_and_clear();
    ui::error(msg);
}

/// Spinner per reconcile step
///
/// With `quiet` set nothing is drawn; failures still surface through the
/// returned error.
pub struct StepProgress {
    current: Option<ProgressBar>,
    quiet: bool,
}

impl StepProgress {
    pub fn new(quiet: bool) -> Self {
        Self {
            current: None,
            quiet,
        }
    }
}

fn outcome(step: &PlannedStep, result: &StepResult) -> String {
    match result {
        StepResult::Installed => format!("Installed {}", step.target()),
        StepResult::Uninstalled => format!("Uninstalled {}", step.target()),
        StepResult::AlreadyPresent => format!("{} already present", step.target()),
        StepResult::Ensured => format!("Ensured {}", step.target()),
        StepResult::Skipped { reason } => format!("Skipped {} ({reason})", step.target()),
    }
}

impl ProgressCallback for StepProgress {
    fn on_step_start(&mut self, index: usize, total: usize, step: &PlannedStep) {
        if self.quiet {
            return;
        }
        self.current = Some(spinner(&format!("[{index}/{total}] {}", step.describe())));
    }

    fn on_step_complete(&mut self, step: &PlannedStep, result: &StepResult) {
        if let Some(pb) = self.current.take() {
            finish_success(&pb, &outcome(step, result));
        }
    }

    fn on_step_failed(&mut self, step: &PlannedStep, _error: &Error) {
        if let Some(pb) = self.current.take() {
            finish_error(&pb, &format!("Failed to {}", step.describe()));
        }
    }
}
