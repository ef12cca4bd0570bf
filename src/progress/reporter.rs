//! Progress reporter implementation
//!
//! Uses indicatif to show benchmark progress:
//! - Round count progress
//! - Current phase (load test, database workload, pause)

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

/// Progress reporter for benchmark runs
pub struct ProgressReporter {
    /// Multi-progress container
    multi: MultiProgress,
    /// Round count progress bar
    rounds_bar: ProgressBar,
    /// Current status message
    status: ProgressBar,
}

impl ProgressReporter {
    /// Create a new progress reporter
    pub fn new() -> Self {
        let multi = MultiProgress::new();

        let status = multi.add(ProgressBar::new_spinner());
        status.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .expect("Invalid template"),
        );
        status.enable_steady_tick(Duration::from_millis(120));

        let rounds_bar = multi.add(ProgressBar::new(0));
        rounds_bar.set_style(
            ProgressStyle::default_bar()
                .template("{prefix:.bold.dim} [{bar:40.cyan/blue}] {pos}/{len} rounds ({elapsed_precise})")
                .expect("Invalid template")
                .progress_chars("=> "),
        );
        rounds_bar.set_prefix("Benchmark");

        Self {
            multi,
            rounds_bar,
            status,
        }
    }

    /// Create a disabled progress reporter (for quiet mode)
    pub fn disabled() -> Self {
        let reporter = Self::new();
        reporter.status.disable_steady_tick();
        reporter.multi.set_draw_target(ProgressDrawTarget::hidden());
        reporter
    }

    /// Set total rounds
    pub fn set_total_rounds(&self, total: u64) {
        self.rounds_bar.set_length(total);
    }

    /// Mark one round complete
    pub fn finish_round(&self) {
        self.rounds_bar.inc(1);
    }

    /// Set current status message
    pub fn set_status(&self, msg: &str) {
        self.status.set_message(msg.to_string());
    }

    /// Show the pause between rounds
    pub fn set_pausing(&self, pause: Duration) {
        self.status
            .set_message(format!("Pausing {} before next round", humantime::format_duration(pause)));
    }

    /// Finish progress with success message
    pub fn finish_success(&self, message: &str) {
        self.status.finish_with_message(format!("✓ {}", message));
        self.rounds_bar.finish();
    }

    /// Finish progress with error message
    pub fn finish_error(&self, message: &str) {
        self.status.finish_with_message(format!("✗ {}", message));
        self.rounds_bar.abandon();
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}
