use crate::core::progress_driver::ProgressSnapshot;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Console rendering of the loading phase
#[derive(Debug)]
pub struct LoadingBar {
    bar: ProgressBar,
}

impl LoadingBar {
    /// Bar on stderr, 0-100 percent
    pub fn new() -> Self {
        Self::with_target(ProgressDrawTarget::stderr())
    }

    /// Bar that draws nowhere (tests, non-interactive runs)
    pub fn hidden() -> Self {
        Self::with_target(ProgressDrawTarget::hidden())
    }

    fn with_target(target: ProgressDrawTarget) -> Self {
        let bar = ProgressBar::with_draw_target(Some(100), target);
        let style = ProgressStyle::default_bar()
            .template("[{bar:40.cyan/blue}] {pos:>3}% | {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");
        bar.set_style(style);
        bar.set_message(ProgressSnapshot::default().message);
        Self { bar }
    }

    /// Reflect the latest sample; position only moves forward.
    pub fn update(&self, snapshot: &ProgressSnapshot) {
        let percent = u64::from(snapshot.percent);
        if percent > self.bar.position() {
            self.bar.set_position(percent);
        }
        self.bar.set_message(snapshot.message);
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    /// Loading done: fill the bar and leave it on screen
    pub fn finish(&self, message: &'static str) {
        self.bar.set_position(100);
        self.bar.finish_with_message(message);
    }

    /// Loading failed: keep the bar where it stopped
    pub fn abandon(&self, message: &'static str) {
        self.bar.abandon_with_message(message);
    }

    /// Back to zero for a new loading cycle
    pub fn reset(&self) {
        self.bar.reset();
        self.bar.set_message(ProgressSnapshot::default().message);
    }
}

impl Default for LoadingBar {
    fn default() -> Self {
        Self::new()
    }
}
