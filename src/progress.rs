//! Progress indicators for hivekeep CLI.

use colored::Colorize;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use reconcile::{Action, ApplyResult, ProgressCallback, ResourceIdentity, ResourceKind};

/// Create a progress bar with `len` steps
pub fn bar(len: u64, prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    let style = ProgressStyle::default_bar()
        .template("  {prefix:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-");
    pb.set_style(style);
    pb.set_prefix(prefix.to_string());
    pb
}

/// Drives one progress bar per kind while a plan is applied
pub struct ApplyProgress {
    current: Option<ProgressBar>,
    hidden: bool,
}

impl ApplyProgress {
    pub fn new(hidden: bool) -> Self {
        Self {
            current: None,
            hidden,
        }
    }
}

impl ProgressCallback for ApplyProgress {
    fn on_batch_start(&mut self, kind: ResourceKind, total: usize) {
        let pb = bar(total as u64, &format!("{kind}s"));
        if self.hidden {
            pb.set_draw_target(ProgressDrawTarget::hidden());
        }
        self.current = Some(pb);
    }

    fn on_entry_start(&mut self, identity: &ResourceIdentity, action: Action) {
        if let Some(pb) = &self.current {
            pb.set_message(format!("{action} {}", identity.name));
        }
    }

    fn on_entry_complete(&mut self, result: &ApplyResult) {
        let Some(pb) = &self.current else { return };
        let symbol = if result.succeeded {
            "✓".green()
        } else {
            "✗".red()
        };
        pb.set_message(format!("{symbol} {}", result.identity.name));
        pb.inc(1);
    }

    fn on_batch_complete(&mut self, _kind: ResourceKind) {
        if let Some(pb) = self.current.take() {
            pb.finish_and_clear();
        }
    }
}

impl Drop for ApplyProgress {
    fn drop(&mut self) {
        if let Some(pb) = self.current.take() {
            pb.abandon();
        }
    }
}
