use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::styling::{done, heading, highlight};
use crate::collector::CollectEvent;

/// Spinner-per-phase progress for an `update` run: listing runs, fetching
/// jobs batch by batch, then merging into the dataset.
pub struct PhaseProgress {
    pb: ProgressBar,
}

impl PhaseProgress {
    pub fn start() -> Self {
        eprintln!("{}  {}", heading("⚙️"), heading("Phases").underlined());
        let pb = create_spinner(highlight("Phase 1/3: Fetching workflow runs").to_string());
        Self { pb }
    }

    /// Advances the spinners as the collector reports progress.
    pub fn on_event(&mut self, event: CollectEvent) {
        match event {
            CollectEvent::RunsListed(count) => {
                self.pb.finish_with_message(
                    done(format!("Phase 1/3: Found {count} new workflow runs ✓"))
                        .to_string(),
                );
                self.pb = create_spinner(highlight("Phase 2/3: Fetching jobs").to_string());
            }
            CollectEvent::Batch { index, total } => {
                self.pb.set_message(
                    highlight(format!("Phase 2/3: Fetching jobs batch {index}/{total}"))
                        .to_string(),
                );
            }
            CollectEvent::JobsFetched(count) => {
                self.pb.finish_with_message(
                    done(format!("Phase 2/3: Fetched {count} jobs ✓"))
                        .to_string(),
                );
                self.pb = create_spinner(highlight("Phase 3/3: Merging dataset").to_string());
            }
        }
    }

    pub fn finish(self, new_count: usize, total: usize) {
        self.pb.finish_with_message(
            done(format!(
                "Phase 3/3: Added {new_count} observations, {total} in dataset ✓"
            ))
            .to_string(),
        );
        eprintln!();
    }

    pub fn abandon(self) {
        self.pb.finish_and_clear();
    }
}

fn create_spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("  {msg} {spinner}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}
