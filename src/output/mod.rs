mod exports;
mod progress;
mod styling;
mod summary;
mod tables;

pub use exports::export_report;
pub use progress::PhaseProgress;
use styling::{label, title};
pub use summary::print_summary;

/// Prints the stepwatch banner to stderr.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        title("⏱ stepwatch"),
        label(env!("CARGO_PKG_VERSION")),
        label("CI Step Duration Tracker")
    );
}
