//! Turns a duration dataset into chart data and statistics.

pub mod layout;
pub mod releases;
pub mod report;
pub mod stats;
pub mod trend;

pub use report::ReportBuilder;
