use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::analytics::layout::{PlacedMarker, Ticks};
use crate::dataset::Variant;

/// Everything a rendering consumer needs to draw the duration charts, plus
/// the summary statistics.
#[derive(Debug, Serialize, Deserialize)]
pub struct DurationReport {
    pub repo: String,
    pub step_name: String,
    pub generated_at: DateTime<Utc>,
    pub summary: SummaryStats,
    /// All observations on one chart
    pub combined: Chart,
    /// One chart per variant, grouped by OS
    pub variants: Vec<VariantChart>,
    /// Run averages split by python version, tool version and OS
    pub averages: Vec<CategoryChart>,
}

/// One run on the horizontal axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunAxisEntry {
    pub index: usize,
    pub run_id: String,
    /// First start time among the run's observations
    pub started_at: DateTime<Utc>,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// One observation, placed at its run index plus a small offset so the
/// variants of a run do not sit on top of each other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScatterPoint {
    pub x: f64,
    /// Duration in minutes
    pub y: f64,
    pub variant: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chart {
    pub title: String,
    pub runs: Vec<RunAxisEntry>,
    pub scatter: Vec<ScatterPoint>,
    pub run_average: Vec<Point>,
    pub trend: Vec<Point>,
    pub ticks: Ticks,
    pub releases: Vec<PlacedMarker>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantChart {
    pub os: String,
    pub variant: Variant,
    pub chart: Chart,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Series {
    pub label: String,
    pub points: Vec<Point>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryChart {
    pub title: String,
    pub runs: Vec<RunAxisEntry>,
    /// Run average over every observation
    pub all_runs: Vec<Point>,
    pub series: Vec<Series>,
    pub ticks: Ticks,
    pub releases: Vec<PlacedMarker>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SummaryStats {
    pub total_observations: usize,
    pub distinct_runs: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub distinct_dates: usize,
    pub duration: DurationStats,
    pub by_os: Vec<GroupStats>,
    pub by_python_version: Vec<GroupStats>,
    pub by_tool_version: Vec<GroupStats>,
    /// Up to five variants with the lowest mean duration, fastest first
    pub fastest_variants: Vec<VariantStats>,
    /// Up to five variants with the highest mean duration, slowest last
    pub slowest_variants: Vec<VariantStats>,
}

/// Duration statistics in minutes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DurationStats {
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    /// Sample standard deviation; absent below two observations
    pub std_dev: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupStats {
    pub key: String,
    pub count: usize,
    pub mean: f64,
    pub median: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantStats {
    pub variant: String,
    pub count: usize,
    pub mean: f64,
}
