use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;
use log::debug;

use super::layout::{place_release_labels, tick_positions, PlacedMarker};
use super::releases::correlate;
use super::stats::{cmp_f64, summarize};
use super::trend::{aggregate, fit_trend, spread_offsets};
use crate::config::ReportConfig;
use crate::dataset::{Observation, Variant};
use crate::insights::{
    CategoryChart, Chart, DurationReport, Point, RunAxisEntry, ScatterPoint, Series, VariantChart,
};
use crate::providers::github::types::{links, Release};

/// Half of the horizontal band the observations of one run are spread over.
const SCATTER_HALF_WIDTH: f64 = 0.3;

/// Distinct runs ordered by their first start time.
#[derive(Debug, Clone)]
pub struct RunAxis {
    entries: Vec<RunAxisEntry>,
    index_of: HashMap<String, usize>,
}

impl RunAxis {
    pub fn build(observations: &[Observation], repo: &str) -> Self {
        let mut first_start: IndexMap<&str, DateTime<Utc>> = IndexMap::new();
        for obs in observations {
            first_start
                .entry(obs.run_id.as_str())
                .and_modify(|at| *at = (*at).min(obs.started_at))
                .or_insert(obs.started_at);
        }

        let mut runs: Vec<(&str, DateTime<Utc>)> = first_start.into_iter().collect();
        runs.sort_by_key(|(_, at)| *at);

        let entries: Vec<RunAxisEntry> = runs
            .into_iter()
            .enumerate()
            .map(|(index, (run_id, started_at))| RunAxisEntry {
                index,
                run_id: run_id.to_string(),
                started_at,
                url: links::workflow_run_url(repo, run_id),
            })
            .collect();

        let index_of = entries
            .iter()
            .map(|entry| (entry.run_id.clone(), entry.index))
            .collect();

        Self { entries, index_of }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn index(&self, run_id: &str) -> Option<usize> {
        self.index_of.get(run_id).copied()
    }

    pub fn run_ids(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.run_id.clone()).collect()
    }

    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.entries.iter().map(|e| e.started_at).collect()
    }
}

/// One point per observation. The observations of a run are spread evenly
/// around its index, in input order.
#[allow(clippy::cast_precision_loss)]
pub fn scatter_points(observations: &[Observation], axis: &RunAxis) -> Vec<ScatterPoint> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for obs in observations {
        *counts.entry(obs.run_id.as_str()).or_default() += 1;
    }

    let offsets: HashMap<&str, Vec<f64>> = counts
        .into_iter()
        .map(|(run_id, count)| (run_id, spread_offsets(count, SCATTER_HALF_WIDTH)))
        .collect();

    let mut seen: HashMap<&str, usize> = HashMap::new();
    observations
        .iter()
        .filter_map(|obs| {
            let index = axis.index(&obs.run_id)?;
            let position = seen.entry(obs.run_id.as_str()).or_default();
            let offset = offsets
                .get(obs.run_id.as_str())
                .and_then(|o| o.get(*position))
                .copied()
                .unwrap_or_default();
            *position += 1;

            Some(ScatterPoint {
                x: index as f64 + offset,
                y: obs.duration_minutes(),
                variant: obs.variant().label,
            })
        })
        .collect()
}

/// Mean duration per run placed on `axis`, ordered by run index. Runs not on
/// the axis are dropped.
#[allow(clippy::cast_precision_loss)]
pub fn run_average_points(observations: &[Observation], axis: &RunAxis) -> Vec<Point> {
    let mut points: Vec<Point> = aggregate(observations)
        .into_iter()
        .filter_map(|(run_id, mean)| {
            axis.index(&run_id).map(|index| Point {
                x: index as f64,
                y: mean,
            })
        })
        .collect();

    points.sort_by(|a, b| cmp_f64(a.x, b.x));
    points
}

pub fn trend_points(points: &[Point]) -> Vec<Point> {
    let xs: Vec<f64> = points.iter().map(|p| p.x).collect();
    let ys: Vec<f64> = points.iter().map(|p| p.y).collect();

    let (trend_xs, trend_ys) = fit_trend(&xs, &ys);
    trend_xs
        .into_iter()
        .zip(trend_ys)
        .map(|(x, y)| Point { x, y })
        .collect()
}

/// Turns a dataset into a [`DurationReport`].
pub struct ReportBuilder<'a> {
    repo: &'a str,
    step_name: &'a str,
    releases: &'a [Release],
    config: &'a ReportConfig,
}

impl<'a> ReportBuilder<'a> {
    pub fn new(
        repo: &'a str,
        step_name: &'a str,
        releases: &'a [Release],
        config: &'a ReportConfig,
    ) -> Self {
        Self {
            repo,
            step_name,
            releases,
            config,
        }
    }

    pub fn build(&self, observations: &[Observation]) -> DurationReport {
        debug!(
            "Building report over {} observations and {} releases",
            observations.len(),
            self.releases.len()
        );

        let combined = self.chart(
            format!("{} duration", self.step_name),
            observations,
            self.config.max_ticks,
        );

        DurationReport {
            repo: self.repo.to_string(),
            step_name: self.step_name.to_string(),
            generated_at: Utc::now(),
            summary: summarize(observations),
            combined,
            variants: self.variant_charts(observations),
            averages: self.category_charts(observations),
        }
    }

    fn chart(&self, title: String, observations: &[Observation], max_ticks: usize) -> Chart {
        let axis = RunAxis::build(observations, self.repo);
        let run_average = run_average_points(observations, &axis);

        Chart {
            title,
            scatter: scatter_points(observations, &axis),
            trend: trend_points(&run_average),
            run_average,
            ticks: tick_positions(&axis.run_ids(), max_ticks),
            releases: self.release_markers(&axis),
            runs: axis.entries,
        }
    }

    /// One chart per variant, grouped by OS in name order; within an OS the
    /// variants keep their first-appearance order.
    fn variant_charts(&self, observations: &[Observation]) -> Vec<VariantChart> {
        let mut by_os: BTreeMap<String, IndexMap<Variant, Vec<Observation>>> = BTreeMap::new();
        for obs in observations {
            let variant = obs.variant();
            by_os
                .entry(variant.os.clone())
                .or_default()
                .entry(variant)
                .or_default()
                .push(obs.clone());
        }

        by_os
            .into_iter()
            .flat_map(|(os, variants)| {
                variants.into_iter().map(move |(variant, group)| {
                    let title = format!(
                        "{}: Python {}, Tool {}",
                        variant.os, variant.python_version, variant.tool_version
                    );
                    VariantChart {
                        os: os.clone(),
                        chart: self.chart(title, &group, self.config.variant_max_ticks),
                        variant,
                    }
                })
            })
            .collect()
    }

    fn category_charts(&self, observations: &[Observation]) -> Vec<CategoryChart> {
        vec![
            self.category_chart("Average duration by Python version", observations, |v| {
                (v.python_version.clone(), format!("Python {}", v.python_version))
            }),
            self.category_chart("Average duration by tool version", observations, |v| {
                (v.tool_version.clone(), format!("Tool {}", v.tool_version))
            }),
            self.category_chart("Average duration by OS", observations, |v| {
                (v.os.clone(), v.os.clone())
            }),
        ]
    }

    /// Run averages per category value on the axis of the whole dataset.
    /// `category` maps a variant to its sort key and series label.
    fn category_chart<F>(&self, title: &str, observations: &[Observation], category: F) -> CategoryChart
    where
        F: Fn(&Variant) -> (String, String),
    {
        let axis = RunAxis::build(observations, self.repo);

        let mut groups: BTreeMap<String, (String, Vec<Observation>)> = BTreeMap::new();
        for obs in observations {
            let (key, label) = category(&obs.variant());
            groups
                .entry(key)
                .or_insert_with(|| (label, Vec::new()))
                .1
                .push(obs.clone());
        }

        let series = groups
            .into_values()
            .map(|(label, group)| Series {
                label,
                points: run_average_points(&group, &axis),
            })
            .collect();

        CategoryChart {
            title: title.to_string(),
            all_runs: run_average_points(observations, &axis),
            series,
            ticks: tick_positions(&axis.run_ids(), self.config.max_ticks),
            releases: self.release_markers(&axis),
            runs: axis.entries,
        }
    }

    fn release_markers(&self, axis: &RunAxis) -> Vec<PlacedMarker> {
        if axis.is_empty() {
            return Vec::new();
        }

        let markers = correlate(
            self.releases,
            &axis.timestamps(),
            Duration::days(self.config.release_tolerance_days),
        );
        place_release_labels(&markers, axis.len())
    }
}
