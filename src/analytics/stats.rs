use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use crate::dataset::Observation;
use crate::insights::{DurationStats, GroupStats, SummaryStats, VariantStats};

const TOP_VARIANTS: usize = 5;

pub(crate) fn cmp_f64(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

/// Summary statistics over the whole dataset.
pub fn summarize(observations: &[Observation]) -> SummaryStats {
    let durations: Vec<f64> = observations.iter().map(Observation::duration_minutes).collect();

    let dates: HashSet<_> = observations.iter().map(|o| o.started_at.date_naive()).collect();
    let runs: HashSet<&str> = observations.iter().map(|o| o.run_id.as_str()).collect();

    let (fastest_variants, slowest_variants) = variant_extremes(observations);

    SummaryStats {
        total_observations: observations.len(),
        distinct_runs: runs.len(),
        first_date: dates.iter().min().copied(),
        last_date: dates.iter().max().copied(),
        distinct_dates: dates.len(),
        duration: duration_stats(&durations),
        by_os: group_stats(observations, |v| v.os.clone()),
        by_python_version: group_stats(observations, |v| v.python_version.clone()),
        by_tool_version: group_stats(observations, |v| v.tool_version.clone()),
        fastest_variants,
        slowest_variants,
    }
}

#[allow(clippy::cast_precision_loss)]
fn duration_stats(values: &[f64]) -> DurationStats {
    if values.is_empty() {
        return DurationStats::default();
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;

    let std_dev = (values.len() > 1).then(|| {
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
        variance.sqrt()
    });

    DurationStats {
        mean,
        median: median(values),
        min: values.iter().copied().fold(f64::INFINITY, f64::min),
        max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        std_dev,
    }
}

/// Middle value, or the mean of the two middle values.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| cmp_f64(*a, *b));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len().max(1) as f64
}

/// Count, mean and median per key, ordered by key.
fn group_stats<F>(observations: &[Observation], key: F) -> Vec<GroupStats>
where
    F: Fn(&crate::dataset::Variant) -> String,
{
    let mut groups: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for obs in observations {
        groups
            .entry(key(&obs.variant()))
            .or_default()
            .push(obs.duration_minutes());
    }

    groups
        .into_iter()
        .map(|(key, durations)| GroupStats {
            key,
            count: durations.len(),
            mean: mean(&durations),
            median: median(&durations),
        })
        .collect()
}

fn variant_extremes(observations: &[Observation]) -> (Vec<VariantStats>, Vec<VariantStats>) {
    let mut groups: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for obs in observations {
        groups
            .entry(obs.variant().label)
            .or_default()
            .push(obs.duration_minutes());
    }

    let mut variants: Vec<VariantStats> = groups
        .into_iter()
        .map(|(variant, durations)| VariantStats {
            variant,
            count: durations.len(),
            mean: mean(&durations),
        })
        .collect();
    variants.sort_by(|a, b| cmp_f64(a.mean, b.mean));

    let fastest = variants.iter().take(TOP_VARIANTS).cloned().collect();
    let slowest = variants[variants.len().saturating_sub(TOP_VARIANTS)..].to_vec();

    (fastest, slowest)
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn create_observation(run_id: &str, job: &str, day: u32, minutes: i64) -> Observation {
        let started = Utc.with_ymd_and_hms(2024, 1, day, 8, 0, 0).unwrap();
        Observation::new(run_id, job, "install", started, started + Duration::minutes(minutes))
            .unwrap()
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&[]), 0.0);
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
    }

    #[test]
    fn test_summarize() {
        let observations = vec![
            create_observation("1", "t (ubuntu, 3.10, 1.0)", 1, 4),
            create_observation("1", "t (debian, 3.8, 1.0)", 1, 8),
            create_observation("2", "t (ubuntu, 3.10, 1.0)", 3, 6),
        ];

        let stats = summarize(&observations);

        assert_eq!(stats.total_observations, 3);
        assert_eq!(stats.distinct_runs, 2);
        assert_eq!(stats.distinct_dates, 2);
        assert_eq!(stats.first_date.unwrap().to_string(), "2024-01-01");
        assert_eq!(stats.last_date.unwrap().to_string(), "2024-01-03");
        assert_eq!(stats.duration.mean, 6.0);
        assert_eq!(stats.duration.median, 6.0);
        assert_eq!(stats.duration.min, 4.0);
        assert_eq!(stats.duration.max, 8.0);
        assert_eq!(stats.duration.std_dev, Some(2.0));

        let os_keys: Vec<&str> = stats.by_os.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(os_keys, vec!["debian", "ubuntu"]);
        assert_eq!(stats.by_os[1].count, 2);
        assert_eq!(stats.by_os[1].mean, 5.0);

        assert_eq!(stats.fastest_variants[0].variant, "ubuntu, 3.10, 1.0");
        assert_eq!(stats.slowest_variants.last().unwrap().variant, "debian, 3.8, 1.0");
    }

    #[test]
    fn test_summarize_empty() {
        let stats = summarize(&[]);
        assert_eq!(stats.total_observations, 0);
        assert!(stats.first_date.is_none());
        assert_eq!(stats.duration, DurationStats::default());
        assert!(stats.fastest_variants.is_empty());
    }

    #[test]
    fn test_single_observation_has_no_std_dev() {
        let stats = summarize(&[create_observation("1", "t (a, b, c)", 1, 5)]);
        assert!(stats.duration.std_dev.is_none());
    }
}
