use chrono::{DateTime, Duration, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::providers::github::types::Release;

/// Default distance allowed between a release and its matched run.
pub const DEFAULT_TOLERANCE_DAYS: i64 = 30;

/// A release pinned to the run closest to its publication time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseMarker {
    pub tag: String,
    pub name: String,
    pub published_at: DateTime<Utc>,
    /// Position of the matched run on the run axis
    pub run_index: usize,
    /// Timestamp of the matched run
    pub run_started_at: DateTime<Utc>,
    /// Absolute distance between publication and the matched run
    pub delta_seconds: i64,
}

/// Matches each release to the run nearest in time.
///
/// `run_timestamps[i]` is the timestamp of run index `i`. Releases published
/// before the earliest run are skipped, as are releases whose nearest run is
/// farther away than `tolerance`. When two runs are equally close the lower
/// run index wins. The result is ordered by run index; releases matched to
/// the same run keep their input order.
pub fn correlate(
    releases: &[Release],
    run_timestamps: &[DateTime<Utc>],
    tolerance: Duration,
) -> Vec<ReleaseMarker> {
    let Some(first_run) = run_timestamps.iter().min().copied() else {
        return Vec::new();
    };

    let mut markers: Vec<ReleaseMarker> = releases
        .iter()
        .filter(|release| release.published_at >= first_run)
        .filter_map(|release| {
            let (run_index, delta) = nearest_run(release.published_at, run_timestamps)?;

            if delta > tolerance {
                debug!(
                    "Release {} is {} days from the nearest run, not shown",
                    release.tag_name,
                    delta.num_days()
                );
                return None;
            }

            Some(ReleaseMarker {
                tag: release.tag_name.clone(),
                name: release.display_name().to_string(),
                published_at: release.published_at,
                run_index,
                run_started_at: run_timestamps[run_index],
                delta_seconds: delta.num_seconds(),
            })
        })
        .collect();

    markers.sort_by_key(|marker| marker.run_index);
    markers
}

/// Index of the run closest to `at` and its distance. Ties keep the first
/// index.
fn nearest_run(at: DateTime<Utc>, run_timestamps: &[DateTime<Utc>]) -> Option<(usize, Duration)> {
    run_timestamps
        .iter()
        .enumerate()
        .map(|(index, &run_at)| {
            let delta = if at >= run_at { at - run_at } else { run_at - at };
            (index, delta)
        })
        .fold(None, |best, (index, delta)| match best {
            Some((_, best_delta)) if best_delta <= delta => best,
            _ => Some((index, delta)),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn correlate_default(releases: &[Release], runs: &[DateTime<Utc>]) -> Vec<ReleaseMarker> {
        correlate(releases, runs, Duration::days(DEFAULT_TOLERANCE_DAYS))
    }

    fn create_release(tag: &str, published_at: &str) -> Release {
        Release {
            tag_name: tag.to_string(),
            name: Some(format!("Release {tag}")),
            published_at: ts(published_at),
        }
    }

    #[test]
    fn test_release_matches_nearest_run() {
        let runs = vec![ts("2024-01-01T00:00:00Z"), ts("2024-01-10T00:00:00Z")];
        let releases = vec![create_release("v1.0", "2024-01-02T00:00:00Z")];

        let markers = correlate_default(&releases, &runs);

        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].run_index, 0);
        assert_eq!(markers[0].delta_seconds, 86_400);
        assert_eq!(markers[0].name, "Release v1.0");
    }

    #[test]
    fn test_release_before_first_run_is_excluded() {
        let runs = vec![ts("2024-01-10T00:00:00Z"), ts("2024-01-20T00:00:00Z")];
        // one hour before the first run: closest by far, still not shown
        let releases = vec![create_release("v0.9", "2024-01-09T23:00:00Z")];

        assert!(correlate_default(&releases, &runs).is_empty());
    }

    #[test]
    fn test_tolerance_is_enforced() {
        let runs = vec![ts("2024-01-01T00:00:00Z")];
        let releases = vec![
            create_release("near", "2024-01-30T00:00:00Z"),
            create_release("far", "2024-02-01T00:00:00Z"),
        ];

        let markers = correlate_default(&releases, &runs);

        let tags: Vec<&str> = markers.iter().map(|m| m.tag.as_str()).collect();
        assert_eq!(tags, vec!["near"]);
    }

    #[test]
    fn test_exactly_thirty_days_is_included() {
        let runs = vec![ts("2024-01-01T00:00:00Z")];
        let releases = vec![create_release("edge", "2024-01-31T00:00:00Z")];

        assert_eq!(correlate_default(&releases, &runs).len(), 1);
    }

    #[test]
    fn test_tie_goes_to_first_run_index() {
        let runs = vec![ts("2024-01-01T00:00:00Z"), ts("2024-01-03T00:00:00Z")];
        let releases = vec![create_release("mid", "2024-01-02T00:00:00Z")];

        let markers = correlate_default(&releases, &runs);
        assert_eq!(markers[0].run_index, 0);
    }

    #[test]
    fn test_offsets_are_compared_in_utc() {
        let runs = vec![ts("2024-01-01T00:00:00Z"), ts("2024-01-01T12:00:00Z")];
        let release = Release {
            tag_name: "tz".to_string(),
            name: None,
            // 2024-01-01T11:00:00Z
            published_at: ts("2024-01-01T13:00:00+02:00"),
        };

        let markers = correlate_default(&[release], &runs);
        assert_eq!(markers[0].run_index, 1);
        assert_eq!(markers[0].delta_seconds, 3_600);
        assert_eq!(markers[0].name, "tz");
    }

    #[test]
    fn test_markers_sorted_by_run_index() {
        let runs = vec![
            ts("2024-01-01T00:00:00Z"),
            ts("2024-01-05T00:00:00Z"),
            ts("2024-01-09T00:00:00Z"),
        ];
        let releases = vec![
            create_release("v3", "2024-01-09T01:00:00Z"),
            create_release("v1", "2024-01-01T01:00:00Z"),
            create_release("v2", "2024-01-05T01:00:00Z"),
        ];

        let markers = correlate_default(&releases, &runs);

        let indices: Vec<usize> = markers.iter().map(|m| m.run_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_no_runs_means_no_markers() {
        let releases = vec![create_release("v1", "2024-01-01T00:00:00Z")];
        assert!(correlate_default(&releases, &[]).is_empty());
    }
}
