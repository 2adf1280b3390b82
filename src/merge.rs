use std::collections::HashSet;

use log::info;

use crate::dataset::{Observation, ObservationKey};

/// Merges freshly collected observations into an existing dataset.
///
/// Incoming observations whose key is already present, either in `existing`
/// or earlier in `incoming`, are dropped. The merged dataset is sorted by
/// `started_at` (stable, so equal timestamps keep their insertion order).
///
/// Returns the merged dataset and the number of observations actually added.
/// Merging the same batch twice adds nothing the second time.
pub fn merge(
    existing: Vec<Observation>,
    incoming: &[Observation],
) -> (Vec<Observation>, usize) {
    let mut seen: HashSet<ObservationKey> = existing.iter().map(Observation::key).collect();

    let fresh: Vec<Observation> = incoming
        .iter()
        .filter(|obs| seen.insert(obs.key()))
        .cloned()
        .collect();

    let duplicates = incoming.len() - fresh.len();
    if duplicates > 0 {
        info!("Removed {duplicates} duplicate entries from new data");
    }

    let new_count = fresh.len();

    let mut merged = existing;
    merged.extend(fresh);
    merged.sort_by_key(|obs| obs.started_at);

    (merged, new_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn create_observation(run_id: &str, job: &str, minute: i64) -> Observation {
        let started = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minute);
        Observation::new(run_id, job, "install", started, started + Duration::minutes(5)).unwrap()
    }

    #[test]
    fn test_merge_into_empty_dataset() {
        let incoming = vec![
            create_observation("2", "test (a, 3.10, 1)", 10),
            create_observation("1", "test (a, 3.10, 1)", 0),
        ];

        let (merged, new_count) = merge(vec![], &incoming);

        assert_eq!(new_count, 2);
        assert_eq!(merged[0].run_id, "1");
        assert_eq!(merged[1].run_id, "2");
    }

    #[test]
    fn test_merge_is_idempotent() {
        let existing = vec![create_observation("1", "job-a", 0)];
        let incoming = vec![
            create_observation("2", "job-a", 10),
            create_observation("2", "job-b", 11),
        ];

        let (merged, new_count) = merge(existing, &incoming);
        assert_eq!(new_count, 2);
        assert_eq!(merged.len(), 3);

        let (merged_again, new_count_again) = merge(merged.clone(), &incoming);
        assert_eq!(new_count_again, 0);
        assert_eq!(merged_again, merged);
    }

    #[test]
    fn test_merge_keeps_keys_unique() {
        let existing = vec![create_observation("1", "job-a", 0)];
        let incoming = vec![
            create_observation("1", "job-a", 0),
            create_observation("3", "job-a", 20),
            create_observation("3", "job-a", 20),
        ];

        let (merged, new_count) = merge(existing, &incoming);

        assert_eq!(new_count, 1);
        let keys: HashSet<_> = merged.iter().map(Observation::key).collect();
        assert_eq!(keys.len(), merged.len());
    }

    #[test]
    fn test_same_run_and_job_with_different_start_is_new() {
        let existing = vec![create_observation("1", "job-a", 0)];
        let incoming = vec![create_observation("1", "job-a", 1)];

        let (merged, new_count) = merge(existing, &incoming);

        assert_eq!(new_count, 1);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_merge_empty_incoming() {
        let existing = vec![create_observation("1", "job-a", 0)];
        let (merged, new_count) = merge(existing.clone(), &[]);
        assert_eq!(new_count, 0);
        assert_eq!(merged, existing);
    }
}
