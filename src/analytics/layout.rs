use serde::{Deserialize, Serialize};

use super::releases::ReleaseMarker;

/// Default tick budget for a run axis.
pub const DEFAULT_MAX_TICKS: usize = 20;

/// Label heights, as fractions of the plot height, cycled through when
/// release labels crowd each other.
pub const LABEL_HEIGHTS: [f64; 4] = [0.95, 0.90, 0.85, 0.80];

/// Characters of a run id kept in a tick label.
const LABEL_CHARS: usize = 4;

/// Tick positions on the run axis with their labels.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ticks {
    pub indices: Vec<usize>,
    pub labels: Vec<String>,
}

/// A release marker with the vertical slot for its label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedMarker {
    #[serde(flatten)]
    pub marker: ReleaseMarker,
    /// Index into [`LABEL_HEIGHTS`]
    pub level: usize,
    pub height: f64,
}

/// Picks which run indices get a tick.
///
/// Up to 10 runs every run is ticked; up to 50 every `total_runs / 10`-th;
/// beyond that every `total_runs / max_ticks`-th. The last run is added when
/// it sits more than half a step past the last regular tick.
pub fn tick_indices(total_runs: usize, max_ticks: usize) -> Vec<usize> {
    if total_runs == 0 {
        return Vec::new();
    }

    let step = if total_runs <= 10 {
        1
    } else if total_runs <= 50 {
        (total_runs / 10).max(1)
    } else {
        (total_runs / max_ticks.max(1)).max(1)
    };

    let mut indices: Vec<usize> = (0..total_runs).step_by(step).collect();

    let last = total_runs - 1;
    if let Some(&last_tick) = indices.last() {
        if last - last_tick > step / 2 {
            indices.push(last);
        }
    }

    indices
}

/// Ticks for a run axis whose runs are `run_ids`, in axis order.
pub fn tick_positions(run_ids: &[String], max_ticks: usize) -> Ticks {
    let indices = tick_indices(run_ids.len(), max_ticks);
    let labels = indices.iter().map(|&i| short_label(&run_ids[i])).collect();
    Ticks { indices, labels }
}

/// Last four characters of a run id.
pub fn short_label(run_id: &str) -> String {
    let count = run_id.chars().count();
    run_id.chars().skip(count.saturating_sub(LABEL_CHARS)).collect()
}

/// Assigns a label height to each release marker so neighbours do not
/// overlap.
///
/// Markers are taken in run-index order. A marker closer than
/// `max(1, total_runs / 20)` runs to the previous one moves to the next
/// height (wrapping after the last); otherwise it goes back to the top.
pub fn place_release_labels(markers: &[ReleaseMarker], total_runs: usize) -> Vec<PlacedMarker> {
    let mut sorted: Vec<&ReleaseMarker> = markers.iter().collect();
    sorted.sort_by_key(|marker| marker.run_index);

    #[allow(clippy::cast_possible_wrap)]
    let min_distance = (total_runs / 20).max(1) as i64;
    let mut last_x = -min_distance;
    let mut level = 0;

    sorted
        .into_iter()
        .map(|marker| {
            #[allow(clippy::cast_possible_wrap)]
            let x = marker.run_index as i64;
            level = if x - last_x < min_distance {
                (level + 1) % LABEL_HEIGHTS.len()
            } else {
                0
            };
            last_x = x;

            PlacedMarker {
                marker: marker.clone(),
                level,
                height: LABEL_HEIGHTS[level],
            }
        })
        .collect()
}
