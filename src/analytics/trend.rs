use indexmap::IndexMap;

use crate::dataset::Observation;

/// Number of points a fitted trend line is sampled at.
pub const TREND_POINTS: usize = 100;

/// Mean duration per run, in order of each run's first appearance.
///
/// All observations sharing a `run_id` (the variants of one workflow
/// invocation) are averaged together.
#[allow(clippy::cast_precision_loss)]
pub fn aggregate(observations: &[Observation]) -> IndexMap<String, f64> {
    let mut sums: IndexMap<String, (f64, usize)> = IndexMap::new();

    for obs in observations {
        let entry = sums.entry(obs.run_id.clone()).or_insert((0.0, 0));
        entry.0 += obs.duration_minutes();
        entry.1 += 1;
    }

    sums.into_iter()
        .map(|(run_id, (sum, count))| (run_id, sum / count as f64))
        .collect()
}

/// Least-squares linear trend through `(xs[i], ys[i])`.
///
/// Pairs with a non-finite member are ignored. Below two usable pairs there
/// is no trend and both returned vectors are empty. Otherwise the line is
/// sampled at [`TREND_POINTS`] evenly spaced x values from the smallest to
/// the largest usable x.
pub fn fit_trend(xs: &[f64], ys: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let points: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys)
        .map(|(&x, &y)| (x, y))
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .collect();

    if points.len() < 2 {
        return (Vec::new(), Vec::new());
    }

    let (slope, intercept) = least_squares(&points);

    let min_x = points.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
    let max_x = points.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);

    let trend_xs = linspace(min_x, max_x, TREND_POINTS);
    let trend_ys = trend_xs.iter().map(|x| slope * x + intercept).collect();

    (trend_xs, trend_ys)
}

/// Slope and intercept of the degree-1 least-squares fit. A vertical point
/// cloud (all x equal) gets a flat line through the mean.
#[allow(clippy::cast_precision_loss)]
fn least_squares(points: &[(f64, f64)]) -> (f64, f64) {
    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.1).sum::<f64>() / n;

    let (sxy, sxx) = points.iter().fold((0.0, 0.0), |(sxy, sxx), (x, y)| {
        let dx = x - mean_x;
        (sxy + dx * (y - mean_y), sxx + dx * dx)
    });

    if sxx == 0.0 {
        return (0.0, mean_y);
    }

    let slope = sxy / sxx;
    (slope, mean_y - slope * mean_x)
}

#[allow(clippy::cast_precision_loss)]
fn linspace(start: f64, end: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (count - 1) as f64;
            (0..count)
                .map(|i| if i == count - 1 { end } else { start + step * i as f64 })
                .collect()
        }
    }
}

/// `count` offsets spread evenly over `[-half_width, half_width]`, or a
/// single zero offset.
pub fn spread_offsets(count: usize, half_width: f64) -> Vec<f64> {
    if count <= 1 {
        return vec![0.0; count];
    }
    linspace(-half_width, half_width, count)
}
