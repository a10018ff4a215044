//! Instability metric.

/// Mean absolute difference between consecutive samples, in sampling
/// order, rounded to two decimal places.
///
/// Fewer than two samples leave no pair to compare and score 0.0.
pub fn mean_absolute_swing(samples: &[f64]) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }
    let total: f64 = samples
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).abs())
        .sum();
    round_to_two(total / (samples.len() - 1) as f64)
}

fn round_to_two(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
