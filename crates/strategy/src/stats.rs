//! Small numeric helpers shared by the strategy variants and the
//! market-data endpoints.

/// Arithmetic mean. Zero for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation. Zero for slices shorter than two.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Day-over-day percentage changes of an OLDEST-FIRST close series.
/// Returns one fewer element than the input.
pub fn pct_changes(closes: &[f64]) -> Vec<f64> {
    closes
        .windows(2)
        .map(|w| if w[0] != 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

/// Standardize a series: each value minus the sample mean, divided by the
/// population standard deviation. `None` when the series has zero variance.
pub fn z_scores(values: &[f64]) -> Option<Vec<f64>> {
    let sd = std_dev(values);
    if sd == 0.0 {
        return None;
    }
    let m = mean(values);
    Some(values.iter().map(|v| (v - m) / sd).collect())
}

/// Volatility of an OLDEST-FIRST close series: standard deviation of its
/// day-over-day percentage changes.
pub fn volatility(closes: &[f64]) -> f64 {
    std_dev(&pct_changes(closes))
}
