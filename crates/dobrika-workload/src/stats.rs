//! Latency statistics over samples measured in seconds.

/// Linear-interpolated percentile of `samples_secs`, in milliseconds.
///
/// `p` is in `0..=100`. Empty input yields `0.0`.
pub fn percentile_ms(samples_secs: &[f64], p: f64) -> f64 {
    if samples_secs.is_empty() {
        return 0.0;
    }

    let mut sorted = samples_secs.to_vec();
    sorted.sort_by(f64::total_cmp);

    let last = sorted.len() - 1;
    let k = last as f64 * (p / 100.0);
    let f = (k.floor() as usize).min(last);
    let c = (f + 1).min(last);

    if f == c {
        return sorted[f] * 1000.0;
    }

    let d0 = sorted[f] * (c as f64 - k);
    let d1 = sorted[c] * (k - f as f64);
    (d0 + d1) * 1000.0
}

/// Arithmetic mean of `samples_secs`, in milliseconds. Empty input yields `0.0`.
pub fn average_ms(samples_secs: &[f64]) -> f64 {
    if samples_secs.is_empty() {
        return 0.0;
    }
    samples_secs.iter().sum::<f64>() / samples_secs.len() as f64 * 1000.0
}
