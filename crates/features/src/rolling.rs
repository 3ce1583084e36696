//! Trailing-window statistics over a single numeric column.
//!
//! Windows are counted in samples, not wall-clock time. Partial windows at
//! the start of a column are allowed: a statistic is produced as soon as the
//! window holds enough valid (finite) values, otherwise the slot is NaN and is
//! repaired later by [`forward_fill`].

/// Added to the moving standard deviation before dividing.
pub const DEVIATION_EPSILON: f64 = 0.001;

/// Moving average over the trailing `window` samples (minimum 1 valid value).
pub fn moving_average(values: &[f64], window: usize) -> Vec<f64> {
    let window = window.max(1);
    (0..values.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(window);
            let (sum, n) = values[start..=i]
                .iter()
                .filter(|v| v.is_finite())
                .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
            if n == 0 { f64::NAN } else { sum / n as f64 }
        })
        .collect()
}

/// Moving sample standard deviation (n - 1) over the trailing `window`.
///
/// Needs at least 2 valid values in the window; fewer yields NaN.
pub fn moving_std(values: &[f64], window: usize) -> Vec<f64> {
    let window = window.max(1);
    (0..values.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(window);
            let slice: Vec<f64> = values[start..=i]
                .iter()
                .copied()
                .filter(|v| v.is_finite())
                .collect();
            sample_std(&slice).unwrap_or(f64::NAN)
        })
        .collect()
}

/// First difference; the first row has no predecessor and is NaN.
pub fn rate_of_change(values: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    if values.is_empty() {
        return out;
    }
    out.push(f64::NAN);
    out.extend(values.windows(2).map(|w| w[1] - w[0]));
    out
}

/// `(value - moving_average) / (moving_std + ε)` per row.
pub fn deviation_score(values: &[f64], average: &[f64], std: &[f64]) -> Vec<f64> {
    values
        .iter()
        .zip(average)
        .zip(std)
        .map(|((v, m), s)| (v - m) / (s + DEVIATION_EPSILON))
        .collect()
}

/// Replace non-finite values with the nearest prior finite value, or with
/// `default` when no prior value exists. Returns how many slots were filled.
pub fn forward_fill(values: &mut [f64], default: f64) -> usize {
    let mut last: Option<f64> = None;
    let mut filled = 0;
    for v in values.iter_mut() {
        if v.is_finite() {
            last = Some(*v);
        } else {
            *v = last.unwrap_or(default);
            filled += 1;
        }
    }
    filled
}

pub fn mean(xs: &[f64]) -> Option<f64> {
    if xs.is_empty() {
        return None;
    }
    Some(xs.iter().sum::<f64>() / xs.len() as f64)
}

/// Sample standard deviation (n - 1); `None` for fewer than two values.
pub fn sample_std(xs: &[f64]) -> Option<f64> {
    if xs.len() < 2 {
        return None;
    }
    let m = mean(xs)?;
    let var = xs.iter().map(|x| (x - m) * (x - m)).sum::<f64>() / (xs.len() - 1) as f64;
    Some(var.sqrt())
}
