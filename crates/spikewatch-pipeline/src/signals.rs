//! Pure trend-signal functions.
//!
//! Every function here is a deterministic computation over counts; history
//! slices are ordered newest-first (`history[0]` is the bucket immediately
//! before the one being scored) and `None` entries mean "no snapshot was
//! recorded for that bucket" — a known condition, never an error.

/// Growth of `cur` over the previous bucket's count.
///
/// A missing or non-positive `prev` is damped to 1: this avoids division by
/// zero and keeps a zero baseline from manufacturing infinite growth. With
/// the damping, `cur = 10, prev = 0` yields `9.0`.
#[must_use]
pub fn short_term_growth(cur: u64, prev: Option<u64>) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let prev = match prev {
        Some(p) if p > 0 => p as f64,
        _ => 1.0,
    };
    #[allow(clippy::cast_precision_loss)]
    let cur = cur as f64;
    (cur - prev) / prev
}

/// Growth values between consecutive historical buckets, newest-first.
///
/// `result[i]` is the growth into bucket `T-(i+1)` from bucket `T-(i+2)`,
/// present only when both endpoints have recorded counts.
#[must_use]
pub fn growth_series(history: &[Option<u64>]) -> Vec<Option<f64>> {
    history
        .windows(2)
        .map(|pair| match (pair[0], pair[1]) {
            (Some(cur), Some(prev)) => Some(short_term_growth(cur, Some(prev))),
            _ => None,
        })
        .collect()
}

/// Current count relative to the mean of the up-to-3 most recent valid
/// historical counts. Missing or zero entries are excluded from the mean,
/// not treated as zero; with no valid history the ratio is 0.
#[must_use]
pub fn long_term_ratio(cur: u64, history: &[Option<u64>]) -> f64 {
    let recent = &history[..history.len().min(3)];
    #[allow(clippy::cast_precision_loss)]
    let valid: Vec<f64> = recent
        .iter()
        .filter_map(|c| c.filter(|&v| v > 0).map(|v| v as f64))
        .collect();
    if valid.is_empty() {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let mean = valid.iter().sum::<f64>() / valid.len() as f64;
    if mean <= 0.0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let cur = cur as f64;
    cur / mean
}

/// Coefficient of variation (sample standard deviation over mean) of the
/// valid historical counts. 0 with fewer than 2 valid points or a
/// non-positive mean.
#[must_use]
pub fn volatility(history: &[Option<u64>]) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let valid: Vec<f64> = history.iter().filter_map(|c| c.map(|v| v as f64)).collect();
    if valid.len() < 2 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let n = valid.len() as f64;
    let mean = valid.iter().sum::<f64>() / n;
    if mean <= 0.0 {
        return 0.0;
    }
    let variance = valid.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    variance.sqrt() / mean
}

/// 1 when the three most recent historical growth values are all present
/// and all exceed `threshold`; 0 otherwise (including when fewer than three
/// growth values exist).
#[must_use]
pub fn duration_above_threshold(growths: &[Option<f64>], threshold: f64) -> u8 {
    if growths.len() < 3 {
        return 0;
    }
    let sustained = growths[..3]
        .iter()
        .all(|g| g.is_some_and(|v| v > threshold));
    u8::from(sustained)
}

/// Share of the current category count within all categories at the same
/// `(channel, query, bucket)`. 0 when the total is 0.
#[must_use]
pub fn ratio_to_total(cur: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let ratio = cur as f64 / total as f64;
    ratio
}

/// Change in growth rate: current growth minus the growth one bucket
/// earlier. 0 when the earlier growth is unavailable.
#[must_use]
pub fn acceleration(cur_growth: f64, prev_growth: Option<f64>) -> f64 {
    match prev_growth {
        Some(prev) => cur_growth - prev,
        None => 0.0,
    }
}
