/// Simple moving average over a trailing window.
///
/// The window is clamped to the input length; the first `n-1` values are
/// NaN while the window is still filling.
pub fn sma(series: &[f64], window: usize) -> Vec<f64> {
    let len = series.len();
    let mut out = vec![f64::NAN; len];
    if len == 0 {
        return out;
    }
    let n = window.clamp(1, len);
    for i in (n - 1)..len {
        let start = i + 1 - n;
        out[i] = series[start..=i].iter().sum::<f64>() / n as f64;
    }
    out
}

/// Exponential moving average with span weighting.
///
/// Uses the adjusted form: weights `(1-a)^j` renormalized per index, with
/// `a = 2/(n+1)`. The first `n` values are forced to NaN regardless of the
/// recurrence bootstrap so early unstable output never reaches a trigger
/// check.
pub fn ema(series: &[f64], span: usize) -> Vec<f64> {
    let len = series.len();
    let mut out = vec![f64::NAN; len];
    if len == 0 {
        return out;
    }
    let n = span.clamp(1, len);
    let alpha = 2.0 / (n as f64 + 1.0);
    let decay = 1.0 - alpha;

    let mut num = 0.0;
    let mut den = 0.0;
    for (i, &value) in series.iter().enumerate() {
        num = value + decay * num;
        den = 1.0 + decay * den;
        if i >= n {
            out[i] = num / den;
        }
    }
    out
}
