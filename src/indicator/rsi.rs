/// RSI with Wilder smoothing, aligned 1:1 with the input.
///
/// The seed averages the gains and losses of the first `period` deltas;
/// indices up to `period` carry the seed reading, then the recurrence
/// `avg = (avg*(n-1) + value)/n` takes over per side.
pub fn rsi(series: &[f64], period: usize) -> Vec<f64> {
    let len = series.len();
    let mut out = vec![0.0; len];
    if len < 2 || period == 0 {
        return out;
    }

    let deltas: Vec<f64> = series.windows(2).map(|w| w[1] - w[0]).collect();
    let seed = &deltas[..period.min(deltas.len())];
    let mut avg_gain = seed.iter().map(|&d| d.max(0.0)).sum::<f64>() / period as f64;
    let mut avg_loss = seed.iter().map(|&d| (-d).max(0.0)).sum::<f64>() / period as f64;

    let seed_rsi = rsi_value(avg_gain, avg_loss);
    for slot in out.iter_mut().take(period) {
        *slot = seed_rsi;
    }

    for i in period..len {
        let delta = deltas[i - 1];
        avg_gain = (avg_gain * (period - 1) as f64 + delta.max(0.0)) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + (-delta).max(0.0)) / period as f64;
        out[i] = rsi_value(avg_gain, avg_loss);
    }
    out
}

/// Zero average loss saturates toward 100 by using the average gain as the
/// relative strength directly, so a pure up-move never divides by zero.
fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    let rs = if avg_loss == 0.0 { avg_gain } else { avg_gain / avg_loss };
    100.0 - 100.0 / (1.0 + rs)
}
