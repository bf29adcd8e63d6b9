/// Streak length where the counter wraps back to 1.
pub const STREAK_CAP: i32 = 9;

/// Signed streak counter against the close `lookback` bars earlier.
///
/// A close above its counterpart extends the up streak (and zeroes the
/// down streak); anything else extends the down streak. Streaks cap at
/// [`STREAK_CAP`] and wrap to 1 rather than climbing further. The first
/// `lookback` indices emit 0: no comparison is possible yet.
pub fn sequential(series: &[f64], lookback: usize) -> Vec<i32> {
    let len = series.len();
    let mut out = vec![0i32; len];
    let mut up = 0i32;
    let mut down = 0i32;

    for i in lookback..len {
        if series[i] > series[i - lookback] {
            down = 0;
            up += 1;
            if up > STREAK_CAP {
                up = 1;
            }
            out[i] = up;
        } else {
            up = 0;
            down += 1;
            if down > STREAK_CAP {
                down = 1;
            }
            out[i] = -down;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leading_indices_emit_zero() {
        let values = sequential(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 4);
        assert_eq!(&values[..4], &[0, 0, 0, 0]);
        assert_eq!(values[4], 1);
        assert_eq!(values[5], 2);
    }

    #[test]
    fn up_streak_wraps_at_cap() {
        let series: Vec<f64> = (0..20).map(f64::from).collect();
        let values = sequential(&series, 4);
        // Streak runs 1..=9 from index 4, then restarts at 1.
        assert_eq!(values[12], 9);
        assert_eq!(values[13], 1);
        assert_eq!(values[14], 2);
    }

    #[test]
    fn equal_closes_count_as_down() {
        let values = sequential(&[5.0; 8], 4);
        assert_eq!(&values[4..], &[-1, -2, -3, -4]);
    }

    #[test]
    fn direction_flip_resets_the_opposite_streak() {
        // Rise long enough for an up streak, then collapse.
        let series = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 0.5, 0.4];
        let values = sequential(&series, 4);
        assert_eq!(values[7], 4);
        assert_eq!(values[8], -1);
        assert_eq!(values[9], -2);
    }

    #[test]
    fn output_always_within_cap() {
        let series: Vec<f64> = (0..60).map(|i| f64::from(i % 7)).collect();
        for v in sequential(&series, 4) {
            assert!(v.abs() <= STREAK_CAP);
        }
    }
}
