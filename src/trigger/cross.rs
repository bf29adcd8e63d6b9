use crate::model::{AverageKind, EventId, Signal, TriggerHit};
use crate::trigger::adjacent_indices;

/// Crossover between a faster average `a` and a slower average `b`.
/// Golden cross (a moves from at-or-below b to above) is bullish; death
/// cross is bearish. NaN warmup values never satisfy either comparison,
/// so crosses only fire where both series are defined.
pub fn avg_cross(
    a: &[f64],
    b: &[f64],
    offset: usize,
    kind: AverageKind,
    fast: u32,
    slow: u32,
    label: &str,
) -> Option<TriggerHit> {
    let len = a.len().min(b.len());
    let (now, prev) = adjacent_indices(len, offset)?;

    if a[now] > b[now] && a[prev] <= b[prev] {
        return Some(TriggerHit {
            signal: Signal::Bull,
            id: EventId::AvgCross { kind, fast, slow, offset },
            message: format!("GCross {label}"),
            days_ago: offset,
        });
    }
    if a[now] < b[now] && a[prev] >= b[prev] {
        return Some(TriggerHit {
            signal: Signal::Bear,
            id: EventId::AvgCross { kind, fast, slow, offset },
            message: format!("DCross {label}"),
            days_ago: offset,
        });
    }
    None
}

/// Sort-order flip across four averages ordered short to long.
///
/// The fully descending arrangement (fastest on top) marks a strong bull
/// trend; this fires when that arrangement begins or ends. The bearish
/// side tests the strictly reversed arrangement, deliberately mirroring
/// the bullish ordering rather than repeating it.
pub fn sort_flip(s: [&[f64]; 4], offset: usize, kind: AverageKind) -> Option<TriggerHit> {
    let len = s.iter().map(|v| v.len()).min()?;
    let (now, prev) = adjacent_indices(len, offset)?;

    let bull_now = ordered_desc(&s, now);
    let bull_prev = ordered_desc(&s, prev);
    if bull_now && !bull_prev {
        return Some(flip(kind, offset, Signal::Bull, "Sort Went Bullish"));
    }
    if bull_prev && !bull_now {
        return Some(flip(kind, offset, Signal::Bear, "Sort Ended Bullish"));
    }

    let bear_now = ordered_asc(&s, now);
    let bear_prev = ordered_asc(&s, prev);
    if bear_now && !bear_prev {
        return Some(flip(kind, offset, Signal::Bear, "Sort Went Bearish"));
    }
    if bear_prev && !bear_now {
        return Some(flip(kind, offset, Signal::Bull, "Sort Ended Bearish"));
    }
    None
}

fn flip(kind: AverageKind, offset: usize, signal: Signal, what: &str) -> TriggerHit {
    TriggerHit {
        signal,
        id: EventId::SortFlip { kind, offset },
        message: format!("{} {what}", kind.label()),
        days_ago: offset,
    }
}

fn ordered_desc(s: &[&[f64]; 4], i: usize) -> bool {
    s[0][i] >= s[1][i] && s[1][i] >= s[2][i] && s[2][i] >= s[3][i]
}

fn ordered_asc(s: &[&[f64]; 4], i: usize) -> bool {
    s[0][i] <= s[1][i] && s[1][i] <= s[2][i] && s[2][i] <= s[3][i]
}
