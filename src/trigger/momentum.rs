use crate::indicator::sequential::STREAK_CAP;
use crate::model::{EventId, Scale, Signal, TriggerHit};
use crate::trigger::{adjacent_indices, now_index};

pub const OVERSOLD: f64 = 30.0;
pub const OVERBOUGHT: f64 = 70.0;

/// RSI leaving oversold is a bull event; dropping out of overbought is a
/// bear event. `offset` indexes the series under test (the week index for
/// weekly RSI); `display_days_ago` is always the daily offset.
pub fn rsi_cross(
    rsi: &[f64],
    offset: usize,
    scale: Scale,
    display_days_ago: usize,
) -> Option<TriggerHit> {
    let (now, prev) = adjacent_indices(rsi.len(), offset)?;

    if rsi[now] > OVERSOLD && rsi[prev] < OVERSOLD {
        return Some(TriggerHit {
            signal: Signal::Bull,
            id: EventId::RsiCross { scale, bull: true, offset },
            message: format!("RSI {} up", scale.label()),
            days_ago: display_days_ago,
        });
    }
    if rsi[now] < OVERBOUGHT && rsi[prev] > OVERBOUGHT {
        return Some(TriggerHit {
            signal: Signal::Bear,
            id: EventId::RsiCross { scale, bull: false, offset },
            message: format!("RSI {} falling", scale.label()),
            days_ago: display_days_ago,
        });
    }
    None
}

/// Contrarian read of the streak counter: a full up streak is a bear
/// event, a full down streak a bull event.
pub fn sequential_nine(
    seq: &[i32],
    offset: usize,
    scale: Scale,
    display_days_ago: usize,
) -> Option<TriggerHit> {
    let now = now_index(seq.len(), offset)?;

    if seq[now] == STREAK_CAP {
        return Some(TriggerHit {
            signal: Signal::Bear,
            id: EventId::SeqNine { scale, bull: false, offset },
            message: format!("SEQ Green {STREAK_CAP} {}", scale.tag()),
            days_ago: display_days_ago,
        });
    }
    if seq[now] == -STREAK_CAP {
        return Some(TriggerHit {
            signal: Signal::Bull,
            id: EventId::SeqNine { scale, bull: true, offset },
            message: format!("SEQ Red {STREAK_CAP} {}", scale.tag()),
            days_ago: display_days_ago,
        });
    }
    None
}
