use rand::Rng;

use crate::model::{EventId, Signal, TriggerHit};

/// Chance of each random signal per evaluation.
const FIRE_RATE: f64 = 0.01;

/// Random control signal for judging the other checks against. Each
/// evaluation draws for a bullish signal first and only draws for a
/// bearish one when the bullish draw misses. The event identity carries
/// no offset, so each instrument keeps at most one bull and one bear
/// control event per run.
pub fn control<R: Rng>(rng: &mut R, days_ago: usize) -> Option<TriggerHit> {
    if rng.r#gen::<f64>() > 1.0 - FIRE_RATE {
        return Some(TriggerHit {
            signal: Signal::Bull,
            id: EventId::ControlBull,
            message: "Random Bull".to_string(),
            days_ago,
        });
    }
    if rng.r#gen::<f64>() > 1.0 - FIRE_RATE {
        return Some(TriggerHit {
            signal: Signal::Bear,
            id: EventId::ControlBear,
            message: "Random Bear".to_string(),
            days_ago,
        });
    }
    None
}
