//! Randomized, interruptible waits.
//!
//! Every wait in the crate goes through [`pause`], which sleeps in short
//! slices and returns early once the shared stop flag is observed.

use crate::models::{Jitter, SecondsRange, secs};
use crate::state::StateManager;
use rand::Rng;
use std::time::Duration;
use tokio::time::Instant;

/// Granularity at which waits observe the stop flag.
pub const STOP_CHECK_INTERVAL: Duration = Duration::from_millis(100);

const MIN_JITTERED_SECS: f64 = 0.1;
const EXTRA_PAUSE_CHANCE: f64 = 0.1;

/// `base ± variance` seconds, with an occasional extra 1-3 s pause.
///
/// Never shorter than 100 ms.
pub fn jittered(jitter: Jitter) -> Duration {
    let mut rng = rand::thread_rng();
    let variance = jitter.variance.abs();
    let mut value = jitter.base;
    if variance > 0.0 {
        value += rng.gen_range(-variance..=variance);
    }
    if rng.gen_bool(EXTRA_PAUSE_CHANCE) {
        value += rng.gen_range(1.0..=3.0);
    }
    secs(value.max(MIN_JITTERED_SECS))
}

/// Uniform duration between `range.min` and `range.max` seconds.
pub fn between(range: SecondsRange) -> Duration {
    let (low, high) = if range.min <= range.max {
        (range.min, range.max)
    } else {
        (range.max, range.min)
    };
    if high <= low {
        return secs(low);
    }
    secs(rand::thread_rng().gen_range(low..=high))
}

/// Sleep for `duration`, checking the stop flag every 100 ms.
///
/// Returns `false` when the wait was cut short by a stop request.
pub async fn pause(duration: Duration, state: &StateManager) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if state.should_stop() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        tokio::time::sleep((deadline - now).min(STOP_CHECK_INTERVAL)).await;
    }
}

/// [`pause`] for a seconds value taken from the settings.
pub async fn pause_secs(seconds: f64, state: &StateManager) -> bool {
    pause(secs(seconds), state).await
}
