use crate::config::DelayRange;
use std::thread;
use std::time::Duration;

pub fn pick_delay(range: DelayRange) -> Duration {
    let range = range.normalized();
    if range.is_zero() {
        return Duration::ZERO;
    }
    Duration::from_millis(fastrand::u64(range.min_ms..=range.max_ms))
}

pub fn jitter(range: DelayRange) -> Duration {
    let delay = pick_delay(range);
    if !delay.is_zero() {
        thread::sleep(delay);
    }
    delay
}

/// Random human-looking scroll offset: 300-800px, downward three times in four.
pub fn scroll_offset() -> i64 {
    let amount = fastrand::i64(300..=800);
    if fastrand::u8(0..4) == 0 {
        -amount
    } else {
        amount
    }
}
