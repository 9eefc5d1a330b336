//! TSC clock for pipeline timing without syscalls

use std::time::Duration;

use once_cell::sync::Lazy;
use quanta::Clock;

/// Process-wide TSC clock, calibrated once on first use
pub static CLOCK: Lazy<Clock> = Lazy::new(Clock::new);

/// Raw TSC reading, stamped on each record at receipt
#[inline]
pub fn now_tsc() -> u64 {
    CLOCK.raw()
}

/// Wall time elapsed since a raw reading taken with [`now_tsc`]
#[inline]
pub fn elapsed(since: u64) -> Duration {
    CLOCK.delta(since, now_tsc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readings_do_not_go_backwards() {
        let first = now_tsc();
        let second = now_tsc();
        assert!(second >= first);
    }

    #[test]
    fn test_elapsed_tracks_sleep() {
        let start = now_tsc();
        std::thread::sleep(Duration::from_millis(5));
        let took = elapsed(start);
        assert!(took >= Duration::from_millis(4));
        assert!(took < Duration::from_secs(5));
    }
}
