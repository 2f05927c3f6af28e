//! # System Time
//!
//! Coarse wall-clock built on the free-running system timer: the port
//! counts timer overflows, this module converts them to milliseconds and
//! offers a busy-wait delay on top. Consumed by programs, never by the
//! scheduler.

use crate::arch::port;
use crate::config::{F_CPU, SYSTEM_TIMER_PRESCALER};

/// Timer overflows per second: the 8-bit counter wraps every 256 prescaled
/// clocks.
const OVERFLOWS_PER_SECOND: u32 = F_CPU / SYSTEM_TIMER_PRESCALER / 256;

/// Resets the system time to zero.
pub fn reset() {
    port::reset_timer_overflows();
}

/// Milliseconds since boot (or the last [`reset`]), overflow-count
/// resolution (a few milliseconds per step).
pub fn now_ms() -> u32 {
    (port::timer_overflows() as u64 * 1000 / OVERFLOWS_PER_SECOND as u64) as u32
}

/// Busy-waits for `ms` milliseconds.
///
/// Works across a wrap of the millisecond clock: when the destination time
/// wrapped past zero, the wait runs until the clock itself wraps and then
/// until the destination is reached.
pub fn delay_ms(ms: u32) {
    let start = now_ms();
    let destination = start.wrapping_add(ms);

    if start <= destination {
        loop {
            let now = now_ms();
            if !(start <= now && now < destination) {
                break;
            }
        }
    } else {
        loop {
            let now = now_ms();
            if !(now < destination || start <= now) {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::sim;

    #[test]
    fn time_advances_monotonically() {
        let _guard = sim::testing::exclusive();
        sim::testing::reset();

        let first = now_ms();
        let second = now_ms();
        assert!(second >= first);
    }

    #[test]
    fn delay_waits_at_least_the_requested_time() {
        let _guard = sim::testing::exclusive();
        sim::testing::reset();

        let before = now_ms();
        delay_ms(50);
        assert!(now_ms() >= before + 50);
    }

    #[test]
    fn reset_rewinds_the_clock() {
        let _guard = sim::testing::exclusive();
        sim::testing::reset();

        delay_ms(20);
        reset();
        assert!(now_ms() < 20);
    }
}
