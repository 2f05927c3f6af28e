//! # Fatal-Error Sink
//!
//! Last stop for conditions the kernel cannot recover from by returning an
//! error value: gate misuse and stack corruption. The sink stops the
//! scheduler, reports the fault and blocks until the user acknowledges it,
//! then puts the interrupt machinery back exactly as it found it and
//! returns to the caller. It never resets the MCU — some callers (the
//! scheduler interrupt, critical sections) continue after acknowledgement.
//!
//! Recoverable failures (a full process table, an exhausted registry) are
//! ordinary `Result` values and never come through here.

use crate::arch::port;

/// Reports a fatal kernel error and waits for user confirmation.
///
/// The global interrupt flag is cleared for the duration of the prompt and
/// restored to its pre-call value afterwards; likewise the scheduler-timer
/// mask. Callers that cannot tolerate a flag flip — interrupt handlers,
/// critical sections — rely on this.
pub fn fatal(message: core::fmt::Arguments<'_>) {
    let interrupts_were_enabled = port::interrupts_enabled();
    let timer_was_armed = port::scheduler_timer_armed();
    port::disable_interrupts();
    port::disarm_scheduler_timer();

    log::error!("{}", message);
    port::report_fatal(message);
    port::wait_for_confirmation();

    if timer_was_armed {
        port::arm_scheduler_timer();
    }
    port::restore_interrupts(interrupts_were_enabled);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::sim;

    #[test]
    fn reports_and_returns() {
        let _guard = sim::testing::exclusive();
        sim::testing::reset();

        fatal(format_args!("stack checksum mismatch: process 3"));
        assert_eq!(sim::fatal_count(), 1);
        assert_eq!(sim::confirmation_count(), 1);
        assert!(sim::last_fatal_contains("process 3"));
    }

    #[test]
    fn restores_the_interrupt_flag_and_timer_mask() {
        let _guard = sim::testing::exclusive();
        sim::testing::reset();

        port::enable_interrupts();
        port::arm_scheduler_timer();
        fatal(format_args!("fault"));
        assert!(port::interrupts_enabled());
        assert!(port::scheduler_timer_armed());

        port::disable_interrupts();
        port::disarm_scheduler_timer();
        fatal(format_args!("fault"));
        assert!(!port::interrupts_enabled());
        assert!(!port::scheduler_timer_armed());
    }
}
