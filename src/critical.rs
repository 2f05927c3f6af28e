//! # Critical-Section Gate
//!
//! Nested critical sections that hold off the scheduler without touching
//! unrelated interrupts. Entering masks the scheduler timer's compare-match
//! interrupt; the global interrupt flag keeps whatever value the caller had,
//! so pin-change and timer-overflow interrupts stay serviceable inside a
//! critical section. Only the outermost leave re-arms the scheduler and puts
//! the global flag back to the value snapshotted on the outermost enter.
//!
//! Up to 255 nesting levels are supported; overflow and underflow are
//! programming errors and go to the fatal-error sink.

use crate::arch::port;
use crate::error;

/// Nesting counter plus the interrupt-flag snapshot of the outermost entry.
#[derive(Debug, Clone, Copy)]
pub struct CriticalGate {
    depth: u8,
    saved_interrupt_flag: bool,
}

impl CriticalGate {
    pub const fn new() -> CriticalGate {
        CriticalGate {
            depth: 0,
            saved_interrupt_flag: false,
        }
    }

    /// Current nesting depth. Zero means the scheduler is armed.
    pub fn depth(&self) -> u8 {
        self.depth
    }

    /// Enters a critical section. On the first entry the current global
    /// interrupt flag is snapshotted and the scheduler timer disarmed.
    ///
    /// The flag is cleared only around the bookkeeping itself and leaves
    /// this function with the value it had on entry.
    pub fn enter(&mut self) {
        let enabled = port::interrupts_enabled();
        port::disable_interrupts();

        if self.depth == u8::MAX {
            error::fatal(format_args!("critical section overflow"));
            port::restore_interrupts(enabled);
            return;
        }
        if self.depth == 0 {
            self.saved_interrupt_flag = enabled;
        }
        self.depth += 1;
        port::disarm_scheduler_timer();

        port::restore_interrupts(enabled);
    }

    /// Leaves a critical section. The outermost leave re-arms the scheduler
    /// timer and restores the global interrupt flag snapshotted by the
    /// matching enter.
    pub fn leave(&mut self) {
        let enabled = port::interrupts_enabled();
        port::disable_interrupts();

        if self.depth == 0 {
            error::fatal(format_args!("critical section underflow"));
            port::restore_interrupts(enabled);
            return;
        }
        self.depth -= 1;
        if self.depth == 0 {
            port::arm_scheduler_timer();
            port::restore_interrupts(self.saved_interrupt_flag);
        } else {
            port::restore_interrupts(enabled);
        }
    }
}
