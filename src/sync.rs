//! # Synchronization
//!
//! Interrupt-safe access to shared kernel state. A closure run through
//! [`critical`] executes with the global interrupt flag cleared and the
//! previous flag value restored afterwards, whatever it was.
//!
//! This is the coarse hammer for short accesses from thread context. It is
//! deliberately distinct from the scheduler's critical-section gate, which
//! masks only the scheduler timer and may stay held across longer regions.

use crate::arch::port;

/// Executes `f` with interrupts globally disabled.
#[inline]
pub fn critical<R>(f: impl FnOnce() -> R) -> R {
    let enabled = port::interrupts_enabled();
    port::disable_interrupts();
    let result = f();
    port::restore_interrupts(enabled);
    result
}
