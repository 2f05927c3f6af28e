//! # TickOS Configuration
//!
//! Compile-time constants governing the process table, the SRAM stack
//! partition and the timer hardware. All limits are fixed at compile time —
//! no dynamic allocation anywhere in the kernel.

use crate::process::Priority;
use crate::stack::StackAddr;

/// Maximum number of processes that can exist at the same time, including
/// the idle process at slot 0. The highest valid id is `MAX_PROCESSES - 1`.
/// Must not exceed 8: the stack partition divides half the SRAM among the
/// process slots.
pub const MAX_PROCESSES: usize = 8;

/// Priority assigned to newly created processes unless the caller chooses
/// a different one. Higher numeric value means more favourable.
pub const DEFAULT_PRIORITY: Priority = 2;

// ---------------------------------------------------------------------------
// SRAM map (ATmega644)
// ---------------------------------------------------------------------------

/// First byte of on-chip SRAM. Everything below it is the register file and
/// the I/O space.
pub const SRAM_FIRST: StackAddr = 0x0100;

/// Last (highest) byte of on-chip SRAM, i.e. the hardware `RAMEND`.
pub const SRAM_LAST: StackAddr = 0x10FF;

/// Total SRAM size in bytes.
pub const SRAM_SIZE: u16 = SRAM_LAST - SRAM_FIRST + 1;

/// Size of the main stack used during initialization and for globals.
pub const MAIN_STACK_SIZE: u16 = 32;

/// Size of the dedicated stack the scheduler interrupt runs on.
pub const ISR_STACK_SIZE: u16 = 192;

/// Size of one process stack. The upper half of SRAM, minus the main and
/// ISR stacks, is split evenly among all process slots.
pub const PROCESS_STACK_SIZE: u16 =
    (SRAM_SIZE / 2 - MAIN_STACK_SIZE - ISR_STACK_SIZE) / MAX_PROCESSES as u16;

/// Bottom (highest address) of the main stack.
pub const MAIN_STACK_BOTTOM: StackAddr = SRAM_LAST;

/// Bottom (highest address) of the scheduler's ISR stack.
pub const ISR_STACK_BOTTOM: StackAddr = MAIN_STACK_BOTTOM - MAIN_STACK_SIZE;

/// Bottom (highest address) of the memory chunk holding all process stacks.
/// Slot `pid` owns the `PROCESS_STACK_SIZE` bytes ending at
/// `PROCESS_STACKS_BOTTOM - pid * PROCESS_STACK_SIZE`.
pub const PROCESS_STACKS_BOTTOM: StackAddr = ISR_STACK_BOTTOM - ISR_STACK_SIZE;

// ---------------------------------------------------------------------------
// Timer hardware
// ---------------------------------------------------------------------------

/// System clock frequency in Hz.
pub const F_CPU: u32 = 20_000_000;

/// Compare-match value for the scheduler timer (timer 2, prescaler 1024).
/// Determines the preemption interval.
pub const SCHEDULER_COMPARE: u8 = 60;

/// Prescaler of the free-running system-time timer (timer 0).
pub const SYSTEM_TIMER_PRESCALER: u32 = 256;
