//! # Stack Windows
//!
//! Address arithmetic for the fixed SRAM stack partition, the XOR-fold
//! checksum over a parked stack window, and the synthesis of the initial
//! register frame a new process is dispatched from.
//!
//! Stacks grow downward: a push stores at the stack pointer and then
//! decrements it, so the *bottom* of a stack is its highest address. Each
//! process slot owns a contiguous window of `PROCESS_STACK_SIZE` bytes whose
//! bottom is derived from the slot index alone; windows of distinct slots
//! never overlap each other, the ISR stack or the main stack.

use crate::arch::port;
use crate::config::{PROCESS_STACKS_BOTTOM, PROCESS_STACK_SIZE};
use crate::process::{ProcessId, StackChecksum};

/// A byte address inside the SRAM stack region.
pub type StackAddr = u16;

/// Number of bytes a full register context occupies on a process stack:
/// 32 general registers plus the status register.
pub const CONTEXT_SIZE: u16 = 33;

/// Size of the synthetic frame `exec` writes: a register context plus the
/// two-byte program-counter word.
pub const INITIAL_FRAME_SIZE: u16 = CONTEXT_SIZE + 2;

// ---------------------------------------------------------------------------
// Stack windows
// ---------------------------------------------------------------------------

/// The contiguous byte range owned by one process stack, from
/// `bottom - size + 1` (lowest address) to `bottom` (highest address).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackWindow {
    /// Highest address of the window; the first byte ever pushed lands here.
    pub bottom: StackAddr,
    /// Window size in bytes.
    pub size: u16,
}

impl StackWindow {
    /// The stack window owned by process slot `pid`.
    pub const fn of(pid: ProcessId) -> StackWindow {
        StackWindow {
            bottom: PROCESS_STACKS_BOTTOM - pid as u16 * PROCESS_STACK_SIZE,
            size: PROCESS_STACK_SIZE,
        }
    }

    /// Lowest address belonging to the window.
    pub const fn top(&self) -> StackAddr {
        self.bottom - self.size + 1
    }

    /// Whether `addr` lies inside the window.
    pub const fn contains(&self, addr: StackAddr) -> bool {
        addr >= self.top() && addr <= self.bottom
    }
}

// ---------------------------------------------------------------------------
// Checksum
// ---------------------------------------------------------------------------

/// Folds the used part of a stack window into one byte with XOR.
///
/// `sp` follows the hardware convention and points one below the most
/// recently pushed byte, so the covered range is `sp + 1 ..= bottom`. Any
/// single-byte change inside that range changes the fold; flips at the same
/// bit position in two covered bytes cancel out, which the scheme knowingly
/// accepts. Bytes at or below `sp` and bytes outside the window are not
/// covered.
pub fn checksum(window: StackWindow, sp: StackAddr) -> StackChecksum {
    let mut folded: StackChecksum = 0;
    let mut addr = sp + 1;
    while addr <= window.bottom {
        folded ^= port::stack_read(addr);
        addr += 1;
    }
    folded
}

// ---------------------------------------------------------------------------
// Initial frame synthesis
// ---------------------------------------------------------------------------

/// Writes the synthetic saved context a freshly created process is first
/// dispatched from, and returns the resulting stack pointer.
///
/// The frame replays the hardware push order of a preemption at the entry
/// point: the program-counter word first (low byte at the bottom, high byte
/// above it), then 33 zero bytes for the registers and the status register.
/// The status register is zero on the stack; the interrupt return re-enables
/// interrupts on its own.
///
/// Nothing outside the window is touched, and the caller's descriptor is
/// only published after this returns.
pub fn write_initial_frame(window: StackWindow, entry_word: u16) -> StackAddr {
    port::stack_write(window.bottom, entry_word as u8);
    port::stack_write(window.bottom - 1, (entry_word >> 8) as u8);
    let mut addr = window.bottom - 2;
    while addr > window.bottom - 2 - CONTEXT_SIZE {
        port::stack_write(addr, 0);
        addr -= 1;
    }
    window.bottom - INITIAL_FRAME_SIZE
}
