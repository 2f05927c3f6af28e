//! # Process Model
//!
//! Defines the process descriptor and its state machine. Each descriptor
//! bundles everything the scheduler needs to park and resume one program:
//! its state, priority, entry function, saved stack pointer and the checksum
//! of its parked stack window.
//!
//! Scheduling-strategy specific bookkeeping (time slices, ages) is *not*
//! stored here; it lives with the strategies themselves.

use crate::config::MAX_PROCESSES;
use crate::stack::StackAddr;

/// Index of a process slot in the process table. Valid ids are
/// `0..MAX_PROCESSES`; slot 0 is always the idle process.
pub type ProcessId = u8;

/// The slot of the idle process. It is created during kernel initialization
/// and is the fallback whenever no other process is runnable.
pub const IDLE_PROCESS: ProcessId = 0;

/// Distinguished id meaning "no process". Never a valid table index.
pub const INVALID_PROCESS: ProcessId = 255;

/// Scheduling priority of a process. Higher numeric value means more
/// favourable. Certain strategies ignore it.
pub type Priority = u8;

/// Age of a process, maintained by the inactive-aging strategy.
pub type Age = u8;

/// Checksum over a process's parked stack window, used to detect stack
/// corruption between two dispatches.
pub type StackChecksum = u8;

/// Entry function of a process. A program may return; the dispatcher then
/// removes the process from the table.
pub type Program = extern "C" fn();

// ---------------------------------------------------------------------------
// Process state machine
// ---------------------------------------------------------------------------

/// Execution state of a process slot.
///
/// ```text
///   ┌──────────┐      exec       ┌─────────┐    dispatch    ┌─────────┐
///   │  Unused  │ ──────────────► │  Ready  │ ─────────────► │ Running │
///   └──────────┘                 └─────────┘ ◄───────────── └─────────┘
///        ▲                                      preempt          │
///        └───────────────────────────────────────────────────────┘
///                        program returned
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// The slot is free; `exec` may claim it.
    Unused,
    /// The process is waiting to be dispatched.
    Ready,
    /// The process currently owns the CPU. At most one slot is in this
    /// state while the scheduler is active.
    Running,
    /// The process is waiting for an event. No core operation produces this
    /// state; it is reserved for blocking primitives layered on top and is
    /// never selected by a strategy.
    Blocked,
}

// ---------------------------------------------------------------------------
// Process descriptor
// ---------------------------------------------------------------------------

/// One slot of the process table.
///
/// The descriptor does not own its stack memory; the stack window of slot
/// `pid` is a fixed SRAM range derived from `pid` alone (see the `stack`
/// module). While the process is parked, `sp` points into that window and
/// `checksum` covers every byte from `sp + 1` down to the window's bottom.
#[derive(Debug, Clone, Copy)]
pub struct Process {
    /// Current execution state.
    pub state: ProcessState,

    /// Scheduling priority.
    pub priority: Priority,

    /// Entry function this slot was created with. `None` iff the slot is
    /// unused, so a slot can never be dispatched without a program.
    pub program: Option<Program>,

    /// Saved stack pointer, hardware convention: holds the address one
    /// below the most recently pushed byte.
    pub sp: StackAddr,

    /// Checksum of the parked stack window, written at every context save
    /// and verified before every context restore.
    pub checksum: StackChecksum,
}

impl Process {
    /// An unused slot. Used to initialize the static table.
    pub const EMPTY: Process = Process {
        state: ProcessState::Unused,
        priority: 0,
        program: None,
        sp: 0,
        checksum: 0,
    };

    /// Returns the slot to the unused state so `exec` can claim it again.
    pub fn clear(&mut self) {
        *self = Process::EMPTY;
    }

    /// Whether the process can be selected to run.
    #[inline]
    pub fn is_runnable(&self) -> bool {
        matches!(self.state, ProcessState::Ready | ProcessState::Running)
    }
}

/// The process table: one descriptor per possible process, indexed by
/// [`ProcessId`]. Owned by the scheduler; strategies see it read-only.
pub type ProcessTable = [Process; MAX_PROCESSES];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_slot_is_not_runnable() {
        let slot = Process::EMPTY;
        assert_eq!(slot.state, ProcessState::Unused);
        assert!(slot.program.is_none());
        assert!(!slot.is_runnable());
    }

    #[test]
    fn ready_and_running_are_runnable() {
        let mut slot = Process::EMPTY;
        slot.state = ProcessState::Ready;
        assert!(slot.is_runnable());
        slot.state = ProcessState::Running;
        assert!(slot.is_runnable());
    }

    #[test]
    fn blocked_is_not_runnable() {
        let mut slot = Process::EMPTY;
        slot.state = ProcessState::Blocked;
        assert!(!slot.is_runnable());
    }

    #[test]
    fn clear_releases_the_slot() {
        extern "C" fn noop() {}
        let mut slot = Process::EMPTY;
        slot.state = ProcessState::Running;
        slot.priority = 7;
        slot.program = Some(noop);
        slot.clear();
        assert_eq!(slot.state, ProcessState::Unused);
        assert!(slot.program.is_none());
        assert_eq!(slot.priority, 0);
    }
}
