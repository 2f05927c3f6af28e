//! # Scheduler
//!
//! The scheduler owns the process table, the id of the running process, the
//! active strategy with its accounting and the critical-section gate. It is
//! instantiated exactly once, as the kernel's global state; everything here
//! works on `&mut self` and leaves the question of how that reference is
//! obtained safely to the `kernel` module.
//!
//! ## Tick path
//!
//! [`Scheduler::reschedule`] is the portable middle of the scheduler
//! interrupt. The surrounding architecture code has already pushed the full
//! register context onto the interrupted process's stack and moved execution
//! to the dedicated ISR stack; it passes the resulting stack pointer in and
//! gets the next process's stack pointer back. The order inside is fixed:
//! park the running process (store stack pointer, store checksum), run the
//! strategy, verify the incoming process's stack integrity, then publish it
//! as running.

use crate::autostart::Autostart;
use crate::config::DEFAULT_PRIORITY;
use crate::critical::CriticalGate;
use crate::error;
use crate::process::{
    Priority, Process, ProcessId, ProcessState, ProcessTable, Program, StackChecksum,
    IDLE_PROCESS,
};
use crate::stack::{self, StackAddr, StackWindow};
use crate::strategies::{self, SchedulingInfo, SchedulingStrategy};

/// Why `exec` could not create a process. A full table is an expected
/// runtime condition, reported to the caller rather than to the error sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecError {
    /// Every slot of the process table is in use.
    NoFreeSlot,
}

/// The central scheduler state.
pub struct Scheduler {
    /// One descriptor per possible process; slot 0 is the idle process.
    pub table: ProcessTable,

    /// Id of the process owning the CPU. Always the single slot in the
    /// `Running` state while scheduling is active.
    pub current: ProcessId,

    /// The strategy consulted at every tick.
    strategy: SchedulingStrategy,

    /// Accounting private to the strategies.
    info: SchedulingInfo,

    /// Critical-section gate holding off the scheduler timer.
    pub(crate) gate: CriticalGate,
}

impl Scheduler {
    pub const fn new() -> Scheduler {
        Scheduler {
            table: [Process::EMPTY; crate::config::MAX_PROCESSES],
            current: IDLE_PROCESS,
            strategy: SchedulingStrategy::Even,
            info: SchedulingInfo::new(),
            gate: CriticalGate::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Initialization
    // -----------------------------------------------------------------------

    /// Builds the initial process table: the idle program at slot 0, then
    /// every autostart program in registration order. Called once at boot,
    /// before the scheduler timer is armed.
    pub fn init(&mut self, idle: Program, autostart: &Autostart) {
        for slot in self.table.iter_mut() {
            slot.clear();
        }
        self.current = IDLE_PROCESS;

        if self.exec(idle, DEFAULT_PRIORITY) != Ok(IDLE_PROCESS) {
            error::fatal(format_args!("idle process did not land in slot 0"));
        }
        for program in autostart.iter() {
            if let Err(err) = self.exec(program, DEFAULT_PRIORITY) {
                log::warn!("autostart program dropped: {:?}", err);
            }
        }
        log::info!("process table ready, strategy {:?}", self.strategy);
    }

    // -----------------------------------------------------------------------
    // Process creation
    // -----------------------------------------------------------------------

    /// Creates a process for `program` in the lowest unused slot and makes
    /// it ready for dispatch.
    ///
    /// The slot's stack receives a synthetic saved context whose
    /// program-counter word points at the dispatcher, so the first dispatch
    /// leaves the scheduler interrupt through the ordinary restore path.
    /// Safe to call from any process and from inside critical sections; the
    /// gate is held while the descriptor is half-built and released on
    /// every return path.
    pub fn exec(&mut self, program: Program, priority: Priority) -> Result<ProcessId, ExecError> {
        self.gate.enter();

        let Some(free) = self.table.iter().position(|p| p.state == ProcessState::Unused) else {
            self.gate.leave();
            log::debug!("exec rejected: no free slot");
            return Err(ExecError::NoFreeSlot);
        };
        let pid = free as ProcessId;

        let window = StackWindow::of(pid);
        let sp = stack::write_initial_frame(window, crate::kernel::dispatcher_entry_word());

        let slot = &mut self.table[free];
        slot.priority = priority;
        slot.program = Some(program);
        slot.sp = sp;
        slot.checksum = stack::checksum(window, sp);
        self.info.reset_slot(pid, priority);
        // Publish last: the slot only becomes visible to the strategies
        // once every other field is in place.
        slot.state = ProcessState::Ready;

        self.gate.leave();
        Ok(pid)
    }

    /// Removes the running process from the table. Called by the dispatcher
    /// when a program returns; the freed slot is immediately reusable by
    /// `exec` and its strategy accounting is cleared.
    pub fn exit_current(&mut self) {
        let pid = self.current;
        self.table[pid as usize].clear();
        self.info.reset_slot(pid, 0);
    }

    // -----------------------------------------------------------------------
    // Tick path
    // -----------------------------------------------------------------------

    /// Scheduling decision between context save and context restore.
    ///
    /// `saved_sp` is the hardware stack pointer after the interrupted
    /// process's context was pushed; the return value is the stack pointer
    /// to restore from. A checksum mismatch on the incoming process is
    /// reported as fatal per slot; after acknowledgement scheduling
    /// continues and the next context save overwrites the stored checksum.
    pub fn reschedule(&mut self, saved_sp: StackAddr) -> StackAddr {
        let running = &mut self.table[self.current as usize];
        running.sp = saved_sp;
        running.checksum = stack::checksum(StackWindow::of(self.current), saved_sp);
        if running.state == ProcessState::Running {
            running.state = ProcessState::Ready;
        }

        let next = strategies::select(self.strategy, &self.table, self.current, &mut self.info);

        let incoming = &self.table[next as usize];
        if stack::checksum(StackWindow::of(next), incoming.sp) != incoming.checksum {
            error::fatal(format_args!("stack checksum mismatch: process {}", next));
        }

        self.table[next as usize].state = ProcessState::Running;
        self.current = next;
        self.table[next as usize].sp
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// The descriptor of process `pid`.
    pub fn slot(&self, pid: ProcessId) -> &Process {
        &self.table[pid as usize]
    }

    /// The entry function of the running process, if its slot still holds
    /// one. Consulted by the dispatcher on first dispatch.
    pub fn current_program(&self) -> Option<Program> {
        self.table[self.current as usize].program
    }

    /// Freshly computed checksum over the parked stack window of `pid`.
    pub fn stack_checksum(&self, pid: ProcessId) -> StackChecksum {
        stack::checksum(StackWindow::of(pid), self.table[pid as usize].sp)
    }

    /// Switches the selection strategy. The new strategy starts from its
    /// initial accounting.
    pub fn set_strategy(&mut self, strategy: SchedulingStrategy) {
        self.strategy = strategy;
        self.info.reset_strategy(strategy, &self.table);
        log::debug!("strategy switched to {:?}", strategy);
    }

    /// The currently active selection strategy.
    pub fn strategy(&self) -> SchedulingStrategy {
        self.strategy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::{port, sim};
    use crate::config::MAX_PROCESSES;
    use crate::kernel;

    extern "C" fn infinite_loop() {}
    extern "C" fn other_program() {}

    fn fresh() -> Scheduler {
        Scheduler::new()
    }

    #[test]
    fn exec_rejects_a_full_table() {
        let _guard = sim::testing::exclusive();
        sim::testing::reset();

        let mut scheduler = fresh();
        for slot in scheduler.table.iter_mut() {
            slot.state = ProcessState::Ready;
        }
        assert_eq!(
            scheduler.exec(infinite_loop, DEFAULT_PRIORITY),
            Err(ExecError::NoFreeSlot)
        );
        // The gate is balanced on the failure path as well.
        assert_eq!(scheduler.gate.depth(), 0);
        assert_eq!(sim::fatal_count(), 0);
    }

    #[test]
    fn exec_fills_the_lowest_free_slot_first() {
        let _guard = sim::testing::exclusive();
        sim::testing::reset();

        let mut scheduler = fresh();
        for expected in 0..MAX_PROCESSES as ProcessId {
            assert_eq!(scheduler.exec(infinite_loop, DEFAULT_PRIORITY), Ok(expected));
        }
        // A vacated slot in the middle is reused before anything else.
        scheduler.table[2].clear();
        assert_eq!(scheduler.exec(infinite_loop, DEFAULT_PRIORITY), Ok(2));
        assert_eq!(scheduler.gate.depth(), 0);
    }

    #[test]
    fn exec_postconditions_and_frame_layout() {
        let _guard = sim::testing::exclusive();
        sim::testing::reset();

        let mut scheduler = fresh();
        let pid = scheduler.exec(infinite_loop, 10).unwrap();
        assert_eq!(pid, 0);

        let window = StackWindow::of(pid);
        let slot = scheduler.slot(pid);
        assert_eq!(slot.state, ProcessState::Ready);
        assert_eq!(slot.priority, 10);
        assert_eq!(slot.program, Some(infinite_loop as Program));
        assert_eq!(slot.sp, window.bottom - 35);
        assert!(window.contains(slot.sp));

        for offset in 1..=33 {
            assert_eq!(port::stack_read(slot.sp + offset), 0);
        }
        let entry = kernel::dispatcher_entry_word();
        assert_eq!(port::stack_read(slot.sp + 34), (entry >> 8) as u8);
        assert_eq!(port::stack_read(slot.sp + 35), entry as u8);

        // Stored checksum matches a fresh fold over the parked window.
        assert_eq!(slot.checksum, scheduler.stack_checksum(pid));
    }

    #[test]
    fn init_builds_idle_plus_autostart_in_registration_order() {
        let _guard = sim::testing::exclusive();
        sim::testing::reset();

        let mut autostart = Autostart::new();
        autostart.push(infinite_loop).unwrap();
        autostart.push(other_program).unwrap();

        extern "C" fn idle() {}
        let mut scheduler = fresh();
        scheduler.init(idle, &autostart);

        assert_eq!(scheduler.slot(0).state, ProcessState::Ready);
        assert_eq!(scheduler.slot(0).priority, DEFAULT_PRIORITY);
        assert_eq!(scheduler.slot(0).program, Some(idle as Program));
        assert_eq!(scheduler.slot(1).program, Some(infinite_loop as Program));
        assert_eq!(scheduler.slot(2).program, Some(other_program as Program));
        for pid in 3..MAX_PROCESSES as ProcessId {
            assert_eq!(scheduler.slot(pid).state, ProcessState::Unused);
        }
        assert_eq!(sim::fatal_count(), 0);
    }

    #[test]
    fn reschedule_rotates_and_keeps_one_running() {
        let _guard = sim::testing::exclusive();
        sim::testing::reset();

        extern "C" fn idle() {}
        let mut scheduler = fresh();
        let autostart = Autostart::new();
        scheduler.init(idle, &autostart);
        scheduler.exec(infinite_loop, 2).unwrap();
        scheduler.exec(infinite_loop, 2).unwrap();
        scheduler.exec(infinite_loop, 2).unwrap();

        scheduler.current = 1;
        scheduler.table[1].state = ProcessState::Running;

        let mut picks = [0; 6];
        for pick in picks.iter_mut() {
            let sp = scheduler.table[scheduler.current as usize].sp;
            let next_sp = scheduler.reschedule(sp);
            *pick = scheduler.current;
            assert_eq!(next_sp, scheduler.table[scheduler.current as usize].sp);

            let running = scheduler
                .table
                .iter()
                .filter(|p| p.state == ProcessState::Running)
                .count();
            assert_eq!(running, 1);
        }
        assert_eq!(picks, [2, 3, 1, 2, 3, 1]);
        assert_eq!(sim::fatal_count(), 0);
    }

    #[test]
    fn corrupted_stack_is_detected_on_dispatch() {
        let _guard = sim::testing::exclusive();
        sim::testing::reset();

        extern "C" fn idle() {}
        let mut scheduler = fresh();
        let autostart = Autostart::new();
        scheduler.init(idle, &autostart);
        scheduler.exec(infinite_loop, 2).unwrap();
        scheduler.exec(infinite_loop, 2).unwrap();

        scheduler.current = 1;
        scheduler.table[1].state = ProcessState::Running;

        // Flip one bit inside process 2's parked window.
        let parked = scheduler.table[2].sp;
        port::stack_write(parked + 5, port::stack_read(parked + 5) ^ 0x10);

        let sp = scheduler.table[1].sp;
        scheduler.reschedule(sp);
        assert_eq!(scheduler.current, 2);
        assert_eq!(sim::fatal_count(), 1);
        assert!(sim::last_fatal_contains("process 2"));
    }

    #[test]
    fn flips_outside_the_window_go_unnoticed() {
        let _guard = sim::testing::exclusive();
        sim::testing::reset();

        extern "C" fn idle() {}
        let mut scheduler = fresh();
        let autostart = Autostart::new();
        scheduler.init(idle, &autostart);
        scheduler.exec(infinite_loop, 2).unwrap();
        scheduler.exec(infinite_loop, 2).unwrap();
        scheduler.current = 1;
        scheduler.table[1].state = ProcessState::Running;

        // At the saved stack pointer itself (one below the pushed context).
        let parked = scheduler.table[2].sp;
        port::stack_write(parked, port::stack_read(parked) ^ 0x01);
        // And past the window bottom, in foreign memory.
        let bottom = StackWindow::of(2).bottom;
        port::stack_write(bottom + 1, port::stack_read(bottom + 1) ^ 0x01);

        scheduler.reschedule(scheduler.table[1].sp);
        assert_eq!(scheduler.current, 2);
        assert_eq!(sim::fatal_count(), 0);
    }

    #[test]
    fn compensating_double_flip_goes_unnoticed() {
        let _guard = sim::testing::exclusive();
        sim::testing::reset();

        extern "C" fn idle() {}
        let mut scheduler = fresh();
        let autostart = Autostart::new();
        scheduler.init(idle, &autostart);
        scheduler.exec(infinite_loop, 2).unwrap();
        scheduler.exec(infinite_loop, 2).unwrap();
        scheduler.current = 1;
        scheduler.table[1].state = ProcessState::Running;

        let parked = scheduler.table[2].sp;
        port::stack_write(parked + 3, port::stack_read(parked + 3) ^ 0x08);
        port::stack_write(parked + 9, port::stack_read(parked + 9) ^ 0x08);

        scheduler.reschedule(scheduler.table[1].sp);
        assert_eq!(scheduler.current, 2);
        assert_eq!(sim::fatal_count(), 0);
    }

    #[test]
    fn termination_between_ticks_is_tolerated() {
        let _guard = sim::testing::exclusive();
        sim::testing::reset();

        extern "C" fn idle() {}
        let mut scheduler = fresh();
        let autostart = Autostart::new();
        scheduler.init(idle, &autostart);
        scheduler.exec(infinite_loop, 2).unwrap();
        scheduler.exec(infinite_loop, 2).unwrap();

        scheduler.current = 1;
        scheduler.table[1].state = ProcessState::Running;
        scheduler.exit_current();
        assert_eq!(scheduler.slot(1).state, ProcessState::Unused);

        // The next tick skips the vacated slot and the slot is reusable.
        scheduler.reschedule(scheduler.table[1].sp);
        assert_eq!(scheduler.current, 2);
        assert_eq!(scheduler.exec(other_program, 4), Ok(1));
    }

    #[test]
    fn set_strategy_restarts_its_accounting() {
        let _guard = sim::testing::exclusive();
        sim::testing::reset();

        extern "C" fn idle() {}
        let mut scheduler = fresh();
        let autostart = Autostart::new();
        scheduler.init(idle, &autostart);
        scheduler.exec(infinite_loop, 3).unwrap();
        scheduler.current = 1;
        scheduler.table[1].state = ProcessState::Running;

        scheduler.set_strategy(SchedulingStrategy::RoundRobin);
        assert_eq!(scheduler.strategy(), SchedulingStrategy::RoundRobin);

        // A fresh slice of 3 keeps slot 1 in place for two more ticks.
        scheduler.reschedule(scheduler.table[1].sp);
        assert_eq!(scheduler.current, 1);
        scheduler.reschedule(scheduler.table[1].sp);
        assert_eq!(scheduler.current, 1);
        scheduler.reschedule(scheduler.table[1].sp);
        assert_eq!(scheduler.current, 1);
    }
}
