//! # Kernel
//!
//! The single global scheduler instance and the public API around it. All
//! kernel state lives in one static [`Scheduler`]; this module hands out
//! access to it only inside interrupts-disabled regions and owns the two
//! pieces of glue code that are processes rather than kernel paths: the
//! dispatcher trampoline and the idle program.
//!
//! ## Startup sequence
//!
//! ```text
//! main()
//!   ├─► autostart::register(...)   ← collect programs (×N)
//!   ├─► kernel::init()             ← timers, buttons, process table
//!   └─► kernel::start()            ← dispatch idle, never returns
//!         └─ first `reti` enables interrupts; preemption is live
//! ```

use crate::arch::port;
use crate::autostart;
use crate::process::{Priority, ProcessId, ProcessState, Program, StackChecksum, IDLE_PROCESS};
use crate::scheduler::{ExecError, Scheduler};
use crate::strategies::SchedulingStrategy;
use crate::sync;
use crate::time;
use core::cell::UnsafeCell;

struct KernelCell(UnsafeCell<Scheduler>);

// Safety: mutable access is confined to interrupts-disabled regions — either
// `with`, the scheduler interrupt itself, or the gate functions, which mask
// before they touch anything.
unsafe impl Sync for KernelCell {}

static KERNEL: KernelCell = KernelCell(UnsafeCell::new(Scheduler::new()));

/// Runs `f` on the global scheduler with interrupts disabled. This is the
/// token every thread-context access to kernel state goes through.
pub fn with<R>(f: impl FnOnce(&mut Scheduler) -> R) -> R {
    sync::critical(|| unsafe { f(&mut *KERNEL.0.get()) })
}

// ---------------------------------------------------------------------------
// Boot
// ---------------------------------------------------------------------------

/// Brings up the hardware and builds the process table: the idle program in
/// slot 0, then every registered autostart program in registration order.
/// Must run before [`start`], with interrupts still disabled from reset.
pub fn init() {
    port::init_hardware();
    time::reset();
    let autostart = autostart::snapshot();
    with(|k| k.init(idle, &autostart));
}

/// Starts concurrent execution. The idle process becomes the running
/// process and the CPU leaves through the context-restore path, which also
/// turns interrupts — and with them preemption — on. Never returns.
pub fn start() -> ! {
    let sp = with(|k| {
        k.current = IDLE_PROCESS;
        k.table[IDLE_PROCESS as usize].state = ProcessState::Running;
        k.table[IDLE_PROCESS as usize].sp
    });
    log::info!("handing over to the idle process");
    unsafe { port::start_first_process(sp) }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Creates a new process. See [`Scheduler::exec`].
///
/// Deliberately not routed through [`with`]: the critical-section gate
/// inside must observe the caller's interrupt flag, not a wrapper's.
pub fn exec(program: Program, priority: Priority) -> Result<ProcessId, ExecError> {
    unsafe { (*KERNEL.0.get()).exec(program, priority) }
}

/// Enters a scheduler-masking critical section. Nestable; see the
/// `critical` module.
pub fn enter_critical() {
    // Same rule as `exec`: the gate snapshots the caller's interrupt flag.
    unsafe { (*KERNEL.0.get()).gate.enter() }
}

/// Leaves a critical section entered with [`enter_critical`].
pub fn leave_critical() {
    unsafe { (*KERNEL.0.get()).gate.leave() }
}

/// Current critical-section nesting depth.
pub fn critical_depth() -> u8 {
    with(|k| k.gate.depth())
}

/// Id of the currently running process.
pub fn current_pid() -> ProcessId {
    with(|k| k.current)
}

/// Switches the scheduling strategy; its accounting restarts.
pub fn set_strategy(strategy: SchedulingStrategy) {
    with(|k| k.set_strategy(strategy));
}

/// The active scheduling strategy.
pub fn strategy() -> SchedulingStrategy {
    with(|k| k.strategy())
}

/// Fresh checksum over the parked stack window of `pid`.
pub fn stack_checksum(pid: ProcessId) -> StackChecksum {
    with(|k| k.stack_checksum(pid))
}

// ---------------------------------------------------------------------------
// Dispatcher and idle
// ---------------------------------------------------------------------------

/// The code word `exec` plants in every synthetic stack frame: the first
/// dispatch of any process lands in [`dispatcher`].
pub(crate) fn dispatcher_entry_word() -> u16 {
    port::code_word(dispatcher as usize)
}

/// First-run glue. A new process's synthetic frame returns from the
/// scheduler interrupt straight into this function, which enables
/// interrupts unconditionally and enters the program. A program that
/// returns is removed from the table; the emptied slot is reusable
/// immediately, and the CPU is taken away at the next tick.
extern "C" fn dispatcher() -> ! {
    port::enable_interrupts();
    let program = with(|k| k.current_program());
    if let Some(run) = program {
        run();
    }
    with(|k| k.exit_current());
    loop {
        port::idle_relax();
    }
}

/// The idle process. Owns the CPU whenever nothing else is runnable and
/// must never return.
extern "C" fn idle() {
    loop {
        port::idle_relax();
    }
}

// ---------------------------------------------------------------------------
// Interrupt entry
// ---------------------------------------------------------------------------

/// Portable middle of the context-switch interrupt; called from the naked
/// handler with the interrupted process's stack pointer, returns the next
/// process's stack pointer.
///
/// # Safety
/// Only the scheduler interrupt may call this: it runs with interrupts
/// disabled and no other reference into the kernel alive.
#[cfg(target_arch = "avr")]
pub(crate) unsafe extern "C" fn isr_reschedule(saved_sp: u16) -> u16 {
    (*KERNEL.0.get()).reschedule(saved_sp)
}

#[cfg(test)]
pub(crate) fn reset_for_test() {
    sync::critical(|| unsafe { *KERNEL.0.get() = Scheduler::new() });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::sim;
    use crate::config::DEFAULT_PRIORITY;

    extern "C" fn looper() {}
    extern "C" fn other() {}

    #[test]
    fn boot_builds_idle_and_autostart_slots() {
        let _guard = sim::testing::exclusive();
        sim::testing::reset();

        autostart::register(looper).unwrap();
        autostart::register(other).unwrap();
        init();

        with(|k| {
            assert_eq!(k.slot(0).state, ProcessState::Ready);
            assert_eq!(k.slot(0).priority, DEFAULT_PRIORITY);
            assert_eq!(k.slot(1).program, Some(looper as Program));
            assert_eq!(k.slot(2).program, Some(other as Program));
        });
        assert_eq!(current_pid(), IDLE_PROCESS);
        assert!(port::scheduler_timer_armed());
    }

    #[test]
    fn exec_through_the_public_api() {
        let _guard = sim::testing::exclusive();
        sim::testing::reset();

        init();
        let pid = exec(looper, 5).unwrap();
        assert_eq!(pid, 1);
        assert_eq!(stack_checksum(pid), with(|k| k.slot(pid).checksum));
        assert_eq!(critical_depth(), 0);
    }

    #[test]
    fn critical_sections_nest_and_preserve_the_flag() {
        let _guard = sim::testing::exclusive();
        sim::testing::reset();

        init();
        port::enable_interrupts();
        enter_critical();
        enter_critical();
        assert_eq!(critical_depth(), 2);
        assert!(!port::scheduler_timer_armed());
        leave_critical();
        leave_critical();
        assert_eq!(critical_depth(), 0);
        assert!(port::scheduler_timer_armed());
        assert!(port::interrupts_enabled());
    }

    #[test]
    fn strategy_can_be_switched_at_runtime() {
        let _guard = sim::testing::exclusive();
        sim::testing::reset();

        init();
        assert_eq!(strategy(), SchedulingStrategy::Even);
        set_strategy(SchedulingStrategy::InactiveAging);
        assert_eq!(strategy(), SchedulingStrategy::InactiveAging);
    }

    #[test]
    fn dispatcher_word_is_stable() {
        assert_eq!(dispatcher_entry_word(), dispatcher_entry_word());
    }
}
