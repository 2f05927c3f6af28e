//! # Scheduling Strategies
//!
//! The five exchangeable selection strategies and the bookkeeping they
//! maintain. A strategy is a function from the process table and the
//! currently running slot to the slot that runs next. Strategies never
//! mutate the table; everything they remember between invocations lives in
//! [`SchedulingInfo`], keyed by slot index.
//!
//! Common rules for all strategies:
//! - Only `Ready`/`Running` slots are candidates; `Blocked` counts as not
//!   runnable, exactly like `Unused`.
//! - The idle slot (0) is returned if and only if no other slot is runnable.
//! - Selection is dispatched through a closed enum rather than function
//!   pointers; it runs inside the scheduler interrupt.

use crate::config::MAX_PROCESSES;
use crate::process::{Age, Priority, ProcessId, ProcessTable, IDLE_PROCESS, INVALID_PROCESS};

/// The available scheduling strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulingStrategy {
    /// Cycle through the non-idle slots in ascending order.
    Even,
    /// Uniform random pick among the runnable non-idle slots.
    Random,
    /// Priority-weighted round-robin: a slot keeps the CPU for as many
    /// ticks as its priority.
    RoundRobin,
    /// Waiting slots age by their priority each tick; the oldest one wins.
    InactiveAging,
    /// The current slot keeps the CPU until it stops being runnable.
    RunToCompletion,
}

// ---------------------------------------------------------------------------
// Pseudo-random source
// ---------------------------------------------------------------------------

/// Multiplicative linear-congruential generator,
/// `state = state * 16807 mod (2^31 - 1)`, truncated to 15 bits per draw.
/// Deterministic and seeded to 1 on reset, so random-strategy schedules are
/// reproducible run over run.
#[derive(Debug, Clone, Copy)]
pub struct Lcg {
    state: u32,
}

impl Lcg {
    const MULTIPLIER: u32 = 16807;
    const MODULUS: u32 = 0x7FFF_FFFF;

    pub const fn new() -> Lcg {
        Lcg { state: 1 }
    }

    /// Next draw in `0..32768`.
    pub fn next(&mut self) -> u16 {
        // Schrage factorization keeps the product inside 32 bits.
        let hi = self.state / (Self::MODULUS / Self::MULTIPLIER);
        let lo = self.state % (Self::MODULUS / Self::MULTIPLIER);
        let mixed = (Self::MULTIPLIER * lo).wrapping_sub((Self::MODULUS % Self::MULTIPLIER) * hi);
        self.state = if mixed > Self::MODULUS { mixed.wrapping_add(Self::MODULUS) } else { mixed };
        (self.state % 32768) as u16
    }
}

// ---------------------------------------------------------------------------
// Strategy accounting
// ---------------------------------------------------------------------------

/// Bookkeeping private to the strategies, one entry per process slot.
///
/// Owned by the scheduler next to the process table, but only the selection
/// functions in this module read or write it. The entries of a slot must be
/// cleared whenever the slot changes tenant, so no age or remaining slice
/// leaks from a terminated process into its successor.
#[derive(Debug, Clone, Copy)]
pub struct SchedulingInfo {
    /// Remaining round-robin time slice per slot.
    slices: [Priority; MAX_PROCESSES],
    /// Inactive-aging age per slot.
    ages: [Age; MAX_PROCESSES],
    /// Pseudo-random source of the random strategy.
    rng: Lcg,
}

impl SchedulingInfo {
    pub const fn new() -> SchedulingInfo {
        SchedulingInfo {
            slices: [0; MAX_PROCESSES],
            ages: [0; MAX_PROCESSES],
            rng: Lcg::new(),
        }
    }

    /// Resets the accounting of one strategy to its initial values. Called
    /// whenever that strategy is (re)selected.
    pub fn reset_strategy(&mut self, strategy: SchedulingStrategy, table: &ProcessTable) {
        match strategy {
            SchedulingStrategy::Even | SchedulingStrategy::RunToCompletion => {}
            SchedulingStrategy::Random => self.rng = Lcg::new(),
            SchedulingStrategy::RoundRobin => {
                for (slice, slot) in self.slices.iter_mut().zip(table.iter()) {
                    *slice = slot.priority;
                }
            }
            SchedulingStrategy::InactiveAging => self.ages = [0; MAX_PROCESSES],
        }
    }

    /// Reinitializes the entries of one slot for a new tenant with the given
    /// priority. Used by `exec`; with a priority of zero it doubles as the
    /// cleanup when a process leaves the table.
    pub fn reset_slot(&mut self, pid: ProcessId, priority: Priority) {
        self.slices[pid as usize] = priority;
        self.ages[pid as usize] = 0;
    }
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// Runs the given strategy. Returns the slot to dispatch next, which is the
/// idle slot exactly when no non-idle slot is runnable.
pub fn select(
    strategy: SchedulingStrategy,
    table: &ProcessTable,
    current: ProcessId,
    info: &mut SchedulingInfo,
) -> ProcessId {
    match strategy {
        SchedulingStrategy::Even => select_even(table, current),
        SchedulingStrategy::Random => select_random(table, &mut info.rng),
        SchedulingStrategy::RoundRobin => select_round_robin(table, current, info),
        SchedulingStrategy::InactiveAging => select_inactive_aging(table, current, info),
        SchedulingStrategy::RunToCompletion => select_run_to_completion(table, current),
    }
}

/// Whether slot `pid` is a candidate for selection (runnable and not idle).
#[inline]
fn is_candidate(table: &ProcessTable, pid: ProcessId) -> bool {
    pid != IDLE_PROCESS && table[pid as usize].is_runnable()
}

/// The next runnable non-idle slot after `current` in ascending cyclic
/// order, `current` itself being the last candidate tried. Idle if none.
fn next_candidate_after(table: &ProcessTable, current: ProcessId) -> ProcessId {
    let rotation = MAX_PROCESSES - 1;
    let base = if current == IDLE_PROCESS {
        rotation - 1
    } else {
        current as usize - 1
    };
    for step in 1..=rotation {
        let candidate = ((base + step) % rotation + 1) as ProcessId;
        if is_candidate(table, candidate) {
            return candidate;
        }
    }
    IDLE_PROCESS
}

fn select_even(table: &ProcessTable, current: ProcessId) -> ProcessId {
    next_candidate_after(table, current)
}

fn select_random(table: &ProcessTable, rng: &mut Lcg) -> ProcessId {
    let runnable = (1..MAX_PROCESSES as ProcessId)
        .filter(|&pid| is_candidate(table, pid))
        .count() as u16;
    if runnable == 0 {
        return IDLE_PROCESS;
    }
    let mut remaining = rng.next() % runnable;
    for pid in 1..MAX_PROCESSES as ProcessId {
        if is_candidate(table, pid) {
            if remaining == 0 {
                return pid;
            }
            remaining -= 1;
        }
    }
    IDLE_PROCESS
}

fn select_round_robin(
    table: &ProcessTable,
    current: ProcessId,
    info: &mut SchedulingInfo,
) -> ProcessId {
    if is_candidate(table, current) {
        let slice = &mut info.slices[current as usize];
        *slice = slice.saturating_sub(1);
        if *slice > 0 {
            return current;
        }
    }
    let next = next_candidate_after(table, current);
    if next != IDLE_PROCESS {
        info.slices[next as usize] = table[next as usize].priority;
    }
    next
}

fn select_inactive_aging(
    table: &ProcessTable,
    current: ProcessId,
    info: &mut SchedulingInfo,
) -> ProcessId {
    // Everyone who waited grows older by their priority; the slot chosen
    // last time does not, its age was just reset.
    for pid in 1..MAX_PROCESSES as ProcessId {
        if pid != current && is_candidate(table, pid) {
            let age = &mut info.ages[pid as usize];
            *age = age.saturating_add(table[pid as usize].priority);
        }
    }

    let mut chosen = INVALID_PROCESS;
    for pid in 1..MAX_PROCESSES as ProcessId {
        if !is_candidate(table, pid) {
            continue;
        }
        if chosen == INVALID_PROCESS {
            chosen = pid;
            continue;
        }
        let key = (info.ages[pid as usize], table[pid as usize].priority);
        let best = (info.ages[chosen as usize], table[chosen as usize].priority);
        // Strictly-greater comparison keeps the lowest index on a full tie.
        if key > best {
            chosen = pid;
        }
    }

    if chosen == INVALID_PROCESS {
        return IDLE_PROCESS;
    }
    info.ages[chosen as usize] = table[chosen as usize].priority;
    chosen
}

fn select_run_to_completion(table: &ProcessTable, current: ProcessId) -> ProcessId {
    if is_candidate(table, current) {
        return current;
    }
    for pid in 1..MAX_PROCESSES as ProcessId {
        if is_candidate(table, pid) {
            return pid;
        }
    }
    IDLE_PROCESS
}
