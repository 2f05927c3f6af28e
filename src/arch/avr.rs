//! # ATmega644 Port
//!
//! The real-hardware implementation of the port interface: timer and button
//! bring-up through the `avr-device` peripheral access crate, raw SRAM
//! access for the stack region, and the context-switch machinery in naked
//! assembly.
//!
//! ## Context switch
//!
//! The scheduler interrupt (timer 2 compare match A) is a naked handler.
//! The hardware has already pushed the return address when it runs; the
//! handler pushes the 32 general registers and the status register on the
//! interrupted process's stack, moves the CPU to the dedicated ISR stack,
//! and hands the old stack pointer to the portable scheduler. Whatever
//! stack pointer comes back is loaded and unwound through the mirror-image
//! pop sequence, ending in `reti`, which restores the program counter and
//! re-enables interrupts in one step.
//!
//! The push order is fixed by this handler and must match the synthetic
//! frame written by `exec` byte for byte, or checksums break on the first
//! dispatch.

use crate::config::{ISR_STACK_BOTTOM, SCHEDULER_COMPARE};
use crate::stack::StackAddr;
use avr_device::atmega644::Peripherals;
use core::arch::{asm, naked_asm};
use core::cell::UnsafeCell;

// ---------------------------------------------------------------------------
// Hardware bring-up
// ---------------------------------------------------------------------------

/// Configures the timers and buttons. Timer 2 runs the scheduler in
/// clear-on-compare mode with a 1024 prescaler; timer 0 free-runs with a 256
/// prescaler for the system time. The global interrupt flag stays untouched:
/// scheduling begins when the first context restore executes `reti`.
pub fn init_hardware() {
    // Safety: called once at boot, before any interrupt can fire.
    let dp = unsafe { Peripherals::steal() };

    dp.TC2.tccr2a.modify(|_, w| w.wgm2().ctc());
    dp.TC2.tccr2b.modify(|_, w| w.cs2().prescale_1024());
    dp.TC2.ocr2a.write(|w| w.bits(SCHEDULER_COMPARE));
    dp.TC2.timsk2.modify(|_, w| w.ocie2a().set_bit());

    dp.TC0.tccr0b.modify(|_, w| w.cs0().prescale_256());
    dp.TC0.timsk0.modify(|_, w| w.toie0().set_bit());

    // Confirmation buttons on PC0/PC1/PC6/PC7: inputs with pull-ups.
    dp.PORTC.ddrc.modify(|r, w| w.bits(r.bits() & !BUTTON_MASK));
    dp.PORTC.portc.modify(|r, w| w.bits(r.bits() | BUTTON_MASK));
}

// ---------------------------------------------------------------------------
// Interrupt flag and scheduler timer
// ---------------------------------------------------------------------------

pub fn interrupts_enabled() -> bool {
    let sreg: u8;
    unsafe { asm!("in {0}, 0x3F", out(reg) sreg) };
    sreg & 0x80 != 0
}

pub fn enable_interrupts() {
    // Safety: the kernel only enables interrupts at points where its state
    // is consistent (dispatcher entry, end of gate bookkeeping).
    unsafe { avr_device::interrupt::enable() };
}

pub fn disable_interrupts() {
    avr_device::interrupt::disable();
}

pub fn restore_interrupts(enabled: bool) {
    if enabled {
        enable_interrupts();
    }
}

pub fn arm_scheduler_timer() {
    let dp = unsafe { Peripherals::steal() };
    dp.TC2.timsk2.modify(|_, w| w.ocie2a().set_bit());
}

pub fn disarm_scheduler_timer() {
    let dp = unsafe { Peripherals::steal() };
    dp.TC2.timsk2.modify(|_, w| w.ocie2a().clear_bit());
}

pub fn scheduler_timer_armed() -> bool {
    let dp = unsafe { Peripherals::steal() };
    dp.TC2.timsk2.read().ocie2a().bit_is_set()
}

// ---------------------------------------------------------------------------
// Stack region
// ---------------------------------------------------------------------------

pub fn stack_read(addr: StackAddr) -> u8 {
    unsafe { core::ptr::read_volatile(addr as *const u8) }
}

pub fn stack_write(addr: StackAddr, value: u8) {
    unsafe { core::ptr::write_volatile(addr as *mut u8, value) }
}

// ---------------------------------------------------------------------------
// System-time timer
// ---------------------------------------------------------------------------

struct OverflowCell(UnsafeCell<u32>);

// Safety: written only from the overflow interrupt (interrupts disabled),
// read under `sync::critical`.
unsafe impl Sync for OverflowCell {}

static TIMER_OVERFLOWS: OverflowCell = OverflowCell(UnsafeCell::new(0));

pub fn timer_overflows() -> u32 {
    crate::sync::critical(|| unsafe { *TIMER_OVERFLOWS.0.get() })
}

pub fn reset_timer_overflows() {
    crate::sync::critical(|| unsafe { *TIMER_OVERFLOWS.0.get() = 0 });
}

/// Timer 0 overflow: one tick of the system time.
#[export_name = "__vector_18"]
extern "avr-interrupt" fn system_timer_overflow() {
    unsafe { *TIMER_OVERFLOWS.0.get() += 1 };
}

// ---------------------------------------------------------------------------
// Error sink plumbing
// ---------------------------------------------------------------------------

const BUTTON_MASK: u8 = 0xC3;

/// The message already went through the log facade; a display-backed logger
/// is the firmware's reporting channel.
pub fn report_fatal(_message: core::fmt::Arguments<'_>) {}

/// Blocks until any button is pressed and released again.
pub fn wait_for_confirmation() {
    let dp = unsafe { Peripherals::steal() };
    while dp.PORTC.pinc.read().bits() & BUTTON_MASK == BUTTON_MASK {}
    while dp.PORTC.pinc.read().bits() & BUTTON_MASK != BUTTON_MASK {}
}

// ---------------------------------------------------------------------------
// Code addresses and CPU glue
// ---------------------------------------------------------------------------

/// The 16-bit code word for a synthetic stack frame. Return addresses on
/// this CPU are word-granular, so the byte address is halved.
pub fn code_word(entry: usize) -> u16 {
    (entry >> 1) as u16
}

pub fn idle_relax() {
    avr_device::asm::nop();
}

/// Dispatches the very first process: loads its saved stack pointer and
/// leaves through the ordinary context-restore path. `reti` enables
/// interrupts, which arms preemption from the first instruction on.
///
/// # Safety
/// `sp` must be the parked stack pointer of a ready process whose frame was
/// written by `exec`. Never returns.
#[unsafe(naked)]
pub unsafe extern "C" fn start_first_process(sp: StackAddr) -> ! {
    naked_asm!(
        "out 0x3D, r24",
        "out 0x3E, r25",
        "pop r0\npop r1\npop r2\npop r3\npop r4\npop r5\npop r6\npop r7",
        "pop r8\npop r9\npop r10\npop r11\npop r12\npop r13\npop r14\npop r15",
        "pop r16\npop r17\npop r18\npop r19\npop r20\npop r21\npop r22\npop r23",
        "pop r24\npop r25\npop r26\npop r27\npop r28\npop r29\npop r30",
        "pop r31",
        "out 0x3F, r31",
        "pop r31",
        "reti",
    );
}

// ---------------------------------------------------------------------------
// Scheduler interrupt
// ---------------------------------------------------------------------------

/// Timer 2 compare match A: the preemption point.
#[export_name = "__vector_9"]
#[unsafe(naked)]
unsafe extern "C" fn scheduler_tick() {
    naked_asm!(
        // Save the full register context on the interrupted process's
        // stack: r31, status register, r30..r0. r1 is the compiler's zero
        // register and gets cleared for the Rust code called below.
        "push r31",
        "in r31, 0x3F",
        "cli",
        "push r31",
        "push r30\npush r29\npush r28\npush r27\npush r26\npush r25\npush r24",
        "push r23\npush r22\npush r21\npush r20\npush r19\npush r18\npush r17",
        "push r16\npush r15\npush r14\npush r13\npush r12\npush r11\npush r10",
        "push r9\npush r8\npush r7\npush r6\npush r5\npush r4\npush r3",
        "push r2\npush r1",
        "clr r1",
        "push r0",
        // Hand the saved stack pointer to the scheduler and continue on the
        // dedicated ISR stack.
        "in r24, 0x3D",
        "in r25, 0x3E",
        "ldi r30, {isr_lo}",
        "out 0x3D, r30",
        "ldi r30, {isr_hi}",
        "out 0x3E, r30",
        "call {reschedule}",
        // Resume whichever process the scheduler chose; the pop sequence
        // mirrors the pushes above and reti restores the program counter.
        "out 0x3D, r24",
        "out 0x3E, r25",
        "pop r0\npop r1\npop r2\npop r3\npop r4\npop r5\npop r6\npop r7",
        "pop r8\npop r9\npop r10\npop r11\npop r12\npop r13\npop r14\npop r15",
        "pop r16\npop r17\npop r18\npop r19\npop r20\npop r21\npop r22\npop r23",
        "pop r24\npop r25\npop r26\npop r27\npop r28\npop r29\npop r30",
        "pop r31",
        "out 0x3F, r31",
        "pop r31",
        "reti",
        isr_lo = const ISR_STACK_BOTTOM & 0xFF,
        isr_hi = const ISR_STACK_BOTTOM >> 8,
        reschedule = sym crate::kernel::isr_reschedule,
    );
}
