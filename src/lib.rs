//! # TickOS
//!
//! A small preemptive multitasking kernel for ATmega644-class
//! microcontrollers (4 KB SRAM, 64 KB flash, single core, no MMU).
//!
//! ## Overview
//!
//! TickOS runs up to eight processes — an always-present idle process plus
//! user programs — that share the CPU through periodic timer-driven context
//! switches. Every tick, the scheduler interrupt parks the running process
//! on its private stack, checks the stack for corruption, asks an
//! exchangeable strategy which process runs next, and resumes it.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    Programs (main.rs)                    │
//! ├─────────────────────────────────────────────────────────┤
//! │                 Kernel API (kernel.rs)                   │
//! │   init() · start() · exec() · enter/leave_critical()    │
//! ├───────────────┬───────────────────┬─────────────────────┤
//! │  Scheduler    │  Strategies       │  Critical gate      │
//! │  scheduler.rs │  strategies.rs    │  critical.rs        │
//! │  ─ exec()     │  ─ even/random    │  ─ nested entries   │
//! │  ─ reschedule │  ─ round-robin    │  ─ timer masking    │
//! │  ─ table      │  ─ aging/rtc      │  ─ flag snapshot    │
//! ├───────────────┴───────────────────┴─────────────────────┤
//! │        Process model & stacks (process.rs, stack.rs)     │
//! │     descriptors · stack windows · XOR-fold checksums     │
//! ├─────────────────────────────────────────────────────────┤
//! │           Arch port (arch/avr.rs, arch/sim.rs)           │
//! │   tick ISR · context frames · SREG/timer · error sink    │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Memory model
//!
//! - **No heap**: every kernel structure is statically allocated.
//! - **Fixed stack partition**: the upper half of SRAM holds the main
//!   stack, the ISR stack and eight equal process stacks at compile-time
//!   addresses.
//! - **One global scheduler**: all mutable kernel state sits in a single
//!   static, touched only with interrupts disabled.
//!
//! ## Testing
//!
//! The portable core — table, strategies, checksums, gate — runs unchanged
//! on the host against the simulation port, which is where the unit tests
//! live. Only the naked context-switch handler and the register accesses
//! are AVR-only.

#![no_std]
#![cfg_attr(target_arch = "avr", feature(asm_experimental_arch, abi_avr_interrupt))]

#[cfg(test)]
extern crate std;

pub mod arch;
pub mod autostart;
pub mod config;
pub mod critical;
pub mod error;
pub mod kernel;
pub mod process;
pub mod scheduler;
pub mod stack;
pub mod strategies;
pub mod sync;
pub mod time;
