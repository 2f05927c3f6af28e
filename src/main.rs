//! # TickOS Demo Firmware
//!
//! Four autostarted busy-loop programs sharing the CPU under the default
//! strategy. Each program increments its own counter and naps on the
//! system clock, so a debugger (or a logic analyzer on the counters'
//! addresses) shows the interleaving the scheduler produces.
//!
//! On non-AVR targets this binary is an empty stub; the kernel library and
//! its test suite are the host-facing surface.

#![cfg_attr(target_arch = "avr", no_std)]
#![cfg_attr(target_arch = "avr", no_main)]

#[cfg(target_arch = "avr")]
mod firmware {
    use panic_halt as _;

    use tickos::autostart;
    use tickos::kernel;
    use tickos::time;

    static mut COUNTERS: [u32; 4] = [0; 4];

    extern "C" fn worker_a() {
        loop {
            unsafe { COUNTERS[0] = COUNTERS[0].wrapping_add(1) };
            time::delay_ms(100);
        }
    }

    extern "C" fn worker_b() {
        loop {
            unsafe { COUNTERS[1] = COUNTERS[1].wrapping_add(1) };
            time::delay_ms(100);
        }
    }

    extern "C" fn worker_c() {
        loop {
            unsafe { COUNTERS[2] = COUNTERS[2].wrapping_add(1) };
            time::delay_ms(100);
        }
    }

    /// Runs once and terminates: the dispatcher reclaims the slot, leaving
    /// room to observe `exec` into a vacated slot from a debugger.
    extern "C" fn one_shot() {
        unsafe { COUNTERS[3] = 1 };
    }

    #[avr_device::entry]
    fn main() -> ! {
        autostart::register(worker_a).unwrap();
        autostart::register(worker_b).unwrap();
        autostart::register(worker_c).unwrap();
        autostart::register(one_shot).unwrap();

        kernel::init();
        kernel::start()
    }
}

#[cfg(not(target_arch = "avr"))]
fn main() {}
