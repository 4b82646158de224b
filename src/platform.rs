//! # Collaborator Contracts
//!
//! The scheduler reaches the rest of the firmware only through these traits.
//! The board support code implements them once; tests implement them with
//! simulated clocks and counters.

/// Free-running timer used to measure task and cycle durations.
///
/// Ticks are whatever unit the timing budgets are expressed in. The counter
/// may wrap; durations are computed with `wrapping_sub`.
pub trait CycleClock {
    fn now(&mut self) -> u32;

    /// Ticks elapsed since `start`.
    #[inline]
    fn elapsed_since(&mut self, start: u32) -> u32 {
        self.now().wrapping_sub(start)
    }
}

/// Why an RT cycle was escalated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OvertimeCause {
    /// The cycle reached the peak budget.
    Peak,
    /// The next tick request arrived before the cycle finished.
    TickOverrun,
    /// Too many consecutive cycles above the max budget.
    Sustained,
}

/// Details handed to the overtime handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OvertimeReport {
    pub cause: OvertimeCause,
    /// Duration of the offending cycle
    pub cycle_time: u32,
    /// Hysteresis counter at the time of escalation
    pub over_slots: u32,
    /// `free_running_ticks` of the offending cycle
    pub tick: u32,
}

/// Everything the RT pass needs from the board, apart from the status word.
///
/// All methods are called from the RT context and must return promptly.
pub trait RtPlatform: CycleClock {
    /// True if another tick request is already pending.
    fn tick_pending(&mut self) -> bool;

    /// Per-cycle safety checks (reset button debounce, power-fail
    /// detection). May reset the board and never return.
    fn safety_checks(&mut self);

    /// True if the PLC runtime is active and can shed load.
    fn plc_active(&self) -> bool;

    /// Ask the PLC runtime to shed load after an overtime event.
    fn plc_overtime(&mut self, report: &OvertimeReport);

    /// Overtime with nobody to shed load: enter the non-recoverable
    /// diagnostic state. Implementations usually do not return; if they do,
    /// the RT pass carries on with the next tick.
    fn fatal_overtime(&mut self, report: &OvertimeReport);
}

/// Boot progress display (7-segment, LEDs) driven by the init dispatcher.
pub trait ProgressIndicator {
    /// Show the 1-based number of the init step about to run.
    fn show_step(&mut self, step: usize);
}

impl ProgressIndicator for () {
    fn show_step(&mut self, _step: usize) {}
}

// ---------------------------------------------------------------------------
// Simulated board (host tests)
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod sim {
    use super::*;
    use core::sync::atomic::{AtomicU32, Ordering};
    use std::boxed::Box;

    /// Board stand-in. Time only moves when a task advances the shared clock
    /// or when the safety checks charge `cycle_cost` to the running cycle.
    pub(crate) struct SimPlatform {
        pub clock: &'static AtomicU32,
        pub cycle_cost: u32,
        pub tick_pending: bool,
        pub plc_active: bool,
        pub plc_calls: u32,
        pub fatal_calls: u32,
        pub safety_calls: u32,
        pub last_report: Option<OvertimeReport>,
    }

    impl SimPlatform {
        /// Platform with a private clock.
        pub fn new() -> Self {
            Self::with_clock(Box::leak(Box::new(AtomicU32::new(0))))
        }

        /// Platform reading a clock that tasks can advance.
        pub fn with_clock(clock: &'static AtomicU32) -> Self {
            Self {
                clock,
                cycle_cost: 0,
                tick_pending: false,
                plc_active: false,
                plc_calls: 0,
                fatal_calls: 0,
                safety_calls: 0,
                last_report: None,
            }
        }
    }

    impl CycleClock for SimPlatform {
        fn now(&mut self) -> u32 {
            self.clock.load(Ordering::Relaxed)
        }
    }

    impl RtPlatform for SimPlatform {
        fn tick_pending(&mut self) -> bool {
            self.tick_pending
        }

        fn safety_checks(&mut self) {
            self.safety_calls += 1;
            self.clock.fetch_add(self.cycle_cost, Ordering::Relaxed);
        }

        fn plc_active(&self) -> bool {
            self.plc_active
        }

        fn plc_overtime(&mut self, report: &OvertimeReport) {
            self.plc_calls += 1;
            self.last_report = Some(*report);
        }

        fn fatal_overtime(&mut self, report: &OvertimeReport) {
            self.fatal_calls += 1;
            self.last_report = Some(*report);
        }
    }
}
