//! # Scheduler Configuration
//!
//! Compile-time constants governing table capacities and the RT timing
//! budgets. Table sizes are fixed at compile time; there is no dynamic allocation.
//! The timing budgets are defaults for [`TimingBudget`], which each
//! [`RtScheduler`](crate::scheduler::RtScheduler) carries by value so a board
//! with a different timer resolution can tune them.

/// Number of slots in the RT task table.
pub const RT_TASK_CAPACITY: usize = 32;

/// Number of slots in the background task table.
pub const BACKGROUND_TASK_CAPACITY: usize = 64;

/// RT ticks per statistics window. The background loop recomputes
/// `rt_avg_time_window` and `rt_peak_time_window` once per window.
pub const STATS_WINDOW_TICKS: u32 = 1024;

/// Budget after which `OPTIONAL` tasks are skipped and reiteration of
/// optional tasks stops. In timer ticks.
pub const RT_STANDARD_TIME: u32 = 1100;

/// A cycle longer than this feeds the overtime hysteresis counter.
pub const RT_MAX_TIME: u32 = 1200;

/// A cycle at or above this escalates immediately.
pub const RT_PEAK_TIME: u32 = 1240;

/// Hysteresis limit: the counter must exceed this before escalation.
pub const RT_MAX_ALLOWED_OVER_SLOTS: u32 = 4;

/// RT tick frequency in Hz for the Cortex-M4 port.
pub const RT_TICK_HZ: u32 = 16_000;

/// System clock frequency in Hz (STM32F4 running from PLL at 168 MHz).
pub const SYSTEM_CLOCK_HZ: u32 = 168_000_000;

/// Divider applied to the DWT cycle counter to get budget ticks.
/// At 168 MHz a divider of 8 gives 21 ticks per microsecond, so
/// `RT_PEAK_TIME` sits just under the 62.5 µs tick period.
pub const CYCLE_CLOCK_DIVIDER: u32 = 8;

/// Timing budgets applied by the RT scheduler, in timer ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimingBudget {
    /// Elapsed time after which optional work is shed.
    pub standard: u32,
    /// Cycle duration that counts as a (non-fatal) overrun.
    pub max: u32,
    /// Cycle duration that escalates on its own.
    pub peak: u32,
    /// Consecutive-overrun allowance before escalation.
    pub max_allowed_over_slots: u32,
}

impl TimingBudget {
    /// The reference budgets.
    pub const fn new() -> Self {
        Self {
            standard: RT_STANDARD_TIME,
            max: RT_MAX_TIME,
            peak: RT_PEAK_TIME,
            max_allowed_over_slots: RT_MAX_ALLOWED_OVER_SLOTS,
        }
    }

    /// True if the ordering `standard <= max <= peak` holds.
    pub const fn is_consistent(&self) -> bool {
        self.standard <= self.max && self.max <= self.peak
    }
}

impl Default for TimingBudget {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_budget() {
        let budget = TimingBudget::default();
        assert_eq!(budget.standard, 1100);
        assert_eq!(budget.max, 1200);
        assert_eq!(budget.peak, 1240);
        assert_eq!(budget.max_allowed_over_slots, 4);
        assert!(budget.is_consistent());
    }

    #[test]
    fn test_inconsistent_budget() {
        let budget = TimingBudget {
            max: 2000,
            ..TimingBudget::new()
        };
        assert!(!budget.is_consistent());
    }
}
