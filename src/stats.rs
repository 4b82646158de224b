//! # Scheduler Statistics
//!
//! Timing and overtime state shared between the RT pass, the background
//! loop and diagnostics. Every field is an atomic with exactly one writer:
//!
//! | Field group | Writer |
//! |-------------|--------|
//! | ticks, phase, cycle timing, overtime state | RT pass |
//! | window average / window peak | background loop |
//!
//! The only multi-field exchange is the end of a statistics window, where
//! the background loop takes the accumulated time sum together with the
//! tick counter inside a critical section so the RT pass cannot land a
//! cycle between the two reads.
//!
//! Relaxed ordering is sufficient: the RT pass cannot be preempted by its
//! readers, and readers only need each value to be untorn.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::sync;

/// Process-wide scheduler statistics. Intended to live in a `static`.
#[derive(Debug)]
pub struct SchedulerStats {
    free_running_ticks: AtomicU32,
    odd_phase: AtomicBool,
    rt_running: AtomicBool,

    last_cycle_time: AtomicU32,
    rt_peak_time_ever: AtomicU32,
    rt_cycle_peak: AtomicU32,
    rt_time_sum_window: AtomicU32,

    rt_peak_time_window: AtomicU32,
    rt_avg_time_window: AtomicU32,

    overtime_slot_counter: AtomicU32,
    overtime_grace_pending: AtomicBool,
    overtime_events: AtomicU32,
}

/// Plain copy of [`SchedulerStats`] for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StatsSnapshot {
    /// RT invocations since reset
    pub free_running_ticks: u32,
    /// Phase of the most recent RT invocation
    pub odd_phase: bool,
    /// An RT pass is in progress
    pub rt_running: bool,
    /// Duration of the most recent RT cycle
    pub last_cycle_time: u32,
    /// Longest RT cycle since reset
    pub rt_peak_time_ever: u32,
    /// Longest RT cycle of the last closed window
    pub rt_peak_time_window: u32,
    /// Mean RT cycle of the last closed window
    pub rt_avg_time_window: u32,
    /// Time accumulated in the open window
    pub rt_time_sum_window: u32,
    /// Overtime hysteresis counter
    pub overtime_slot_counter: u32,
    /// Next overtime check is suppressed
    pub overtime_grace_pending: bool,
    /// Escalations since reset
    pub overtime_events: u32,
}

impl SchedulerStats {
    pub const fn new() -> Self {
        Self {
            free_running_ticks: AtomicU32::new(0),
            odd_phase: AtomicBool::new(false),
            rt_running: AtomicBool::new(false),
            last_cycle_time: AtomicU32::new(0),
            rt_peak_time_ever: AtomicU32::new(0),
            rt_cycle_peak: AtomicU32::new(0),
            rt_time_sum_window: AtomicU32::new(0),
            rt_peak_time_window: AtomicU32::new(0),
            rt_avg_time_window: AtomicU32::new(0),
            overtime_slot_counter: AtomicU32::new(0),
            overtime_grace_pending: AtomicBool::new(false),
            overtime_events: AtomicU32::new(0),
        }
    }

    /// Zero every field. Only valid while neither scheduler is running.
    pub fn reset(&self) {
        for counter in [
            &self.free_running_ticks,
            &self.last_cycle_time,
            &self.rt_peak_time_ever,
            &self.rt_cycle_peak,
            &self.rt_time_sum_window,
            &self.rt_peak_time_window,
            &self.rt_avg_time_window,
            &self.overtime_slot_counter,
            &self.overtime_events,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        self.odd_phase.store(false, Ordering::Relaxed);
        self.rt_running.store(false, Ordering::Relaxed);
        self.overtime_grace_pending.store(false, Ordering::Relaxed);
    }

    // --- RT pass side -------------------------------------------------------

    /// Count the invocation, flip the phase and raise the running flag.
    /// Returns the phase for this invocation.
    pub(crate) fn begin_cycle(&self) -> bool {
        let ticks = self.free_running_ticks.load(Ordering::Relaxed);
        self.free_running_ticks
            .store(ticks.wrapping_add(1), Ordering::Relaxed);

        let odd = !self.odd_phase.load(Ordering::Relaxed);
        self.odd_phase.store(odd, Ordering::Relaxed);
        self.rt_running.store(true, Ordering::Release);
        odd
    }

    /// Fold one cycle duration into the profile.
    pub(crate) fn record_cycle(&self, duration: u32) {
        self.last_cycle_time.store(duration, Ordering::Relaxed);
        if duration > self.rt_peak_time_ever.load(Ordering::Relaxed) {
            self.rt_peak_time_ever.store(duration, Ordering::Relaxed);
        }
        self.rt_cycle_peak.fetch_max(duration, Ordering::Relaxed);
        // Saturates; a starved background loop leaves the window open
        let _ = self.rt_time_sum_window.fetch_update(
            Ordering::Relaxed,
            Ordering::Relaxed,
            |sum| Some(sum.saturating_add(duration)),
        );
    }

    pub(crate) fn end_cycle(&self) {
        self.rt_running.store(false, Ordering::Release);
    }

    pub(crate) fn overtime_slot_counter(&self) -> u32 {
        self.overtime_slot_counter.load(Ordering::Relaxed)
    }

    pub(crate) fn set_overtime_slot_counter(&self, value: u32) {
        self.overtime_slot_counter.store(value, Ordering::Relaxed);
    }

    /// Clear the grace flag, returning whether it was set.
    pub(crate) fn consume_grace(&self) -> bool {
        self.overtime_grace_pending.swap(false, Ordering::Relaxed)
    }

    pub(crate) fn grant_grace(&self) {
        self.overtime_grace_pending.store(true, Ordering::Relaxed);
    }

    pub(crate) fn count_overtime_event(&self) {
        self.overtime_events.fetch_add(1, Ordering::Relaxed);
    }

    // --- Background side ----------------------------------------------------

    /// Take the longest cycle seen since the previous call.
    pub(crate) fn take_cycle_peak(&self) -> u32 {
        self.rt_cycle_peak.swap(0, Ordering::Relaxed)
    }

    /// Take the window time sum together with the tick count it covers.
    pub(crate) fn take_window_sum(&self) -> (u32, u32) {
        sync::critical_section(|_cs| {
            let sum = self.rt_time_sum_window.swap(0, Ordering::Relaxed);
            let ticks = self.free_running_ticks.load(Ordering::Relaxed);
            (sum, ticks)
        })
    }

    pub(crate) fn publish_window(&self, avg: u32, peak: u32) {
        self.rt_avg_time_window.store(avg, Ordering::Relaxed);
        self.rt_peak_time_window.store(peak, Ordering::Relaxed);
    }

    // --- Readers ------------------------------------------------------------

    #[inline]
    pub fn free_running_ticks(&self) -> u32 {
        self.free_running_ticks.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn odd_phase(&self) -> bool {
        self.odd_phase.load(Ordering::Relaxed)
    }

    /// True while an RT pass is executing. Collaborators that share state
    /// with RT tasks check this before touching it.
    #[inline]
    pub fn rt_running(&self) -> bool {
        self.rt_running.load(Ordering::Acquire)
    }

    #[inline]
    pub fn overtime_grace_pending(&self) -> bool {
        self.overtime_grace_pending.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            free_running_ticks: self.free_running_ticks.load(Ordering::Relaxed),
            odd_phase: self.odd_phase.load(Ordering::Relaxed),
            rt_running: self.rt_running.load(Ordering::Acquire),
            last_cycle_time: self.last_cycle_time.load(Ordering::Relaxed),
            rt_peak_time_ever: self.rt_peak_time_ever.load(Ordering::Relaxed),
            rt_peak_time_window: self.rt_peak_time_window.load(Ordering::Relaxed),
            rt_avg_time_window: self.rt_avg_time_window.load(Ordering::Relaxed),
            rt_time_sum_window: self.rt_time_sum_window.load(Ordering::Relaxed),
            overtime_slot_counter: self.overtime_slot_counter.load(Ordering::Relaxed),
            overtime_grace_pending: self.overtime_grace_pending.load(Ordering::Relaxed),
            overtime_events: self.overtime_events.load(Ordering::Relaxed),
        }
    }
}

impl Default for SchedulerStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_flips_every_cycle() {
        let stats = SchedulerStats::new();
        assert!(stats.begin_cycle());
        stats.end_cycle();
        assert!(!stats.begin_cycle());
        stats.end_cycle();
        assert!(stats.begin_cycle());
        assert!(stats.rt_running());
        stats.end_cycle();
        assert!(!stats.rt_running());
        assert_eq!(stats.free_running_ticks(), 3);
    }

    #[test]
    fn test_record_cycle() {
        let stats = SchedulerStats::new();
        stats.record_cycle(500);
        stats.record_cycle(900);
        stats.record_cycle(700);

        let snap = stats.snapshot();
        assert_eq!(snap.last_cycle_time, 700);
        assert_eq!(snap.rt_peak_time_ever, 900);
        assert_eq!(snap.rt_time_sum_window, 2100);

        assert_eq!(stats.take_cycle_peak(), 900);
        assert_eq!(stats.take_cycle_peak(), 0);
    }

    #[test]
    fn test_take_window_sum_clears() {
        let stats = SchedulerStats::new();
        stats.begin_cycle();
        stats.record_cycle(100);
        stats.end_cycle();

        assert_eq!(stats.take_window_sum(), (100, 1));
        assert_eq!(stats.take_window_sum(), (0, 1));
    }

    #[test]
    fn test_window_sum_saturates() {
        let stats = SchedulerStats::new();
        stats.record_cycle(u32::MAX - 10);
        stats.record_cycle(100);
        assert_eq!(stats.snapshot().rt_time_sum_window, u32::MAX);
        assert_eq!(stats.snapshot().rt_peak_time_ever, u32::MAX - 10);
    }

    #[test]
    fn test_grace_is_one_shot() {
        let stats = SchedulerStats::new();
        assert!(!stats.consume_grace());
        stats.grant_grace();
        assert!(stats.overtime_grace_pending());
        assert!(stats.consume_grace());
        assert!(!stats.consume_grace());
    }

    #[test]
    fn test_reset() {
        let stats = SchedulerStats::new();
        stats.begin_cycle();
        stats.record_cycle(1300);
        stats.set_overtime_slot_counter(3);
        stats.grant_grace();
        stats.count_overtime_event();

        stats.reset();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }
}
