//! # Background Scheduler
//!
//! Lowest-priority round-robin loop. Every pass calls each background task
//! once, in registration order, then folds the RT timing profile into the
//! windowed statistics and yields to the host.
//!
//! The RT pass may interrupt a background pass at any point. Timing data
//! crosses over only through [`SchedulerStats`]: the per-cycle peak is taken
//! with an atomic swap, and the window sum is taken together with the tick
//! counter inside a critical section.

use crate::config::STATS_WINDOW_TICKS;
use crate::registry::BackgroundTable;
use crate::stats::SchedulerStats;

/// The background loop and its statistics window.
#[derive(Debug)]
pub struct BackgroundScheduler<'s> {
    table: BackgroundTable,
    stats: &'s SchedulerStats,
    window_ticks: u32,
    window_start: u32,
    window_peak: u32,
    passes: u32,
}

impl<'s> BackgroundScheduler<'s> {
    pub fn new(table: BackgroundTable, stats: &'s SchedulerStats) -> Self {
        Self::with_window(table, stats, STATS_WINDOW_TICKS)
    }

    /// Use a statistics window of `window_ticks` RT ticks (at least 1).
    pub fn with_window(table: BackgroundTable, stats: &'s SchedulerStats, window_ticks: u32) -> Self {
        Self {
            table,
            stats,
            window_ticks: window_ticks.max(1),
            window_start: stats.free_running_ticks(),
            window_peak: 0,
            passes: 0,
        }
    }

    /// Run every background task once and update the windowed statistics.
    pub fn run_pass(&mut self) {
        for task in self.table.iter() {
            task();
        }

        self.window_peak = self.window_peak.max(self.stats.take_cycle_peak());

        let ticks = self.stats.free_running_ticks();
        if ticks.wrapping_sub(self.window_start) >= self.window_ticks {
            self.close_window();
        }

        self.passes = self.passes.wrapping_add(1);
    }

    fn close_window(&mut self) {
        let (sum, ticks) = self.stats.take_window_sum();
        let ticks_in_window = ticks.wrapping_sub(self.window_start);
        if ticks_in_window == 0 {
            return;
        }

        // A cycle may have finished between the peak swap and the sum swap
        self.window_peak = self.window_peak.max(self.stats.take_cycle_peak());

        let avg = sum / ticks_in_window;
        self.stats.publish_window(avg, self.window_peak);
        crate::log_debug!(
            "RT window: ticks={} avg={} peak={}",
            ticks_in_window,
            avg,
            self.window_peak
        );

        self.window_start = ticks;
        self.window_peak = 0;
    }

    /// Loop forever, yielding to the host after every pass.
    pub fn run_forever<Y>(mut self, mut yield_now: Y) -> !
    where
        Y: FnMut(),
    {
        crate::log_info!("background loop started ({} tasks)", self.table.len());
        loop {
            self.run_pass();
            yield_now();
        }
    }

    /// Completed passes (wraps).
    #[inline]
    pub fn passes(&self) -> u32 {
        self.passes
    }

    #[inline]
    pub fn task_count(&self) -> usize {
        self.table.len()
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TimingBudget;
    use crate::platform::sim::SimPlatform;
    use crate::registry::TaskRegistry;
    use crate::scheduler::RtScheduler;
    use crate::status::SystemStatus;
    use core::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_pass_runs_all_tasks_in_order() {
        static ORDER: AtomicU32 = AtomicU32::new(0);
        fn push(digit: u32) {
            let prev = ORDER.load(Ordering::Relaxed);
            ORDER.store(prev * 10 + digit, Ordering::Relaxed);
        }
        fn first() {
            push(1);
        }
        fn second() {
            push(2);
        }
        fn third() {
            push(3);
        }

        let mut registry = TaskRegistry::new();
        registry.add_background_task(first).unwrap();
        registry.add_background_task(second).unwrap();
        registry.add_background_task(third).unwrap();

        let stats = SchedulerStats::new();
        let (_, table) = registry.into_tables();
        let mut background = BackgroundScheduler::new(table, &stats);

        background.run_pass();
        assert_eq!(ORDER.load(Ordering::Relaxed), 123);
        assert_eq!(background.passes(), 1);
        assert_eq!(background.task_count(), 3);
    }

    #[test]
    fn test_window_average_is_mean_of_cycles() {
        let stats = SchedulerStats::new();
        let (rt_table, bg_table) = TaskRegistry::new().into_tables();
        let mut rt = RtScheduler::new(rt_table, &stats, TimingBudget::new());
        let mut background = BackgroundScheduler::new(bg_table, &stats);
        let mut platform = SimPlatform::new();

        let mut sum = 0u32;
        let mut peak = 0u32;
        for i in 0..STATS_WINDOW_TICKS {
            let cost = 400 + (i % 8) * 100;
            sum += cost;
            peak = peak.max(cost);
            platform.cycle_cost = cost;
            rt.run_cycle(SystemStatus::empty(), &mut platform);

            // Merge peaks as the background loop would between ticks
            if i % 100 == 0 {
                background.run_pass();
            }
        }
        assert_eq!(stats.snapshot().rt_avg_time_window, 0);

        background.run_pass();
        let snap = stats.snapshot();
        assert_eq!(snap.rt_avg_time_window, sum / STATS_WINDOW_TICKS);
        assert_eq!(snap.rt_avg_time_window, 750);
        assert_eq!(snap.rt_peak_time_window, peak);
        assert_eq!(snap.rt_time_sum_window, 0);
    }

    #[test]
    fn test_window_restarts() {
        let stats = SchedulerStats::new();
        let (rt_table, bg_table) = TaskRegistry::new().into_tables();
        let mut rt = RtScheduler::new(rt_table, &stats, TimingBudget::new());
        let mut background = BackgroundScheduler::with_window(bg_table, &stats, 4);
        let mut platform = SimPlatform::new();

        platform.cycle_cost = 1000;
        for _ in 0..4 {
            rt.run_cycle(SystemStatus::empty(), &mut platform);
        }
        background.run_pass();
        assert_eq!(stats.snapshot().rt_avg_time_window, 1000);
        assert_eq!(stats.snapshot().rt_peak_time_window, 1000);

        platform.cycle_cost = 200;
        for _ in 0..3 {
            rt.run_cycle(SystemStatus::empty(), &mut platform);
        }
        background.run_pass();
        // Window not closed yet
        assert_eq!(stats.snapshot().rt_avg_time_window, 1000);

        rt.run_cycle(SystemStatus::empty(), &mut platform);
        background.run_pass();
        let snap = stats.snapshot();
        assert_eq!(snap.rt_avg_time_window, 200);
        assert_eq!(snap.rt_peak_time_window, 200);
        assert_eq!(snap.rt_peak_time_ever, 1000);
    }

    #[test]
    fn test_window_spanning_more_ticks() {
        let stats = SchedulerStats::new();
        let (rt_table, bg_table) = TaskRegistry::new().into_tables();
        let mut rt = RtScheduler::new(rt_table, &stats, TimingBudget::new());
        let mut background = BackgroundScheduler::with_window(bg_table, &stats, 4);
        let mut platform = SimPlatform::new();

        // Background starved for six ticks: average over all six
        for cost in [100, 200, 300, 400, 500, 600] {
            platform.cycle_cost = cost;
            rt.run_cycle(SystemStatus::empty(), &mut platform);
        }
        background.run_pass();
        assert_eq!(stats.snapshot().rt_avg_time_window, 350);
        assert_eq!(stats.snapshot().rt_peak_time_window, 600);
    }
}
