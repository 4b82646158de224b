//! # RT Scheduler
//!
//! Executes the RT task table once per hardware tick. The pass is fully
//! synchronous: the caller invokes [`RtScheduler::run_cycle`] from its
//! timer interrupt (or highest-priority task) and every RT task must return
//! promptly. Nothing in the pass blocks or suspends.
//!
//! ## Cycle Algorithm
//!
//! At each tick:
//! 1. **Snapshot**: count the tick, flip the odd/even phase, raise `rt_running`
//! 2. **Start** the cycle timer
//! 3. **Table pass**, in registration order, for each occupied slot:
//!    a. gating: `EveryNSlots` countdown → status gate → phase gate;
//!       a failed check skips this entry for this tick only
//!    b. execution per [`RunMode`]
//!    c. store the entry's `last_exec_time`
//! 4. **Safety checks** (reset button, power fail) via the platform
//! 5. **Profiling**: cycle duration, all-time peak, window sum
//! 6. **Overtime detection** (skipped in boot / reset / flash states)
//!
//! ## Overtime Escalation
//!
//! ```text
//!   grace pending ──────────────► clear grace, no check this cycle
//!   duration ≥ PEAK ─┐
//!   tick pending ────┼──► escalate ─┬─ PLC active ──► PLC hook, grace, counter = 0
//!   counter > LIMIT ─┘              └─ no PLC ──────► fatal sink
//!   duration > MAX ─────────────► counter += 1
//!   otherwise ──────────────────► counter -= 1 (down to 0)
//! ```
//!
//! The hysteresis counter is updated before the escalation test, so the
//! `(LIMIT + 1)`-th consecutive cycle above MAX escalates and a single
//! compliant cycle in between delays escalation.

use crate::config::TimingBudget;
use crate::platform::{CycleClock, OvertimeCause, OvertimeReport, RtPlatform};
use crate::registry::RtTable;
use crate::stats::SchedulerStats;
use crate::status::SystemStatus;
use crate::task::{RtTaskEntry, RunMode};

/// Outcome of the overtime check of one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OvertimeVerdict {
    /// The status word exempts this cycle from supervision.
    Unchecked,
    /// The one-cycle grace after an escalation was used up.
    GraceConsumed,
    /// Within budget (the hysteresis counter may have decayed).
    Nominal,
    /// Above MAX; the hysteresis counter grew.
    Accumulating,
    /// Escalated to the PLC, which was asked to shed load.
    Shed(OvertimeCause),
    /// Escalated with no PLC active; the fatal sink was invoked.
    Fatal(OvertimeCause),
}

/// Summary of one RT cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CycleReport {
    /// `free_running_ticks` after this cycle was counted
    pub tick: u32,
    /// Phase the cycle ran in
    pub odd_phase: bool,
    /// Measured cycle duration
    pub duration: u32,
    /// Task calls made, reiterations included
    pub calls: u32,
    pub verdict: OvertimeVerdict,
}

/// The RT scheduler: the frozen RT table plus its timing policy.
#[derive(Debug)]
pub struct RtScheduler<'s> {
    table: RtTable,
    stats: &'s SchedulerStats,
    budget: TimingBudget,
}

impl<'s> RtScheduler<'s> {
    pub fn new(table: RtTable, stats: &'s SchedulerStats, budget: TimingBudget) -> Self {
        if !budget.is_consistent() {
            crate::log_warn!(
                "RT budget out of order: standard={} max={} peak={}",
                budget.standard,
                budget.max,
                budget.peak
            );
        }
        Self {
            table,
            stats,
            budget,
        }
    }

    /// Run one RT cycle.
    ///
    /// `status` is the current system status word. The platform supplies
    /// the cycle clock and the collaborator hooks.
    pub fn run_cycle<P>(&mut self, status: SystemStatus, platform: &mut P) -> CycleReport
    where
        P: RtPlatform + ?Sized,
    {
        let odd_phase = self.stats.begin_cycle();
        let tick = self.stats.free_running_ticks();
        let cycle_start = platform.now();
        let standard = self.budget.standard;
        let mut calls = 0u32;

        for entry in self.table.iter_mut() {
            if !entry.admit(status, odd_phase) {
                continue;
            }

            let task_start = platform.now();
            calls += execute(entry, platform, cycle_start, standard);
            entry.set_last_exec_time(platform.elapsed_since(task_start));
        }

        platform.safety_checks();

        let duration = platform.elapsed_since(cycle_start);
        self.stats.record_cycle(duration);

        let verdict = self.check_overtime(status, duration, tick, platform);
        self.stats.end_cycle();

        CycleReport {
            tick,
            odd_phase,
            duration,
            calls,
            verdict,
        }
    }

    fn check_overtime<P>(
        &mut self,
        status: SystemStatus,
        duration: u32,
        tick: u32,
        platform: &mut P,
    ) -> OvertimeVerdict
    where
        P: RtPlatform + ?Sized,
    {
        if status.overtime_exempt() {
            return OvertimeVerdict::Unchecked;
        }

        if self.stats.consume_grace() {
            return OvertimeVerdict::GraceConsumed;
        }

        let budget = self.budget;
        let counter = self.stats.overtime_slot_counter();
        let over_slots = if duration >= budget.peak {
            counter
        } else if duration > budget.max {
            counter.saturating_add(1)
        } else {
            counter.saturating_sub(1)
        };
        self.stats.set_overtime_slot_counter(over_slots);

        let cause = if duration >= budget.peak {
            Some(OvertimeCause::Peak)
        } else if platform.tick_pending() {
            Some(OvertimeCause::TickOverrun)
        } else if over_slots > budget.max_allowed_over_slots {
            Some(OvertimeCause::Sustained)
        } else {
            None
        };

        match cause {
            Some(cause) => {
                let report = OvertimeReport {
                    cause,
                    cycle_time: duration,
                    over_slots,
                    tick,
                };
                self.escalate(&report, platform)
            }
            None if duration > budget.max => OvertimeVerdict::Accumulating,
            None => OvertimeVerdict::Nominal,
        }
    }

    fn escalate<P>(&mut self, report: &OvertimeReport, platform: &mut P) -> OvertimeVerdict
    where
        P: RtPlatform + ?Sized,
    {
        self.stats.count_overtime_event();

        if platform.plc_active() {
            crate::log_warn!(
                "RT overtime {:?}: cycle={} over_slots={}, shedding PLC load",
                report.cause,
                report.cycle_time,
                report.over_slots
            );
            platform.plc_overtime(report);
            self.stats.grant_grace();
            self.stats.set_overtime_slot_counter(0);
            OvertimeVerdict::Shed(report.cause)
        } else {
            crate::log_error!(
                "RT overtime {:?}: cycle={} over_slots={}, no PLC to shed load",
                report.cause,
                report.cycle_time,
                report.over_slots
            );
            platform.fatal_overtime(report);
            OvertimeVerdict::Fatal(report.cause)
        }
    }

    /// Number of registered RT tasks.
    #[inline]
    pub fn task_count(&self) -> usize {
        self.table.len()
    }

    /// Ticks consumed by the most recent invocation of the task in `index`.
    pub fn rt_task_exec_time(&self, index: usize) -> Option<u32> {
        self.table.get(index).map(RtTaskEntry::last_exec_time)
    }

    #[inline]
    pub fn budget(&self) -> TimingBudget {
        self.budget
    }

    /// Replace the timing budgets. Takes effect on the next cycle.
    pub fn set_budget(&mut self, budget: TimingBudget) {
        self.budget = budget;
    }
}

/// Run one admitted entry according to its run mode. Returns the number of
/// calls made.
fn execute<C>(entry: &RtTaskEntry, clock: &mut C, cycle_start: u32, standard: u32) -> u32
where
    C: CycleClock + ?Sized,
{
    match entry.policy().run {
        RunMode::Once => {
            entry.call();
            1
        }
        RunMode::Optional => {
            if clock.elapsed_since(cycle_start) > standard {
                return 0;
            }
            entry.call();
            1
        }
        RunMode::Reiterate { optional } => {
            let mut calls = 0;
            loop {
                calls += 1;
                if !entry.call() {
                    break;
                }
                // Budget is only checked before a reiteration
                if optional && clock.elapsed_since(cycle_start) > standard {
                    break;
                }
            }
            calls
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
