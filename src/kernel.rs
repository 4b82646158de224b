//! # Kernel
//!
//! Global scheduler instance and the public API used by the firmware.
//!
//! ## Startup Sequence
//!
//! ```text
//! reset_handler (cortex-m-rt)
//!   └─► main()
//!         ├─► kernel::init()             ← Empty tables, zero statistics
//!         ├─► init::initialize_all(...)  ← Modules call add_rt_task /
//!         │                                add_background_task
//!         ├─► kernel::start(budget)      ← Freeze tables, arm RT scheduler
//!         ├─► enable the tick source     ← SysTick → kernel::rt_tick()
//!         └─► background.run_forever()   ← Lowest priority, never returns
//! ```
//!
//! The registry and the armed RT scheduler live behind
//! `critical_section::Mutex`. The background table is moved out to the
//! caller by [`start`], so the background loop holds nothing the RT pass
//! needs and can be preempted at any point.

use core::cell::{Cell, RefCell};
use core::sync::atomic::{AtomicBool, Ordering};

use critical_section::Mutex;

use crate::background::BackgroundScheduler;
use crate::config::TimingBudget;
use crate::error::Error;
use crate::platform::RtPlatform;
use crate::registry::TaskRegistry;
use crate::scheduler::{CycleReport, RtScheduler};
use crate::stats::{SchedulerStats, StatsSnapshot};
use crate::status::{StatusGate, SystemStatus};
use crate::sync::{self, CriticalSection};
use crate::task::{BackgroundTaskFn, ExecPolicy, RtTaskFn, TaskFlags};

// ---------------------------------------------------------------------------
// Global state
// ---------------------------------------------------------------------------

/// Process-wide statistics, readable from any context.
pub static STATS: SchedulerStats = SchedulerStats::new();

static REGISTRY: Mutex<RefCell<TaskRegistry>> = Mutex::new(RefCell::new(TaskRegistry::new()));

/// Borrowed mutably for the whole RT pass.
static RT_SCHEDULER: Mutex<RefCell<Option<RtScheduler<'static>>>> =
    Mutex::new(RefCell::new(None));

/// Budget handed over by [`set_budget`], applied at the start of the next
/// RT pass.
static PENDING_BUDGET: Mutex<Cell<Option<TimingBudget>>> = Mutex::new(Cell::new(None));

static INITIALIZED: AtomicBool = AtomicBool::new(false);
static STARTED: AtomicBool = AtomicBool::new(false);

// ---------------------------------------------------------------------------
// Kernel API
// ---------------------------------------------------------------------------

/// Reset the scheduler: vacate both tables, drop an armed RT scheduler and
/// zero the statistics.
///
/// Must be called with the tick source disabled, before any registration.
pub fn init() {
    sync::critical_section(|cs| {
        REGISTRY.borrow_ref_mut(cs).init();
        RT_SCHEDULER.borrow_ref_mut(cs).take();
        PENDING_BUDGET.borrow(cs).set(None);
        STATS.reset();
        STARTED.store(false, Ordering::Release);
        INITIALIZED.store(true, Ordering::Release);
    });
    crate::log_info!("scheduler initialized");
}

/// Registration phase check. Runs in the same critical section as the
/// insert so a concurrent [`start`] cannot drain the registry in between.
fn ensure_registering(_cs: CriticalSection<'_>) -> Result<(), Error> {
    if !INITIALIZED.load(Ordering::Acquire) {
        return Err(Error::NotInitialized);
    }
    if STARTED.load(Ordering::Acquire) {
        return Err(Error::AlreadyStarted);
    }
    Ok(())
}

/// Register an RT task with the global registry.
///
/// # Returns
/// - `Ok(slot)` — the table slot the task occupies
/// - `Err(Error::RtTableFull)` — no slot left
/// - `Err(Error::NotInitialized | Error::AlreadyStarted)` — wrong phase
pub fn add_rt_task(
    task: RtTaskFn,
    policy: ExecPolicy,
    gate: StatusGate,
    arg: u32,
) -> Result<usize, Error> {
    sync::critical_section(|cs| {
        ensure_registering(cs)?;
        REGISTRY
            .borrow_ref_mut(cs)
            .add_rt_task(task, policy, gate, arg)
    })
}

/// Register an RT task described by registration flags.
pub fn add_rt_task_flags(
    task: RtTaskFn,
    flags: TaskFlags,
    status_select: u32,
    status_mask: u32,
    n_slots: u16,
    arg: u32,
) -> Result<usize, Error> {
    add_rt_task(
        task,
        ExecPolicy::from_flags(flags, n_slots),
        StatusGate::new(status_select, status_mask),
        arg,
    )
}

/// Register a background task with the global registry.
pub fn add_background_task(task: BackgroundTaskFn) -> Result<usize, Error> {
    sync::critical_section(|cs| {
        ensure_registering(cs)?;
        REGISTRY.borrow_ref_mut(cs).add_background_task(task)
    })
}

/// Freeze the tables and arm the RT scheduler.
///
/// Returns the background scheduler; the caller runs it from its
/// lowest-priority context. The tick source may be enabled once this
/// returns.
pub fn start(budget: TimingBudget) -> Result<BackgroundScheduler<'static>, Error> {
    let background_table = sync::critical_section(|cs| {
        if !INITIALIZED.load(Ordering::Acquire) {
            return Err(Error::NotInitialized);
        }
        if STARTED.swap(true, Ordering::AcqRel) {
            return Err(Error::AlreadyStarted);
        }

        let (rt_table, background_table) = REGISTRY.borrow_ref_mut(cs).take_tables();
        crate::log_info!(
            "scheduler started: {} RT tasks, {} background tasks",
            rt_table.len(),
            background_table.len()
        );
        RT_SCHEDULER
            .borrow_ref_mut(cs)
            .replace(RtScheduler::new(rt_table, &STATS, budget));
        Ok(background_table)
    })?;

    Ok(BackgroundScheduler::new(background_table, &STATS))
}

/// Run one RT cycle. Call from the tick interrupt.
///
/// Returns `None` (and does nothing) until [`start`] has armed the
/// scheduler, and for a tick re-entered from inside a running pass.
pub fn rt_tick<P>(status: SystemStatus, platform: &mut P) -> Option<CycleReport>
where
    P: RtPlatform + ?Sized,
{
    sync::critical_section(|cs| {
        let mut slot = RT_SCHEDULER.borrow(cs).try_borrow_mut().ok()?;
        let scheduler = slot.as_mut()?;
        if let Some(budget) = PENDING_BUDGET.borrow(cs).take() {
            scheduler.set_budget(budget);
        }
        Some(scheduler.run_cycle(status, platform))
    })
}

/// Ticks consumed by the most recent invocation of RT slot `index`.
///
/// `None` for a vacant slot, before [`start`], and while an RT pass is
/// running (i.e. when called from an RT task or a platform hook).
pub fn rt_task_exec_time(index: usize) -> Option<u32> {
    sync::critical_section(|cs| {
        RT_SCHEDULER
            .borrow(cs)
            .try_borrow()
            .ok()?
            .as_ref()
            .and_then(|scheduler| scheduler.rt_task_exec_time(index))
    })
}

/// Replace the RT timing budgets of the armed scheduler.
///
/// Takes effect at the start of the next RT cycle, so it may be called from
/// inside the RT pass (e.g. by the PLC overtime hook).
pub fn set_budget(budget: TimingBudget) -> Result<(), Error> {
    sync::critical_section(|cs| {
        if !STARTED.load(Ordering::Acquire) {
            return Err(Error::NotInitialized);
        }
        PENDING_BUDGET.borrow(cs).set(Some(budget));
        Ok(())
    })
}

/// True while an RT pass is executing.
#[inline]
pub fn rt_running() -> bool {
    STATS.rt_running()
}

/// Copy of the global statistics.
pub fn stats() -> StatsSnapshot {
    STATS.snapshot()
}
