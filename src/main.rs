//! # mcb-sched Demo Firmware
//!
//! Two-axis motor-control board wired onto the scheduler:
//!
//! | Task | Level | Policy | Behavior |
//! |------|-------|--------|----------|
//! | `current_loop` | RT | every slot | One per axis, inner current regulator |
//! | `speed_loop` | RT | every 4 slots | One per axis, outer speed regulator |
//! | `encoder_sample` | RT | odd phase | Encoder read-out, alternating ticks |
//! | `plc_scan` | RT | optional, reiterate | Burns leftover budget on PLC steps |
//! | `stats_report` | BG | — | Logs the windowed RT statistics |
//! | `plc_refill` | BG | — | Queues the next PLC program scan |
//!
//! The status word starts with `BOOTING` set, so overtime supervision is
//! off until bring-up completes and the bit is cleared.

#![no_std]
#![no_main]

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use cortex_m_rt::{entry, exception};
use panic_halt as _;

use mcb_sched::arch::cortex_m4::{self, DwtClock};
use mcb_sched::config::CYCLE_CLOCK_DIVIDER;
use mcb_sched::init::{self, ModuleInit};
use mcb_sched::kernel;
use mcb_sched::{
    CycleClock, Error, ExecPolicy, OvertimeReport, ProgressIndicator, RtPlatform, StatusGate,
    SystemStatus, TimingBudget,
};

// ---------------------------------------------------------------------------
// Board state
// ---------------------------------------------------------------------------

/// System status word shared by every priority level.
static STATUS: AtomicU32 = AtomicU32::new(SystemStatus::BOOTING.bits());

static PLC_ACTIVE: AtomicBool = AtomicBool::new(false);
static PLC_PENDING_STEPS: AtomicU32 = AtomicU32::new(0);
static BOOT_STEP: AtomicUsize = AtomicUsize::new(0);

const AXES: u32 = 2;
const PLC_STEPS_PER_SCAN: u32 = 8;

fn status() -> SystemStatus {
    SystemStatus::from_raw(STATUS.load(Ordering::Acquire))
}

// ---------------------------------------------------------------------------
// RT tasks
// ---------------------------------------------------------------------------

fn current_loop(_axis: u32) -> bool {
    let mut acc: u32 = 0;
    for i in 0..200 {
        acc = acc.wrapping_add(i);
    }
    core::hint::black_box(acc);
    false
}

fn speed_loop(_axis: u32) -> bool {
    let mut acc: u32 = 0;
    for i in 0..400 {
        acc = acc.wrapping_mul(31).wrapping_add(i);
    }
    core::hint::black_box(acc);
    false
}

fn encoder_sample(_channel: u32) -> bool {
    false
}

/// One PLC step per call; asks for another while steps remain.
fn plc_scan(_: u32) -> bool {
    let remaining = PLC_PENDING_STEPS.load(Ordering::Relaxed);
    if remaining == 0 {
        return false;
    }
    PLC_PENDING_STEPS.store(remaining - 1, Ordering::Relaxed);
    remaining > 1
}

// ---------------------------------------------------------------------------
// Background tasks
// ---------------------------------------------------------------------------

fn stats_report() {
    let stats = kernel::stats();
    if stats.free_running_ticks % 16_000 == 0 {
        mcb_sched::log_info!(
            "rt avg={} peak={} ever={}",
            stats.rt_avg_time_window,
            stats.rt_peak_time_window,
            stats.rt_peak_time_ever
        );
    }
}

fn plc_refill() {
    let _ = PLC_PENDING_STEPS.compare_exchange(
        0,
        PLC_STEPS_PER_SCAN,
        Ordering::Relaxed,
        Ordering::Relaxed,
    );
}

// ---------------------------------------------------------------------------
// Module bring-up
// ---------------------------------------------------------------------------

fn init_axes(axes: u32) -> Result<(), Error> {
    let not_resetting = StatusGate::forbid(SystemStatus::RESETTING);
    for axis in 0..axes {
        kernel::add_rt_task(current_loop, ExecPolicy::UNCONDITIONAL, not_resetting, axis)?;
    }
    for axis in 0..axes {
        kernel::add_rt_task(
            speed_loop,
            ExecPolicy::UNCONDITIONAL.every_n_slots(4),
            not_resetting,
            axis,
        )?;
    }
    Ok(())
}

fn init_encoder(channel: u32) -> Result<(), Error> {
    kernel::add_rt_task(
        encoder_sample,
        ExecPolicy::UNCONDITIONAL.odd_phase(),
        StatusGate::ALWAYS,
        channel,
    )?;
    Ok(())
}

fn init_plc(_: u32) -> Result<(), Error> {
    kernel::add_rt_task(
        plc_scan,
        ExecPolicy::UNCONDITIONAL.optional().reiterate(),
        StatusGate::forbid(SystemStatus::OVERTIME_EXEMPT),
        0,
    )?;
    PLC_ACTIVE.store(true, Ordering::Release);
    Ok(())
}

fn init_housekeeping(_: u32) -> Result<(), Error> {
    kernel::add_background_task(stats_report)?;
    kernel::add_background_task(plc_refill)?;
    Ok(())
}

const MODULES: [ModuleInit; 4] = [
    ModuleInit::new("axes", init_axes, AXES),
    ModuleInit::new("encoder", init_encoder, 0),
    ModuleInit::new("plc", init_plc, 0),
    ModuleInit::new("housekeeping", init_housekeeping, 0),
];

/// Boot step display. The board has no 7-segment fitted, so the step is
/// only latched for the debugger.
struct BootStepLatch;

impl ProgressIndicator for BootStepLatch {
    fn show_step(&mut self, step: usize) {
        BOOT_STEP.store(step, Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// Board platform
// ---------------------------------------------------------------------------

struct BoardPlatform {
    clock: DwtClock,
}

impl BoardPlatform {
    const fn new() -> Self {
        Self {
            clock: DwtClock::running(CYCLE_CLOCK_DIVIDER),
        }
    }
}

impl CycleClock for BoardPlatform {
    fn now(&mut self) -> u32 {
        self.clock.now()
    }

    fn elapsed_since(&mut self, start: u32) -> u32 {
        self.clock.elapsed_since(start)
    }
}

impl RtPlatform for BoardPlatform {
    fn tick_pending(&mut self) -> bool {
        cortex_m4::rt_tick_pending()
    }

    fn safety_checks(&mut self) {}

    fn plc_active(&self) -> bool {
        PLC_ACTIVE.load(Ordering::Acquire)
    }

    fn plc_overtime(&mut self, report: &OvertimeReport) {
        mcb_sched::log_warn!("PLC load shed at tick {}", report.tick);
        PLC_PENDING_STEPS.store(0, Ordering::Relaxed);
    }

    fn fatal_overtime(&mut self, report: &OvertimeReport) {
        mcb_sched::log_error!("fatal RT overtime: {} ticks", report.cycle_time);
        loop {
            cortex_m::asm::nop();
        }
    }
}

// ---------------------------------------------------------------------------
// Interrupt handlers
// ---------------------------------------------------------------------------

#[exception]
fn SysTick() {
    static mut PLATFORM: BoardPlatform = BoardPlatform::new();

    kernel::rt_tick(status(), PLATFORM);
}

// ---------------------------------------------------------------------------
// Main entry point
// ---------------------------------------------------------------------------

/// Firmware entry point. Brings up the modules, arms the scheduler and
/// runs the background loop. Does not return.
#[entry]
fn main() -> ! {
    let mut cp = cortex_m::Peripherals::take().expect("core peripherals already taken");

    let _clock = DwtClock::new(&mut cp.DCB, &mut cp.DWT, CYCLE_CLOCK_DIVIDER);
    cortex_m4::set_rt_tick_priority(&mut cp.SCB);
    cortex_m4::configure_rt_tick(&mut cp.SYST, cortex_m4::RT_TICK_RELOAD);

    kernel::init();

    if let Err(failure) = init::initialize_all(&MODULES, &mut BootStepLatch) {
        mcb_sched::log_error!("bring-up failed at step {}", failure.step);
        STATUS.fetch_or(SystemStatus::BOOT_LOCKED.bits(), Ordering::AcqRel);
    }

    let background = match kernel::start(TimingBudget::default()) {
        Ok(background) => background,
        Err(_) => loop {
            cortex_m::asm::nop();
        },
    };

    cortex_m4::enable_rt_tick(&mut cp.SYST);
    STATUS.fetch_and(!SystemStatus::BOOTING.bits(), Ordering::AcqRel);

    background.run_forever(cortex_m4::yield_now)
}
