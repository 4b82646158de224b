//! # mcb-sched — Motor-Control Board Task Scheduler
//!
//! Tick-driven real-time task scheduler for a multi-axis motor-control
//! board on ARM Cortex-M4 microcontrollers.
//!
//! ## Overview
//!
//! Two priority levels share one core:
//!
//! - **RT pass**: runs once per hardware tick (16 kHz) from the tick
//!   interrupt. Walks a fixed table of short, non-blocking tasks in
//!   registration order, gated by system status, slot cadence and the
//!   odd/even tick phase. Every pass is timed; sustained or gross overruns
//!   are escalated to the PLC or to a fatal sink.
//! - **Background loop**: runs forever at the lowest priority. Walks its own
//!   table of slow housekeeping tasks and folds the RT timing samples into
//!   windowed statistics.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │              Firmware modules (main.rs)                 │
//! ├────────────────────────────────────────────────────────┤
//! │                 Kernel API (kernel.rs)                  │
//! │   init() · add_rt_task() · start() · rt_tick() · stats()│
//! ├──────────────┬────────────────────┬───────────────────┤
//! │ RT Scheduler │ Background Loop    │  Init Dispatcher  │
//! │ scheduler.rs │ background.rs      │  init.rs          │
//! │ ─ run_cycle()│ ─ run_pass()       │  ─ initialize_all()│
//! │ ─ overtime   │ ─ windowed stats   │                   │
//! ├──────────────┴────────────────────┴───────────────────┤
//! │  Task Model (task.rs) · Registry (registry.rs)          │
//! │  Status Gate (status.rs) · Statistics (stats.rs)        │
//! ├────────────────────────────────────────────────────────┤
//! │  Platform Traits (platform.rs) · Sync (sync.rs)         │
//! ├────────────────────────────────────────────────────────┤
//! │            Arch Port (arch/cortex_m4.rs)                │
//! │       SysTick · DWT cycle clock · pending tick          │
//! ├────────────────────────────────────────────────────────┤
//! │         ARM Cortex-M4 Hardware (Thumb-2)                │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! ## RT Cycle
//!
//! 1. Advance the free-running tick counter, flip the odd/even phase
//! 2. For each registered task: cadence countdown, status gate, phase check
//! 3. Call admitted tasks; repeat `REITERATE_IF_TRUE` tasks while they
//!    return `true` and the cycle is under its standard budget
//! 4. Shed `OPTIONAL` tasks once the standard budget is spent
//! 5. Run board safety checks, measure the cycle, apply overtime hysteresis
//!
//! ## Overtime Escalation
//!
//! | Condition | Effect |
//! |-----------|--------|
//! | cycle ≥ `RT_PEAK_TIME` | immediate escalation |
//! | next tick already pending | immediate escalation |
//! | cycle > `RT_MAX_TIME` | over-slot counter +1 |
//! | cycle ≤ `RT_MAX_TIME` | over-slot counter −1 (saturating) |
//! | counter > `RT_MAX_ALLOWED_OVER_SLOTS` | escalation |
//!
//! Escalation goes to the PLC when it is active (which grants one cycle of
//! grace), to the fatal sink otherwise. Booting, resetting, flash
//! programming and boot-locked states skip the check.
//!
//! ## Memory Model
//!
//! - **No heap**: all state is statically allocated
//! - **No `alloc`**: pure `core` only
//! - **Fixed-size tables**: `[Option<RtTaskEntry>; RT_TASK_CAPACITY]`,
//!   `[Option<fn()>; BACKGROUND_TASK_CAPACITY]`
//! - **Critical sections**: `critical_section::with()` for shared state,
//!   atomics for statistics crossing priority levels

#![no_std]

#[cfg(test)]
extern crate std;

pub mod logging;

pub mod arch;
pub mod background;
pub mod config;
pub mod error;
pub mod init;
pub mod kernel;
pub mod platform;
pub mod registry;
pub mod scheduler;
pub mod stats;
pub mod status;
pub mod sync;
pub mod task;

pub use config::TimingBudget;
pub use error::Error;
pub use platform::{CycleClock, OvertimeCause, OvertimeReport, ProgressIndicator, RtPlatform};
pub use status::{StatusGate, SystemStatus};
pub use task::{ExecPolicy, TaskFlags};
