//! # Cortex-M4 Port Layer
//!
//! Hardware-specific pieces of the RT scheduler on an ARM Cortex-M4:
//! SysTick as the RT tick source, the DWT cycle counter as the cycle clock,
//! and the SysTick pend bit as the "next tick already requested" signal.
//!
//! ## Interrupt Priorities
//!
//! - SysTick: priority 0x00 (highest). The RT pass preempts everything
//!   except faults, and is itself never preempted by application ISRs
//! - Thread mode: background loop, preempted by every tick
//!
//! `kernel::rt_tick()` is called from the SysTick handler of the firmware
//! binary; this module only configures the hardware around it.

use cortex_m::peripheral::scb::SystemHandler;
use cortex_m::peripheral::syst::SystClkSource;
use cortex_m::peripheral::{DCB, DWT, SCB, SYST};

use crate::config::{RT_TICK_HZ, SYSTEM_CLOCK_HZ};
use crate::platform::CycleClock;

// ---------------------------------------------------------------------------
// SysTick configuration
// ---------------------------------------------------------------------------

/// SysTick reload value for the configured RT tick rate.
pub const RT_TICK_RELOAD: u32 = SYSTEM_CLOCK_HZ / RT_TICK_HZ - 1;

/// Configure SysTick as the RT tick source.
///
/// Counts processor clocks and fires every `reload + 1` cycles. The counter
/// is started but the caller enables the interrupt with
/// [`enable_rt_tick`] once the scheduler is armed.
pub fn configure_rt_tick(syst: &mut SYST, reload: u32) {
    syst.set_reload(reload);
    syst.clear_current();
    syst.set_clock_source(SystClkSource::Core);
    syst.enable_counter();
}

/// Let SysTick interrupts reach the RT pass.
pub fn enable_rt_tick(syst: &mut SYST) {
    syst.enable_interrupt();
}

// ---------------------------------------------------------------------------
// Interrupt priority configuration
// ---------------------------------------------------------------------------

/// Give SysTick the highest configurable priority.
///
/// The RT pass must not be preempted by application interrupts, or its
/// cycle measurements would include their run time.
pub fn set_rt_tick_priority(scb: &mut SCB) {
    // Safety: changing a system handler priority cannot break memory
    // safety; the scheduler does not use priority-based critical sections.
    unsafe {
        scb.set_priority(SystemHandler::SysTick, 0x00);
    }
}

/// True if a SysTick request is already pending, i.e. the next tick fired
/// before the current RT pass completed.
#[inline]
pub fn rt_tick_pending() -> bool {
    SCB::is_pendst_pending()
}

// ---------------------------------------------------------------------------
// Cycle clock
// ---------------------------------------------------------------------------

/// Cycle clock backed by the DWT cycle counter.
///
/// Divides the processor clock by `divider`, so one budget tick equals
/// `divider` CPU cycles. The counter wraps every 2^32 cycles; cycle-length
/// measurements are far shorter than that.
#[derive(Debug, Clone, Copy)]
pub struct DwtClock {
    divider: u32,
}

impl DwtClock {
    /// Enable the DWT cycle counter and build a clock on top of it.
    pub fn new(dcb: &mut DCB, dwt: &mut DWT, divider: u32) -> Self {
        dcb.enable_trace();
        dwt.enable_cycle_counter();
        Self {
            divider: divider.max(1),
        }
    }

    /// Clock for an already running cycle counter.
    pub const fn running(divider: u32) -> Self {
        Self {
            divider: if divider == 0 { 1 } else { divider },
        }
    }
}

impl CycleClock for DwtClock {
    #[inline]
    fn now(&mut self) -> u32 {
        DWT::cycle_count() / self.divider
    }

    #[inline]
    fn elapsed_since(&mut self, start: u32) -> u32 {
        let now = self.now();
        if now >= start {
            now - start
        } else {
            // The divided counter wraps at 2^32 / divider, not at 2^32
            let range = (u32::MAX / self.divider).wrapping_add(1);
            range.wrapping_sub(start).wrapping_add(now)
        }
    }
}

// ---------------------------------------------------------------------------
// Host yield
// ---------------------------------------------------------------------------

/// Zero-duration yield for the bare-metal background loop.
///
/// There is no host scheduler below the background loop on this port, so
/// yielding just gives pending interrupts a well-defined point to land.
#[inline]
pub fn yield_now() {
    cortex_m::asm::nop();
}
