//! # Synchronization Primitives
//!
//! Interrupt-safe critical section used by the init dispatcher, the kernel
//! façade and the statistics window exchange.
//!
//! Backed by the `critical-section` crate: on the Cortex-M4 target the
//! implementation comes from `cortex-m`'s single-core feature (interrupts
//! masked), on the host from the crate's `std` implementation.

pub use critical_section::CriticalSection;

/// Execute a closure within a critical section (RT tick masked).
///
/// Nesting is allowed; the outermost section restores the interrupt state.
/// Keep sections short: every tick that lands inside one is delayed, and a
/// delay past the next tick shows up as a `TickOverrun`.
#[inline]
pub fn critical_section<F, R>(f: F) -> R
where
    F: FnOnce(CriticalSection<'_>) -> R,
{
    critical_section::with(f)
}
