//! # Architecture Abstraction Layer
//!
//! Hardware port for the scheduler: tick source, cycle clock, pending-tick
//! detection. The scheduler core only sees these through the
//! [`platform`](crate::platform) traits, so host tests never touch this
//! module.

#[cfg(all(target_arch = "arm", target_os = "none"))]
pub mod cortex_m4;
