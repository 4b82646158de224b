//! # System Status Word
//!
//! The 32-bit status word is owned by the application (boot manager, PLC
//! runtime, flash programmer). The scheduler only reads it: RT tasks are
//! gated on a masked-equality compare against it, and a handful of states
//! switch off overtime detection.
//!
//! Bits not named here belong to the application and are retained as-is,
//! so gating works on the raw word.

use bitflags::bitflags;

bitflags! {
    /// Process-wide status word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SystemStatus: u32 {
        /// Bring-up still in progress
        const BOOTING                 = 1 << 0;
        /// A controlled reset is under way
        const RESETTING               = 1 << 1;
        /// Flash is being programmed; the bus stalls the CPU
        const FLASH_PROGRAMMING       = 1 << 2;
        /// Boot loader holds the board
        const BOOT_LOCKED             = 1 << 3;
        /// Overtime supervision switched off by the operator
        const OVERTIME_CHECK_DISABLED = 1 << 4;

        /// States in which cycle overruns are expected and not escalated
        const OVERTIME_EXEMPT = Self::BOOTING.bits()
            | Self::RESETTING.bits()
            | Self::FLASH_PROGRAMMING.bits()
            | Self::BOOT_LOCKED.bits()
            | Self::OVERTIME_CHECK_DISABLED.bits();
    }
}

impl SystemStatus {
    /// Wrap a raw status word, keeping application-owned bits.
    #[inline]
    pub const fn from_raw(word: u32) -> Self {
        Self::from_bits_retain(word)
    }

    /// True if overtime detection must be skipped in this state.
    #[inline]
    pub const fn overtime_exempt(&self) -> bool {
        self.intersects(Self::OVERTIME_EXEMPT)
    }
}

/// Masked-equality gate evaluated against the status word.
///
/// A task is eligible iff `select == mask & status`. The all-zero gate
/// matches every status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StatusGate {
    /// Expected value of the masked bits
    pub select: u32,
    /// Bits that participate in the compare
    pub mask: u32,
}

impl StatusGate {
    /// Gate that is always open.
    pub const ALWAYS: Self = Self { select: 0, mask: 0 };

    pub const fn new(select: u32, mask: u32) -> Self {
        Self { select, mask }
    }

    /// Require all `bits` to be set.
    pub const fn require(bits: SystemStatus) -> Self {
        Self {
            select: bits.bits(),
            mask: bits.bits(),
        }
    }

    /// Require all `bits` to be clear.
    pub const fn forbid(bits: SystemStatus) -> Self {
        Self {
            select: 0,
            mask: bits.bits(),
        }
    }

    #[inline]
    pub const fn admits(&self, status: SystemStatus) -> bool {
        self.select == (self.mask & status.bits())
    }
}
