//! Scheduler error types

use core::fmt;

/// Errors returned by the registration API and the kernel façade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Every slot of the RT task table is occupied.
    RtTableFull {
        /// Table capacity in slots
        capacity: usize,
    },
    /// Every slot of the background task table is occupied.
    BackgroundTableFull {
        /// Table capacity in slots
        capacity: usize,
    },
    /// `kernel::init()` has not been called.
    NotInitialized,
    /// The schedulers were already handed their tables.
    AlreadyStarted,
    /// A module initializer reported a fault of its own.
    ModuleFault {
        /// Module-specific fault code
        code: u32,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::RtTableFull { capacity } => {
                write!(f, "RT task table full ({} slots)", capacity)
            }
            Error::BackgroundTableFull { capacity } => {
                write!(f, "background task table full ({} slots)", capacity)
            }
            Error::NotInitialized => write!(f, "scheduler not initialized"),
            Error::AlreadyStarted => write!(f, "scheduler already started"),
            Error::ModuleFault { code } => write!(f, "module fault (code {})", code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::string::ToString;

    #[test]
    fn test_display() {
        let err = Error::RtTableFull { capacity: 32 };
        assert_eq!(err.to_string(), "RT task table full (32 slots)");
        assert_eq!(
            Error::ModuleFault { code: 7 }.to_string(),
            "module fault (code 7)"
        );
    }
}
