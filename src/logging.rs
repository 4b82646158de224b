//! Logging abstraction
//!
//! Unified logging macros that work across targets:
//! - Embedded with the `defmt` feature: forwards to defmt
//! - Host tests: prints to stdout / stderr
//! - Anything else: no-op (arguments are still type-checked)
//!
//! Format strings must stick to bare `{}` and `{:?}` placeholders (no width,
//! precision or named arguments) so they are valid for both defmt and
//! `core::fmt`. `{:?}` arguments need both `Debug` and `defmt::Format`.
//! Arguments logged from the RT pass must be cheap to format; defmt defers
//! formatting to the host anyway.

/// Log error message
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        ::defmt::error!($($arg)*);

        #[cfg(all(not(feature = "defmt"), test))]
        ::std::eprintln!("[ERROR] {}", format_args!($($arg)*));

        #[cfg(all(not(feature = "defmt"), not(test)))]
        let _ = format_args!($($arg)*);
    }};
}

/// Log warning message
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        ::defmt::warn!($($arg)*);

        #[cfg(all(not(feature = "defmt"), test))]
        ::std::println!("[WARN] {}", format_args!($($arg)*));

        #[cfg(all(not(feature = "defmt"), not(test)))]
        let _ = format_args!($($arg)*);
    }};
}

/// Log informational message
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        ::defmt::info!($($arg)*);

        #[cfg(all(not(feature = "defmt"), test))]
        ::std::println!("[INFO] {}", format_args!($($arg)*));

        #[cfg(all(not(feature = "defmt"), not(test)))]
        let _ = format_args!($($arg)*);
    }};
}

/// Log debug message
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        ::defmt::debug!($($arg)*);

        #[cfg(all(not(feature = "defmt"), test))]
        ::std::println!("[DEBUG] {}", format_args!($($arg)*));

        #[cfg(all(not(feature = "defmt"), not(test)))]
        let _ = format_args!($($arg)*);
    }};
}

/// Log trace message
#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        ::defmt::trace!($($arg)*);

        #[cfg(all(not(feature = "defmt"), test))]
        ::std::println!("[TRACE] {}", format_args!($($arg)*));

        #[cfg(all(not(feature = "defmt"), not(test)))]
        let _ = format_args!($($arg)*);
    }};
}
