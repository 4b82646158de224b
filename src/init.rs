//! # Ordered Init Dispatcher
//!
//! Brings up the board's modules from a declarative list. Every module gets
//! its turn, even after an earlier one failed; the caller receives the first
//! failure and decides whether it is fatal. The whole sequence runs in a
//! critical section so neither scheduler can observe a half-initialized
//! module.

use core::fmt;

use crate::error::Error;
use crate::platform::ProgressIndicator;
use crate::sync;

/// Module initializer. The parameter is the value given in the list.
pub type ModuleInitFn = fn(u32) -> Result<(), Error>;

/// One step of the bring-up sequence.
#[derive(Debug, Clone, Copy)]
pub struct ModuleInit {
    pub name: &'static str,
    pub init: ModuleInitFn,
    pub param: u32,
}

impl ModuleInit {
    pub const fn new(name: &'static str, init: ModuleInitFn, param: u32) -> Self {
        Self { name, init, param }
    }
}

/// First failed step of a bring-up sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InitFailure {
    /// 1-based position in the module list
    pub step: usize,
    pub module: &'static str,
    pub error: Error,
    /// Failed steps in total
    pub failures: usize,
}

impl fmt::Display for InitFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "init step {} ({}) failed: {} [{} failed in total]",
            self.step, self.module, self.error, self.failures
        )
    }
}

/// Run every initializer in order under a critical section.
///
/// The indicator is shown the 1-based step number before each call.
///
/// # Returns
/// - `Ok(())` — every module initialized
/// - `Err(InitFailure)` — the first failing step; later steps still ran
pub fn initialize_all<I>(modules: &[ModuleInit], indicator: &mut I) -> Result<(), InitFailure>
where
    I: ProgressIndicator + ?Sized,
{
    sync::critical_section(|_cs| {
        let mut first: Option<InitFailure> = None;
        let mut failures = 0;

        for (index, module) in modules.iter().enumerate() {
            let step = index + 1;
            indicator.show_step(step);

            if let Err(error) = (module.init)(module.param) {
                crate::log_error!("init step {} ({}) failed: {}", step, module.name, error);
                failures += 1;
                if first.is_none() {
                    first = Some(InitFailure {
                        step,
                        module: module.name,
                        error,
                        failures: 0,
                    });
                }
            } else {
                crate::log_trace!("init step {} ({}) done", step, module.name);
            }
        }

        match first {
            Some(failure) => Err(InitFailure { failures, ..failure }),
            None => {
                crate::log_info!("{} modules initialized", modules.len());
                Ok(())
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec::Vec;

    struct Recorder(Vec<usize>);

    impl ProgressIndicator for Recorder {
        fn show_step(&mut self, step: usize) {
            self.0.push(step);
        }
    }

    fn ok(_: u32) -> Result<(), Error> {
        Ok(())
    }

    fn fault(code: u32) -> Result<(), Error> {
        Err(Error::ModuleFault { code })
    }

    #[test]
    fn test_all_succeed() {
        let modules = [
            ModuleInit::new("encoder", ok, 0),
            ModuleInit::new("power_stage", ok, 1),
        ];
        let mut recorder = Recorder(Vec::new());
        assert_eq!(initialize_all(&modules, &mut recorder), Ok(()));
        assert_eq!(recorder.0, [1usize, 2]);
    }

    #[test]
    fn test_first_failure_reported_and_all_run() {
        use core::sync::atomic::{AtomicU32, Ordering};
        static LAST_RUN: AtomicU32 = AtomicU32::new(0);
        fn tail(param: u32) -> Result<(), Error> {
            LAST_RUN.store(param, Ordering::Relaxed);
            Ok(())
        }

        let modules = [
            ModuleInit::new("encoder", ok, 0),
            ModuleInit::new("current_loop", fault, 11),
            ModuleInit::new("speed_loop", fault, 12),
            ModuleInit::new("watchdog", tail, 77),
        ];
        let mut recorder = Recorder(Vec::new());
        let failure = initialize_all(&modules, &mut recorder).unwrap_err();

        assert_eq!(failure.step, 2);
        assert_eq!(failure.module, "current_loop");
        assert_eq!(failure.error, Error::ModuleFault { code: 11 });
        assert_eq!(failure.failures, 2);
        assert_eq!(recorder.0, [1usize, 2, 3, 4]);
        assert_eq!(LAST_RUN.load(Ordering::Relaxed), 77);
    }

    #[test]
    fn test_empty_list() {
        assert_eq!(initialize_all(&[], &mut ()), Ok(()));
    }

    #[test]
    fn test_failure_display() {
        use std::string::ToString;
        let failure = InitFailure {
            step: 3,
            module: "plc",
            error: Error::RtTableFull { capacity: 32 },
            failures: 1,
        };
        assert_eq!(
            failure.to_string(),
            "init step 3 (plc) failed: RT task table full (32 slots) [1 failed in total]"
        );
    }
}
