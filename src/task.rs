//! # Task Descriptors
//!
//! Defines the RT and background task model. An RT task is a plain function
//! pointer plus an execution policy and a status gate; a background task is
//! just a function pointer that runs every background pass.
//!
//! ## Execution Policy
//!
//! The registration flags of the control firmware are a bitmask. Internally
//! they are decoded once, at registration, into an [`ExecPolicy`] composed of
//! three independent parts:
//!
//! ```text
//!   EVERY_N_SLOTS        ──► Cadence   { EverySlot | EveryNSlots { n } }
//!   EXECUTE_ODD/EVEN     ──► PhaseGate { Any | Odd | Even }
//!   REITERATE / OPTIONAL ──► RunMode   { Once | Optional | Reiterate { optional } }
//! ```
//!
//! Gating is evaluated in the order cadence → status gate → phase. Any
//! failing check skips the task for the current invocation only.

use bitflags::bitflags;

use crate::status::{StatusGate, SystemStatus};

/// RT task entry point. The argument is the value given at registration.
/// Returning `true` asks for another call in the same cycle when the task
/// was registered with [`RunMode::Reiterate`].
pub type RtTaskFn = fn(u32) -> bool;

/// Background task entry point.
pub type BackgroundTaskFn = fn();

// ---------------------------------------------------------------------------
// Registration flags
// ---------------------------------------------------------------------------

bitflags! {
    /// Registration flags as used by the control modules' task tables.
    /// `TaskFlags::empty()` is the plain "run whenever the gate matches" case.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TaskFlags: u8 {
        /// Call again while the task returns `true`
        const REITERATE_IF_TRUE  = 1 << 0;
        /// Work may be shed once the cycle exceeds the standard budget
        const OPTIONAL           = 1 << 1;
        /// Run only on odd-phase ticks
        const EXECUTE_ODD_PHASE  = 1 << 2;
        /// Run only on even-phase ticks
        const EXECUTE_EVEN_PHASE = 1 << 3;
        /// Run once every `n_slots` ticks
        const EVERY_N_SLOTS      = 1 << 4;
    }
}

// ---------------------------------------------------------------------------
// Execution policy
// ---------------------------------------------------------------------------

/// How often a task gets a scheduling opportunity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Cadence {
    /// Every RT tick.
    EverySlot,
    /// First tick after registration, then every `n`-th tick. `n >= 1`.
    EveryNSlots { n: u16 },
}

/// Which tick phase the task runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PhaseGate {
    Any,
    Odd,
    Even,
}

impl PhaseGate {
    #[inline]
    pub const fn admits(&self, odd_phase: bool) -> bool {
        match self {
            PhaseGate::Any => true,
            PhaseGate::Odd => odd_phase,
            PhaseGate::Even => !odd_phase,
        }
    }
}

/// What happens once a task passed gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RunMode {
    /// Call exactly once.
    Once,
    /// Call once, unless the cycle already exceeds the standard budget.
    Optional,
    /// Call while the task returns `true`. With `optional`, stop
    /// reiterating once the cycle exceeds the standard budget.
    Reiterate { optional: bool },
}

/// Composed execution policy of an RT task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ExecPolicy {
    pub cadence: Cadence,
    pub phase: PhaseGate,
    pub run: RunMode,
}

impl ExecPolicy {
    /// Every tick, both phases, called once.
    pub const UNCONDITIONAL: Self = Self {
        cadence: Cadence::EverySlot,
        phase: PhaseGate::Any,
        run: RunMode::Once,
    };

    /// Run every `n`-th tick. `n == 0` is treated as 1.
    pub const fn every_n_slots(self, n: u16) -> Self {
        let n = if n == 0 { 1 } else { n };
        Self {
            cadence: Cadence::EveryNSlots { n },
            ..self
        }
    }

    pub const fn odd_phase(self) -> Self {
        Self {
            phase: PhaseGate::Odd,
            ..self
        }
    }

    pub const fn even_phase(self) -> Self {
        Self {
            phase: PhaseGate::Even,
            ..self
        }
    }

    /// Mark the work as sheddable under load.
    pub const fn optional(self) -> Self {
        let run = match self.run {
            RunMode::Once | RunMode::Optional => RunMode::Optional,
            RunMode::Reiterate { .. } => RunMode::Reiterate { optional: true },
        };
        Self { run, ..self }
    }

    /// Call again while the task returns `true`. Keeps the optional marker.
    pub const fn reiterate(self) -> Self {
        let optional = matches!(
            self.run,
            RunMode::Optional | RunMode::Reiterate { optional: true }
        );
        Self {
            run: RunMode::Reiterate { optional },
            ..self
        }
    }

    /// Decode registration flags. `n_slots` is only read when
    /// `EVERY_N_SLOTS` is set. Both phase flags together leave the task
    /// unrestricted.
    pub const fn from_flags(flags: TaskFlags, n_slots: u16) -> Self {
        let cadence = if flags.contains(TaskFlags::EVERY_N_SLOTS) {
            Cadence::EveryNSlots {
                n: if n_slots == 0 { 1 } else { n_slots },
            }
        } else {
            Cadence::EverySlot
        };

        let odd = flags.contains(TaskFlags::EXECUTE_ODD_PHASE);
        let even = flags.contains(TaskFlags::EXECUTE_EVEN_PHASE);
        let phase = match (odd, even) {
            (true, false) => PhaseGate::Odd,
            (false, true) => PhaseGate::Even,
            _ => PhaseGate::Any,
        };

        let optional = flags.contains(TaskFlags::OPTIONAL);
        let run = if flags.contains(TaskFlags::REITERATE_IF_TRUE) {
            RunMode::Reiterate { optional }
        } else if optional {
            RunMode::Optional
        } else {
            RunMode::Once
        };

        Self {
            cadence,
            phase,
            run,
        }
    }

    /// Inverse of [`from_flags`](Self::from_flags), for diagnostics.
    pub fn flags(&self) -> TaskFlags {
        let mut flags = TaskFlags::empty();
        if let Cadence::EveryNSlots { .. } = self.cadence {
            flags |= TaskFlags::EVERY_N_SLOTS;
        }
        match self.phase {
            PhaseGate::Any => {}
            PhaseGate::Odd => flags |= TaskFlags::EXECUTE_ODD_PHASE,
            PhaseGate::Even => flags |= TaskFlags::EXECUTE_EVEN_PHASE,
        }
        match self.run {
            RunMode::Once => {}
            RunMode::Optional => flags |= TaskFlags::OPTIONAL,
            RunMode::Reiterate { optional } => {
                flags |= TaskFlags::REITERATE_IF_TRUE;
                if optional {
                    flags |= TaskFlags::OPTIONAL;
                }
            }
        }
        flags
    }
}

impl Default for ExecPolicy {
    fn default() -> Self {
        Self::UNCONDITIONAL
    }
}

// ---------------------------------------------------------------------------
// RT task entry
// ---------------------------------------------------------------------------

/// One occupied slot of the RT table.
#[derive(Debug, Clone, Copy)]
pub struct RtTaskEntry {
    task: RtTaskFn,
    policy: ExecPolicy,
    gate: StatusGate,
    arg: u32,
    /// Ticks left until the next opportunity of an `EveryNSlots` task.
    /// Starts at 1 so the first opportunity fires.
    slot_countdown: u16,
    /// Ticks consumed by the most recent invocation(s).
    last_exec_time: u32,
}

impl RtTaskEntry {
    pub const fn new(task: RtTaskFn, policy: ExecPolicy, gate: StatusGate, arg: u32) -> Self {
        Self {
            task,
            policy,
            gate,
            arg,
            slot_countdown: 1,
            last_exec_time: 0,
        }
    }

    /// Apply the gating rules for one RT invocation.
    ///
    /// Advances the `EveryNSlots` countdown as a side effect, so this must
    /// be called exactly once per entry per invocation.
    pub fn admit(&mut self, status: SystemStatus, odd_phase: bool) -> bool {
        if let Cadence::EveryNSlots { n } = self.policy.cadence {
            self.slot_countdown = self.slot_countdown.saturating_sub(1);
            if self.slot_countdown > 0 {
                return false;
            }
            self.slot_countdown = n;
        }

        if !self.gate.admits(status) {
            return false;
        }

        self.policy.phase.admits(odd_phase)
    }

    /// Call the task once.
    #[inline]
    pub fn call(&self) -> bool {
        (self.task)(self.arg)
    }

    #[inline]
    pub fn policy(&self) -> ExecPolicy {
        self.policy
    }

    #[inline]
    pub fn gate(&self) -> StatusGate {
        self.gate
    }

    #[inline]
    pub fn arg(&self) -> u32 {
        self.arg
    }

    #[inline]
    pub fn slot_countdown(&self) -> u16 {
        self.slot_countdown
    }

    #[inline]
    pub fn last_exec_time(&self) -> u32 {
        self.last_exec_time
    }

    #[inline]
    pub(crate) fn set_last_exec_time(&mut self, ticks: u32) {
        self.last_exec_time = ticks;
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: u32) -> bool {
        false
    }

    #[test]
    fn test_from_flags_none() {
        let policy = ExecPolicy::from_flags(TaskFlags::empty(), 0);
        assert_eq!(policy, ExecPolicy::UNCONDITIONAL);
        assert_eq!(policy.flags(), TaskFlags::empty());
    }

    #[test]
    fn test_from_flags_composition() {
        let policy = ExecPolicy::from_flags(
            TaskFlags::REITERATE_IF_TRUE | TaskFlags::OPTIONAL | TaskFlags::EVERY_N_SLOTS,
            8,
        );
        assert_eq!(policy.cadence, Cadence::EveryNSlots { n: 8 });
        assert_eq!(policy.phase, PhaseGate::Any);
        assert_eq!(policy.run, RunMode::Reiterate { optional: true });

        let policy = ExecPolicy::from_flags(TaskFlags::OPTIONAL | TaskFlags::EXECUTE_EVEN_PHASE, 8);
        assert_eq!(policy.cadence, Cadence::EverySlot);
        assert_eq!(policy.phase, PhaseGate::Even);
        assert_eq!(policy.run, RunMode::Optional);
    }

    #[test]
    fn test_both_phase_flags_unrestricted() {
        let policy = ExecPolicy::from_flags(
            TaskFlags::EXECUTE_ODD_PHASE | TaskFlags::EXECUTE_EVEN_PHASE,
            0,
        );
        assert_eq!(policy.phase, PhaseGate::Any);
    }

    #[test]
    fn test_zero_slots_clamped() {
        let policy = ExecPolicy::from_flags(TaskFlags::EVERY_N_SLOTS, 0);
        assert_eq!(policy.cadence, Cadence::EveryNSlots { n: 1 });
        assert_eq!(
            ExecPolicy::UNCONDITIONAL.every_n_slots(0).cadence,
            Cadence::EveryNSlots { n: 1 }
        );
    }

    #[test]
    fn test_builder_matches_flags() {
        let built = ExecPolicy::UNCONDITIONAL.optional().reiterate().odd_phase();
        let decoded = ExecPolicy::from_flags(
            TaskFlags::OPTIONAL | TaskFlags::REITERATE_IF_TRUE | TaskFlags::EXECUTE_ODD_PHASE,
            0,
        );
        assert_eq!(built, decoded);
        assert_eq!(ExecPolicy::from_flags(built.flags(), 0), built);
    }

    #[test]
    fn test_every_n_slots_countdown() {
        let policy = ExecPolicy::UNCONDITIONAL.every_n_slots(3);
        let mut entry = RtTaskEntry::new(noop, policy, StatusGate::ALWAYS, 0);
        let status = SystemStatus::empty();

        let pattern: [bool; 7] = core::array::from_fn(|_| entry.admit(status, false));
        assert_eq!(pattern, [true, false, false, true, false, false, true]);
        assert_eq!(entry.slot_countdown(), 3);
    }

    #[test]
    fn test_countdown_runs_while_gate_closed() {
        let policy = ExecPolicy::UNCONDITIONAL.every_n_slots(2);
        let gate = StatusGate::require(SystemStatus::BOOT_LOCKED);
        let mut entry = RtTaskEntry::new(noop, policy, gate, 0);

        // First opportunity consumed even though the gate rejects it
        assert!(!entry.admit(SystemStatus::empty(), false));
        assert!(!entry.admit(SystemStatus::BOOT_LOCKED, false));
        assert!(entry.admit(SystemStatus::BOOT_LOCKED, false));
    }

    #[test]
    fn test_phase_gate() {
        let mut entry = RtTaskEntry::new(
            noop,
            ExecPolicy::UNCONDITIONAL.even_phase(),
            StatusGate::ALWAYS,
            0,
        );
        assert!(entry.admit(SystemStatus::empty(), false));
        assert!(!entry.admit(SystemStatus::empty(), true));
    }
}
