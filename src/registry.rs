//! # Task Registry
//!
//! Fixed-capacity slot tables for RT and background tasks, and the
//! registration API used during bring-up.
//!
//! Tables are append-only: a slot is claimed by the first registration that
//! finds it vacant and is only released by [`TaskRegistry::init`]. Iteration
//! stops at the first vacant slot, which is always the end of the occupied
//! prefix.
//!
//! The registry does no locking of its own. It is filled single-threaded
//! before the tick source is enabled, then split with
//! [`TaskRegistry::into_tables`] and handed to the schedulers.

use crate::config::{BACKGROUND_TASK_CAPACITY, RT_TASK_CAPACITY};
use crate::error::Error;
use crate::status::StatusGate;
use crate::task::{BackgroundTaskFn, ExecPolicy, RtTaskEntry, RtTaskFn, TaskFlags};

// ---------------------------------------------------------------------------
// Slot table
// ---------------------------------------------------------------------------

/// Fixed array of optional slots. Occupied slots always form a prefix.
#[derive(Debug, Clone)]
pub struct SlotTable<T, const N: usize> {
    slots: [Option<T>; N],
    len: usize,
}

impl<T, const N: usize> SlotTable<T, N> {
    const VACANT: Option<T> = None;

    pub const fn new() -> Self {
        Self {
            slots: [Self::VACANT; N],
            len: 0,
        }
    }

    /// Claim the first vacant slot. Returns its index, or `None` when full.
    pub fn insert(&mut self, item: T) -> Option<usize> {
        let index = self.slots.iter().position(Option::is_none)?;
        self.slots[index] = Some(item);
        self.len += 1;
        Some(index)
    }

    /// Vacate every slot.
    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
        self.len = 0;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.slots.get(index)?.as_ref()
    }

    /// Occupied slots in table order, up to the first vacant one.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.slots.iter().map_while(Option::as_ref)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.slots.iter_mut().map_while(Option::as_mut)
    }
}

impl<T, const N: usize> Default for SlotTable<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

/// The RT task table.
pub type RtTable = SlotTable<RtTaskEntry, RT_TASK_CAPACITY>;

/// The background task table.
pub type BackgroundTable = SlotTable<BackgroundTaskFn, BACKGROUND_TASK_CAPACITY>;

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Both task tables, as filled during bring-up.
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    rt: RtTable,
    background: BackgroundTable,
}

impl TaskRegistry {
    pub const fn new() -> Self {
        Self {
            rt: RtTable::new(),
            background: BackgroundTable::new(),
        }
    }

    /// Vacate every slot of both tables.
    pub fn init(&mut self) {
        self.rt.clear();
        self.background.clear();
    }

    /// Register an RT task.
    ///
    /// The entry's slot countdown starts at 1, so an `EveryNSlots` task runs
    /// on its very first opportunity and then reloads to `n`.
    ///
    /// # Returns
    /// - `Ok(index)` — the slot the task landed in
    /// - `Err(Error::RtTableFull)` — no slot left; the table is unchanged
    pub fn add_rt_task(
        &mut self,
        task: RtTaskFn,
        policy: ExecPolicy,
        gate: StatusGate,
        arg: u32,
    ) -> Result<usize, Error> {
        let entry = RtTaskEntry::new(task, policy, gate, arg);
        self.rt.insert(entry).ok_or_else(|| {
            crate::log_warn!("RT task table full ({} slots)", RT_TASK_CAPACITY);
            Error::RtTableFull {
                capacity: RT_TASK_CAPACITY,
            }
        })
    }

    /// Register an RT task described by registration flags.
    pub fn add_rt_task_flags(
        &mut self,
        task: RtTaskFn,
        flags: TaskFlags,
        status_select: u32,
        status_mask: u32,
        n_slots: u16,
        arg: u32,
    ) -> Result<usize, Error> {
        self.add_rt_task(
            task,
            ExecPolicy::from_flags(flags, n_slots),
            StatusGate::new(status_select, status_mask),
            arg,
        )
    }

    /// Register a background task.
    pub fn add_background_task(&mut self, task: BackgroundTaskFn) -> Result<usize, Error> {
        self.background.insert(task).ok_or_else(|| {
            crate::log_warn!(
                "background task table full ({} slots)",
                BACKGROUND_TASK_CAPACITY
            );
            Error::BackgroundTableFull {
                capacity: BACKGROUND_TASK_CAPACITY,
            }
        })
    }

    #[inline]
    pub fn rt_len(&self) -> usize {
        self.rt.len()
    }

    #[inline]
    pub fn background_len(&self) -> usize {
        self.background.len()
    }

    /// Hand the frozen tables over to the schedulers.
    pub fn into_tables(self) -> (RtTable, BackgroundTable) {
        (self.rt, self.background)
    }

    /// Move the tables out, leaving this registry empty.
    pub fn take_tables(&mut self) -> (RtTable, BackgroundTable) {
        core::mem::take(self).into_tables()
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Cadence;

    fn rt_a(_: u32) -> bool {
        false
    }

    fn bg_a() {}

    #[test]
    fn test_slot_table_prefix() {
        let mut table: SlotTable<u8, 4> = SlotTable::new();
        assert!(table.is_empty());
        assert_eq!(table.insert(10), Some(0));
        assert_eq!(table.insert(11), Some(1));
        assert_eq!(table.len(), 2);
        assert_eq!(table.iter().copied().collect::<std::vec::Vec<_>>(), [10u8, 11]);
        assert_eq!(table.get(1), Some(&11));
        assert_eq!(table.get(2), None);
        assert_eq!(table.get(9), None);
    }

    #[test]
    fn test_slot_table_full() {
        let mut table: SlotTable<u8, 2> = SlotTable::new();
        table.insert(1);
        table.insert(2);
        assert_eq!(table.insert(3), None);
        assert_eq!(table.len(), 2);

        table.clear();
        assert!(table.is_empty());
        assert_eq!(table.iter().count(), 0);
        assert_eq!(table.insert(4), Some(0));
    }

    #[test]
    fn test_add_rt_task_initial_countdown() {
        let mut registry = TaskRegistry::new();
        let index = registry
            .add_rt_task_flags(rt_a, TaskFlags::EVERY_N_SLOTS, 0, 0, 5, 42)
            .unwrap();
        assert_eq!(index, 0);

        let (rt, _) = registry.into_tables();
        let entry = rt.get(0).unwrap();
        assert_eq!(entry.slot_countdown(), 1);
        assert_eq!(entry.arg(), 42);
        assert_eq!(entry.policy().cadence, Cadence::EveryNSlots { n: 5 });
    }

    #[test]
    fn test_rt_exhaustion_leaves_entries_untouched() {
        let mut registry = TaskRegistry::new();
        for i in 0..RT_TASK_CAPACITY {
            let slot = registry
                .add_rt_task(rt_a, ExecPolicy::UNCONDITIONAL, StatusGate::ALWAYS, i as u32)
                .unwrap();
            assert_eq!(slot, i);
        }

        let result = registry.add_rt_task(
            rt_a,
            ExecPolicy::UNCONDITIONAL.odd_phase(),
            StatusGate::new(1, 1),
            999,
        );
        assert_eq!(
            result,
            Err(Error::RtTableFull {
                capacity: RT_TASK_CAPACITY
            })
        );

        assert_eq!(registry.rt_len(), RT_TASK_CAPACITY);
        let (rt, _) = registry.into_tables();
        for (i, entry) in rt.iter().enumerate() {
            assert_eq!(entry.arg(), i as u32);
            assert_eq!(entry.policy(), ExecPolicy::UNCONDITIONAL);
            assert_eq!(entry.gate(), StatusGate::ALWAYS);
        }
    }

    #[test]
    fn test_background_exhaustion() {
        let mut registry = TaskRegistry::new();
        for _ in 0..BACKGROUND_TASK_CAPACITY {
            registry.add_background_task(bg_a).unwrap();
        }
        assert_eq!(
            registry.add_background_task(bg_a),
            Err(Error::BackgroundTableFull {
                capacity: BACKGROUND_TASK_CAPACITY
            })
        );
        assert_eq!(registry.background_len(), BACKGROUND_TASK_CAPACITY);
    }

    #[test]
    fn test_init_vacates_tables() {
        let mut registry = TaskRegistry::new();
        registry
            .add_rt_task(rt_a, ExecPolicy::UNCONDITIONAL, StatusGate::ALWAYS, 0)
            .unwrap();
        registry.add_background_task(bg_a).unwrap();

        registry.init();
        assert_eq!(registry.rt_len(), 0);
        assert_eq!(registry.background_len(), 0);
    }

    #[test]
    fn test_take_tables() {
        let mut registry = TaskRegistry::new();
        registry
            .add_rt_task(rt_a, ExecPolicy::UNCONDITIONAL, StatusGate::ALWAYS, 0)
            .unwrap();
        registry.add_background_task(bg_a).unwrap();
        registry.add_background_task(bg_a).unwrap();

        let (rt, background) = registry.take_tables();
        assert_eq!(rt.len(), 1);
        assert_eq!(background.len(), 2);
        assert_eq!(registry.rt_len(), 0);
    }
}
