//! Shared numeric field views.
//!
//! Two fixed-layout buffers let instrumentation and the tracker talk without
//! a function call: instrumentation bumps a phase counter to turn that phase
//! on, and reads/writes the id slots directly. Both sides agree on the slot
//! indices below; either may mutate at any time on the owning thread.

use std::cell::Cell;
use std::collections::BTreeMap;

use tracing::warn;
use wraptrace_core::logging::TARGET;
use wraptrace_core::{AsyncId, HookPhase};

/// `u32` counters, one per hook phase plus the active-hook tally.
#[derive(Debug, Default)]
pub struct HookFields {
    slots: [Cell<u32>; HookFields::LEN],
}

impl HookFields {
    /// Slot of the init counter.
    pub const INIT: usize = HookPhase::Init.index();
    /// Slot of the before counter.
    pub const BEFORE: usize = HookPhase::Before.index();
    /// Slot of the after counter.
    pub const AFTER: usize = HookPhase::After.index();
    /// Slot of the destroy counter.
    pub const DESTROY: usize = HookPhase::Destroy.index();
    /// Slot of the total number of enabled hook sets.
    pub const ACTIVE_HOOKS: usize = 4;
    /// Number of slots.
    pub const LEN: usize = 5;

    /// Create a zeroed buffer; every phase starts inactive.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw slots, for embedders that expose the buffer directly.
    #[must_use]
    pub fn cells(&self) -> &[Cell<u32>; Self::LEN] {
        &self.slots
    }

    /// Read a slot by index.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<u32> {
        self.slots.get(index).map(Cell::get)
    }

    /// Write a slot by index. Returns `false` if the index is out of range.
    pub fn set(&self, index: usize, value: u32) -> bool {
        match self.slots.get(index) {
            Some(slot) => {
                slot.set(value);
                true
            }
            None => false,
        }
    }

    /// Current counter for `phase`.
    #[inline]
    #[must_use]
    pub fn count(&self, phase: HookPhase) -> u32 {
        self.slots[phase.index()].get()
    }

    /// Number of enabled hook sets.
    #[must_use]
    pub fn active_hooks(&self) -> u32 {
        self.slots[Self::ACTIVE_HOOKS].get()
    }

    /// Bump the counter for `phase`.
    pub fn increment(&self, phase: HookPhase) {
        let slot = &self.slots[phase.index()];
        slot.set(slot.get().saturating_add(1));
    }

    /// Drop the counter for `phase`, never below zero.
    pub fn decrement(&self, phase: HookPhase) {
        let slot = &self.slots[phase.index()];
        match slot.get().checked_sub(1) {
            Some(v) => slot.set(v),
            None => warn!(target: TARGET, %phase, "hook counter decremented below zero"),
        }
    }

    /// Bump the active-hook tally.
    pub fn increment_active(&self) {
        let slot = &self.slots[Self::ACTIVE_HOOKS];
        slot.set(slot.get().saturating_add(1));
    }

    /// Drop the active-hook tally, never below zero.
    pub fn decrement_active(&self) {
        let slot = &self.slots[Self::ACTIVE_HOOKS];
        slot.set(slot.get().saturating_sub(1));
    }

    /// Copy of every slot.
    #[must_use]
    pub fn snapshot(&self) -> [u32; Self::LEN] {
        std::array::from_fn(|i| self.slots[i].get())
    }
}

/// `f64` slots holding the id counter and the causal context pair.
#[derive(Debug, Default)]
pub struct UidFields {
    slots: [Cell<f64>; UidFields::LEN],
}

impl UidFields {
    /// Last id handed out.
    pub const ASYNC_UID_COUNTER: usize = 0;
    /// Id of the resource whose callback is running.
    pub const CURRENT_ID: usize = 1;
    /// Trigger id of the resource whose callback is running.
    pub const TRIGGER_ID: usize = 2;
    /// One-shot trigger override for the next constructed resource.
    pub const INIT_TRIGGER_ID: usize = 3;
    /// Trigger id for every resource built inside a trigger-id scope.
    pub const SCOPED_TRIGGER_ID: usize = 4;
    /// Number of slots.
    pub const LEN: usize = 5;

    /// Create a zeroed buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw slots, for embedders that expose the buffer directly.
    #[must_use]
    pub fn cells(&self) -> &[Cell<f64>; Self::LEN] {
        &self.slots
    }

    /// Read a slot by index.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<f64> {
        self.slots.get(index).map(Cell::get)
    }

    /// Write a slot by index. Returns `false` if the index is out of range.
    pub fn set(&self, index: usize, value: f64) -> bool {
        match self.slots.get(index) {
            Some(slot) => {
                slot.set(value);
                true
            }
            None => false,
        }
    }

    /// Read an id slot.
    #[inline]
    #[must_use]
    pub fn id(&self, index: usize) -> AsyncId {
        AsyncId::new(self.slots[index].get())
    }

    /// Write an id slot.
    #[inline]
    pub fn set_id(&self, index: usize, id: AsyncId) {
        self.slots[index].set(id.as_f64());
    }

    /// Copy of every slot.
    #[must_use]
    pub fn snapshot(&self) -> [f64; Self::LEN] {
        std::array::from_fn(|i| self.slots[i].get())
    }
}

/// Read-only map of slot names to indices in both buffers.
#[must_use]
pub fn constants() -> BTreeMap<&'static str, usize> {
    BTreeMap::from([
        ("init", HookFields::INIT),
        ("before", HookFields::BEFORE),
        ("after", HookFields::AFTER),
        ("destroy", HookFields::DESTROY),
        ("activeHooks", HookFields::ACTIVE_HOOKS),
        ("asyncUidCounter", UidFields::ASYNC_UID_COUNTER),
        ("currentId", UidFields::CURRENT_ID),
        ("triggerId", UidFields::TRIGGER_ID),
        ("initTriggerId", UidFields::INIT_TRIGGER_ID),
        ("scopedTriggerId", UidFields::SCOPED_TRIGGER_ID),
    ])
}
