//! Deferred destroy queue.
//!
//! Destroy notifications are never delivered at finalization time: the
//! finalizing code may be running somewhere hooks must not observe. Ids are
//! collected here and handed out as one batch from the host's idle phase.
//!
//! Each batch gets a sequence number. An id enqueued while batch `n` is
//! being delivered belongs to batch `n + 1`.

use std::cell::{Cell, RefCell};
use std::mem;

use wraptrace_core::AsyncId;

/// Ordered pending destroy ids plus the armed flag.
#[derive(Debug, Default)]
pub struct DestroyQueue {
    ids: RefCell<Vec<AsyncId>>,
    initial_capacity: usize,
    armed: Cell<bool>,
    flushing: Cell<bool>,
    taken: Cell<u64>,
    completed: Cell<u64>,
}

/// Result of [`DestroyQueue::enqueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Enqueued {
    /// Sequence number of the batch the id will be delivered in.
    pub batch: u64,
    /// The queue was idle; the caller must request an idle wakeup.
    pub armed_now: bool,
}

impl DestroyQueue {
    /// Empty queue reserving `initial_capacity` ids per batch.
    #[must_use]
    pub fn with_capacity(initial_capacity: usize) -> Self {
        Self {
            ids: RefCell::new(Vec::new()),
            initial_capacity,
            ..Self::default()
        }
    }

    /// Append `id`; arm the queue if it was idle.
    pub fn enqueue(&self, id: AsyncId) -> Enqueued {
        let mut ids = self.ids.borrow_mut();
        debug_assert!(!ids.contains(&id), "async id {id} enqueued for destroy twice");
        if ids.capacity() == 0 {
            ids.reserve(self.initial_capacity);
        }
        ids.push(id);
        let armed_now = !self.armed.replace(true);
        Enqueued {
            batch: self.taken.get(),
            armed_now,
        }
    }

    /// Take every pending id for delivery and disarm.
    ///
    /// Returns `None` when nothing is queued or a batch is already being
    /// delivered; ids queued meanwhile wait for the next idle wakeup.
    pub fn take_batch(&self) -> Option<Vec<AsyncId>> {
        if self.flushing.get() || !self.armed.get() {
            return None;
        }
        self.armed.set(false);
        self.flushing.set(true);
        self.taken.set(self.taken.get() + 1);
        Some(mem::take(&mut *self.ids.borrow_mut()))
    }

    /// Mark the batch returned by the last [`take_batch`](Self::take_batch) as delivered.
    pub fn finish_batch(&self) {
        debug_assert!(self.flushing.get(), "finish_batch without take_batch");
        self.flushing.set(false);
        self.completed.set(self.taken.get());
    }

    /// Whether batch `batch` has been fully delivered.
    #[must_use]
    pub fn is_delivered(&self, batch: u64) -> bool {
        self.completed.get() > batch
    }

    /// Whether an idle wakeup is outstanding.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.armed.get()
    }

    /// Whether a batch is being delivered right now.
    #[must_use]
    pub fn is_flushing(&self) -> bool {
        self.flushing.get()
    }

    /// Ids waiting for the next batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.borrow().len()
    }

    /// Whether no id is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.borrow().is_empty()
    }
}
