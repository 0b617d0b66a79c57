//! What the tracker needs from the host event loop.
//!
//! The tracker schedules nothing itself. It asks the host for one idle-phase
//! wakeup whenever destroy ids start queueing, and it consults the host's
//! pending-work queue at the end of every outermost callback.
//!
//! [`ManualLoop`] is a host driven by hand, for tests and for embedders
//! that step their loop explicitly.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use tracing::debug;
use wraptrace_core::FatalHookError;
use wraptrace_core::logging::TARGET;

use crate::env::Environment;

/// Host event loop services consumed by the tracker.
pub trait HostLoop {
    /// Run [`Environment::run_idle`] once during the next idle phase.
    fn request_idle(&self);

    /// Number of entries waiting in the pending-work queue.
    fn pending_work(&self) -> usize;

    /// Drain the pending-work queue. Called at most once per outermost callback.
    fn drain_pending(&self) -> anyhow::Result<()>;

    /// Microtask checkpoint, run when the pending-work queue is empty.
    fn run_microtasks(&self) {}

    /// Reset the pending-work queue's read index after it was found empty.
    fn reset_pending_index(&self) {}

    /// A hook failed. Terminate, report, or record; the tracker has already
    /// aborted whatever it was doing.
    fn on_fatal(&self, _err: &FatalHookError) {}
}

type PendingTask = Box<dyn FnOnce() -> anyhow::Result<()>>;

/// A [`HostLoop`] stepped explicitly by its owner.
#[derive(Default)]
pub struct ManualLoop {
    idle_armed: Cell<bool>,
    idle_requests: Cell<usize>,
    pending: RefCell<VecDeque<PendingTask>>,
    drains: Cell<usize>,
    microtask_checkpoints: Cell<usize>,
    index_resets: Cell<usize>,
    fatal_errors: RefCell<Vec<String>>,
}

impl ManualLoop {
    /// Create a loop with nothing pending.
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Queue pending work, drained at the end of the next outermost callback.
    pub fn push_pending<F>(&self, task: F)
    where
        F: FnOnce() -> anyhow::Result<()> + 'static,
    {
        self.pending.borrow_mut().push_back(Box::new(task));
    }

    /// Run the idle phase if the tracker asked for it.
    ///
    /// Returns the number of destroy notifications delivered.
    pub fn run_idle(&self, env: &Environment) -> Result<usize, FatalHookError> {
        if !self.idle_armed.replace(false) {
            return Ok(0);
        }
        env.run_idle()
    }

    /// Whether an idle wakeup is outstanding.
    #[must_use]
    pub fn idle_armed(&self) -> bool {
        self.idle_armed.get()
    }

    /// Total idle wakeups requested.
    #[must_use]
    pub fn idle_requests(&self) -> usize {
        self.idle_requests.get()
    }

    /// Total pending-work drains.
    #[must_use]
    pub fn drains(&self) -> usize {
        self.drains.get()
    }

    /// Total microtask checkpoints.
    #[must_use]
    pub fn microtask_checkpoints(&self) -> usize {
        self.microtask_checkpoints.get()
    }

    /// Total pending index resets.
    #[must_use]
    pub fn index_resets(&self) -> usize {
        self.index_resets.get()
    }

    /// Messages of every fatal error reported so far.
    #[must_use]
    pub fn fatal_errors(&self) -> Vec<String> {
        self.fatal_errors.borrow().clone()
    }
}

impl HostLoop for ManualLoop {
    fn request_idle(&self) {
        self.idle_armed.set(true);
        self.idle_requests.set(self.idle_requests.get() + 1);
    }

    fn pending_work(&self) -> usize {
        self.pending.borrow().len()
    }

    fn drain_pending(&self) -> anyhow::Result<()> {
        self.drains.set(self.drains.get() + 1);
        // Pop one at a time: a task may queue more work or re-enter the tracker.
        loop {
            let task = self.pending.borrow_mut().pop_front();
            match task {
                Some(task) => task()?,
                None => return Ok(()),
            }
        }
    }

    fn run_microtasks(&self) {
        self.microtask_checkpoints
            .set(self.microtask_checkpoints.get() + 1);
    }

    fn reset_pending_index(&self) {
        self.index_resets.set(self.index_resets.get() + 1);
    }

    fn on_fatal(&self, err: &FatalHookError) {
        debug!(target: TARGET, error = %err, "fatal error recorded by manual loop");
        self.fatal_errors.borrow_mut().push(err.to_string());
    }
}

impl fmt::Debug for ManualLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualLoop")
            .field("idle_armed", &self.idle_armed.get())
            .field("pending", &self.pending.borrow().len())
            .field("drains", &self.drains.get())
            .finish_non_exhaustive()
    }
}
