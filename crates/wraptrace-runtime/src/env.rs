//! Per-runtime tracker state.
//!
//! An [`Environment`] owns everything that would otherwise be process
//! global: the hook registry, the shared uid fields, the destroy queue, and
//! the callback nesting counter. Several environments may coexist on one
//! thread; they share nothing.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, error, info, trace, warn};
use wraptrace_core::logging::TARGET;
use wraptrace_core::{AsyncId, FatalHookError, HookPhase};
use wraptrace_hooks::{HookBundle, HookRegistry, UidFields};
use wraptrace_settings::WraptraceSettings;

use crate::destroy_queue::DestroyQueue;
use crate::errors::RuntimeError;
use crate::host::HostLoop;
use crate::scope::{ExecScope, TriggerIdScope};

/// Smallest integer `f64` without a distinct successor.
const MAX_EXACT_ID: f64 = 9_007_199_254_740_992.0;

/// Install the global subscriber described by `settings.logging`.
pub fn init_logging(settings: &WraptraceSettings) {
    let logging = &settings.logging;
    if logging.json {
        wraptrace_core::logging::init_json_subscriber(&logging.level);
    } else {
        wraptrace_core::logging::init_subscriber(&logging.level);
    }
}

/// Tracker state for one runtime instance.
pub struct Environment {
    hooks: HookRegistry,
    uid_fields: UidFields,
    last_issued: Cell<f64>,
    destroy_queue: DestroyQueue,
    callback_depth: Cell<u32>,
    scope_depth: Cell<usize>,
    using_domains: Cell<bool>,
    torn_down: Cell<bool>,
    host: Rc<dyn HostLoop>,
    settings: WraptraceSettings,
}

impl Environment {
    /// Create an environment bound to `host`.
    ///
    /// The root context owns id 1, so the first resource gets id 2. No scope
    /// is entered: the current id reads 0 until the embedder enters one.
    #[must_use]
    pub fn new(host: Rc<dyn HostLoop>, settings: WraptraceSettings) -> Rc<Self> {
        let uid_fields = UidFields::new();
        uid_fields.set_id(UidFields::ASYNC_UID_COUNTER, AsyncId::ROOT);
        let env = Self {
            hooks: HookRegistry::new(),
            uid_fields,
            last_issued: Cell::new(AsyncId::ROOT.as_f64()),
            destroy_queue: DestroyQueue::with_capacity(settings.destroy_queue.initial_capacity),
            callback_depth: Cell::new(0),
            scope_depth: Cell::new(0),
            using_domains: Cell::new(settings.domains.enabled),
            torn_down: Cell::new(false),
            host,
            settings,
        };
        debug!(target: TARGET, domains = env.using_domains.get(), "environment created");
        Rc::new(env)
    }

    /// Install the four instrumentation hooks.
    pub fn setup_hooks(&self, bundle: HookBundle) -> Result<(), RuntimeError> {
        self.hooks.install(bundle)?;
        Ok(())
    }

    /// The hook registry and its phase counters.
    #[must_use]
    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    /// The shared id slots.
    #[must_use]
    pub fn uid_fields(&self) -> &UidFields {
        &self.uid_fields
    }

    /// Settings this environment was built with.
    #[must_use]
    pub fn settings(&self) -> &WraptraceSettings {
        &self.settings
    }

    /// The host event loop.
    #[must_use]
    pub fn host(&self) -> &Rc<dyn HostLoop> {
        &self.host
    }

    /// Issue a fresh id, strictly greater than every id issued before.
    ///
    /// Instrumentation may rewrite the counter slot. Values below the last
    /// issued id are ignored, and so are values outside the exactly
    /// representable integer range (non-finite, or at or above 2^53), where
    /// adding one would no longer produce a new id.
    ///
    /// # Panics
    ///
    /// Panics if the id space itself is exhausted.
    pub fn new_async_id(&self) -> AsyncId {
        let last = self.last_issued.get();
        let raw = self.uid_fields.id(UidFields::ASYNC_UID_COUNTER).as_f64();
        let counter = if raw.is_finite() && raw < MAX_EXACT_ID {
            raw
        } else {
            warn!(target: TARGET, counter = raw, last, "async id counter out of range, ignored");
            last
        };
        let next = AsyncId::new(counter.max(last)).next();
        assert!(
            next.as_f64() > last,
            "async id space exhausted after {last}"
        );
        self.last_issued.set(next.as_f64());
        self.uid_fields.set_id(UidFields::ASYNC_UID_COUNTER, next);
        next
    }

    /// Id of the resource whose callback is running, 0 if none.
    #[must_use]
    pub fn current_id(&self) -> AsyncId {
        self.uid_fields.id(UidFields::CURRENT_ID)
    }

    /// Trigger id of the resource whose callback is running, 0 if none.
    #[must_use]
    pub fn current_trigger_id(&self) -> AsyncId {
        self.uid_fields.id(UidFields::TRIGGER_ID)
    }

    /// Replace the one-shot trigger override, returning the previous value.
    pub fn exchange_init_trigger_id(&self, id: AsyncId) -> AsyncId {
        let old = self.uid_fields.id(UidFields::INIT_TRIGGER_ID);
        self.uid_fields.set_id(UidFields::INIT_TRIGGER_ID, id);
        old
    }

    /// Resolve the trigger id for a resource under construction.
    ///
    /// One-shot override first (consumed), then the scoped trigger id, then
    /// the current id.
    pub(crate) fn take_trigger_id(&self) -> AsyncId {
        let init = self.uid_fields.id(UidFields::INIT_TRIGGER_ID);
        if !init.is_void() {
            self.uid_fields
                .set_id(UidFields::INIT_TRIGGER_ID, AsyncId::VOID);
            return init;
        }
        let scoped = self.uid_fields.id(UidFields::SCOPED_TRIGGER_ID);
        if !scoped.is_void() {
            return scoped;
        }
        self.current_id()
    }

    /// Make `trigger_id` the trigger of every resource constructed while the guard lives.
    pub fn trigger_id_scope(&self, trigger_id: AsyncId) -> TriggerIdScope<'_> {
        TriggerIdScope::enter(self, trigger_id)
    }

    /// Make `(async_id, trigger_id)` current while the guard lives.
    pub fn enter_scope(&self, async_id: AsyncId, trigger_id: AsyncId) -> ExecScope<'_> {
        ExecScope::enter(self, async_id, trigger_id)
    }

    pub(crate) fn push_scope(&self) -> usize {
        let depth = self.scope_depth.get() + 1;
        self.scope_depth.set(depth);
        depth
    }

    /// Returns the depth of the scope being closed.
    pub(crate) fn pop_scope(&self) -> usize {
        let depth = self.scope_depth.get();
        self.scope_depth.set(depth.saturating_sub(1));
        depth
    }

    pub(crate) fn push_callback(&self) -> u32 {
        let depth = self.callback_depth.get() + 1;
        self.callback_depth.set(depth);
        depth
    }

    pub(crate) fn pop_callback(&self) {
        self.callback_depth
            .set(self.callback_depth.get().saturating_sub(1));
    }

    /// Number of callback invocations on the stack.
    #[must_use]
    pub fn callback_depth(&self) -> u32 {
        self.callback_depth.get()
    }

    /// Number of execution scopes on the stack.
    #[must_use]
    pub fn scope_depth(&self) -> usize {
        self.scope_depth.get()
    }

    /// Whether callbacks consult resource domains.
    #[must_use]
    pub fn using_domains(&self) -> bool {
        self.using_domains.get()
    }

    /// Turn domain handling on or off.
    pub fn set_using_domains(&self, enabled: bool) {
        self.using_domains.set(enabled);
    }

    /// The destroy queue.
    #[must_use]
    pub fn destroy_queue(&self) -> &DestroyQueue {
        &self.destroy_queue
    }

    /// Queue `async_id` for destroy notification.
    ///
    /// Returns the batch it will be delivered in, or `None` once the
    /// environment is torn down.
    pub(crate) fn enqueue_destroy(&self, async_id: AsyncId) -> Option<u64> {
        if self.torn_down.get() {
            warn!(target: TARGET, %async_id, "destroy after teardown dropped");
            return None;
        }
        let enqueued = self.destroy_queue.enqueue(async_id);
        trace!(target: TARGET, %async_id, batch = enqueued.batch, "destroy queued");
        if enqueued.armed_now {
            self.host.request_idle();
        }
        Some(enqueued.batch)
    }

    /// Deliver the pending destroy batch. Called from the host's idle phase.
    ///
    /// Every id gets its destroy hook call even if an earlier one fails;
    /// each failure goes through [`handle_fatal`](Self::handle_fatal). The
    /// first failure is returned once the batch is done.
    pub fn run_idle(&self) -> Result<usize, FatalHookError> {
        let Some(batch) = self.destroy_queue.take_batch() else {
            return Ok(0);
        };
        let count = batch.len();
        let threshold = self.settings.destroy_queue.batch_warn_threshold;
        if count > threshold {
            warn!(target: TARGET, count, threshold, "large destroy batch");
        }
        debug!(target: TARGET, count, "flushing destroy queue");

        let mut first_failure = None;
        for async_id in batch {
            if let Err(err) = self.hooks.call(HookPhase::Destroy, async_id) {
                self.handle_fatal(&err);
                let _ = first_failure.get_or_insert(err);
            }
        }
        self.destroy_queue.finish_batch();
        trace!(target: TARGET, count, "destroy queue flushed");

        match first_failure {
            Some(err) => Err(err),
            None => Ok(count),
        }
    }

    /// Top-level recognition point for hook failures.
    pub fn handle_fatal(&self, err: &FatalHookError) {
        error!(target: TARGET, async_id = %err.async_id, source = %err.source_kind, error = %err.cause, "fatal hook error");
        self.host.on_fatal(err);
    }

    /// Deliver any armed destroy batch now and stop accepting new ones.
    pub fn teardown(&self) -> Result<usize, FatalHookError> {
        if self.torn_down.get() {
            return Ok(0);
        }
        let delivered = self.run_idle();
        self.torn_down.set(true);
        info!(target: TARGET, "environment torn down");
        delivered
    }

    /// Whether [`teardown`](Self::teardown) has run.
    #[must_use]
    pub fn is_torn_down(&self) -> bool {
        self.torn_down.get()
    }
}

impl Drop for Environment {
    fn drop(&mut self) {
        let pending = self.destroy_queue.len();
        if pending > 0 {
            warn!(target: TARGET, pending, "environment dropped with undelivered destroy ids");
        }
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("hooks", &self.hooks)
            .field("uid_fields", &self.uid_fields.snapshot())
            .field("destroy_queue", &self.destroy_queue.len())
            .field("callback_depth", &self.callback_depth.get())
            .field("torn_down", &self.torn_down.get())
            .finish_non_exhaustive()
    }
}
