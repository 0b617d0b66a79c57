//! Hook registry.
//!
//! Holds the installed [`HookBundle`] and the [`HookFields`] counters that
//! gate each phase. The hot path only ever asks [`HookRegistry::is_active`],
//! a single counter read, before doing any work for a phase.

use std::cell::RefCell;
use std::fmt;

use tracing::{debug, error, trace};
use wraptrace_core::logging::TARGET;
use wraptrace_core::{AsyncId, FatalHookError, HookPhase};

use crate::errors::HookError;
use crate::fields::HookFields;
use crate::handler::{HookBundle, IdHook, InitEvent, InitHook};

#[derive(Clone)]
struct Installed {
    init: InitHook,
    before: IdHook,
    after: IdHook,
    destroy: IdHook,
}

/// Installed hooks plus the per-phase activation counters.
#[derive(Default)]
pub struct HookRegistry {
    installed: RefCell<Option<Installed>>,
    fields: HookFields,
}

impl HookRegistry {
    /// Create a registry with nothing installed and every phase inactive.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the four hooks.
    ///
    /// Rejects a second installation, and a bundle missing any phase.
    /// Installing does not activate anything; phases are turned on through
    /// the counters.
    pub fn install(&self, bundle: HookBundle) -> Result<(), HookError> {
        if self.installed.borrow().is_some() {
            return Err(HookError::AlreadyInstalled);
        }
        let missing = bundle.missing();
        let (Some(init), Some(before), Some(after), Some(destroy)) =
            (bundle.init, bundle.before, bundle.after, bundle.destroy)
        else {
            return Err(HookError::MissingHook(missing.unwrap_or(HookPhase::Init)));
        };

        *self.installed.borrow_mut() = Some(Installed {
            init,
            before,
            after,
            destroy,
        });
        debug!(target: TARGET, "async hooks installed");
        Ok(())
    }

    /// Whether hooks have been installed.
    #[must_use]
    pub fn is_installed(&self) -> bool {
        self.installed.borrow().is_some()
    }

    /// Whether `phase` should be run. A counter read; nothing else.
    #[inline]
    #[must_use]
    pub fn is_active(&self, phase: HookPhase) -> bool {
        self.fields.count(phase) > 0
    }

    /// Activation counters shared with instrumentation.
    #[must_use]
    pub fn fields(&self) -> &HookFields {
        &self.fields
    }

    /// Turn on every phase for one more hook set.
    pub fn enable(&self) {
        for phase in HookPhase::all() {
            self.fields.increment(*phase);
        }
        self.fields.increment_active();
        trace!(target: TARGET, active = self.fields.active_hooks(), "hook set enabled");
    }

    /// Undo one [`enable`](Self::enable).
    pub fn disable(&self) {
        for phase in HookPhase::all() {
            self.fields.decrement(*phase);
        }
        self.fields.decrement_active();
        trace!(target: TARGET, active = self.fields.active_hooks(), "hook set disabled");
    }

    /// Turn on a single phase.
    pub fn enable_phase(&self, phase: HookPhase) {
        self.fields.increment(phase);
    }

    /// Turn off a single phase.
    pub fn disable_phase(&self, phase: HookPhase) {
        self.fields.decrement(phase);
    }

    /// Run the init hook.
    ///
    /// The callback is cloned out before the call so a hook may re-enter the
    /// registry.
    pub fn call_init(&self, event: &InitEvent) -> Result<(), FatalHookError> {
        let Some(hook) = self.installed.borrow().as_ref().map(|h| h.init.clone()) else {
            return Ok(());
        };
        trace!(target: TARGET, async_id = %event.async_id, provider = event.provider_name(), "init hook");
        hook(event).map_err(|cause| escalate(HookPhase::Init, event.async_id, cause))
    }

    /// Run the before, after, or destroy hook for `async_id`.
    pub fn call(&self, phase: HookPhase, async_id: AsyncId) -> Result<(), FatalHookError> {
        let hook = {
            let installed = self.installed.borrow();
            let Some(hooks) = installed.as_ref() else {
                return Ok(());
            };
            match phase {
                HookPhase::Before => hooks.before.clone(),
                HookPhase::After => hooks.after.clone(),
                HookPhase::Destroy => hooks.destroy.clone(),
                HookPhase::Init => {
                    debug_assert!(false, "init hook needs an InitEvent");
                    return Ok(());
                }
            }
        };
        trace!(target: TARGET, %async_id, %phase, "hook");
        hook(async_id).map_err(|cause| escalate(phase, async_id, cause))
    }
}

fn escalate(phase: HookPhase, async_id: AsyncId, cause: anyhow::Error) -> FatalHookError {
    error!(target: TARGET, %phase, %async_id, error = %cause, "hook failed");
    FatalHookError::hook(phase, async_id, cause)
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRegistry")
            .field("installed", &self.is_installed())
            .field("fields", &self.fields.snapshot())
            .finish()
    }
}
