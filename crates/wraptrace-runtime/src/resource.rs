//! Tracked async resources.
//!
//! An [`AsyncResource`] is embedded in a concrete resource (socket, timer,
//! request) and gives it an identity for instrumentation. Construction runs
//! the init sequence; dropping (or [`finalize`](AsyncResource::finalize))
//! queues the destroy notification.
//!
//! ```text
//! Created ──init──▶ Active ──finalize──▶ PendingDestroy ──idle flush──▶ Destroyed
//!                   ▲    │                        (destroy inactive) ──▶ Destroyed
//!                   └reset┘
//! ```

use std::fmt;
use std::rc::Rc;

use serde::Serialize;
use tracing::{debug, trace};
use wraptrace_core::logging::TARGET;
use wraptrace_core::{AsyncId, FatalHookError, HookPhase, ProviderType};
use wraptrace_hooks::{InitEvent, ResourceHandle};

use crate::domain::Domain;
use crate::env::Environment;
use crate::errors::RuntimeError;

/// Where a resource is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LifecycleState {
    /// Id issued, init sequence not finished.
    Created,
    /// Callbacks may run.
    Active,
    /// Finalized; destroy notification queued.
    PendingDestroy,
    /// Destroy notification delivered, or none was due.
    Destroyed,
}

/// One tracked asynchronous operation.
pub struct AsyncResource {
    env: Rc<Environment>,
    provider: ProviderType,
    self_size: usize,
    async_id: AsyncId,
    trigger_id: AsyncId,
    state: LifecycleState,
    destroy_batch: Option<u64>,
    domain: Option<Rc<dyn Domain>>,
}

impl AsyncResource {
    /// Construct a resource of kind `provider` reporting `self_size` bytes.
    ///
    /// Issues an id, resolves the trigger id, and runs the init hook when
    /// active. A failing init hook is reported through
    /// [`Environment::handle_fatal`] and returned; no destroy notification
    /// follows for that id.
    pub fn new(
        env: &Rc<Environment>,
        provider: ProviderType,
        self_size: usize,
    ) -> Result<Self, RuntimeError> {
        if !provider.is_trackable() {
            return Err(RuntimeError::UntrackableProvider(provider));
        }
        let mut resource = Self {
            env: Rc::clone(env),
            provider,
            self_size,
            async_id: AsyncId::VOID,
            trigger_id: AsyncId::VOID,
            state: LifecycleState::Created,
            destroy_batch: None,
            domain: None,
        };
        resource.init_sequence()?;
        Ok(resource)
    }

    /// Give a pooled resource a fresh identity and re-run init.
    ///
    /// The provider type and size are kept. The old id gets no destroy
    /// notification.
    pub fn reset(&mut self) -> Result<(), RuntimeError> {
        if self.state() != LifecycleState::Active {
            return Err(RuntimeError::NotActive {
                async_id: self.async_id,
                state: self.state(),
            });
        }
        let old = self.async_id;
        self.state = LifecycleState::Created;
        self.init_sequence()?;
        debug!(target: TARGET, %old, new = %self.async_id, "resource reset");
        Ok(())
    }

    fn init_sequence(&mut self) -> Result<(), RuntimeError> {
        self.async_id = self.env.new_async_id();
        self.trigger_id = self.env.take_trigger_id();
        trace!(
            target: TARGET,
            async_id = %self.async_id,
            trigger_id = %self.trigger_id,
            provider = self.provider.name(),
            "resource created"
        );

        if let Err(err) = self.run_init_hook() {
            self.env.handle_fatal(&err);
            self.state = LifecycleState::Destroyed;
            return Err(err.into());
        }
        self.state = LifecycleState::Active;
        Ok(())
    }

    fn run_init_hook(&self) -> Result<(), FatalHookError> {
        if !self.env.hooks().is_active(HookPhase::Init) {
            return Ok(());
        }
        let event = InitEvent {
            async_id: self.async_id,
            provider: self.provider,
            resource: self.handle(),
            trigger_id: self.trigger_id,
        };
        self.env.hooks().call_init(&event)
    }

    /// Finalize: queue the destroy notification.
    ///
    /// Idempotent; only the first call has an effect. With the destroy
    /// phase inactive the resource goes straight to
    /// [`Destroyed`](LifecycleState::Destroyed) without touching the queue.
    pub fn finalize(&mut self) {
        if matches!(
            self.state,
            LifecycleState::PendingDestroy | LifecycleState::Destroyed
        ) {
            return;
        }
        if !self.env.hooks().is_active(HookPhase::Destroy) {
            self.state = LifecycleState::Destroyed;
            return;
        }
        match self.env.enqueue_destroy(self.async_id) {
            Some(batch) => {
                self.destroy_batch = Some(batch);
                self.state = LifecycleState::PendingDestroy;
            }
            None => self.state = LifecycleState::Destroyed,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        match (self.state, self.destroy_batch) {
            (LifecycleState::PendingDestroy, Some(batch))
                if self.env.destroy_queue().is_delivered(batch) =>
            {
                LifecycleState::Destroyed
            }
            (state, _) => state,
        }
    }

    /// Unique id of this resource.
    #[must_use]
    pub fn async_id(&self) -> AsyncId {
        self.async_id
    }

    /// Id of the resource whose callback created this one.
    #[must_use]
    pub fn trigger_id(&self) -> AsyncId {
        self.trigger_id
    }

    /// Kind of operation.
    #[must_use]
    pub fn provider(&self) -> ProviderType {
        self.provider
    }

    /// Self-reported size in bytes.
    #[must_use]
    pub fn self_size(&self) -> usize {
        self.self_size
    }

    /// What instrumentation sees of this resource.
    #[must_use]
    pub fn handle(&self) -> ResourceHandle {
        ResourceHandle {
            provider: self.provider,
            self_size: self.self_size,
        }
    }

    /// Environment this resource belongs to.
    #[must_use]
    pub fn env(&self) -> &Rc<Environment> {
        &self.env
    }

    /// Attach or clear the domain consulted by callback invocations.
    pub fn set_domain(&mut self, domain: Option<Rc<dyn Domain>>) {
        self.domain = domain;
    }

    /// Attached domain.
    #[must_use]
    pub fn domain(&self) -> Option<&Rc<dyn Domain>> {
        self.domain.as_ref()
    }
}

impl Drop for AsyncResource {
    fn drop(&mut self) {
        self.finalize();
    }
}

impl fmt::Debug for AsyncResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncResource")
            .field("async_id", &self.async_id)
            .field("trigger_id", &self.trigger_id)
            .field("provider", &self.provider)
            .field("self_size", &self.self_size)
            .field("state", &self.state())
            .field("has_domain", &self.domain.is_some())
            .finish()
    }
}
