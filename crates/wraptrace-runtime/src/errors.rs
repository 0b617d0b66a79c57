//! Runtime error types.

use thiserror::Error;
use wraptrace_core::{AsyncId, CallbackError, FatalHookError, ProviderType};
use wraptrace_hooks::HookError;

use crate::resource::LifecycleState;

/// Errors raised to embedders and resource owners.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Hook installation was rejected.
    #[error("hook setup rejected: {0}")]
    Hooks(#[from] HookError),

    /// The provider tag cannot be attached to a live resource.
    #[error("provider {0} cannot be attached to a resource")]
    UntrackableProvider(ProviderType),

    /// An id was requested for an object that carries no async wrapper.
    #[error("object has no async wrapper attached")]
    MissingWrapper,

    /// A wrapper class id outside the provider table.
    #[error("wrapper class id {0:#x} does not name a provider")]
    InvalidClassId(u16),

    /// The operation requires an active resource.
    #[error("async id {async_id} is {state:?}, not active")]
    NotActive {
        /// Resource id.
        async_id: AsyncId,
        /// Where the resource is in its lifecycle.
        state: LifecycleState,
    },

    /// An instrumentation hook failed.
    #[error(transparent)]
    Fatal(#[from] FatalHookError),
}

/// Outcome of a failed callback invocation.
///
/// Callers must keep the variants apart: [`Fatal`](Self::Fatal) belongs to
/// the runtime's fatal path, [`Callback`](Self::Callback) to its ordinary
/// error reporting.
#[derive(Debug, Error)]
pub enum InvocationError {
    /// Instrumentation broke; the invocation was aborted.
    #[error(transparent)]
    Fatal(#[from] FatalHookError),

    /// User code failed. Hooks and scope teardown still ran.
    #[error(transparent)]
    Callback(#[from] CallbackError),

    /// The resource's domain was disposed; nothing ran.
    #[error("domain of async id {0} is disposed")]
    DomainDisposed(AsyncId),
}

impl InvocationError {
    /// Whether this must be escalated to the fatal path.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}
