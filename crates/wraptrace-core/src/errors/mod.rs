//! Error types shared across the workspace.
//!
//! Two failure channels are kept apart on purpose:
//!
//! - [`FatalHookError`]: an instrumentation hook (or a domain enter/exit
//!   callback) failed. Not recoverable locally; the runtime's top level is
//!   expected to recognise it and terminate or report.
//! - [`CallbackError`]: user code failed. Travels through the host's normal
//!   error-reporting channel.

use std::fmt;

use thiserror::Error;

use crate::ids::AsyncId;
use crate::phase::HookPhase;

/// Which instrumentation call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatalSource {
    /// One of the four lifecycle hooks.
    Hook(HookPhase),
    /// A domain's `enter` callback.
    DomainEnter,
    /// A domain's `exit` callback.
    DomainExit,
}

impl fmt::Display for FatalSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hook(phase) => write!(f, "{phase} hook"),
            Self::DomainEnter => f.write_str("domain enter callback"),
            Self::DomainExit => f.write_str("domain exit callback"),
        }
    }
}

/// An instrumentation callback failed; escalate to the fatal path.
#[derive(Debug, Error)]
#[error("{source_kind} failed for async id {async_id}: {cause}")]
pub struct FatalHookError {
    /// What failed.
    pub source_kind: FatalSource,
    /// Resource the call was made for.
    pub async_id: AsyncId,
    /// Error returned by the callback.
    #[source]
    pub cause: anyhow::Error,
}

impl FatalHookError {
    /// A lifecycle hook failed.
    #[must_use]
    pub fn hook(phase: HookPhase, async_id: AsyncId, cause: anyhow::Error) -> Self {
        Self {
            source_kind: FatalSource::Hook(phase),
            async_id,
            cause,
        }
    }

    /// A domain callback failed.
    #[must_use]
    pub fn domain(source_kind: FatalSource, async_id: AsyncId, cause: anyhow::Error) -> Self {
        Self {
            source_kind,
            async_id,
            cause,
        }
    }

    /// Phase of the failing hook, if it was a lifecycle hook.
    #[must_use]
    pub fn phase(&self) -> Option<HookPhase> {
        match self.source_kind {
            FatalSource::Hook(phase) => Some(phase),
            FatalSource::DomainEnter | FatalSource::DomainExit => None,
        }
    }
}

/// User code failed while running on a resource's behalf.
#[derive(Debug, Error)]
pub enum CallbackError {
    /// The wrapped user callback returned an error.
    #[error("callback for async id {async_id} failed: {cause}")]
    User {
        /// Resource the callback ran for.
        async_id: AsyncId,
        /// Error returned by the callback.
        #[source]
        cause: anyhow::Error,
    },

    /// Draining the host's pending-work queue failed.
    #[error("pending work drain failed: {0}")]
    Drain(#[source] anyhow::Error),
}

impl CallbackError {
    /// Resource the failing callback ran for, if any.
    #[must_use]
    pub fn async_id(&self) -> Option<AsyncId> {
        match self {
            Self::User { async_id, .. } => Some(*async_id),
            Self::Drain(_) => None,
        }
    }
}
