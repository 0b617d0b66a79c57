//! Hook registry error types.

use thiserror::Error;
use wraptrace_core::HookPhase;

/// Configuration errors raised while installing hooks.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HookError {
    /// Hooks were already installed on this registry.
    #[error("async hooks are already installed")]
    AlreadyInstalled,

    /// The bundle did not supply every phase.
    #[error("hook bundle is missing the {0} hook")]
    MissingHook(HookPhase),
}
