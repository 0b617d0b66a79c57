//! Hook phases.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A point in a resource's lifecycle at which instrumentation may observe it.
///
/// The discriminant doubles as the phase's slot index in the hook field
/// buffer, so the order here is part of the embedding contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HookPhase {
    /// Resource constructed (or reset out of a pool).
    Init = 0,
    /// About to run a user callback on the resource's behalf.
    Before = 1,
    /// User callback finished.
    After = 2,
    /// Resource finalized; delivered later from the idle phase.
    Destroy = 3,
}

impl HookPhase {
    /// Number of phases.
    pub const COUNT: usize = 4;

    /// Slot index of this phase in the hook field buffer.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// All phases in slot order.
    #[must_use]
    pub fn all() -> &'static [HookPhase] {
        &[Self::Init, Self::Before, Self::After, Self::Destroy]
    }

    /// Lowercase name used in the bundle and in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Before => "before",
            Self::After => "after",
            Self::Destroy => "destroy",
        }
    }
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
