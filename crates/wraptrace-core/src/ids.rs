//! Async resource identifiers.
//!
//! Ids are `f64` so they can live directly in the shared numeric field
//! buffer read by instrumentation code, while still covering a range well
//! beyond `u32`. Every integer up to 2^53 is exactly representable, which
//! is far more than a process can allocate.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of one tracked async resource.
///
/// `0` is the "void": no resource is currently executing (for example a
/// handle created for an incoming connection outside any callback). `1` is
/// the root execution context.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AsyncId(f64);

impl AsyncId {
    /// No resource is executing.
    pub const VOID: Self = Self(0.0);
    /// The root execution context.
    pub const ROOT: Self = Self(1.0);

    /// Wrap a raw id value.
    #[must_use]
    pub const fn new(raw: f64) -> Self {
        Self(raw)
    }

    /// Raw value as stored in the uid field buffer.
    #[must_use]
    pub const fn as_f64(self) -> f64 {
        self.0
    }

    /// Whether this is the void id (or a cleared slot).
    #[must_use]
    pub fn is_void(self) -> bool {
        self.0 <= 0.0
    }

    /// The id immediately after this one.
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0 + 1.0)
    }
}

impl fmt::Display for AsyncId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Ids are integral; print them without a trailing `.0`.
        write!(f, "{}", self.0)
    }
}

impl From<f64> for AsyncId {
    fn from(raw: f64) -> Self {
        Self(raw)
    }
}

impl From<AsyncId> for f64 {
    fn from(id: AsyncId) -> Self {
        id.0
    }
}
