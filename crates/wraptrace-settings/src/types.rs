//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]`, so a settings
//! file only needs the keys it overrides.

use serde::{Deserialize, Serialize};

/// Root settings for a tracker environment.
///
/// ```json
/// {
///   "logging": { "level": "debug" },
///   "destroyQueue": { "batchWarnThreshold": 500 }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WraptraceSettings {
    /// Log output.
    pub logging: LoggingSettings,
    /// Domain-style error scoping around callbacks.
    pub domains: DomainSettings,
    /// Deferred destroy queue tuning.
    pub destroy_queue: DestroyQueueSettings,
    /// Execution scope diagnostics.
    pub scopes: ScopeSettings,
}

/// Log output settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Minimum level when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json: false,
        }
    }
}

/// Domain settings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DomainSettings {
    /// Consult a resource's domain in every callback invocation.
    pub enabled: bool,
}

/// Destroy queue settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DestroyQueueSettings {
    /// Ids reserved up front for each batch.
    pub initial_capacity: usize,
    /// Batch size above which a flush logs a warning.
    pub batch_warn_threshold: usize,
}

impl Default for DestroyQueueSettings {
    fn default() -> Self {
        Self {
            initial_capacity: 64,
            batch_warn_threshold: 10_000,
        }
    }
}

/// Execution scope settings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScopeSettings {
    /// Nesting depth above which entering a scope logs a warning. `0` disables the check.
    pub max_depth: usize,
}
