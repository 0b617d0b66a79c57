//! # wraptrace-settings
//!
//! Layered configuration for a tracker environment.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`WraptraceSettings::default()`]
//! 2. **User file**: `~/.wraptrace/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `WRAPTRACE_*` overrides (highest priority)
//!
//! Each runtime `Environment` takes its settings explicitly; the global
//! below is a convenience for embedders with a single environment.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, apply_overrides_from, deep_merge, load_settings, load_settings_from_path,
    settings_path,
};
pub use types::*;

use std::sync::OnceLock;

static SETTINGS: OnceLock<WraptraceSettings> = OnceLock::new();

/// Get the global settings, loading them on first access.
///
/// Falls back to compiled defaults if loading fails.
pub fn get_settings() -> &'static WraptraceSettings {
    SETTINGS.get_or_init(|| {
        load_settings().unwrap_or_else(|err| {
            tracing::warn!(error = %err, "failed to load settings, using defaults");
            WraptraceSettings::default()
        })
    })
}

/// Initialize the global settings with a specific value.
///
/// Returns the settings back if the global was already initialized.
#[allow(clippy::result_large_err)]
pub fn init_settings(settings: WraptraceSettings) -> std::result::Result<(), WraptraceSettings> {
    SETTINGS.set(settings)
}
