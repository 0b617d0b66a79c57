//! # wraptrace-core
//!
//! Shared vocabulary for the wraptrace async resource tracker:
//!
//! - [`AsyncId`]: `f64` resource identifier with the void/root sentinels
//! - [`ProviderType`]: the table of resource kinds and their wrapper class ids
//! - [`HookPhase`]: init / before / after / destroy
//! - [`FatalHookError`] and [`CallbackError`]: the two failure channels
//! - [`logging`]: subscriber setup and test capture

#![deny(unsafe_code)]

pub mod errors;
pub mod ids;
pub mod logging;
pub mod phase;
pub mod provider;

pub use errors::{CallbackError, FatalHookError, FatalSource};
pub use ids::AsyncId;
pub use phase::HookPhase;
pub use provider::{ProviderType, WRAPPER_CLASS_ID_OFFSET};
