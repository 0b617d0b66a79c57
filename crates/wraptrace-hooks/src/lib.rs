//! # wraptrace-hooks
//!
//! The instrumentation side of the tracker: the four lifecycle hooks, the
//! registry they are installed into, and the shared numeric buffers that
//! let instrumentation switch phases on and off without a call.
//!
//! ## Phases
//!
//! - **init**: a resource was constructed (or reset out of a pool)
//! - **before** / **after**: bracket every callback run for a resource
//! - **destroy**: a resource was finalized; delivered in batches from the
//!   host's idle phase
//!
//! ## Fail-Closed
//!
//! A hook that returns an error is a broken observability contract. The
//! registry logs it and hands back a [`FatalHookError`](wraptrace_core::FatalHookError)
//! for the runtime to escalate; it is never swallowed.

#![deny(unsafe_code)]

pub mod errors;
pub mod fields;
pub mod handler;
pub mod registry;

pub use errors::HookError;
pub use fields::{HookFields, UidFields, constants};
pub use handler::{AsyncHookHandler, HookBundle, IdHook, InitEvent, InitHook, ResourceHandle};
pub use registry::HookRegistry;
