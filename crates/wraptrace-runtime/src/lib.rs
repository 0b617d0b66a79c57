//! # wraptrace-runtime
//!
//! The async resource tracker proper.
//!
//! - **Environment**: per-runtime state; id allocation, trigger resolution,
//!   destroy queue flushing, fatal error recognition
//! - **Async resource**: one tracked operation; init on construction and
//!   reset, destroy queued on finalization
//! - **Execution scopes**: guards making a resource's `(id, trigger id)` the
//!   current pair, restored on every exit path
//! - **Callback invocation**: before/after around user code, outermost-only
//!   drain of the host's pending work
//! - **Host loop**: what the tracker needs from the event loop, plus a
//!   hand-stepped implementation
//! - **Binding**: the surface handed to instrumentation code
//!
//! ```text
//! let env = Environment::new(host, settings);
//! env.setup_hooks(bundle)?;
//! env.hooks().enable();
//!
//! let socket = AsyncResource::new(&env, ProviderType::TcpWrap, size)?;
//! socket.make_callback(|| on_readable())?;
//! drop(socket);           // destroy queued, idle wakeup requested
//! env.run_idle()?;        // from the host's idle phase
//! ```

#![deny(unsafe_code)]

pub mod binding;
mod callback;
pub mod destroy_queue;
pub mod domain;
pub mod env;
pub mod errors;
pub mod heap;
pub mod host;
pub mod resource;
pub mod scope;

pub use binding::{AsyncWrapBinding, BindingSnapshot};
pub use destroy_queue::DestroyQueue;
pub use domain::Domain;
pub use env::{Environment, init_logging};
pub use errors::{InvocationError, RuntimeError};
pub use heap::{HeapProfiler, RetainedAsyncInfo, WrapperInfoFn, register_wrapper_info};
pub use host::{HostLoop, ManualLoop};
pub use resource::{AsyncResource, LifecycleState};
pub use scope::{ExecScope, TriggerIdScope};
