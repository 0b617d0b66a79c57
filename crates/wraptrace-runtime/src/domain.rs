//! Domain-style error scoping.
//!
//! A resource may carry a domain. When the environment has domains enabled,
//! every callback invocation for that resource runs between the domain's
//! `enter` and `exit`, and a disposed domain suppresses the invocation.

/// Error-scoping object attached to a resource.
pub trait Domain {
    /// A disposed domain suppresses every later callback.
    fn is_disposed(&self) -> bool {
        false
    }

    /// Called before the execution scope is established.
    fn enter(&self) -> anyhow::Result<()>;

    /// Called after the after hook.
    fn exit(&self) -> anyhow::Result<()>;
}
