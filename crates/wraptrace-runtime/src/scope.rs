//! Guards over the causal context.
//!
//! Each guard saves the slots it replaces and restores them on drop, so the
//! previous context comes back on every exit path, including `?` and
//! unwinding. Guards live on the stack; nesting follows the call stack.

use std::fmt;

use tracing::{trace, warn};
use wraptrace_core::AsyncId;
use wraptrace_core::logging::TARGET;
use wraptrace_hooks::UidFields;

use crate::env::Environment;

/// Makes `(async_id, trigger_id)` the current pair for its lifetime.
#[must_use = "the scope ends as soon as the guard is dropped"]
pub struct ExecScope<'env> {
    env: &'env Environment,
    async_id: AsyncId,
    saved_current: AsyncId,
    saved_trigger: AsyncId,
    depth: usize,
}

impl<'env> ExecScope<'env> {
    pub(crate) fn enter(env: &'env Environment, async_id: AsyncId, trigger_id: AsyncId) -> Self {
        let fields = env.uid_fields();
        let saved_current = fields.id(UidFields::CURRENT_ID);
        let saved_trigger = fields.id(UidFields::TRIGGER_ID);
        fields.set_id(UidFields::CURRENT_ID, async_id);
        fields.set_id(UidFields::TRIGGER_ID, trigger_id);

        let depth = env.push_scope();
        let max_depth = env.settings().scopes.max_depth;
        if max_depth > 0 && depth > max_depth {
            warn!(target: TARGET, %async_id, depth, max_depth, "execution scope nesting exceeds limit");
        }
        trace!(target: TARGET, %async_id, %trigger_id, depth, "enter scope");

        Self {
            env,
            async_id,
            saved_current,
            saved_trigger,
            depth,
        }
    }

    /// Id this scope made current.
    #[must_use]
    pub fn async_id(&self) -> AsyncId {
        self.async_id
    }

    /// Nesting depth, 1 for the outermost scope.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// End the scope now.
    pub fn dispose(self) {}
}

impl Drop for ExecScope<'_> {
    fn drop(&mut self) {
        let depth = self.env.pop_scope();
        if depth != self.depth && !std::thread::panicking() {
            panic!(
                "execution scope for async id {} closed out of order (depth {}, expected {})",
                self.async_id, depth, self.depth
            );
        }
        let fields = self.env.uid_fields();
        fields.set_id(UidFields::CURRENT_ID, self.saved_current);
        fields.set_id(UidFields::TRIGGER_ID, self.saved_trigger);
        trace!(target: TARGET, async_id = %self.async_id, restored = %self.saved_current, "exit scope");
    }
}

impl fmt::Debug for ExecScope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecScope")
            .field("async_id", &self.async_id)
            .field("saved_current", &self.saved_current)
            .field("saved_trigger", &self.saved_trigger)
            .field("depth", &self.depth)
            .finish()
    }
}

/// Counts nested callback invocations.
#[derive(Debug)]
pub(crate) struct CallbackScope<'env> {
    env: &'env Environment,
    depth: u32,
}

impl<'env> CallbackScope<'env> {
    pub(crate) fn enter(env: &'env Environment) -> Self {
        let depth = env.push_callback();
        Self { env, depth }
    }

    /// Whether another invocation is already on the stack.
    pub(crate) fn is_nested(&self) -> bool {
        self.depth > 1
    }
}

impl Drop for CallbackScope<'_> {
    fn drop(&mut self) {
        self.env.pop_callback();
    }
}

/// Makes every resource constructed in its extent take `trigger_id`,
/// unless a one-shot override is set.
#[must_use = "the scope ends as soon as the guard is dropped"]
#[derive(Debug)]
pub struct TriggerIdScope<'env> {
    env: &'env Environment,
    saved: AsyncId,
}

impl<'env> TriggerIdScope<'env> {
    pub(crate) fn enter(env: &'env Environment, trigger_id: AsyncId) -> Self {
        let fields = env.uid_fields();
        let saved = fields.id(UidFields::SCOPED_TRIGGER_ID);
        fields.set_id(UidFields::SCOPED_TRIGGER_ID, trigger_id);
        Self { env, saved }
    }
}

impl Drop for TriggerIdScope<'_> {
    fn drop(&mut self) {
        self.env
            .uid_fields()
            .set_id(UidFields::SCOPED_TRIGGER_ID, self.saved);
    }
}

#[cfg(test)]
mod tests {
    use wraptrace_core::logging::capture_logs;
    use wraptrace_settings::WraptraceSettings;

    use super::*;
    use crate::host::ManualLoop;

    fn env() -> std::rc::Rc<Environment> {
        Environment::new(ManualLoop::new(), WraptraceSettings::default())
    }

    #[test]
    fn scope_sets_and_restores_pair() {
        let env = env();
        assert_eq!(env.current_id(), AsyncId::VOID);
        {
            let scope = env.enter_scope(AsyncId::new(5.0), AsyncId::new(2.0));
            assert_eq!(scope.depth(), 1);
            assert_eq!(env.current_id(), AsyncId::new(5.0));
            assert_eq!(env.current_trigger_id(), AsyncId::new(2.0));
        }
        assert_eq!(env.current_id(), AsyncId::VOID);
        assert_eq!(env.current_trigger_id(), AsyncId::VOID);
    }

    #[test]
    fn nested_scopes_unwind_in_order() {
        let env = env();
        let outer = env.enter_scope(AsyncId::new(5.0), AsyncId::ROOT);
        let inner = env.enter_scope(AsyncId::new(9.0), AsyncId::new(5.0));
        assert_eq!(inner.depth(), 2);
        assert_eq!(env.current_id(), AsyncId::new(9.0));
        inner.dispose();
        assert_eq!(env.current_id(), AsyncId::new(5.0));
        outer.dispose();
        assert_eq!(env.current_id(), AsyncId::VOID);
    }

    #[test]
    fn restored_after_error_path() {
        fn fails(env: &Environment) -> anyhow::Result<()> {
            let _scope = env.enter_scope(AsyncId::new(9.0), AsyncId::new(5.0));
            anyhow::bail!("boom")
        }

        let env = env();
        let _outer = env.enter_scope(AsyncId::new(5.0), AsyncId::ROOT);
        assert!(fails(&env).is_err());
        assert_eq!(env.current_id(), AsyncId::new(5.0));
    }

    #[test]
    #[should_panic(expected = "closed out of order")]
    fn out_of_order_close_panics() {
        let env = env();
        let outer = env.enter_scope(AsyncId::new(5.0), AsyncId::ROOT);
        let _inner = env.enter_scope(AsyncId::new(9.0), AsyncId::new(5.0));
        drop(outer);
    }

    #[test]
    fn depth_limit_warns() {
        let (logs, _guard) = capture_logs();
        let mut settings = WraptraceSettings::default();
        settings.scopes.max_depth = 1;
        let env = Environment::new(ManualLoop::new(), settings);
        let _a = env.enter_scope(AsyncId::new(2.0), AsyncId::ROOT);
        assert!(!logs.has_event(tracing::Level::WARN, "exceeds limit"));
        let _b = env.enter_scope(AsyncId::new(3.0), AsyncId::new(2.0));
        assert!(logs.has_event(tracing::Level::WARN, "exceeds limit"));
    }

    #[test]
    fn trigger_id_scope_restores() {
        let env = env();
        {
            let _outer = env.trigger_id_scope(AsyncId::new(4.0));
            {
                let _inner = env.trigger_id_scope(AsyncId::new(6.0));
                assert_eq!(env.uid_fields().id(UidFields::SCOPED_TRIGGER_ID), AsyncId::new(6.0));
            }
            assert_eq!(env.uid_fields().id(UidFields::SCOPED_TRIGGER_ID), AsyncId::new(4.0));
        }
        assert_eq!(env.uid_fields().id(UidFields::SCOPED_TRIGGER_ID), AsyncId::VOID);
    }

    #[test]
    fn callback_scope_nesting() {
        let env = env();
        let outer = CallbackScope::enter(&env);
        assert!(!outer.is_nested());
        {
            let inner = CallbackScope::enter(&env);
            assert!(inner.is_nested());
        }
        assert_eq!(env.callback_depth(), 1);
        drop(outer);
        assert_eq!(env.callback_depth(), 0);
    }
}
