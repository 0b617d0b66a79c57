//! Callback invocation protocol.
//!
//! Every call into user code on a resource's behalf goes through
//! [`AsyncResource::make_callback`]: it brackets the callback with the
//! before/after hooks inside an execution scope, and the outermost
//! invocation on the stack drains the host's pending-work queue afterwards.

use tracing::{debug, warn};
use wraptrace_core::logging::TARGET;
use wraptrace_core::{AsyncId, CallbackError, FatalHookError, FatalSource, HookPhase};

use crate::env::Environment;
use crate::errors::InvocationError;
use crate::host::HostLoop;
use crate::resource::AsyncResource;
use crate::scope::CallbackScope;

impl AsyncResource {
    /// Run `callback` on behalf of this resource.
    ///
    /// Hook failures come back as [`InvocationError::Fatal`] after being
    /// reported through [`Environment::handle_fatal`]; a failing before hook
    /// means `callback` never runs. A failing `callback` still gets its after
    /// hook and comes back as [`InvocationError::Callback`], without tail
    /// processing.
    pub fn make_callback<T, F>(&self, callback: F) -> Result<T, InvocationError>
    where
        F: FnOnce() -> anyhow::Result<T>,
    {
        let env: &Environment = self.env();
        let async_id = self.async_id();
        let callback_scope = CallbackScope::enter(env);

        let domain = if env.using_domains() {
            self.domain().cloned()
        } else {
            None
        };
        if let Some(domain) = &domain {
            if domain.is_disposed() {
                debug!(target: TARGET, %async_id, "callback skipped, domain disposed");
                return Err(InvocationError::DomainDisposed(async_id));
            }
            if let Err(cause) = domain.enter() {
                return Err(escalate(
                    env,
                    FatalHookError::domain(FatalSource::DomainEnter, async_id, cause),
                ));
            }
        }

        let exec_scope = env.enter_scope(async_id, self.trigger_id());

        if env.hooks().is_active(HookPhase::Before) {
            if let Err(err) = env.hooks().call(HookPhase::Before, async_id) {
                return Err(escalate(env, err));
            }
        }

        let result = callback();

        if env.hooks().is_active(HookPhase::After) {
            if let Err(err) = env.hooks().call(HookPhase::After, async_id) {
                if let Err(cause) = &result {
                    warn!(target: TARGET, %async_id, error = %cause, "callback error discarded by failing after hook");
                }
                return Err(escalate(env, err));
            }
        }

        if let Some(domain) = &domain {
            if let Err(cause) = domain.exit() {
                return Err(escalate(
                    env,
                    FatalHookError::domain(FatalSource::DomainExit, async_id, cause),
                ));
            }
        }

        exec_scope.dispose();

        let value = result.map_err(|cause| CallbackError::User { async_id, cause })?;

        if callback_scope.is_nested() {
            return Ok(value);
        }
        // The callback scope stays open during the drain, so invocations made
        // from pending work see themselves as nested.
        process_tail(env.host().as_ref(), async_id).map_err(CallbackError::Drain)?;
        Ok(value)
    }
}

fn escalate(env: &Environment, err: FatalHookError) -> InvocationError {
    env.handle_fatal(&err);
    InvocationError::Fatal(err)
}

fn process_tail(host: &dyn HostLoop, async_id: AsyncId) -> anyhow::Result<()> {
    if host.pending_work() == 0 {
        host.run_microtasks();
        if host.pending_work() == 0 {
            host.reset_pending_index();
            return Ok(());
        }
    }
    debug!(target: TARGET, %async_id, pending = host.pending_work(), "draining pending work");
    host.drain_pending()
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use assert_matches::assert_matches;
    use wraptrace_core::ProviderType;
    use wraptrace_core::logging::capture_logs;
    use wraptrace_hooks::HookBundle;
    use wraptrace_settings::WraptraceSettings;

    use super::*;
    use crate::domain::Domain;
    use crate::host::ManualLoop;

    type Events = Rc<RefCell<Vec<String>>>;

    fn setup(fail_before: bool, fail_after: bool) -> (Rc<ManualLoop>, Rc<Environment>, Events) {
        let host = ManualLoop::new();
        let mut settings = WraptraceSettings::default();
        settings.domains.enabled = true;
        let env = Environment::new(host.clone(), settings);
        let events: Events = Rc::default();
        let before = Rc::clone(&events);
        let after = Rc::clone(&events);
        env.setup_hooks(
            HookBundle::new()
                .init(|_| Ok(()))
                .before(move |id| {
                    before.borrow_mut().push(format!("before:{id}"));
                    if fail_before {
                        anyhow::bail!("before broke");
                    }
                    Ok(())
                })
                .after(move |id| {
                    after.borrow_mut().push(format!("after:{id}"));
                    if fail_after {
                        anyhow::bail!("after broke");
                    }
                    Ok(())
                })
                .destroy(|_| Ok(())),
        )
        .unwrap();
        env.hooks().enable();
        (host, env, events)
    }

    struct TestDomain {
        disposed: bool,
        fail_enter: bool,
        events: Events,
    }

    impl Domain for TestDomain {
        fn is_disposed(&self) -> bool {
            self.disposed
        }

        fn enter(&self) -> anyhow::Result<()> {
            self.events.borrow_mut().push("enter".into());
            if self.fail_enter {
                anyhow::bail!("enter broke");
            }
            Ok(())
        }

        fn exit(&self) -> anyhow::Result<()> {
            self.events.borrow_mut().push("exit".into());
            Ok(())
        }
    }

    #[test]
    fn hooks_bracket_callback() {
        let (_host, env, events) = setup(false, false);
        let resource = AsyncResource::new(&env, ProviderType::TcpWrap, 0).unwrap();
        let inner = Rc::clone(&events);
        let value = resource
            .make_callback(|| {
                inner.borrow_mut().push("callback".into());
                Ok(7)
            })
            .unwrap();
        assert_eq!(value, 7);
        assert_eq!(*events.borrow(), vec!["before:2", "callback", "after:2"]);
    }

    #[test]
    fn failing_before_aborts() {
        let (host, env, events) = setup(true, false);
        let resource = AsyncResource::new(&env, ProviderType::TcpWrap, 0).unwrap();
        let ran = Cell::new(false);
        let err = resource
            .make_callback(|| {
                ran.set(true);
                Ok(())
            })
            .unwrap_err();
        assert!(err.is_fatal());
        assert!(!ran.get());
        assert_eq!(*events.borrow(), vec!["before:2"]);
        assert_eq!(host.fatal_errors().len(), 1);
        assert_eq!(env.current_id(), AsyncId::VOID);
    }

    #[test]
    fn failing_after_discards_result() {
        let (_host, env, _events) = setup(false, true);
        let resource = AsyncResource::new(&env, ProviderType::TcpWrap, 0).unwrap();
        let err = resource.make_callback(|| Ok(1)).unwrap_err();
        assert_matches!(err, InvocationError::Fatal(ref fatal) if fatal.phase() == Some(HookPhase::After));

        // A user error is discarded too, but logged first.
        let (logs, _guard) = capture_logs();
        let err = resource
            .make_callback::<(), _>(|| anyhow::bail!("user broke"))
            .unwrap_err();
        assert_matches!(err, InvocationError::Fatal(ref fatal) if fatal.phase() == Some(HookPhase::After));
        let discarded = logs.matching("discarded by failing after hook");
        assert_eq!(discarded.len(), 1);
        assert_eq!(discarded[0].level, tracing::Level::WARN);
        assert!(discarded[0].field("error").is_some_and(|e| e.contains("user broke")));
    }

    #[test]
    fn user_error_still_runs_after() {
        let (host, env, events) = setup(false, false);
        let resource = AsyncResource::new(&env, ProviderType::TcpWrap, 0).unwrap();
        host.push_pending(|| Ok(()));
        let err = resource
            .make_callback::<(), _>(|| anyhow::bail!("user broke"))
            .unwrap_err();
        assert_matches!(
            err,
            InvocationError::Callback(CallbackError::User { async_id, .. }) if async_id == AsyncId::new(2.0)
        );
        assert_eq!(*events.borrow(), vec!["before:2", "after:2"]);
        // The host's error channel owns the tail.
        assert_eq!(host.drains(), 0);
        assert_eq!(host.pending_work(), 1);
    }

    #[test]
    fn empty_queue_runs_microtasks_and_resets() {
        let (host, env, _events) = setup(false, false);
        let resource = AsyncResource::new(&env, ProviderType::TcpWrap, 0).unwrap();
        resource.make_callback(|| Ok(())).unwrap();
        assert_eq!(host.microtask_checkpoints(), 1);
        assert_eq!(host.index_resets(), 1);
        assert_eq!(host.drains(), 0);
    }

    #[test]
    fn outermost_drains_once() {
        let (host, env, _events) = setup(false, false);
        let outer = AsyncResource::new(&env, ProviderType::TcpWrap, 0).unwrap();
        let inner = AsyncResource::new(&env, ProviderType::TimerWrap, 0).unwrap();
        host.push_pending(|| Ok(()));

        outer
            .make_callback(|| {
                inner.make_callback(|| Ok(()))?;
                // The nested call left the queue alone.
                assert_eq!(host.drains(), 0);
                Ok(())
            })
            .unwrap();
        assert_eq!(host.drains(), 1);
        assert_eq!(host.pending_work(), 0);
    }

    #[test]
    fn callbacks_from_drain_do_not_drain() {
        let (host, env, _events) = setup(false, false);
        let outer = AsyncResource::new(&env, ProviderType::TcpWrap, 0).unwrap();
        let inner = Rc::new(AsyncResource::new(&env, ProviderType::TimerWrap, 0).unwrap());
        let from_drain = Rc::clone(&inner);
        host.push_pending(move || {
            from_drain.make_callback(|| Ok(()))?;
            Ok(())
        });

        outer.make_callback(|| Ok(())).unwrap();
        assert_eq!(host.drains(), 1);
        assert_eq!(env.callback_depth(), 0);
    }

    #[test]
    fn drain_failure_is_callback_error() {
        let (host, env, _events) = setup(false, false);
        let resource = AsyncResource::new(&env, ProviderType::TcpWrap, 0).unwrap();
        host.push_pending(|| Err(anyhow::anyhow!("tick broke")));
        let err = resource.make_callback(|| Ok(())).unwrap_err();
        assert_matches!(err, InvocationError::Callback(CallbackError::Drain(_)));
    }

    #[test]
    fn domain_wraps_hooks() {
        let (_host, env, events) = setup(false, false);
        let mut resource = AsyncResource::new(&env, ProviderType::TcpWrap, 0).unwrap();
        resource.set_domain(Some(Rc::new(TestDomain {
            disposed: false,
            fail_enter: false,
            events: Rc::clone(&events),
        })));
        resource.make_callback(|| Ok(())).unwrap();
        assert_eq!(*events.borrow(), vec!["enter", "before:2", "after:2", "exit"]);
    }

    #[test]
    fn disposed_domain_runs_nothing() {
        let (host, env, events) = setup(false, false);
        let mut resource = AsyncResource::new(&env, ProviderType::TcpWrap, 0).unwrap();
        resource.set_domain(Some(Rc::new(TestDomain {
            disposed: true,
            fail_enter: false,
            events: Rc::clone(&events),
        })));
        let ran = Cell::new(false);
        let err = resource
            .make_callback(|| {
                ran.set(true);
                Ok(())
            })
            .unwrap_err();
        assert_matches!(err, InvocationError::DomainDisposed(_));
        assert!(!ran.get());
        assert!(events.borrow().is_empty());
        assert_eq!(host.microtask_checkpoints(), 0);
    }

    #[test]
    fn failing_domain_enter_is_fatal() {
        let (host, env, events) = setup(false, false);
        let mut resource = AsyncResource::new(&env, ProviderType::TcpWrap, 0).unwrap();
        resource.set_domain(Some(Rc::new(TestDomain {
            disposed: false,
            fail_enter: true,
            events: Rc::clone(&events),
        })));
        let err = resource.make_callback(|| Ok(())).unwrap_err();
        assert_matches!(
            err,
            InvocationError::Fatal(ref fatal) if fatal.source_kind == FatalSource::DomainEnter
        );
        assert_eq!(*events.borrow(), vec!["enter"]);
        assert_eq!(host.fatal_errors().len(), 1);
    }

    #[test]
    fn domains_ignored_when_disabled() {
        let (_host, env, events) = setup(false, false);
        env.set_using_domains(false);
        let mut resource = AsyncResource::new(&env, ProviderType::TcpWrap, 0).unwrap();
        resource.set_domain(Some(Rc::new(TestDomain {
            disposed: true,
            fail_enter: false,
            events: Rc::clone(&events),
        })));
        resource.make_callback(|| Ok(())).unwrap();
        assert_eq!(*events.borrow(), vec!["before:2", "after:2"]);
    }
}
