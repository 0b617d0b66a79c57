//! Hook callbacks and the bundle they are installed as.
//!
//! Instrumentation supplies all four callbacks at once, either as closures
//! through [`HookBundle`]'s builder methods or as one value implementing
//! [`AsyncHookHandler`]. The registry never inspects what a hook does; it
//! only calls it and escalates any error it returns.

use std::fmt;
use std::rc::Rc;

use wraptrace_core::{AsyncId, HookPhase, ProviderType};

/// What an init hook learns about the resource being constructed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceHandle {
    /// Kind of operation.
    pub provider: ProviderType,
    /// Memory footprint reported by the concrete resource.
    pub self_size: usize,
}

/// Arguments of the init hook.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InitEvent {
    /// Freshly allocated id.
    pub async_id: AsyncId,
    /// Kind of operation.
    pub provider: ProviderType,
    /// The resource itself, as seen by instrumentation.
    pub resource: ResourceHandle,
    /// Id of the resource that caused this one to be created.
    pub trigger_id: AsyncId,
}

impl InitEvent {
    /// Provider name, as passed to instrumentation.
    #[must_use]
    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }
}

/// Init hook callback.
pub type InitHook = Rc<dyn Fn(&InitEvent) -> anyhow::Result<()>>;

/// Before, after, and destroy hook callback; receives the async id.
pub type IdHook = Rc<dyn Fn(AsyncId) -> anyhow::Result<()>>;

/// Instrumentation implemented as one value.
///
/// Every method defaults to doing nothing, so implementors only override
/// the phases they care about. Activation is still controlled by the phase
/// counters, not by which methods are overridden.
pub trait AsyncHookHandler {
    /// A resource was constructed or reset.
    fn init(&self, _event: &InitEvent) -> anyhow::Result<()> {
        Ok(())
    }

    /// A callback is about to run for `async_id`.
    fn before(&self, _async_id: AsyncId) -> anyhow::Result<()> {
        Ok(())
    }

    /// A callback finished for `async_id`.
    fn after(&self, _async_id: AsyncId) -> anyhow::Result<()> {
        Ok(())
    }

    /// `async_id` was finalized.
    fn destroy(&self, _async_id: AsyncId) -> anyhow::Result<()> {
        Ok(())
    }
}

/// The four hook callbacks, installed together.
#[derive(Clone, Default)]
pub struct HookBundle {
    pub(crate) init: Option<InitHook>,
    pub(crate) before: Option<IdHook>,
    pub(crate) after: Option<IdHook>,
    pub(crate) destroy: Option<IdHook>,
}

impl HookBundle {
    /// Empty bundle; every slot must be filled before installing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bundle with every slot routed to `handler`.
    #[must_use]
    pub fn from_handler<H: AsyncHookHandler + 'static>(handler: Rc<H>) -> Self {
        let init = Rc::clone(&handler);
        let before = Rc::clone(&handler);
        let after = Rc::clone(&handler);
        Self::new()
            .init(move |event| init.init(event))
            .before(move |id| before.before(id))
            .after(move |id| after.after(id))
            .destroy(move |id| handler.destroy(id))
    }

    /// Set the init hook.
    #[must_use]
    pub fn init<F>(mut self, hook: F) -> Self
    where
        F: Fn(&InitEvent) -> anyhow::Result<()> + 'static,
    {
        self.init = Some(Rc::new(hook));
        self
    }

    /// Set the before hook.
    #[must_use]
    pub fn before<F>(mut self, hook: F) -> Self
    where
        F: Fn(AsyncId) -> anyhow::Result<()> + 'static,
    {
        self.before = Some(Rc::new(hook));
        self
    }

    /// Set the after hook.
    #[must_use]
    pub fn after<F>(mut self, hook: F) -> Self
    where
        F: Fn(AsyncId) -> anyhow::Result<()> + 'static,
    {
        self.after = Some(Rc::new(hook));
        self
    }

    /// Set the destroy hook.
    #[must_use]
    pub fn destroy<F>(mut self, hook: F) -> Self
    where
        F: Fn(AsyncId) -> anyhow::Result<()> + 'static,
    {
        self.destroy = Some(Rc::new(hook));
        self
    }

    /// First phase without a callback, in slot order.
    #[must_use]
    pub fn missing(&self) -> Option<HookPhase> {
        if self.init.is_none() {
            Some(HookPhase::Init)
        } else if self.before.is_none() {
            Some(HookPhase::Before)
        } else if self.after.is_none() {
            Some(HookPhase::After)
        } else if self.destroy.is_none() {
            Some(HookPhase::Destroy)
        } else {
            None
        }
    }
}

impl fmt::Debug for HookBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookBundle")
            .field("init", &self.init.is_some())
            .field("before", &self.before.is_some())
            .field("after", &self.after.is_some())
            .field("destroy", &self.destroy.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        calls: RefCell<Vec<String>>,
    }

    impl AsyncHookHandler for Recorder {
        fn before(&self, async_id: AsyncId) -> anyhow::Result<()> {
            self.calls.borrow_mut().push(format!("before:{async_id}"));
            Ok(())
        }
    }

    fn ok_id(_: AsyncId) -> anyhow::Result<()> {
        Ok(())
    }

    #[test]
    fn empty_bundle_misses_init_first() {
        assert_eq!(HookBundle::new().missing(), Some(HookPhase::Init));
    }

    #[test]
    fn partial_bundle_reports_first_gap() {
        let bundle = HookBundle::new()
            .init(|_| Ok(()))
            .before(ok_id)
            .destroy(ok_id);
        assert_eq!(bundle.missing(), Some(HookPhase::After));
    }

    #[test]
    fn complete_bundle_misses_nothing() {
        let bundle = HookBundle::new()
            .init(|_| Ok(()))
            .before(ok_id)
            .after(ok_id)
            .destroy(ok_id);
        assert_eq!(bundle.missing(), None);
    }

    #[test]
    fn from_handler_fills_every_slot() {
        let recorder = Rc::new(Recorder::default());
        let bundle = HookBundle::from_handler(Rc::clone(&recorder));
        assert_eq!(bundle.missing(), None);

        let before = bundle.before.clone().unwrap();
        before(AsyncId::new(4.0)).unwrap();
        assert_eq!(*recorder.calls.borrow(), vec!["before:4".to_string()]);

        // Defaults are no-ops.
        let destroy = bundle.destroy.unwrap();
        assert!(destroy(AsyncId::new(4.0)).is_ok());
    }

    #[test]
    fn init_event_provider_name() {
        let event = InitEvent {
            async_id: AsyncId::new(2.0),
            provider: ProviderType::TimerWrap,
            resource: ResourceHandle {
                provider: ProviderType::TimerWrap,
                self_size: 48,
            },
            trigger_id: AsyncId::ROOT,
        };
        assert_eq!(event.provider_name(), "TIMERWRAP");
    }

    #[test]
    fn debug_shows_slots() {
        let debug = format!("{:?}", HookBundle::new().before(ok_id));
        assert!(debug.contains("before: true"));
        assert!(debug.contains("init: false"));
    }
}
