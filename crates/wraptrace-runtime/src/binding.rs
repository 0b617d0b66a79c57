//! Surface exposed to instrumentation code.
//!
//! [`AsyncWrapBinding`] is what an embedder hands to the instrumentation
//! layer: the hook registration entry point, the two shared field buffers,
//! the slot-index constants, the provider table, and the per-resource id
//! accessor. [`BindingSnapshot`] is the serialisable part of it.

use std::collections::BTreeMap;
use std::rc::Rc;

use serde::Serialize;
use tracing::debug;
use wraptrace_core::logging::TARGET;
use wraptrace_core::{AsyncId, ProviderType};
use wraptrace_hooks::{HookBundle, HookFields, UidFields, constants};

use crate::env::Environment;
use crate::errors::RuntimeError;
use crate::resource::AsyncResource;

/// Instrumentation-facing view of an [`Environment`].
#[derive(Debug, Clone)]
pub struct AsyncWrapBinding {
    env: Rc<Environment>,
}

impl AsyncWrapBinding {
    /// Bind to `env`.
    #[must_use]
    pub fn new(env: Rc<Environment>) -> Self {
        Self { env }
    }

    /// Install the four hooks; fails if already installed or any is missing.
    pub fn setup_hooks(&self, bundle: HookBundle) -> Result<(), RuntimeError> {
        self.env.setup_hooks(bundle)?;
        debug!(target: TARGET, "hooks installed through binding");
        Ok(())
    }

    /// Per-phase activation counters.
    #[must_use]
    pub fn async_hook_fields(&self) -> &HookFields {
        self.env.hooks().fields()
    }

    /// Id counter and causal context slots.
    #[must_use]
    pub fn async_uid_fields(&self) -> &UidFields {
        self.env.uid_fields()
    }

    /// Slot names to indices.
    #[must_use]
    pub fn constants(&self) -> BTreeMap<&'static str, usize> {
        constants()
    }

    /// Provider names to numeric tags.
    #[must_use]
    pub fn providers(&self) -> BTreeMap<&'static str, u16> {
        ProviderType::all()
            .iter()
            .map(|provider| (provider.name(), provider.tag()))
            .collect()
    }

    /// Id of the resource wrapped by an object, if it has one.
    pub fn get_async_id(&self, resource: Option<&AsyncResource>) -> Result<AsyncId, RuntimeError> {
        resource
            .map(AsyncResource::async_id)
            .ok_or(RuntimeError::MissingWrapper)
    }

    /// Constants and providers, for export.
    #[must_use]
    pub fn snapshot(&self) -> BindingSnapshot {
        BindingSnapshot {
            constants: self.constants(),
            providers: self.providers(),
        }
    }
}

/// Static tables exported to instrumentation code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BindingSnapshot {
    /// Slot names to indices.
    pub constants: BTreeMap<&'static str, usize>,
    /// Provider names to numeric tags.
    pub providers: BTreeMap<&'static str, u16>,
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use wraptrace_core::HookPhase;
    use wraptrace_hooks::HookError;
    use wraptrace_settings::WraptraceSettings;

    use super::*;
    use crate::host::ManualLoop;

    fn binding() -> AsyncWrapBinding {
        AsyncWrapBinding::new(Environment::new(
            ManualLoop::new(),
            WraptraceSettings::default(),
        ))
    }

    fn bundle() -> HookBundle {
        HookBundle::new()
            .init(|_| Ok(()))
            .before(|_| Ok(()))
            .after(|_| Ok(()))
            .destroy(|_| Ok(()))
    }

    #[test]
    fn setup_hooks_once() {
        let binding = binding();
        binding.setup_hooks(bundle()).unwrap();
        assert_matches!(
            binding.setup_hooks(bundle()),
            Err(RuntimeError::Hooks(HookError::AlreadyInstalled))
        );
    }

    #[test]
    fn setup_hooks_rejects_missing() {
        let binding = binding();
        assert_matches!(
            binding.setup_hooks(HookBundle::new().init(|_| Ok(()))),
            Err(RuntimeError::Hooks(HookError::MissingHook(HookPhase::Before)))
        );
    }

    #[test]
    fn field_writes_gate_phases() {
        let binding = binding();
        assert!(binding.async_hook_fields().set(HookFields::INIT, 1));
        assert!(binding.env.hooks().is_active(HookPhase::Init));
        assert!(!binding.env.hooks().is_active(HookPhase::Before));
    }

    #[test]
    fn uid_fields_are_live() {
        let binding = binding();
        let _scope = binding.env.enter_scope(AsyncId::new(6.0), AsyncId::new(3.0));
        let uids = binding.async_uid_fields();
        assert_eq!(uids.get(UidFields::CURRENT_ID), Some(6.0));
        assert_eq!(uids.get(UidFields::TRIGGER_ID), Some(3.0));
    }

    #[test]
    fn providers_table() {
        let providers = binding().providers();
        assert_eq!(providers.len(), ProviderType::COUNT);
        assert_eq!(providers["NONE"], 0);
        assert_eq!(providers["TCPWRAP"], ProviderType::TcpWrap.tag());
        assert_eq!(providers["ZCTX"], 25);
    }

    #[test]
    fn get_async_id_requires_wrapper() {
        let binding = binding();
        assert_matches!(binding.get_async_id(None), Err(RuntimeError::MissingWrapper));

        let resource = AsyncResource::new(&binding.env, ProviderType::TtyWrap, 0).unwrap();
        assert_eq!(binding.get_async_id(Some(&resource)).unwrap(), resource.async_id());
    }

    #[test]
    fn snapshot_serializes() {
        let json = serde_json::to_value(binding().snapshot()).unwrap();
        assert_eq!(json["constants"]["scopedTriggerId"], 4);
        assert_eq!(json["providers"]["TIMERWRAP"], ProviderType::TimerWrap.tag());
    }
}
