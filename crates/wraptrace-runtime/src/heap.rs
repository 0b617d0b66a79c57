//! Heap snapshot integration.
//!
//! Every provider type gets its own wrapper class id
//! (`WRAPPER_CLASS_ID_OFFSET + tag`), so a heap profiler can group retained
//! resources by kind and ask for a [`RetainedAsyncInfo`] describing each.

use std::hash::{Hash, Hasher};

use wraptrace_core::ProviderType;

use crate::errors::RuntimeError;
use crate::resource::AsyncResource;

/// Builds the retained info for a wrapper of the given class id.
pub type WrapperInfoFn = fn(u16, &AsyncResource) -> Result<RetainedAsyncInfo, RuntimeError>;

/// The host heap profiler, as far as the tracker uses it.
pub trait HeapProfiler {
    /// Route wrappers tagged `class_id` to `info`.
    fn set_wrapper_class_info_provider(&mut self, class_id: u16, info: WrapperInfoFn);
}

/// Register [`wrapper_info`] for every provider type.
pub fn register_wrapper_info<P: HeapProfiler + ?Sized>(profiler: &mut P) {
    for provider in ProviderType::all() {
        profiler.set_wrapper_class_info_provider(provider.class_id(), wrapper_info);
    }
}

/// [`WrapperInfoFn`] registered by [`register_wrapper_info`].
pub fn wrapper_info(
    class_id: u16,
    resource: &AsyncResource,
) -> Result<RetainedAsyncInfo, RuntimeError> {
    RetainedAsyncInfo::new(class_id, resource)
}

/// What a heap snapshot records about one retained resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetainedAsyncInfo {
    label: &'static str,
    identity: u64,
    size: usize,
}

impl RetainedAsyncInfo {
    /// Describe `resource`, retained under wrapper class `class_id`.
    ///
    /// The label comes from the class id, not the resource, matching what
    /// the profiler grouped it under.
    pub fn new(class_id: u16, resource: &AsyncResource) -> Result<Self, RuntimeError> {
        let provider =
            ProviderType::from_class_id(class_id).ok_or(RuntimeError::InvalidClassId(class_id))?;
        Ok(Self {
            label: provider.name(),
            identity: resource.async_id().as_f64().to_bits(),
            size: resource.self_size(),
        })
    }

    /// Provider name.
    #[must_use]
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Self-reported size of the resource.
    #[must_use]
    pub fn size_in_bytes(&self) -> usize {
        self.size
    }

    /// Stable per resource: derived from its async id.
    #[must_use]
    pub fn hash_code(&self) -> u64 {
        self.identity
    }

    /// Same label and same resource.
    #[must_use]
    pub fn is_equivalent(&self, other: &Self) -> bool {
        self.label == other.label && self.identity == other.identity
    }
}

impl Hash for RetainedAsyncInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity.hash(state);
    }
}
