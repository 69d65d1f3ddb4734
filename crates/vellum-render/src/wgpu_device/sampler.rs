use std::sync::Arc;

use vellum_core::alloc::HashMap;
use vellum_core::profiling::profile_function;

use super::convert::sampler_descriptor;
use crate::SamplerState;

/// GPU samplers shared between identical [`SamplerState`]s.
#[derive(Debug, Default)]
pub(crate) struct SamplerCache {
    cache: HashMap<SamplerState, Arc<wgpu::Sampler>>,
    border_supported: bool,
}

impl SamplerCache {
    pub fn new(border_supported: bool) -> Self {
        Self {
            cache: HashMap::default(),
            border_supported,
        }
    }

    /// Get a sampler from the cache or create a new one.
    pub fn get_or_create(&mut self, device: &wgpu::Device, state: SamplerState) -> Arc<wgpu::Sampler> {
        if let Some(sampler) = self.cache.get(&state) {
            return Arc::clone(sampler);
        }

        profile_function!();
        let descriptor = sampler_descriptor(&state, self.border_supported);
        let sampler = Arc::new(device.create_sampler(&descriptor));
        self.cache.insert(state, Arc::clone(&sampler));
        sampler
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }
}
