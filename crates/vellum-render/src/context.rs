use std::sync::Arc;

use crate::RenderError;

/// Shared wgpu instance, adapter, device and queue.
///
/// # Ownership Pattern
///
/// Contexts are created behind an `Arc` and cloned into every device or
/// helper that needs GPU access:
///
/// ```rust,no_run
/// use vellum_render::GraphicsContext;
///
/// let ctx = GraphicsContext::new_owned_sync().expect("no GPU");
/// let ctx2 = ctx.clone(); // Cheap clone (Arc)
/// ```
pub struct GraphicsContext {
    pub instance: wgpu::Instance,
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl GraphicsContext {
    /// Creates a context with the default descriptor.
    pub async fn new_owned() -> Result<Arc<Self>, RenderError> {
        Self::new_owned_with_descriptor(GraphicsContextDescriptor::default()).await
    }

    /// Creates a context, blocking the current thread until it is ready.
    pub fn new_owned_sync() -> Result<Arc<Self>, RenderError> {
        pollster::block_on(Self::new_owned())
    }

    pub fn new_owned_sync_with_descriptor(
        descriptor: GraphicsContextDescriptor,
    ) -> Result<Arc<Self>, RenderError> {
        pollster::block_on(Self::new_owned_with_descriptor(descriptor))
    }

    pub async fn new_owned_with_descriptor(
        descriptor: GraphicsContextDescriptor,
    ) -> Result<Arc<Self>, RenderError> {
        let context = Self::create_context_internal(descriptor).await?;
        Ok(Arc::new(context))
    }

    async fn create_context_internal(
        descriptor: GraphicsContextDescriptor,
    ) -> Result<Self, RenderError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: descriptor.backends,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: descriptor.power_preference,
                compatible_surface: None,
                force_fallback_adapter: descriptor.force_fallback_adapter,
            })
            .await
            .map_err(|_| RenderError::NoAdapter)?;

        // Requested features are best-effort
        let available = descriptor.requested_features & adapter.features();
        if available != descriptor.requested_features {
            tracing::warn!(
                "Some requested GPU features are not available: requested {:?}, enabled {:?}",
                descriptor.requested_features,
                available
            );
        }

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                required_features: available,
                required_limits: descriptor.limits.clone(),
                label: descriptor.label,
                ..Default::default()
            })
            .await
            .map_err(|e| RenderError::RequestDevice(e.to_string()))?;

        tracing::info!(
            "Created graphics context on {} ({:?}) with features: {:?}",
            adapter.get_info().name,
            adapter.get_info().backend,
            available
        );

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Adapter name, backend and driver the context runs on.
    pub fn info(&self) -> wgpu::AdapterInfo {
        self.adapter.get_info()
    }

    /// Limits the device was created with.
    pub fn limits(&self) -> wgpu::Limits {
        self.device.limits()
    }

    /// Features enabled on the device, a subset of the requested ones.
    pub fn features(&self) -> wgpu::Features {
        self.device.features()
    }

    pub fn has_feature(&self, feature: wgpu::Features) -> bool {
        self.features().contains(feature)
    }

    /// Alignment for dynamic uniform buffer offsets.
    #[inline]
    pub fn min_uniform_buffer_offset_alignment(&self) -> u32 {
        self.limits().min_uniform_buffer_offset_alignment
    }

    #[inline]
    pub fn max_texture_dimension_2d(&self) -> u32 {
        self.limits().max_texture_dimension_2d
    }

    /// Largest buffer the device accepts, in bytes.
    #[inline]
    pub fn max_buffer_size(&self) -> u64 {
        self.limits().max_buffer_size
    }
}

impl std::fmt::Debug for GraphicsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let info = self.info();
        f.debug_struct("GraphicsContext")
            .field("adapter", &info.name)
            .field("backend", &info.backend)
            .finish()
    }
}

/// Descriptor for configuring graphics context creation.
#[derive(Debug, Clone)]
pub struct GraphicsContextDescriptor {
    /// GPU backends to use
    pub backends: wgpu::Backends,
    /// Power preference for adapter selection
    pub power_preference: wgpu::PowerPreference,
    /// Whether to force fallback adapter
    pub force_fallback_adapter: bool,
    /// Features enabled when the adapter supports them.
    ///
    /// Defaults to `POLYGON_MODE_LINE` so wireframe rasterizer states work.
    pub requested_features: wgpu::Features,
    /// Required device limits
    pub limits: wgpu::Limits,
    /// Optional label for debugging
    pub label: Option<&'static str>,
}

impl Default for GraphicsContextDescriptor {
    fn default() -> Self {
        Self {
            backends: wgpu::Backends::all(),
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            requested_features: wgpu::Features::POLYGON_MODE_LINE,
            limits: wgpu::Limits::default(),
            label: None,
        }
    }
}

impl GraphicsContextDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add best-effort features.
    pub fn with_requested_features(mut self, features: wgpu::Features) -> Self {
        self.requested_features |= features;
        self
    }

    /// Set the power preference.
    pub fn power_preference(mut self, preference: wgpu::PowerPreference) -> Self {
        self.power_preference = preference;
        self
    }

    /// Set the backends to use.
    pub fn backends(mut self, backends: wgpu::Backends) -> Self {
        self.backends = backends;
        self
    }

    /// Use the software fallback adapter (useful on CI).
    pub fn force_fallback_adapter(mut self, force: bool) -> Self {
        self.force_fallback_adapter = force;
        self
    }

    /// Set the device limits.
    pub fn limits(mut self, limits: wgpu::Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Set the debug label.
    pub fn label(mut self, label: &'static str) -> Self {
        self.label = Some(label);
        self
    }
}
