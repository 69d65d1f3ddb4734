//! Host-side vertex/index staging and the streaming upload ring.
//!
//! Shape builders write into growable host arrays. Those arrays are split
//! into batches, each small enough to fit the fixed-size GPU buffers in one
//! upload. During replay every batch is copied into the GPU buffers with
//! ring semantics:
//!
//! ```text
//! GPU vertex buffer (capacity N)
//! [ frame k batch 0 | frame k batch 1 | frame k+1 batch 0 | ...free... ]
//!                                                         ^ write cursor
//! ```
//!
//! Appending uses [`MapMode::NoOverwrite`]. A batch that does not fit in the
//! remaining space wraps to offset 0 with [`MapMode::Discard`].

use vellum_core::profiling::profile_function;

use crate::{CommandManager, IndexType, MapMode, RenderDevice2D, Vertex2D};

/// Capacities of the batch allocator.
///
/// Host arrays grow by doubling from their initial size up to the max size.
/// The GPU buffer sizes bound a single batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    /// Initial host vertex array length.
    pub initial_vertex_array_size: u32,
    /// GPU vertex buffer capacity, in vertices.
    pub vertex_buffer_size: u32,
    /// Upper bound of the host vertex array.
    pub max_vertex_array_size: u32,
    /// Initial host index array length.
    pub initial_index_array_size: u32,
    /// GPU index buffer capacity, in indices.
    pub index_buffer_size: u32,
    /// Upper bound of the host index array.
    pub max_index_array_size: u32,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            initial_vertex_array_size: 4096,
            vertex_buffer_size: 65535,
            max_vertex_array_size: 65535 * 64,
            initial_index_array_size: 4096 * 8,
            index_buffer_size: 65535 * 3,
            max_index_array_size: 196605 * 64,
        }
    }
}

impl BatchConfig {
    pub fn with_vertex_buffer_size(mut self, size: u32) -> Self {
        self.vertex_buffer_size = size;
        self
    }

    pub fn with_index_buffer_size(mut self, size: u32) -> Self {
        self.index_buffer_size = size;
        self
    }

    pub fn with_max_vertex_array_size(mut self, size: u32) -> Self {
        self.max_vertex_array_size = size;
        self
    }

    pub fn with_max_index_array_size(mut self, size: u32) -> Self {
        self.max_index_array_size = size;
        self
    }

    pub fn with_initial_sizes(mut self, vertices: u32, indices: u32) -> Self {
        self.initial_vertex_array_size = vertices;
        self.initial_index_array_size = indices;
        self
    }

    /// The config with every value forced into a usable range.
    ///
    /// Batch-relative indices are [`IndexType`], so a batch can never hold
    /// more than `IndexType::MAX` vertices.
    pub fn sanitized(self) -> Self {
        let vertex_buffer_size = self.vertex_buffer_size.clamp(1, IndexType::MAX as u32);
        let index_buffer_size = self.index_buffer_size.max(1);
        let max_vertex_array_size = self.max_vertex_array_size.max(vertex_buffer_size);
        let max_index_array_size = self.max_index_array_size.max(index_buffer_size);
        Self {
            initial_vertex_array_size: self.initial_vertex_array_size.clamp(1, max_vertex_array_size),
            vertex_buffer_size,
            max_vertex_array_size,
            initial_index_array_size: self.initial_index_array_size.clamp(1, max_index_array_size),
            index_buffer_size,
            max_index_array_size,
        }
    }
}

/// Write region handed out by [`Vertex2DBatch::request_buffer`].
///
/// Both slices have exactly the requested lengths. Indices are relative to
/// the batch, so builders add `index_offset` to their local indices.
#[derive(Debug)]
pub struct BufferRegion<'a> {
    pub vertices: &'a mut [Vertex2D],
    pub indices: &'a mut [IndexType],
    pub index_offset: IndexType,
}

/// Where a batch landed in the GPU buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchInfo {
    pub index_count: u32,
    pub start_index_location: u32,
    pub base_vertex_location: u32,
}

#[derive(Debug, Clone, Copy, Default)]
struct BatchExtent {
    vertex_start: u32,
    vertex_count: u32,
    index_start: u32,
    index_count: u32,
}

/// Growable host vertex/index arrays split into GPU-sized batches.
#[derive(Debug)]
pub struct Vertex2DBatch {
    config: BatchConfig,

    vertices: Vec<Vertex2D>,
    indices: Vec<IndexType>,
    vertex_write_pos: u32,
    index_write_pos: u32,
    batches: Vec<BatchExtent>,

    // GPU ring cursors; kept across frames
    vertex_buffer_write_pos: u32,
    index_buffer_write_pos: u32,
}

impl Vertex2DBatch {
    pub fn new(config: BatchConfig) -> Self {
        let config = config.sanitized();
        Self {
            vertices: vec![Vertex2D::default(); config.initial_vertex_array_size as usize],
            indices: vec![0; config.initial_index_array_size as usize],
            vertex_write_pos: 0,
            index_write_pos: 0,
            batches: vec![BatchExtent::default()],
            vertex_buffer_write_pos: 0,
            index_buffer_write_pos: 0,
            config,
        }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Number of batches recorded this frame (at least 1).
    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    pub fn vertex_array_len(&self) -> usize {
        self.vertices.len()
    }

    pub fn index_array_len(&self) -> usize {
        self.indices.len()
    }

    /// Current GPU ring cursors `(vertex, index)`.
    pub fn gpu_write_positions(&self) -> (u32, u32) {
        (self.vertex_buffer_write_pos, self.index_buffer_write_pos)
    }

    /// Reserves `vertex_size` vertices and `index_size` indices.
    ///
    /// Starts a new batch, and records the switch in `commands`, when the
    /// current one cannot take the request. Returns `None` when the request
    /// can never be satisfied: it exceeds a GPU buffer on its own or the host
    /// arrays would outgrow their caps. The caller skips the draw.
    pub fn request_buffer(
        &mut self,
        vertex_size: u16,
        index_size: u32,
        commands: &mut CommandManager,
    ) -> Option<BufferRegion<'_>> {
        let vertex_size = vertex_size as u32;

        if vertex_size > self.config.vertex_buffer_size || index_size > self.config.index_buffer_size {
            tracing::warn!(
                "Batch request of {} vertices / {} indices exceeds GPU buffer capacity ({} / {})",
                vertex_size,
                index_size,
                self.config.vertex_buffer_size,
                self.config.index_buffer_size
            );
            return None;
        }

        let vertex_end = self.vertex_write_pos + vertex_size;
        let index_end = self.index_write_pos + index_size;

        if vertex_end > self.config.max_vertex_array_size || index_end > self.config.max_index_array_size {
            tracing::warn!(
                "Host batch arrays exhausted ({} vertices / {} indices requested, cap {} / {})",
                vertex_end,
                index_end,
                self.config.max_vertex_array_size,
                self.config.max_index_array_size
            );
            return None;
        }

        grow_to_fit(&mut self.vertices, vertex_end, self.config.max_vertex_array_size);
        grow_to_fit(&mut self.indices, index_end, self.config.max_index_array_size);

        let current = self.batches[self.batches.len() - 1];
        if current.vertex_count + vertex_size > self.config.vertex_buffer_size
            || current.index_count + index_size > self.config.index_buffer_size
        {
            self.batches.push(BatchExtent {
                vertex_start: self.vertex_write_pos,
                vertex_count: 0,
                index_start: self.index_write_pos,
                index_count: 0,
            });
            let batch_index = (self.batches.len() - 1) as u32;
            tracing::debug!("Starting vertex batch {}", batch_index);
            commands.push_update_buffers(batch_index);
        }

        let last = self.batches.len() - 1;
        let batch = &mut self.batches[last];
        let index_offset = batch.vertex_count as IndexType;
        batch.vertex_count += vertex_size;
        batch.index_count += index_size;

        let vertex_start = self.vertex_write_pos as usize;
        let index_start = self.index_write_pos as usize;
        self.vertex_write_pos = vertex_end;
        self.index_write_pos = index_end;

        Some(BufferRegion {
            vertices: &mut self.vertices[vertex_start..vertex_end as usize],
            indices: &mut self.indices[index_start..index_end as usize],
            index_offset,
        })
    }

    /// Uploads batch `batch_index` into the GPU ring and reports where it
    /// landed. Upload failures are logged and the batch is treated as
    /// written.
    pub fn update_buffers<D: RenderDevice2D + ?Sized>(
        &mut self,
        batch_index: u32,
        device: &mut D,
    ) -> BatchInfo {
        profile_function!();

        let Some(batch) = self.batches.get(batch_index as usize).copied() else {
            tracing::warn!("Update of unknown batch {}", batch_index);
            return BatchInfo::default();
        };

        let mut info = BatchInfo {
            index_count: batch.index_count,
            ..Default::default()
        };

        if batch.vertex_count > 0 {
            let mode = ring_mode(
                &mut self.vertex_buffer_write_pos,
                batch.vertex_count,
                self.config.vertex_buffer_size,
            );
            let start = batch.vertex_start as usize;
            let data = &self.vertices[start..start + batch.vertex_count as usize];
            if let Err(e) = device.upload_vertices(mode, self.vertex_buffer_write_pos, data) {
                tracing::warn!("Vertex upload for batch {} failed: {}", batch_index, e);
            }
            info.base_vertex_location = self.vertex_buffer_write_pos;
            self.vertex_buffer_write_pos += batch.vertex_count;
        }

        if batch.index_count > 0 {
            let mode = ring_mode(
                &mut self.index_buffer_write_pos,
                batch.index_count,
                self.config.index_buffer_size,
            );
            let start = batch.index_start as usize;
            let data = &self.indices[start..start + batch.index_count as usize];
            if let Err(e) = device.upload_indices(mode, self.index_buffer_write_pos, data) {
                tracing::warn!("Index upload for batch {} failed: {}", batch_index, e);
            }
            info.start_index_location = self.index_buffer_write_pos;
            self.index_buffer_write_pos += batch.index_count;
        }

        info
    }

    /// Drops every batch and rewinds the host arrays. The GPU ring cursors
    /// are kept so the next frame keeps appending.
    pub fn reset(&mut self) {
        self.batches.clear();
        self.batches.push(BatchExtent::default());
        self.vertex_write_pos = 0;
        self.index_write_pos = 0;
    }

    pub fn set_buffers<D: RenderDevice2D + ?Sized>(&self, device: &mut D) {
        device.set_buffers();
    }
}

fn ring_mode(write_pos: &mut u32, size: u32, capacity: u32) -> MapMode {
    if *write_pos + size <= capacity {
        MapMode::NoOverwrite
    } else {
        *write_pos = 0;
        MapMode::Discard
    }
}

fn grow_to_fit<T: Clone + Default>(array: &mut Vec<T>, required: u32, max: u32) {
    let required = required as usize;
    if required <= array.len() {
        return;
    }

    let mut new_len = array.len().max(1);
    while new_len < required {
        new_len *= 2;
    }
    array.resize(new_len.min(max as usize), T::default());
}
