use vellum_core::math::Vec4;

/// Size of one constant block: 16 vectors.
pub(crate) const CONSTANT_BLOCK_SIZE: u64 = 256;

/// Vectors that fit in one block.
pub(crate) const CONSTANT_BLOCK_VECTORS: usize = (CONSTANT_BLOCK_SIZE / 16) as usize;

/// Splits `data` into the part that fits one block and the count of
/// vectors past the end of it.
pub(crate) fn fit_block(data: &[Vec4]) -> (&[Vec4], usize) {
    let len = data.len().min(CONSTANT_BLOCK_VECTORS);
    (&data[..len], data.len() - len)
}

/// Uniform ring for constant buffer uploads, bound with dynamic offsets.
///
/// Block 0 stays zeroed and is what unset bindings point at. Every upload
/// gets a fresh block, so draws recorded earlier in the same submission keep
/// reading their own data. When the ring is full the owner submits its
/// pending work and calls [`rewind`](Self::rewind).
#[derive(Debug)]
pub(crate) struct ConstantRing {
    buffer: wgpu::Buffer,
    capacity: u64,
    stride: u64,
    offset: u64,
}

impl ConstantRing {
    pub fn new(device: &wgpu::Device, capacity: u64, min_alignment: u32) -> Self {
        let stride = CONSTANT_BLOCK_SIZE.max(min_alignment as u64);
        let capacity = capacity.max(stride * 2) / stride * stride;
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("vellum_constant_ring"),
            size: capacity,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            buffer,
            capacity,
            stride,
            offset: stride,
        }
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    /// Writes `data` into a new block and returns its offset, or `None` when
    /// the ring is full. Callers trim `data` with [`fit_block`] first.
    pub fn push(&mut self, queue: &wgpu::Queue, data: &[Vec4]) -> Option<u32> {
        if self.offset + self.stride > self.capacity {
            return None;
        }

        // unused tail of the block reads as zero
        let mut block = [Vec4::ZERO; CONSTANT_BLOCK_VECTORS];
        let (data, _) = fit_block(data);
        block[..data.len()].copy_from_slice(data);

        let offset = self.offset;
        queue.write_buffer(&self.buffer, offset, bytemuck::cast_slice(&block));
        self.offset += self.stride;
        Some(offset as u32)
    }

    /// Frees every block except the zero block. Only valid once all work
    /// referencing the ring has been submitted.
    pub fn rewind(&mut self) {
        self.offset = self.stride;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_block_keeps_short_uploads() {
        let data = [Vec4::ONE; 3];
        let (kept, dropped) = fit_block(&data);
        assert_eq!(kept.len(), 3);
        assert_eq!(dropped, 0);
    }

    #[test]
    fn test_fit_block_reports_overflow() {
        let data: Vec<Vec4> = (0..20).map(|i| Vec4::splat(i as f32)).collect();
        let (kept, dropped) = fit_block(&data);
        assert_eq!(kept.len(), CONSTANT_BLOCK_VECTORS);
        assert_eq!(dropped, 4);
        assert_eq!(kept[CONSTANT_BLOCK_VECTORS - 1], Vec4::splat(15.0));
    }

    #[test]
    fn test_block_holds_sixteen_vectors() {
        assert_eq!(CONSTANT_BLOCK_VECTORS, 16);
        assert_eq!(CONSTANT_BLOCK_VECTORS * std::mem::size_of::<Vec4>(), CONSTANT_BLOCK_SIZE as usize);
    }
}
