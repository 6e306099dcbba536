//! wgpu-backed device buffers.
//!
//! Uploads go through [`wgpu::Queue::write_buffer`], which stages the bytes
//! and schedules the copy before the next submit. Offsets and lengths are
//! kept at [`wgpu::COPY_BUFFER_ALIGNMENT`].

use std::sync::Arc;

use tandem_animation::{BufferId, DeviceBuffer};

/// A vertex buffer that animations write into.
pub struct WgpuBuffer {
    id: BufferId,
    buffer: Arc<wgpu::Buffer>,
    queue: Arc<wgpu::Queue>,
}

impl WgpuBuffer {
    /// Creates a `VERTEX | COPY_DST` buffer of at least `size` bytes.
    ///
    /// The size is rounded up to [`wgpu::COPY_BUFFER_ALIGNMENT`].
    #[must_use]
    pub fn new(
        device: &wgpu::Device,
        queue: Arc<wgpu::Queue>,
        label: Option<&str>,
        size: usize,
    ) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label,
            size: aligned_size(size),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Self::from_buffer(Arc::new(buffer), queue)
    }

    /// Wraps an existing buffer. It must have been created with `COPY_DST`.
    #[must_use]
    pub fn from_buffer(buffer: Arc<wgpu::Buffer>, queue: Arc<wgpu::Queue>) -> Self {
        Self {
            id: BufferId::next(),
            buffer,
            queue,
        }
    }

    /// Returns the id to register animations against.
    #[must_use]
    pub fn id(&self) -> BufferId {
        self.id
    }

    /// Returns the GPU buffer, for binding in draw calls.
    #[must_use]
    pub fn buffer(&self) -> &Arc<wgpu::Buffer> {
        &self.buffer
    }
}

impl DeviceBuffer for WgpuBuffer {
    fn id(&self) -> BufferId {
        self.id
    }

    fn size(&self) -> usize {
        usize::try_from(self.buffer.size()).unwrap_or(usize::MAX)
    }

    fn upload(&mut self, offset: usize, data: &[u8]) {
        self.queue
            .write_buffer(&self.buffer, offset as wgpu::BufferAddress, data);
    }

    fn alignment(&self) -> usize {
        wgpu::COPY_BUFFER_ALIGNMENT as usize
    }
}

/// Rounds `size` up to the copy alignment.
#[must_use]
pub fn aligned_size(size: usize) -> wgpu::BufferAddress {
    let size = size as wgpu::BufferAddress;
    size.div_ceil(wgpu::COPY_BUFFER_ALIGNMENT) * wgpu::COPY_BUFFER_ALIGNMENT
}

/// Vertex layout for tightly packed `[f32; 3]` positions, as written by
/// [`WaveAnimation`](tandem_animation::animations::WaveAnimation).
pub const POSITION_ATTRIBS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![
    0 => Float32x3,
];

/// Returns the vertex buffer layout for animated positions.
#[must_use]
pub fn position_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &POSITION_ATTRIBS,
    }
}
