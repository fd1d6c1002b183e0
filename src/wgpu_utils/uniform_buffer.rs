// src/wgpu_utils/uniform_buffer.rs
use std::marker::PhantomData;

fn short_type_name<T>() -> &'static str {
    let type_name = std::any::type_name::<T>();
    match type_name.rfind(':') {
        Some(pos) => &type_name[(pos + 1)..],
        None => type_name,
    }
}

/// Typed uniform buffer that skips redundant uploads
pub struct UniformBuffer<Content> {
    buffer: wgpu::Buffer,
    content_type: PhantomData<Content>,
    previous_content: Vec<u8>,
}

impl<Content: bytemuck::Pod> UniformBuffer<Content> {
    /// Create buffer with initial data
    pub fn new_with_data(device: &wgpu::Device, initial_content: &Content) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("UniformBuffer: {}", short_type_name::<Content>())),
            size: std::mem::size_of::<Content>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: true,
        });

        buffer
            .slice(..)
            .get_mapped_range_mut()
            .copy_from_slice(bytemuck::bytes_of(initial_content));
        buffer.unmap();

        UniformBuffer {
            buffer,
            content_type: PhantomData,
            previous_content: bytemuck::bytes_of(initial_content).to_vec(),
        }
    }

    /// Layout entry for binding this buffer at `binding`
    pub fn layout_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
        wgpu::BindGroupLayoutEntry {
            binding,
            visibility,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<Content>() as u64),
            },
            count: None,
        }
    }

    /// Update buffer content (skips the write when nothing changed)
    pub fn update_content(&mut self, queue: &wgpu::Queue, content: Content) {
        let new_content = bytemuck::bytes_of(&content);
        if self.previous_content == new_content {
            return;
        }
        queue.write_buffer(&self.buffer, 0, new_content);
        self.previous_content = new_content.to_vec();
    }

    pub fn binding_resource(&self) -> wgpu::BindingResource {
        self.buffer.as_entire_binding()
    }
}

/// Immutable vertex or index buffer filled at creation
pub struct GeometryBuffer<Content> {
    buffer: wgpu::Buffer,
    content_type: PhantomData<Content>,
    len: usize,
}

impl<Content: bytemuck::Pod> GeometryBuffer<Content> {
    pub fn new_vertex(device: &wgpu::Device, data: &[Content]) -> Self {
        Self::new_with_usage(device, data, wgpu::BufferUsages::VERTEX, "VertexBuffer")
    }

    pub fn new_index(device: &wgpu::Device, data: &[Content]) -> Self {
        Self::new_with_usage(device, data, wgpu::BufferUsages::INDEX, "IndexBuffer")
    }

    fn new_with_usage(
        device: &wgpu::Device,
        data: &[Content],
        usage: wgpu::BufferUsages,
        kind: &str,
    ) -> Self {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        // Mapped buffers must be a multiple of COPY_BUFFER_ALIGNMENT
        let align = wgpu::COPY_BUFFER_ALIGNMENT;
        let size = ((bytes.len() as u64 + align - 1) / align * align).max(align);

        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("{}<{}>", kind, short_type_name::<Content>())),
            size,
            usage,
            mapped_at_creation: true,
        });
        buffer.slice(..).get_mapped_range_mut()[..bytes.len()].copy_from_slice(bytes);
        buffer.unmap();

        GeometryBuffer {
            buffer,
            content_type: PhantomData,
            len: data.len(),
        }
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Nested;

    #[test]
    fn test_short_type_name_strips_path() {
        assert_eq!(short_type_name::<Nested>(), "Nested");
        assert_eq!(short_type_name::<u32>(), "u32");
    }
}
