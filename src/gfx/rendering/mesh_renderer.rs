//! Draws a prepared [`Model`] into the frame's active target

use std::sync::Arc;

use log::{debug, info};

use super::pipeline_manager::{PipelineConfig, PipelineManager};
use super::vertex::MeshVertex;
use crate::gfx::camera::{CameraUniform, Viewport};
use crate::gfx::resources::TextureResource;
use crate::model::Model;
use crate::wgpu_utils::{GeometryBuffer, UniformBuffer};

const MESH_PIPELINE: &str = "Mesh";
const MESH_SHADER: &str = "mesh";

/// Attachments for one frame.
///
/// With MSAA `color_view` is the multisampled target and `resolve_target`
/// the surface texture; otherwise `color_view` is the surface itself.
pub struct FrameTarget<'a> {
    pub color_view: &'a wgpu::TextureView,
    pub resolve_target: Option<&'a wgpu::TextureView>,
    pub depth_view: &'a wgpu::TextureView,
    pub sample_count: u32,
    pub clear_color: wgpu::Color,
    pub clear_depth: f32,
}

/// Something that can draw a model for a viewport
pub trait ModelRenderer {
    /// Records a pass that clears `target` and draws `model`. Models that
    /// are not ready yet leave a cleared frame.
    fn render_model(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        target: &FrameTarget,
        model: &dyn Model,
        viewport: &Viewport,
    );

    /// Drops GPU copies of the model so they can be rebuilt after the
    /// surface comes back
    fn release_gpu_resources(&mut self);
}

struct GpuMesh {
    vertices: GeometryBuffer<MeshVertex>,
    indices: GeometryBuffer<u32>,
}

pub struct MeshRenderer {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    pipeline_manager: PipelineManager,
    camera_buffer: UniformBuffer<CameraUniform>,
    camera_bind_group: wgpu::BindGroup,
    meshes: Vec<GpuMesh>,
    uploaded_generation: Option<u64>,
}

impl MeshRenderer {
    pub fn new(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        color_format: wgpu::TextureFormat,
    ) -> Self {
        let camera_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Camera Layout"),
            entries: &[UniformBuffer::<CameraUniform>::layout_entry(
                0,
                wgpu::ShaderStages::VERTEX_FRAGMENT,
            )],
        });
        let camera_buffer = UniformBuffer::new_with_data(&device, &CameraUniform::default());
        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Camera Bind Group"),
            layout: &camera_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.binding_resource(),
            }],
        });

        let mut pipeline_manager = PipelineManager::new(device.clone());
        pipeline_manager.load_shader(MESH_SHADER, include_str!("mesh.wgsl"));
        pipeline_manager.register_pipeline(
            MESH_PIPELINE,
            PipelineConfig::default_with_shader(MESH_SHADER)
                .with_label(MESH_PIPELINE)
                .with_bind_group_layouts(vec![camera_layout])
                .with_color_format(color_format)
                .with_depth_format(TextureResource::DEPTH_FORMAT),
        );

        Self {
            device,
            queue,
            pipeline_manager,
            camera_buffer,
            camera_bind_group,
            meshes: Vec::new(),
            uploaded_generation: None,
        }
    }

    fn upload(&mut self, model: &dyn Model) {
        self.meshes = model
            .meshes()
            .iter()
            .filter(|mesh| !mesh.indices.is_empty())
            .map(|mesh| GpuMesh {
                vertices: GeometryBuffer::new_vertex(&self.device, &MeshVertex::from_mesh(mesh)),
                indices: GeometryBuffer::new_index(&self.device, &mesh.indices),
            })
            .collect();
        self.uploaded_generation = Some(model.generation());
        info!("Uploaded {} mesh(es) to the GPU", self.meshes.len());
    }
}

impl ModelRenderer for MeshRenderer {
    fn render_model(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        target: &FrameTarget,
        model: &dyn Model,
        viewport: &Viewport,
    ) {
        self.camera_buffer
            .update_content(&self.queue, CameraUniform::from_viewport(viewport));

        if model.is_ready_for_rendering() {
            if self.uploaded_generation != Some(model.generation()) {
                self.upload(model);
            }
        } else if self.uploaded_generation.is_some() {
            self.release_gpu_resources();
        }

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Model Render Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target.color_view,
                resolve_target: target.resolve_target,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(target.clear_color),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: target.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(target.clear_depth),
                    store: wgpu::StoreOp::Discard,
                }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
        });

        if self.meshes.is_empty() {
            return;
        }
        let Some(pipeline) = self
            .pipeline_manager
            .get_pipeline(MESH_PIPELINE, target.sample_count)
        else {
            return;
        };

        render_pass.set_pipeline(pipeline);
        render_pass.set_bind_group(0, &self.camera_bind_group, &[]);
        for mesh in &self.meshes {
            render_pass.set_vertex_buffer(0, mesh.vertices.buffer().slice(..));
            render_pass.set_index_buffer(mesh.indices.buffer().slice(..), wgpu::IndexFormat::Uint32);
            render_pass.draw_indexed(0..mesh.indices.len() as u32, 0, 0..1);
        }
    }

    fn release_gpu_resources(&mut self) {
        if !self.meshes.is_empty() {
            debug!("Releasing {} GPU mesh(es)", self.meshes.len());
        }
        self.meshes.clear();
        self.uploaded_generation = None;
    }
}
