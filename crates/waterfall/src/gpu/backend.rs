use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tracing::{debug, warn};
use winit::dpi::PhysicalSize;
use winit::window::Window;

use super::context::GpuContext;
use super::resources::GpuResources;
use crate::admission::SlotPermit;
use crate::backend::{RenderOutcome, WaterfallBackend};
use crate::geometry::Vertex;
use crate::gradient::GradientTable;
use crate::programs::{resolve_programs, BuiltinPrograms, ProgramLibrary, CONVERT_WORKGROUP};
use crate::ring::RowWrite;
use crate::types::{SurfaceDimensions, WaterfallConfig, GRADIENT_SIZE};

/// wgpu implementation of [`WaterfallBackend`] presenting into a window.
pub struct GpuBackend {
    context: GpuContext,
    resources: GpuResources,
    dims: SurfaceDimensions,
}

impl GpuBackend {
    pub fn new(window: Arc<Window>, config: &WaterfallConfig) -> Result<Self> {
        Self::with_library(window, config, &BuiltinPrograms)
    }

    /// Like [`GpuBackend::new`] with programs looked up in `library`.
    pub fn with_library(
        window: Arc<Window>,
        config: &WaterfallConfig,
        library: &dyn ProgramLibrary,
    ) -> Result<Self> {
        config.dimensions.validate()?;
        let programs = resolve_programs(library, &config.programs)?;
        let context = GpuContext::new(window, config)?;
        let resources = GpuResources::new(
            &context.device,
            &programs,
            config.dimensions,
            config.max_buffers.max(1),
            context.surface_format,
        );
        debug!(
            width = config.dimensions.width,
            height = config.dimensions.height,
            slots = resources.slot_buffers.len(),
            "allocated waterfall surfaces"
        );

        let mut backend = Self {
            context,
            resources,
            dims: config.dimensions,
        };
        backend.set_gradient(&GradientTable::default());
        Ok(backend)
    }

    pub fn surface_size(&self) -> PhysicalSize<u32> {
        self.context.size
    }

    /// Reconfigures the swapchain. The ring and draw surfaces keep their size.
    pub fn resize(&mut self, size: PhysicalSize<u32>) {
        self.context.resize(size);
    }
}

impl WaterfallBackend for GpuBackend {
    fn dimensions(&self) -> SurfaceDimensions {
        self.dims
    }

    fn slot_count(&self) -> usize {
        self.resources.slot_buffers.len()
    }

    fn write_row(&mut self, row: &[u16], line: u32) {
        let Some(write) = RowWrite::validate(row.len(), line, self.dims) else {
            return;
        };
        if write.columns == 0 {
            return;
        }
        self.context.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.resources.ring,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: 0,
                    y: write.line,
                    z: 0,
                },
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(&row[..write.columns]),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(write.columns as u32 * 2),
                rows_per_image: Some(1),
            },
            wgpu::Extent3d {
                width: write.columns as u32,
                height: 1,
                depth_or_array_layers: 1,
            },
        );
    }

    fn set_gradient(&mut self, table: &GradientTable) {
        self.context.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.resources.gradient,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            table.as_bytes(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(GRADIENT_SIZE as u32 * 4),
                rows_per_image: None,
            },
            wgpu::Extent3d {
                width: GRADIENT_SIZE as u32,
                height: 1,
                depth_or_array_layers: 1,
            },
        );
    }

    fn write_slot_geometry(&mut self, slot: usize, vertices: &[Vertex; 4]) {
        let Some(buffer) = self.resources.slot_buffers.get(slot) else {
            warn!(slot, "no vertex buffer for frame slot");
            return;
        };
        self.context
            .queue
            .write_buffer(buffer, 0, bytemuck::cast_slice(vertices));
    }

    fn convert(&mut self) -> Result<()> {
        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("convert encoder"),
                });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("intensity to color"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.resources.convert_pipeline);
            pass.set_bind_group(0, &self.resources.convert_bind_group, &[]);
            pass.dispatch_workgroups(
                self.dims.width.div_ceil(CONVERT_WORKGROUP),
                self.dims.height.div_ceil(CONVERT_WORKGROUP),
                1,
            );
        }
        let submission = self.context.queue.submit(Some(encoder.finish()));
        self.context
            .device
            .poll(wgpu::PollType::WaitForSubmissionIndex(submission))
            .context("waiting for the conversion pass")?;
        Ok(())
    }

    fn render(&mut self, permit: SlotPermit) -> Result<RenderOutcome> {
        if !self.context.is_presentable() {
            debug!(slot = permit.slot(), "window has no area; skipping tick");
            return Ok(RenderOutcome::Skipped);
        }

        let frame = match self.context.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                debug!(slot = permit.slot(), "surface lost; reconfiguring and skipping tick");
                self.context.reconfigure();
                return Ok(RenderOutcome::Skipped);
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                return Err(anyhow!("surface out of memory"));
            }
            Err(err) => {
                debug!(slot = permit.slot(), error = %err, "no presentable surface; skipping tick");
                return Ok(RenderOutcome::Skipped);
            }
        };

        let Some(vertex_buffer) = self.resources.slot_buffers.get(permit.slot()) else {
            return Err(anyhow!("frame slot {} has no vertex buffer", permit.slot()));
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("render encoder"),
                });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("waterfall pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            render_pass.set_pipeline(&self.resources.render_pipeline);
            render_pass.set_bind_group(0, &self.resources.render_bind_group, &[]);
            render_pass.set_vertex_buffer(0, vertex_buffer.slice(..));
            render_pass.draw(0..4, 0..1);
        }

        self.context.queue.submit(Some(encoder.finish()));
        // The slot stays taken until the device reports this submission done.
        self.context
            .queue
            .on_submitted_work_done(move || permit.release());
        frame.present();
        Ok(RenderOutcome::Presented)
    }

    fn maintain(&mut self) {
        if let Err(err) = self.context.device.poll(wgpu::PollType::Poll) {
            warn!(error = %err, "device poll failed");
        }
    }
}
