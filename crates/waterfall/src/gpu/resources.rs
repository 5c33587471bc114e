use crate::geometry::{Vertex, WindowGeometry};
use crate::programs::{ProgramSource, ResolvedPrograms};
use crate::types::{SurfaceDimensions, GRADIENT_SIZE};

pub(crate) const RING_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R16Uint;
pub(crate) const DRAW_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
pub(crate) const GRADIENT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Long-lived device objects. Allocated once; never resized.
pub(crate) struct GpuResources {
    pub ring: wgpu::Texture,
    pub gradient: wgpu::Texture,
    pub _draw: wgpu::Texture,
    pub slot_buffers: Vec<wgpu::Buffer>,
    pub convert_pipeline: wgpu::ComputePipeline,
    pub convert_bind_group: wgpu::BindGroup,
    pub render_pipeline: wgpu::RenderPipeline,
    pub render_bind_group: wgpu::BindGroup,
}

fn shader_module(device: &wgpu::Device, program: &ProgramSource) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(program.name.as_str()),
        source: wgpu::ShaderSource::Wgsl(program.wgsl.clone()),
    })
}

fn texture_2d(
    device: &wgpu::Device,
    label: &str,
    dims: SurfaceDimensions,
    format: wgpu::TextureFormat,
    usage: wgpu::TextureUsages,
) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: dims.width,
            height: dims.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage,
        view_formats: &[],
    })
}

impl GpuResources {
    pub fn new(
        device: &wgpu::Device,
        programs: &ResolvedPrograms,
        dims: SurfaceDimensions,
        slots: usize,
        surface_format: wgpu::TextureFormat,
    ) -> Self {
        let ring = texture_2d(
            device,
            "ring texture",
            dims,
            RING_FORMAT,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        );
        let draw = texture_2d(
            device,
            "draw surface",
            dims,
            DRAW_FORMAT,
            wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::TEXTURE_BINDING,
        );
        let gradient = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("gradient table"),
            size: wgpu::Extent3d {
                width: GRADIENT_SIZE as u32,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D1,
            format: GRADIENT_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let initial = WindowGeometry::new();
        let slot_buffers = (0..slots)
            .map(|slot| {
                let buffer = device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(format!("slot {slot} vertices").as_str()),
                    size: std::mem::size_of::<[Vertex; 4]>() as wgpu::BufferAddress,
                    usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: true,
                });
                buffer
                    .slice(..)
                    .get_mapped_range_mut()
                    .copy_from_slice(bytemuck::cast_slice(initial.vertices()));
                buffer.unmap();
                buffer
            })
            .collect();

        let ring_view = ring.create_view(&wgpu::TextureViewDescriptor::default());
        let draw_view = draw.create_view(&wgpu::TextureViewDescriptor::default());
        let gradient_view = gradient.create_view(&wgpu::TextureViewDescriptor {
            dimension: Some(wgpu::TextureViewDimension::D1),
            ..Default::default()
        });

        let (convert_pipeline, convert_bind_group) = build_convert(
            device,
            &programs.compute,
            &ring_view,
            &gradient_view,
            &draw_view,
        );
        let (render_pipeline, render_bind_group) = build_render(
            device,
            &programs.vertex,
            &programs.fragment,
            &draw_view,
            surface_format,
        );

        Self {
            ring,
            gradient,
            _draw: draw,
            slot_buffers,
            convert_pipeline,
            convert_bind_group,
            render_pipeline,
            render_bind_group,
        }
    }
}

fn build_convert(
    device: &wgpu::Device,
    program: &ProgramSource,
    ring_view: &wgpu::TextureView,
    gradient_view: &wgpu::TextureView,
    draw_view: &wgpu::TextureView,
) -> (wgpu::ComputePipeline, wgpu::BindGroup) {
    let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("convert layout"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Uint,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    view_dimension: wgpu::TextureViewDimension::D1,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::StorageTexture {
                    access: wgpu::StorageTextureAccess::WriteOnly,
                    format: DRAW_FORMAT,
                    view_dimension: wgpu::TextureViewDimension::D2,
                },
                count: None,
            },
        ],
    });
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("convert bind group"),
        layout: &layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(ring_view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(gradient_view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::TextureView(draw_view),
            },
        ],
    });
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("convert pipeline layout"),
        bind_group_layouts: &[&layout],
        push_constant_ranges: &[],
    });
    let module = shader_module(device, program);
    let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some("convert pipeline"),
        layout: Some(&pipeline_layout),
        module: &module,
        entry_point: Some(program.entry_point.as_ref()),
        compilation_options: wgpu::PipelineCompilationOptions::default(),
        cache: None,
    });
    (pipeline, bind_group)
}

fn build_render(
    device: &wgpu::Device,
    vertex: &ProgramSource,
    fragment: &ProgramSource,
    draw_view: &wgpu::TextureView,
    surface_format: wgpu::TextureFormat,
) -> (wgpu::RenderPipeline, wgpu::BindGroup) {
    // The fragment program addresses texels itself: clamp on U, wrap on V.
    let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("draw layout"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
        ],
    });
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("draw bind group"),
        layout: &layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(draw_view),
            },
        ],
    });
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("waterfall pipeline layout"),
        bind_group_layouts: &[&layout],
        push_constant_ranges: &[],
    });

    let vertex_module = shader_module(device, vertex);
    let fragment_module = shader_module(device, fragment);
    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("waterfall pipeline"),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &vertex_module,
            entry_point: Some(vertex.entry_point.as_ref()),
            buffers: &[Vertex::layout()],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleStrip,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        fragment: Some(wgpu::FragmentState {
            module: &fragment_module,
            entry_point: Some(fragment.entry_point.as_ref()),
            targets: &[Some(wgpu::ColorTargetState {
                format: surface_format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        multiview: None,
        cache: None,
    });
    (pipeline, bind_group)
}
