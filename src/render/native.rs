use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use log::{debug, info, warn};
use winit::dpi::PhysicalSize;
use winit::window::{Window, WindowId};

use crate::config::Config;
use crate::frame::{FramePlan, Pass};
use crate::geometry::{self, GeometryBuffer};
use crate::scene::{EARTH_RADIUS, SUN_RADIUS};
use crate::shader::{ProgramDesc, ShaderProgram};
use crate::texture::{Texture, TextureSlot, SKYBOX_FACES};

/// Color is `src * 1 + dst * src_alpha`: the overlay writes in-scattered
/// light to color and transmittance to alpha. Target alpha is left as is.
const SCATTER_BLEND: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::SrcAlpha,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::Zero,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
};

/// GPU renderer backed by wgpu that replays a [`FramePlan`] each frame.
///
/// Owns every GPU resource of the demo; dropping it releases them.
pub struct Renderer {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    size: PhysicalSize<u32>,
    depth: DepthBuffer,
    programs: HashMap<Pass, ShaderProgram>,
    meshes: HashMap<Pass, GeometryBuffer>,
    texture_groups: HashMap<Pass, wgpu::BindGroup>,
    _textures: Vec<Texture>,
}

impl Renderer {
    /// Initializes the GPU, compiles the four programs and loads every
    /// texture and vertex buffer the scene needs.
    pub async fn new(window: Arc<Window>, settings: &Config) -> Result<Self> {
        let size = window.inner_size();
        if size.width == 0 || size.height == 0 {
            return Err(anyhow!("window has zero area"));
        }

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: Default::default(),
            backend_options: Default::default(),
        });
        let surface = instance.create_surface(Arc::clone(&window))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to acquire GPU adapter")?;
        info!("using adapter {}", adapter.get_info().name);

        let device_descriptor = wgpu::DeviceDescriptor {
            label: Some("earth-device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            experimental_features: Default::default(),
            memory_hints: Default::default(),
            trace: Default::default(),
        };
        let (device, queue) = adapter
            .request_device(&device_descriptor)
            .await
            .context("failed to create GPU device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|format| format.is_srgb())
            .copied()
            .or_else(|| surface_caps.formats.first().copied())
            .context("surface reports no supported formats")?;

        let present_mode = if settings.window.vsync {
            wgpu::PresentMode::Fifo
        } else {
            surface_caps
                .present_modes
                .iter()
                .copied()
                .find(|mode| {
                    matches!(
                        mode,
                        wgpu::PresentMode::Mailbox | wgpu::PresentMode::Immediate
                    )
                })
                .unwrap_or(wgpu::PresentMode::Fifo)
        };

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode,
            desired_maximum_frame_latency: 2,
            alpha_mode: pick_alpha_mode(&surface_caps.alpha_modes),
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let depth = DepthBuffer::create(&device, config.width, config.height);

        let texture_layouts = texture_layouts(&device);
        let assets = &settings.assets;
        let programs = build_programs(&device, &texture_layouts, surface_format, |file| {
            assets.shader_path(file)
        });

        let mut meshes = HashMap::new();
        meshes.insert(
            Pass::Earth,
            GeometryBuffer::upload(&device, &geometry::sphere(EARTH_RADIUS), "earth"),
        );
        meshes.insert(
            Pass::Sun,
            GeometryBuffer::upload(&device, &geometry::sphere(SUN_RADIUS), "sun"),
        );
        meshes.insert(
            Pass::Skybox,
            GeometryBuffer::upload(&device, &geometry::cube(), "skybox"),
        );
        meshes.insert(
            Pass::Atmosphere,
            GeometryBuffer::upload(&device, &geometry::screen_quad(), "screen-quad"),
        );

        let sky = Texture::load_cube(&device, &queue, &SKYBOX_FACES, &assets.skybox_dir());
        let maps: Vec<Texture> = TextureSlot::MATERIAL
            .iter()
            .map(|&slot| Texture::load_2d(&device, &queue, &assets.texture_path(slot)))
            .collect();

        let mut texture_groups = HashMap::new();
        texture_groups.insert(
            Pass::Earth,
            texture_group(
                &device,
                "earth-material",
                &texture_layouts[&Pass::Earth],
                TextureSlot::MATERIAL.iter().copied().zip(maps.iter()),
            ),
        );
        texture_groups.insert(
            Pass::Skybox,
            texture_group(
                &device,
                "skybox",
                &texture_layouts[&Pass::Skybox],
                std::iter::once((TextureSlot::Skybox, &sky)),
            ),
        );

        let mut textures = maps;
        textures.push(sky);

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            size,
            depth,
            programs,
            meshes,
            texture_groups,
            _textures: textures,
        })
    }

    /// Returns the identifier of the window owned by the renderer.
    pub fn window_id(&self) -> WindowId {
        self.window.id()
    }

    /// Exposes the inner window for event handling.
    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    /// Resizes the swap chain and depth buffer to match the new dimensions.
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.size = new_size;
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
        self.depth = DepthBuffer::create(&self.device, new_size.width, new_size.height);
    }

    /// Uploads each draw's uniforms and records the draws, in plan order,
    /// into a single render pass.
    pub fn render(&mut self, plan: &FramePlan) -> Result<(), wgpu::SurfaceError> {
        for draw in &plan.draws {
            let Some(program) = self.programs.get_mut(&draw.pass) else {
                continue;
            };
            for (name, value) in &draw.uniforms {
                program.set(name, *value);
            }
            program.ensure_pipeline(&self.device, draw.depth);
            program.flush(&self.queue);
        }

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame-encoder"),
            });

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("frame-pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        for draw in &plan.draws {
            let Some(program) = self.programs.get(&draw.pass) else {
                continue;
            };
            let Some(pipeline) = program.pipeline(draw.depth) else {
                debug!("skipping {} draw: program unavailable", program.label());
                continue;
            };
            let Some(mesh) = self.meshes.get(&draw.pass) else {
                continue;
            };

            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, program.uniform_bind_group(), &[]);
            if let Some(textures) = self.texture_groups.get(&draw.pass) {
                pass.set_bind_group(1, textures, &[]);
            }
            pass.set_vertex_buffer(0, mesh.slice());
            pass.draw(0..mesh.vertex_count(), 0..1);
        }

        drop(pass);
        self.queue.submit(std::iter::once(encoder.finish()));
        self.window.pre_present_notify();
        output.present();
        Ok(())
    }
}

/// Texture bind group layout for every pass that samples textures.
fn texture_layouts(device: &wgpu::Device) -> HashMap<Pass, wgpu::BindGroupLayout> {
    let mut layouts = HashMap::new();
    for pass in Pass::ALL {
        let slots = pass.textures();
        if slots.is_empty() {
            continue;
        }
        let dimension = if slots.contains(&TextureSlot::Skybox) {
            wgpu::TextureViewDimension::Cube
        } else {
            wgpu::TextureViewDimension::D2
        };
        let label = format!("{}-texture-layout", pass.label());
        layouts.insert(pass, texture_layout(device, &label, slots, dimension));
    }
    layouts
}

/// Compiles one program per pass. `shader_path` resolves a shader file name.
fn build_programs(
    device: &wgpu::Device,
    texture_layouts: &HashMap<Pass, wgpu::BindGroupLayout>,
    color_format: wgpu::TextureFormat,
    shader_path: impl Fn(&str) -> PathBuf,
) -> HashMap<Pass, ShaderProgram> {
    let mut programs = HashMap::new();
    for pass in Pass::ALL {
        let (depth_write, blend) = match pass {
            Pass::Earth | Pass::Sun => (true, None),
            Pass::Skybox => (false, None),
            Pass::Atmosphere => (false, Some(SCATTER_BLEND)),
        };
        let desc = ProgramDesc {
            label: pass.label(),
            uniforms: pass.uniform_fields(),
            vertex_layout: pass.vertex_layout(),
            texture_layout: texture_layouts.get(&pass),
            color_format,
            depth_format: DepthBuffer::FORMAT,
            depth_write,
            blend,
        };
        let (vertex_file, fragment_file) = pass.shader_files();
        let program = ShaderProgram::from_files(
            device,
            &desc,
            &shader_path(vertex_file),
            &shader_path(fragment_file),
        );
        if program.is_broken() {
            warn!("{} draws will be skipped", pass.label());
        }
        programs.insert(pass, program);
    }
    programs
}

/// Prefers an opaque window so the overlay's alpha never reaches the
/// compositor.
fn pick_alpha_mode(modes: &[wgpu::CompositeAlphaMode]) -> wgpu::CompositeAlphaMode {
    if modes.contains(&wgpu::CompositeAlphaMode::Opaque) {
        wgpu::CompositeAlphaMode::Opaque
    } else {
        modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto)
    }
}

/// Layout with one texture binding per slot followed by a shared sampler.
fn texture_layout(
    device: &wgpu::Device,
    label: &str,
    slots: &[TextureSlot],
    dimension: wgpu::TextureViewDimension,
) -> wgpu::BindGroupLayout {
    let mut entries: Vec<wgpu::BindGroupLayoutEntry> = slots
        .iter()
        .map(|slot| wgpu::BindGroupLayoutEntry {
            binding: slot.binding(),
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: dimension,
                multisampled: false,
            },
            count: None,
        })
        .collect();
    entries.push(wgpu::BindGroupLayoutEntry {
        binding: slots.len() as u32,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    });
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &entries,
    })
}

/// Binds each texture at its slot's binding. The first texture's sampler
/// fills the trailing sampler binding.
fn texture_group<'a>(
    device: &wgpu::Device,
    label: &str,
    layout: &wgpu::BindGroupLayout,
    textures: impl Iterator<Item = (TextureSlot, &'a Texture)>,
) -> wgpu::BindGroup {
    let textures: Vec<(TextureSlot, &Texture)> = textures.collect();
    let mut entries: Vec<wgpu::BindGroupEntry> = textures
        .iter()
        .map(|(slot, texture)| wgpu::BindGroupEntry {
            binding: slot.binding(),
            resource: wgpu::BindingResource::TextureView(&texture.view),
        })
        .collect();
    if let Some((_, first)) = textures.first() {
        entries.push(wgpu::BindGroupEntry {
            binding: textures.len() as u32,
            resource: wgpu::BindingResource::Sampler(&first.sampler),
        });
    }
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &entries,
    })
}

struct DepthBuffer {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl DepthBuffer {
    const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;

    fn create(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("depth-texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }
}
