//! Compiled vertex+fragment program with name-addressed uniforms.
//!
//! A program that fails to load, compile or link is kept as a *broken*
//! program: the failure is logged, uniform writes still land in the CPU
//! block, and every draw through it is skipped.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use glam::{Mat4, Vec3, Vec4};
use log::{error, info};
use thiserror::Error;

use crate::uniform::{UniformBlock, UniformKind, UniformLayout, UniformValue};

pub const VERTEX_ENTRY: &str = "vs_main";
pub const FRAGMENT_ENTRY: &str = "fs_main";

/// Depth comparison a program is drawn with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DepthMode {
    /// Fragments pass when strictly closer than the stored depth.
    #[default]
    Strict,
    /// Fragments also pass at equal depth, so geometry on the far plane
    /// still lands behind everything else.
    Relaxed,
}

impl DepthMode {
    pub fn compare(self) -> wgpu::CompareFunction {
        match self {
            DepthMode::Strict => wgpu::CompareFunction::Less,
            DepthMode::Relaxed => wgpu::CompareFunction::LessEqual,
        }
    }
}

#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("failed to read shader source {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{label}: shader compilation failed\n{message}")]
    Compile { label: String, message: String },
    #[error("{label}: pipeline link failed ({depth:?} depth)\n{message}")]
    Link {
        label: String,
        depth: DepthMode,
        message: String,
    },
}

/// Reads a shader source file.
pub fn read_source(path: &Path) -> Result<String, ShaderError> {
    fs::read_to_string(path).map_err(|source| ShaderError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Fixed pipeline state shared by every depth variant of a program.
pub struct ProgramDesc<'a> {
    pub label: &'a str,
    pub uniforms: &'a [(&'static str, UniformKind)],
    pub vertex_layout: wgpu::VertexBufferLayout<'static>,
    /// Layout of bind group 1, when the program samples textures.
    pub texture_layout: Option<&'a wgpu::BindGroupLayout>,
    pub color_format: wgpu::TextureFormat,
    pub depth_format: wgpu::TextureFormat,
    pub depth_write: bool,
    pub blend: Option<wgpu::BlendState>,
}

pub struct ShaderProgram {
    label: String,
    modules: Option<(wgpu::ShaderModule, wgpu::ShaderModule)>,
    pipeline_layout: wgpu::PipelineLayout,
    vertex_layout: wgpu::VertexBufferLayout<'static>,
    color_format: wgpu::TextureFormat,
    depth_format: wgpu::TextureFormat,
    depth_write: bool,
    blend: Option<wgpu::BlendState>,
    pipelines: HashMap<DepthMode, wgpu::RenderPipeline>,
    uniforms: UniformBlock,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
}

impl ShaderProgram {
    /// Reads and compiles a vertex/fragment source pair from disk.
    pub fn from_files(
        device: &wgpu::Device,
        desc: &ProgramDesc<'_>,
        vertex_path: &Path,
        fragment_path: &Path,
    ) -> Self {
        match (read_source(vertex_path), read_source(fragment_path)) {
            (Ok(vertex), Ok(fragment)) => Self::compile(device, desc, &vertex, &fragment),
            (Err(err), _) | (_, Err(err)) => {
                error!("{}: {err}", desc.label);
                Self::assemble(device, desc, None)
            }
        }
    }

    /// Compiles WGSL sources for the vertex and fragment stages.
    pub fn compile(
        device: &wgpu::Device,
        desc: &ProgramDesc<'_>,
        vertex_src: &str,
        fragment_src: &str,
    ) -> Self {
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let vertex = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&format!("{}-vertex", desc.label)),
            source: wgpu::ShaderSource::Wgsl(vertex_src.into()),
        });
        let fragment = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&format!("{}-fragment", desc.label)),
            source: wgpu::ShaderSource::Wgsl(fragment_src.into()),
        });
        let modules = match pollster::block_on(device.pop_error_scope()) {
            None => {
                info!("compiled shader program {}", desc.label);
                Some((vertex, fragment))
            }
            Some(err) => {
                let err = ShaderError::Compile {
                    label: desc.label.to_string(),
                    message: err.to_string(),
                };
                error!("{err}");
                None
            }
        };
        Self::assemble(device, desc, modules)
    }

    fn assemble(
        device: &wgpu::Device,
        desc: &ProgramDesc<'_>,
        modules: Option<(wgpu::ShaderModule, wgpu::ShaderModule)>,
    ) -> Self {
        let uniforms = UniformBlock::new(UniformLayout::new(desc.uniforms));
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("{}-uniforms", desc.label)),
            size: uniforms.bytes().len() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(&format!("{}-uniform-layout", desc.label)),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{}-uniform-group", desc.label)),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let mut bind_group_layouts = vec![&uniform_layout];
        bind_group_layouts.extend(desc.texture_layout);
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&format!("{}-pipeline-layout", desc.label)),
            bind_group_layouts: &bind_group_layouts,
            push_constant_ranges: &[],
        });

        Self {
            label: desc.label.to_string(),
            modules,
            pipeline_layout,
            vertex_layout: desc.vertex_layout.clone(),
            color_format: desc.color_format,
            depth_format: desc.depth_format,
            depth_write: desc.depth_write,
            blend: desc.blend,
            pipelines: HashMap::new(),
            uniforms,
            uniform_buffer,
            uniform_bind_group,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_broken(&self) -> bool {
        self.modules.is_none()
    }

    pub fn set(&mut self, name: &str, value: UniformValue) -> bool {
        self.uniforms.set(name, value)
    }

    pub fn set_f32(&mut self, name: &str, value: f32) -> bool {
        self.uniforms.set_f32(name, value)
    }

    pub fn set_i32(&mut self, name: &str, value: i32) -> bool {
        self.uniforms.set_i32(name, value)
    }

    pub fn set_vec3(&mut self, name: &str, value: Vec3) -> bool {
        self.uniforms.set_vec3(name, value)
    }

    pub fn set_vec4(&mut self, name: &str, value: Vec4) -> bool {
        self.uniforms.set_vec4(name, value)
    }

    pub fn set_mat4(&mut self, name: &str, value: Mat4) -> bool {
        self.uniforms.set_mat4(name, value)
    }

    /// Uploads the CPU uniform block to the GPU buffer.
    pub fn flush(&self, queue: &wgpu::Queue) {
        queue.write_buffer(&self.uniform_buffer, 0, self.uniforms.bytes());
    }

    /// Builds the pipeline variant for `depth` if it does not exist yet. A
    /// link failure is logged and the program becomes broken.
    pub fn ensure_pipeline(&mut self, device: &wgpu::Device, depth: DepthMode) {
        if self.pipelines.contains_key(&depth) {
            return;
        }
        let Some((vertex, fragment)) = self.modules.as_ref() else {
            return;
        };

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&format!("{}-{depth:?}-pipeline", self.label)),
            layout: Some(&self.pipeline_layout),
            vertex: wgpu::VertexState {
                module: vertex,
                entry_point: Some(VERTEX_ENTRY),
                compilation_options: Default::default(),
                buffers: &[self.vertex_layout.clone()],
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: self.depth_format,
                depth_write_enabled: self.depth_write,
                depth_compare: depth.compare(),
                stencil: Default::default(),
                bias: Default::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: fragment,
                entry_point: Some(FRAGMENT_ENTRY),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: self.color_format,
                    blend: self.blend,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            multiview: None,
            cache: None,
        });

        match pollster::block_on(device.pop_error_scope()) {
            None => {
                self.pipelines.insert(depth, pipeline);
            }
            Some(err) => {
                let err = ShaderError::Link {
                    label: self.label.clone(),
                    depth,
                    message: err.to_string(),
                };
                error!("{err}");
                self.modules = None;
            }
        }
    }

    /// Pipeline for `depth`, if the program is healthy and it was built.
    pub fn pipeline(&self, depth: DepthMode) -> Option<&wgpu::RenderPipeline> {
        self.pipelines.get(&depth)
    }

    pub fn uniform_bind_group(&self) -> &wgpu::BindGroup {
        &self.uniform_bind_group
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_modes_map_to_comparisons() {
        assert_eq!(DepthMode::default(), DepthMode::Strict);
        assert_eq!(DepthMode::Strict.compare(), wgpu::CompareFunction::Less);
        assert_eq!(
            DepthMode::Relaxed.compare(),
            wgpu::CompareFunction::LessEqual
        );
    }

    #[test]
    fn missing_source_reports_path() {
        let err = read_source(Path::new("nowhere/earth_fs.wgsl")).unwrap_err();
        assert!(matches!(err, ShaderError::Read { .. }));
        assert!(err.to_string().contains("nowhere/earth_fs.wgsl"));
    }

    #[test]
    fn source_is_read_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sun_fs.wgsl");
        fs::write(&path, "@fragment fn fs_main() {}").unwrap();
        assert_eq!(read_source(&path).unwrap(), "@fragment fn fs_main() {}");
    }

    const QUAD_VS: &str = "@vertex fn vs_main(@location(0) position: vec2<f32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(position, 0.0, 1.0);
}";
    const FLAT_FS: &str = "@fragment fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(1.0, 0.5, 0.25, 1.0);
}";

    fn quad_desc() -> ProgramDesc<'static> {
        ProgramDesc {
            label: "quad",
            uniforms: &[("strength", UniformKind::F32)],
            vertex_layout: <crate::geometry::QuadVertex as crate::geometry::Vertex>::layout(),
            texture_layout: None,
            color_format: wgpu::TextureFormat::Rgba8UnormSrgb,
            depth_format: wgpu::TextureFormat::Depth24Plus,
            depth_write: false,
            blend: None,
        }
    }

    #[test]
    fn invalid_wgsl_leaves_program_without_pipelines() {
        let Some((device, _queue)) = crate::texture::test_device_queue() else {
            return;
        };
        let mut program = ShaderProgram::compile(&device, &quad_desc(), QUAD_VS, "fn fs_main( {");
        assert!(program.is_broken());
        for depth in [DepthMode::Strict, DepthMode::Relaxed] {
            program.ensure_pipeline(&device, depth);
            assert!(program.pipeline(depth).is_none());
        }
        // uniform writes on a broken program are accepted and dropped
        program.set_f32("strength", 2.0);
    }

    #[test]
    fn valid_wgsl_builds_a_pipeline_per_depth_mode() {
        let Some((device, _queue)) = crate::texture::test_device_queue() else {
            return;
        };
        let mut program = ShaderProgram::compile(&device, &quad_desc(), QUAD_VS, FLAT_FS);
        assert!(!program.is_broken());
        assert!(program.pipeline(DepthMode::Strict).is_none());
        program.ensure_pipeline(&device, DepthMode::Strict);
        program.ensure_pipeline(&device, DepthMode::Relaxed);
        assert!(program.pipeline(DepthMode::Strict).is_some());
        assert!(program.pipeline(DepthMode::Relaxed).is_some());
    }
}
