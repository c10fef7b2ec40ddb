//! Image decoding and GPU upload for the earth maps and the skybox cubemap.
//!
//! Loading never aborts the demo. A file that cannot be decoded is logged
//! and replaced with zeroed texels, so the surface samples black.

use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::RgbaImage;
use log::{debug, error, info};
use thiserror::Error;

const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

/// Skybox face files in cubemap layer order: +X, -X, +Y, -Y, +Z, -Z.
pub const SKYBOX_FACES: [&str; 6] = [
    "right.png",
    "left.png",
    "top.png",
    "bottom.png",
    "front.png",
    "back.png",
];

/// Semantic role of a texture, mapped to a fixed binding slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureSlot {
    Ambient,
    Diffuse,
    Specular,
    Skybox,
}

impl TextureSlot {
    pub const MATERIAL: [TextureSlot; 3] = [
        TextureSlot::Ambient,
        TextureSlot::Diffuse,
        TextureSlot::Specular,
    ];

    /// Binding index inside the bind group that owns this role. The three
    /// material maps share the earth group; the skybox has its own.
    pub fn binding(self) -> u32 {
        match self {
            TextureSlot::Ambient => 0,
            TextureSlot::Diffuse => 1,
            TextureSlot::Specular => 2,
            TextureSlot::Skybox => 0,
        }
    }

    /// Slot number published to shaders through the material uniforms.
    pub fn unit(self) -> i32 {
        self.binding() as i32
    }

    pub fn file_name(self) -> &'static str {
        match self {
            TextureSlot::Ambient => "night.jpg",
            TextureSlot::Diffuse => "day.jpg",
            TextureSlot::Specular => "spec.jpg",
            TextureSlot::Skybox => "skybox",
        }
    }
}

#[derive(Debug, Error)]
pub enum TextureError {
    #[error("failed to decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("cube face {} is {width}x{height}; faces must be square", path.display())]
    NotSquare {
        path: PathBuf,
        width: u32,
        height: u32,
    },
    #[error(
        "cube face {} is {width}x{height}; expected {expected}x{expected}",
        path.display()
    )]
    SizeMismatch {
        path: PathBuf,
        expected: u32,
        width: u32,
        height: u32,
    },
    #[error(
        "{} is {width}x{height}; the device allows at most {limit} texels per side",
        path.display()
    )]
    TooLarge {
        path: PathBuf,
        width: u32,
        height: u32,
        limit: u32,
    },
}

/// Decodes an image file into 8-bit RGBA.
pub fn decode_image(path: &Path) -> Result<RgbaImage, TextureError> {
    let image = image::open(path).map_err(|source| TextureError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(
        "decoded {} ({}x{}, {} channels)",
        path.display(),
        image.width(),
        image.height(),
        image.color().channel_count()
    );
    Ok(image.to_rgba8())
}

/// Decodes an image and rejects it when either side exceeds `limit`.
pub fn decode_within(path: &Path, limit: u32) -> Result<RgbaImage, TextureError> {
    let image = decode_image(path)?;
    let (width, height) = image.dimensions();
    if width > limit || height > limit {
        return Err(TextureError::TooLarge {
            path: path.to_path_buf(),
            width,
            height,
            limit,
        });
    }
    Ok(image)
}

/// Full mip chain for `base`, halving each level down to 1x1.
pub fn mip_chain(base: RgbaImage) -> Vec<RgbaImage> {
    let mut levels = vec![base];
    loop {
        let last = &levels[levels.len() - 1];
        let (width, height) = last.dimensions();
        if width <= 1 && height <= 1 {
            break;
        }
        let next = imageops::resize(
            last,
            (width / 2).max(1),
            (height / 2).max(1),
            FilterType::Triangle,
        );
        levels.push(next);
    }
    levels
}

/// Decoded cubemap faces. Faces that failed to load stay `None` and upload
/// as zeroed layers.
#[derive(Debug)]
pub struct CubeImages {
    pub size: u32,
    pub faces: [Option<RgbaImage>; 6],
}

impl CubeImages {
    /// Decodes the six faces found under `base`, in the order given. Faces
    /// larger than `limit` texels per side are rejected.
    pub fn decode(faces: &[&str; 6], base: &Path, limit: u32) -> Self {
        let mut size = None;
        let decoded = (*faces).map(|name| {
            let path = base.join(name);
            match decode_cube_face(&path, size, limit) {
                Ok(image) => {
                    size.get_or_insert(image.width());
                    Some(image)
                }
                Err(err) => {
                    error!("failed to load cube texture face: {err}");
                    None
                }
            }
        });
        Self {
            size: size.unwrap_or(1),
            faces: decoded,
        }
    }

    pub fn loaded(&self) -> usize {
        self.faces.iter().filter(|face| face.is_some()).count()
    }
}

fn decode_cube_face(
    path: &Path,
    expected: Option<u32>,
    limit: u32,
) -> Result<RgbaImage, TextureError> {
    let image = decode_within(path, limit)?;
    let (width, height) = image.dimensions();
    if width != height {
        return Err(TextureError::NotSquare {
            path: path.to_path_buf(),
            width,
            height,
        });
    }
    if let Some(expected) = expected.filter(|&expected| expected != width) {
        return Err(TextureError::SizeMismatch {
            path: path.to_path_buf(),
            expected,
            width,
            height,
        });
    }
    Ok(image)
}

/// GPU texture with its default view and sampler.
pub struct Texture {
    texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
}

impl Texture {
    /// Loads a 2D texture with a full mip chain. Falls back to a 1x1 black
    /// texture when the file cannot be decoded or exceeds the device limit.
    pub fn load_2d(device: &wgpu::Device, queue: &wgpu::Queue, path: &Path) -> Self {
        let label = path.display().to_string();
        let limit = device.limits().max_texture_dimension_2d;
        match decode_within(path, limit) {
            Ok(image) => {
                info!("loaded texture {label}");
                Self::from_mips(device, queue, &mip_chain(image), &label)
            }
            Err(err) => {
                error!("texture failed to load: {err}");
                Self::placeholder(device, &label)
            }
        }
    }

    /// Loads a cubemap from six face files, see [`SKYBOX_FACES`].
    pub fn load_cube(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        faces: &[&str; 6],
        base: &Path,
    ) -> Self {
        let limit = device.limits().max_texture_dimension_2d;
        let images = CubeImages::decode(faces, base, limit);
        info!(
            "loaded {}/6 cube faces from {} ({}x{})",
            images.loaded(),
            base.display(),
            images.size,
            images.size
        );
        Self::from_cube(device, queue, &images, &base.display().to_string())
    }

    pub fn size(&self) -> wgpu::Extent3d {
        self.texture.size()
    }

    pub fn mip_level_count(&self) -> u32 {
        self.texture.mip_level_count()
    }

    /// A 1x1 texture with zeroed texels.
    pub fn placeholder(device: &wgpu::Device, label: &str) -> Self {
        let texture = create_texture(device, label, 1, 1, 1, 1);
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = repeat_sampler(device, label);
        Self {
            texture,
            view,
            sampler,
        }
    }

    fn from_mips(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        mips: &[RgbaImage],
        label: &str,
    ) -> Self {
        let (width, height) = mips[0].dimensions();
        let texture = create_texture(device, label, width, height, 1, mips.len() as u32);
        for (level, image) in mips.iter().enumerate() {
            write_layer(queue, &texture, image, level as u32, 0);
        }
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = repeat_sampler(device, label);
        Self {
            texture,
            view,
            sampler,
        }
    }

    fn from_cube(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        images: &CubeImages,
        label: &str,
    ) -> Self {
        let texture = create_texture(device, label, images.size, images.size, 6, 1);
        for (layer, face) in images.faces.iter().enumerate() {
            if let Some(image) = face {
                write_layer(queue, &texture, image, 0, layer as u32);
            }
        }
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(&format!("{label}-cube-view")),
            dimension: Some(wgpu::TextureViewDimension::Cube),
            array_layer_count: Some(6),
            ..Default::default()
        });
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(&format!("{label}-sampler")),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        Self {
            texture,
            view,
            sampler,
        }
    }
}

fn create_texture(
    device: &wgpu::Device,
    label: &str,
    width: u32,
    height: u32,
    layers: u32,
    mip_levels: u32,
) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: layers,
        },
        mip_level_count: mip_levels,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    })
}

fn write_layer(
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    image: &RgbaImage,
    mip_level: u32,
    layer: u32,
) {
    let (width, height) = image.dimensions();
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level,
            origin: wgpu::Origin3d {
                x: 0,
                y: 0,
                z: layer,
            },
            aspect: wgpu::TextureAspect::All,
        },
        image.as_raw(),
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * width),
            rows_per_image: Some(height),
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
}

fn repeat_sampler(device: &wgpu::Device, label: &str) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(&format!("{label}-sampler")),
        address_mode_u: wgpu::AddressMode::Repeat,
        address_mode_v: wgpu::AddressMode::Repeat,
        address_mode_w: wgpu::AddressMode::Repeat,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    })
}

/// Headless device for GPU-backed tests. `None` when no adapter exists.
#[cfg(test)]
pub(crate) fn test_device_queue() -> Option<(wgpu::Device, wgpu::Queue)> {
    pollster::block_on(async {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok()?;
        adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("test-device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                ..Default::default()
            })
            .await
            .ok()
    })
}
