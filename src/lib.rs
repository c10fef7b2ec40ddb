//! Real-time earth demo: a lit, textured earth orbited by an emissive sun,
//! inside a cubemap skybox, with a screen-space atmosphere overlay.
//!
//! Everything that decides *what* a frame contains (camera, sun orbit,
//! input, draw order and depth state) lives in [`frame`] and is free of GPU
//! handles, so it can be driven and tested headlessly. [`render`] and
//! [`app`] bind it to wgpu and winit.

pub mod app;
pub mod camera;
pub mod clock;
pub mod config;
pub mod frame;
pub mod geometry;
pub mod input;
pub mod render;
pub mod scene;
pub mod shader;
pub mod texture;
pub mod uniform;

pub use camera::{Camera, Movement};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, ConfigError};
pub use frame::{Control, DrawCommand, FramePlan, FrameState, Pass};
pub use input::{Action, InputEvent, InputState};
pub use render::Renderer;
pub use scene::SunOrbit;
pub use shader::{DepthMode, ShaderError, ShaderProgram};
pub use texture::{Texture, TextureError, TextureSlot};
pub use uniform::{UniformBlock, UniformKind, UniformLayout, UniformValue};
