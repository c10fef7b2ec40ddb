//! Per-frame orchestration: input → camera → shared matrices → ordered draws.
//!
//! [`FrameState`] owns every piece of mutable view state. Each call to
//! [`FrameState::advance`] runs the timing phase and then records the
//! frame's four draws into a [`FramePlan`], a GPU-independent list that the
//! renderer replays in order.

use glam::{Mat3, Mat4, Vec3, Vec4};

use crate::camera::Camera;
use crate::geometry::{PositionVertex, QuadVertex, SphereVertex, Vertex};
use crate::input::{Action, InputEvent, InputState};
use crate::scene::{
    proximity_damping, SunOrbit, ATMOSPHERE_RADIUS, CAMERA_START, EARTH_LIGHT, EARTH_RADIUS,
    EARTH_SHININESS, SUN_COLOR,
};
use crate::shader::DepthMode;
use crate::texture::TextureSlot;
use crate::uniform::{UniformKind, UniformValue};

/// One draw pass of the fixed scene, in draw order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pass {
    Earth,
    Sun,
    Skybox,
    Atmosphere,
}

impl Pass {
    pub const ALL: [Pass; 4] = [Pass::Earth, Pass::Sun, Pass::Skybox, Pass::Atmosphere];

    pub fn label(self) -> &'static str {
        match self {
            Pass::Earth => "earth",
            Pass::Sun => "sun",
            Pass::Skybox => "skybox",
            Pass::Atmosphere => "atmosphere",
        }
    }

    /// Vertex and fragment shader files, relative to the shader directory.
    pub fn shader_files(self) -> (&'static str, &'static str) {
        match self {
            Pass::Earth => ("sphere_vs.wgsl", "earth_fs.wgsl"),
            Pass::Sun => ("sphere_vs.wgsl", "sun_fs.wgsl"),
            Pass::Skybox => ("skybox_vs.wgsl", "skybox_fs.wgsl"),
            Pass::Atmosphere => ("scatter_vs.wgsl", "scatter_fs.wgsl"),
        }
    }

    pub fn vertex_layout(self) -> wgpu::VertexBufferLayout<'static> {
        match self {
            Pass::Earth | Pass::Sun => SphereVertex::layout(),
            Pass::Skybox => PositionVertex::layout(),
            Pass::Atmosphere => QuadVertex::layout(),
        }
    }

    /// Uniform block fields, in the order the pass's WGSL struct declares
    /// them.
    pub fn uniform_fields(self) -> &'static [(&'static str, UniformKind)] {
        use UniformKind as K;
        match self {
            Pass::Earth => &[
                ("view", K::Mat4),
                ("projection", K::Mat4),
                ("model", K::Mat4),
                ("normal_matrix", K::Mat4),
                ("view_pos", K::Vec3),
                ("light_position", K::Vec3),
                ("light_direction", K::Vec3),
                ("light_ambient", K::Vec3),
                ("light_diffuse", K::Vec3),
                ("light_specular", K::Vec3),
                ("light_constant", K::F32),
                ("light_linear", K::F32),
                ("light_quadratic", K::F32),
                ("material_ambient", K::I32),
                ("material_diffuse", K::I32),
                ("material_specular", K::I32),
                ("material_shininess", K::F32),
            ],
            // Shares the sphere vertex shader, so the transform prefix
            // matches the earth block.
            Pass::Sun => &[
                ("view", K::Mat4),
                ("projection", K::Mat4),
                ("model", K::Mat4),
                ("normal_matrix", K::Mat4),
                ("light_color", K::Vec3),
            ],
            Pass::Skybox => &[("view", K::Mat4), ("projection", K::Mat4)],
            Pass::Atmosphere => &[
                ("earth_center", K::Vec3),
                ("tangent", K::F32),
                ("light_direction", K::Vec3),
                ("aspect", K::F32),
                ("earth_radius", K::F32),
                ("atm_radius", K::F32),
            ],
        }
    }

    /// Textures the pass samples, by role.
    pub fn textures(self) -> &'static [TextureSlot] {
        match self {
            Pass::Earth => &TextureSlot::MATERIAL,
            Pass::Skybox => &[TextureSlot::Skybox],
            Pass::Sun | Pass::Atmosphere => &[],
        }
    }
}

/// A single recorded draw: program, depth state and uniform uploads.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCommand {
    pub pass: Pass,
    pub depth: DepthMode,
    pub uniforms: Vec<(&'static str, UniformValue)>,
}

impl DrawCommand {
    pub fn uniform(&self, name: &str) -> Option<UniformValue> {
        self.uniforms
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, value)| *value)
    }
}

/// Everything the renderer needs to draw one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FramePlan {
    pub view: Mat4,
    pub projection: Mat4,
    pub light_position: Vec3,
    pub light_direction: Vec3,
    pub draws: Vec<DrawCommand>,
}

/// Whether the frame loop should keep running after an input event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Exit,
}

/// Owns the camera, light and input state driven by the frame loop.
#[derive(Debug, Clone)]
pub struct FrameState {
    camera: Camera,
    sun: SunOrbit,
    input: InputState,
    depth: DepthMode,
    viewport: (u32, u32),
    frames: u64,
}

impl FrameState {
    pub fn new(now: f32, width: u32, height: u32) -> Self {
        Self {
            camera: Camera::new(CAMERA_START, Vec3::Y, now, width as f32, height as f32),
            sun: SunOrbit::new(),
            input: InputState::new(),
            depth: DepthMode::Strict,
            viewport: (width.max(1), height.max(1)),
            frames: 0,
        }
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn sun(&self) -> &SunOrbit {
        &self.sun
    }

    pub fn input(&self) -> &InputState {
        &self.input
    }

    /// Depth comparison left active at the end of the last frame.
    pub fn depth_mode(&self) -> DepthMode {
        self.depth
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn aspect(&self) -> f32 {
        self.viewport.0 as f32 / self.viewport.1 as f32
    }

    /// Applies one input event. Cursor and scroll act on the camera
    /// immediately; keys only update the held set, consumed at frame time.
    pub fn handle_input(&mut self, event: InputEvent) -> Control {
        match event {
            InputEvent::CursorMoved { x, y } => self.camera.track_cursor(x, y),
            InputEvent::Scrolled { delta } => self.camera.update_field_of_view(delta),
            InputEvent::Key { action, pressed } => {
                self.input.set_action(action, pressed);
                if action == Action::Quit && pressed {
                    return Control::Exit;
                }
            }
            InputEvent::Resized { width, height } => {
                if width > 0 && height > 0 {
                    self.viewport = (width, height);
                }
            }
        }
        Control::Continue
    }

    /// Runs the timing phase at clock reading `now` and records the frame.
    pub fn advance(&mut self, now: f32) -> FramePlan {
        let damping = proximity_damping(self.camera.position());
        self.camera.advance_time(now, damping);
        let elapsed = self.camera.elapsed();
        let held: Vec<_> = self.input.held_movements().collect();
        for movement in held {
            self.camera.apply_movement(movement, elapsed);
        }
        self.camera.recompute_look_direction();

        let view = self.camera.view_matrix();
        let projection = self.camera.projection_matrix(self.aspect());
        let light_position = self.sun.position();
        let light_direction = self.sun.direction();

        let mut plan = FramePlan {
            view,
            projection,
            light_position,
            light_direction,
            draws: Vec::with_capacity(Pass::ALL.len()),
        };
        self.record_scene(&mut plan);
        self.record_compositing(&mut plan);

        self.sun.advance(elapsed);
        self.frames += 1;
        plan
    }

    fn record_scene(&self, plan: &mut FramePlan) {
        let model = Mat4::IDENTITY;
        let earth = vec![
            ("view", UniformValue::Mat4(plan.view)),
            ("projection", UniformValue::Mat4(plan.projection)),
            ("model", UniformValue::Mat4(model)),
            (
                "normal_matrix",
                UniformValue::Mat4(model.inverse().transpose()),
            ),
            ("view_pos", UniformValue::Vec3(self.camera.position())),
            ("light_position", UniformValue::Vec3(plan.light_position)),
            ("light_direction", UniformValue::Vec3(plan.light_direction)),
            ("light_constant", UniformValue::F32(EARTH_LIGHT.constant)),
            ("light_linear", UniformValue::F32(EARTH_LIGHT.linear)),
            ("light_quadratic", UniformValue::F32(EARTH_LIGHT.quadratic)),
            ("light_ambient", UniformValue::Vec3(EARTH_LIGHT.ambient)),
            ("light_diffuse", UniformValue::Vec3(EARTH_LIGHT.diffuse)),
            ("light_specular", UniformValue::Vec3(EARTH_LIGHT.specular)),
            (
                "material_ambient",
                UniformValue::I32(TextureSlot::Ambient.unit()),
            ),
            (
                "material_diffuse",
                UniformValue::I32(TextureSlot::Diffuse.unit()),
            ),
            (
                "material_specular",
                UniformValue::I32(TextureSlot::Specular.unit()),
            ),
            ("material_shininess", UniformValue::F32(EARTH_SHININESS)),
        ];
        plan.draws.push(DrawCommand {
            pass: Pass::Earth,
            depth: self.depth,
            uniforms: earth,
        });

        let sun_model = Mat4::from_translation(plan.light_position);
        let sun = vec![
            ("view", UniformValue::Mat4(plan.view)),
            ("projection", UniformValue::Mat4(plan.projection)),
            ("model", UniformValue::Mat4(sun_model)),
            (
                "normal_matrix",
                UniformValue::Mat4(sun_model.inverse().transpose()),
            ),
            ("light_color", UniformValue::Vec3(SUN_COLOR)),
        ];
        plan.draws.push(DrawCommand {
            pass: Pass::Sun,
            depth: self.depth,
            uniforms: sun,
        });
    }

    fn record_compositing(&mut self, plan: &mut FramePlan) {
        // Rotation only, so the box stays centred on the eye.
        let sky_view = Mat4::from_mat3(Mat3::from_mat4(plan.view));
        self.depth = DepthMode::Relaxed;
        plan.draws.push(DrawCommand {
            pass: Pass::Skybox,
            depth: self.depth,
            uniforms: vec![
                ("view", UniformValue::Mat4(sky_view)),
                ("projection", UniformValue::Mat4(plan.projection)),
            ],
        });
        self.depth = DepthMode::Strict;

        let earth_center = plan.view * Mat4::IDENTITY * Vec4::new(0.0, 0.0, 0.0, 1.0);
        let light_direction = Mat3::from_mat4(plan.view) * plan.light_direction;
        let tangent = (self.camera.fov().to_radians() / 2.0).tan();
        plan.draws.push(DrawCommand {
            pass: Pass::Atmosphere,
            depth: self.depth,
            uniforms: vec![
                ("tangent", UniformValue::F32(tangent)),
                ("aspect", UniformValue::F32(self.aspect())),
                ("earth_center", UniformValue::Vec3(earth_center.truncate())),
                ("light_direction", UniformValue::Vec3(light_direction)),
                ("earth_radius", UniformValue::F32(EARTH_RADIUS)),
                ("atm_radius", UniformValue::F32(ATMOSPHERE_RADIUS)),
            ],
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Movement;
    use crate::uniform::{UniformBlock, UniformLayout};

    fn state() -> FrameState {
        FrameState::new(0.0, 800, 600)
    }

    #[test]
    fn passes_draw_in_fixed_order() {
        let mut frame = state();
        let plan = frame.advance(0.016);
        let order: Vec<Pass> = plan.draws.iter().map(|d| d.pass).collect();
        assert_eq!(order, Pass::ALL.to_vec());
    }

    #[test]
    fn skybox_alone_uses_relaxed_depth() {
        let mut frame = state();
        for step in 1..=3 {
            let plan = frame.advance(step as f32 * 0.016);
            for draw in &plan.draws {
                let expected = if draw.pass == Pass::Skybox {
                    DepthMode::Relaxed
                } else {
                    DepthMode::Strict
                };
                assert_eq!(draw.depth, expected, "{:?}", draw.pass);
            }
            assert_eq!(frame.depth_mode(), DepthMode::Strict);
        }
    }

    #[test]
    fn every_uniform_is_declared_by_its_pass() {
        let mut frame = state();
        let plan = frame.advance(0.5);
        for draw in &plan.draws {
            let mut block = UniformBlock::new(UniformLayout::new(draw.pass.uniform_fields()));
            for (name, value) in &draw.uniforms {
                assert!(block.set(name, *value), "{:?} {name}", draw.pass);
            }
            assert_eq!(draw.uniforms.len(), draw.pass.uniform_fields().len());
        }
    }

    #[test]
    fn sphere_passes_share_transform_offsets() {
        let earth = UniformLayout::new(Pass::Earth.uniform_fields());
        let sun = UniformLayout::new(Pass::Sun.uniform_fields());
        for name in ["view", "projection", "model", "normal_matrix"] {
            assert_eq!(earth.offset_of(name), sun.offset_of(name), "{name}");
        }
        assert_eq!(earth.size(), 384);
        assert_eq!(sun.size(), 272);
    }

    #[test]
    fn skybox_view_drops_translation() {
        let mut frame = state();
        let plan = frame.advance(0.1);
        let sky = &plan.draws[2];
        let Some(UniformValue::Mat4(view)) = sky.uniform("view") else {
            panic!("skybox view missing");
        };
        assert_eq!(view.w_axis, Vec4::W);
        assert!(Mat3::from_mat4(view).abs_diff_eq(Mat3::from_mat4(plan.view), 1e-6));
    }

    #[test]
    fn atmosphere_sees_earth_in_view_space() {
        let mut frame = state();
        let plan = frame.advance(0.1);
        let atmosphere = &plan.draws[3];
        let Some(UniformValue::Vec3(center)) = atmosphere.uniform("earth_center") else {
            panic!("earth_center missing");
        };
        // camera at z=15 looking down -Z sees the origin 15 units ahead
        assert!(center.abs_diff_eq(Vec3::new(0.0, 0.0, -15.0), 1e-4));
        let Some(UniformValue::F32(tangent)) = atmosphere.uniform("tangent") else {
            panic!("tangent missing");
        };
        assert!((tangent - 22.5f32.to_radians().tan()).abs() < 1e-6);
    }

    #[test]
    fn sun_model_follows_light() {
        let mut frame = state();
        let plan = frame.advance(0.1);
        let Some(UniformValue::Mat4(model)) = plan.draws[1].uniform("model") else {
            panic!("sun model missing");
        };
        assert_eq!(model.w_axis.truncate(), plan.light_position);
    }

    #[test]
    fn held_keys_move_after_speed_update() {
        let mut frame = state();
        frame.handle_input(InputEvent::Key {
            action: Action::Move(Movement::Forward),
            pressed: true,
        });
        let start = frame.camera().position();
        frame.advance(0.1);
        let camera = frame.camera();
        let expected = camera.speed() * camera.elapsed();
        assert!(expected > 0.0);
        assert!(((start - camera.position()).length() - expected).abs() < 1e-4);
        assert!(camera.position().z < start.z);
    }

    #[test]
    fn quit_key_requests_exit() {
        let mut frame = state();
        let control = frame.handle_input(InputEvent::Key {
            action: Action::Quit,
            pressed: true,
        });
        assert_eq!(control, Control::Exit);
        assert!(frame.input().quit_requested());
    }

    #[test]
    fn resize_updates_aspect() {
        let mut frame = state();
        frame.handle_input(InputEvent::Resized {
            width: 1600,
            height: 800,
        });
        assert_eq!(frame.aspect(), 2.0);
        frame.handle_input(InputEvent::Resized {
            width: 0,
            height: 0,
        });
        assert_eq!(frame.aspect(), 2.0);
    }
}
