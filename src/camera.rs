use glam::{Mat4, Vec3};

/// Degrees of yaw/pitch per pixel of cursor travel.
pub const MOUSE_SENSITIVITY: f32 = 0.05;
/// Base movement speed, scaled by frame time and proximity damping.
pub const BASE_SPEED: f32 = 450.0;
pub const MIN_FOV: f32 = 1.0;
pub const MAX_FOV: f32 = 45.0;
pub const NEAR_PLANE: f32 = 0.1;
pub const FAR_PLANE: f32 = 100.0;

const INITIAL_YAW: f32 = -90.0;
const INITIAL_PITCH: f32 = 0.0;

/// Direction of a keyboard-driven camera displacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Movement {
    Forward,
    Backward,
    Left,
    Right,
    Up,
    Down,
}

/// Free-flying camera driven by cursor, scroll and key input.
///
/// Yaw and pitch accumulate without bounds. The look direction and right
/// axis are always re-derived from them, never edited directly.
#[derive(Debug, Clone)]
pub struct Camera {
    position: Vec3,
    world_up: Vec3,
    right: Vec3,
    look_direction: Vec3,
    yaw: f32,
    pitch: f32,
    fov: f32,
    last_frame: f32,
    elapsed: f32,
    speed: f32,
    last_cursor: (f32, f32),
}

impl Camera {
    /// Creates a camera at `position`. `now` seeds the frame timer and the
    /// cursor baseline starts at the centre of a `width` x `height` window.
    pub fn new(position: Vec3, world_up: Vec3, now: f32, width: f32, height: f32) -> Self {
        let mut camera = Self {
            position,
            world_up,
            right: Vec3::X,
            look_direction: Vec3::NEG_Z,
            yaw: INITIAL_YAW,
            pitch: INITIAL_PITCH,
            fov: MAX_FOV,
            last_frame: now,
            elapsed: 0.0,
            speed: 0.0,
            last_cursor: (width / 2.0, height / 2.0),
        };
        camera.recompute_look_direction();
        camera
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn world_up(&self) -> Vec3 {
        self.world_up
    }

    pub fn right(&self) -> Vec3 {
        self.right
    }

    pub fn look_direction(&self) -> Vec3 {
        self.look_direction
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    /// Vertical field of view in degrees.
    pub fn fov(&self) -> f32 {
        self.fov
    }

    /// Seconds between the two most recent `advance_time` calls.
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn last_cursor(&self) -> (f32, f32) {
        self.last_cursor
    }

    /// Accumulates scaled cursor deltas into yaw and pitch. Pitch is left
    /// unclamped, so the view flips once it passes either pole.
    pub fn update_orientation(&mut self, delta_x: f32, delta_y: f32) {
        self.yaw += MOUSE_SENSITIVITY * delta_x;
        self.pitch += MOUSE_SENSITIVITY * delta_y;
    }

    /// Feeds an absolute cursor sample, turning it into orientation deltas
    /// against the previous sample. Screen y grows downward.
    pub fn track_cursor(&mut self, x: f32, y: f32) {
        let (last_x, last_y) = self.last_cursor;
        let delta_x = x - last_x;
        let delta_y = last_y - y;
        self.last_cursor = (x, y);
        self.update_orientation(delta_x, delta_y);
    }

    pub fn update_field_of_view(&mut self, scroll_delta: f32) {
        self.fov = (self.fov - scroll_delta).clamp(MIN_FOV, MAX_FOV);
    }

    /// Updates the frame timer and derives this frame's movement speed.
    /// Must run once per frame, before any `apply_movement` call.
    pub fn advance_time(&mut self, now: f32, damping: f32) {
        self.elapsed = now - self.last_frame;
        self.last_frame = now;
        self.speed = BASE_SPEED * self.elapsed * damping;
    }

    pub fn recompute_look_direction(&mut self) {
        let yaw = self.yaw.to_radians();
        let pitch = self.pitch.to_radians();
        self.look_direction = Vec3::new(
            pitch.cos() * yaw.cos(),
            pitch.sin(),
            pitch.cos() * yaw.sin(),
        );
        self.right = self.look_direction.cross(self.world_up).normalize();
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(
            self.position,
            self.position + self.look_direction,
            self.world_up,
        )
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(
            self.fov.to_radians(),
            aspect.max(0.01),
            NEAR_PLANE,
            FAR_PLANE,
        )
    }

    /// Displaces the camera by `speed * frame_time` along the axis for
    /// `direction`. `Up` and `Down` are accepted and have no effect.
    pub fn apply_movement(&mut self, direction: Movement, frame_time: f32) {
        let velocity = self.speed * frame_time;
        match direction {
            Movement::Forward => self.position += self.look_direction * velocity,
            Movement::Backward => self.position -= self.look_direction * velocity,
            Movement::Right => self.position += self.right * velocity,
            Movement::Left => self.position -= self.right * velocity,
            Movement::Up | Movement::Down => {}
        }
    }
}
