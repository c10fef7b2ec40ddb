//! Fixed parameters of the earth/sun scene and the orbiting light.

use glam::Vec3;

pub const EARTH_RADIUS: f32 = 5.0;
pub const SUN_RADIUS: f32 = 20.0;
/// Outer radius of the scattering shell around the earth.
pub const ATMOSPHERE_RADIUS: f32 = EARTH_RADIUS * 1.025;

pub const SUN_ORBIT_RADIUS: f32 = 100.0;
/// Radians of orbit per second.
pub const SUN_ANGULAR_RATE: f32 = 0.125;
pub const SUN_COLOR: Vec3 = Vec3::new(1.0, 0.9, 0.5);

pub const CAMERA_START: Vec3 = Vec3::new(0.0, 0.0, 15.0);

/// Point light attenuation and color terms used when shading the earth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightTerms {
    pub constant: f32,
    pub linear: f32,
    pub quadratic: f32,
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
}

pub const EARTH_LIGHT: LightTerms = LightTerms {
    constant: 1.0,
    linear: 0.0,
    quadratic: 0.004,
    ambient: Vec3::splat(1.0),
    diffuse: Vec3::splat(0.8),
    specular: Vec3::splat(0.5),
};

pub const EARTH_SHININESS: f32 = 10.0;

/// Movement damping in `[0, 1)` that slows the camera near the origin and
/// lets it speed up further out.
pub fn proximity_damping(position: Vec3) -> f32 {
    const FALLOFF: f32 = 0.01;
    const OFFSET: f32 = 0.2;
    1.0 - (-(FALLOFF * position.length() + OFFSET)).exp()
}

/// The sun's circular orbit in the XZ plane around the origin.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SunOrbit {
    angle: f32,
}

impl SunOrbit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulated orbit angle in radians.
    pub fn angle(&self) -> f32 {
        self.angle
    }

    pub fn position(&self) -> Vec3 {
        Vec3::new(
            SUN_ORBIT_RADIUS * self.angle.cos(),
            0.0,
            SUN_ORBIT_RADIUS * self.angle.sin(),
        )
    }

    /// Unit vector pointing from the sun towards the origin.
    pub fn direction(&self) -> Vec3 {
        (-self.position()).normalize()
    }

    pub fn advance(&mut self, elapsed: f32) {
        self.angle += SUN_ANGULAR_RATE * elapsed;
    }
}
