//! Eye geometry: render target layout, eye offsets, view cone and projection

use glam::{Mat4, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::sdk::ViewCone;

/// Near clipping plane in engine units
pub const DEFAULT_NEAR_Z: f32 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Eye {
    Left,
    Right,
}

impl Eye {
    pub const BOTH: [Eye; 2] = [Eye::Left, Eye::Right];

    pub fn index(self) -> usize {
        match self {
            Eye::Left => 0,
            Eye::Right => 1,
        }
    }

    /// -1 for the left eye, +1 for the right eye
    pub fn sign(self) -> f32 {
        match self {
            Eye::Left => -1.0,
            Eye::Right => 1.0,
        }
    }
}

/// Eye position relative to the glasses origin, in engine units
pub fn eye_offset(ipd: f32, world_to_meters: f32, eye: Eye) -> Vec3 {
    Vec3::new(0.0, eye.sign() * 0.5 * ipd * world_to_meters, 0.0)
}

/// Pixel rectangle inside the shared render target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ViewRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// How the shared render target is split between slots and eyes
///
/// Two eye columns, one row per slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EyeLayout {
    pub eye_width: u32,
    pub eye_height: u32,
}

impl EyeLayout {
    pub fn from_render_target(width: u32, height: u32) -> Self {
        Self {
            eye_width: width / 2,
            eye_height: height / 4,
        }
    }

    pub fn width_to_height(&self) -> f32 {
        if self.eye_height == 0 {
            return 1.0;
        }
        self.eye_width as f32 / self.eye_height as f32
    }

    /// Area rendered for one eye of one slot
    pub fn source_rect(&self, slot: usize, eye: Eye) -> ViewRect {
        ViewRect {
            x: eye.index() as u32 * self.eye_width,
            y: slot as u32 * self.eye_height,
            width: self.eye_width,
            height: self.eye_height,
        }
    }
}

/// Image rectangle of the virtual camera on the unit plane
pub fn view_cone(fov_degrees: f32, width_to_height: f32) -> ViewCone {
    let start_x = -(fov_degrees * 0.5).to_radians().tan();
    let start_y = start_x / width_to_height;
    ViewCone {
        start_x,
        start_y,
        width: -2.0 * start_x,
        height: -2.0 * start_y,
    }
}

/// Reversed-Z, infinite far plane perspective projection
///
/// The matrix maps column vectors; its columns are the rows of the engine's
/// row-vector form.
pub fn stereo_projection(fov_degrees: f32, layout: &EyeLayout, near_z: f32) -> Mat4 {
    let half_fov_tan = (fov_degrees * 0.5).to_radians().tan();
    let x_scale = 1.0 / half_fov_tan;
    let y_scale = layout.eye_width as f32 / half_fov_tan / layout.eye_height.max(1) as f32;

    Mat4::from_cols(
        Vec4::new(x_scale, 0.0, 0.0, 0.0),
        Vec4::new(0.0, y_scale, 0.0, 0.0),
        Vec4::new(0.0, 0.0, 0.0, 1.0),
        Vec4::new(0.0, 0.0, near_z, 0.0),
    )
}
