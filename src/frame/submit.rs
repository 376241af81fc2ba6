//! Assembly of the per-slot stereo frame description

use crate::coords;
use crate::sdk::{FrameInfo, TextureHandle};
use crate::session::RigidTransform;

use super::layout::view_cone;

/// Render targets the host produced for one slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EyeTargets {
    pub left: TextureHandle,
    pub right: TextureHandle,
    pub width: u32,
    pub height: u32,
    pub srgb: bool,
}

/// Optical parameters for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameOptics {
    /// Interpupillary distance in meters
    pub ipd: f32,
    pub world_to_meters: f32,
    pub fov_degrees: f32,
    pub width_to_height: f32,
}

/// Build the frame description for one slot
///
/// Each eye sits half the IPD (in world units) along the glasses' right axis;
/// both eyes share the glasses orientation.
pub fn build_frame_info(glasses: &RigidTransform, optics: &FrameOptics, targets: &EyeTargets) -> FrameInfo {
    let half_ipd = optics.ipd * optics.world_to_meters * 0.5;
    let right = glasses.right_vector();

    let left_eye = glasses.translation - right * half_ipd;
    let right_eye = glasses.translation + right * half_ipd;
    let rotation = coords::orientation_to_hardware(glasses.rotation);

    FrameInfo {
        left_texture: targets.left,
        right_texture: targets.right,
        texture_width: targets.width,
        texture_height: targets.height,
        is_srgb: targets.srgb,
        is_upside_down: true,
        view_cone: view_cone(optics.fov_degrees, optics.width_to_height),
        rot_to_left_eye: rotation,
        rot_to_right_eye: rotation,
        pos_left_eye: coords::position_to_hardware(left_eye, optics.world_to_meters),
        pos_right_eye: coords::position_to_hardware(right_eye, optics.world_to_meters),
    }
}
