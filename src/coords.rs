//! Conversion between the glasses' right-handed gameboard frame and the
//! engine's left-handed world frame.
//!
//! Hardware orientations describe a rotation that takes world points into the
//! glasses' camera frame. The engine expects the camera orientation in the
//! world, so besides the X/Y axis swap both directions flip the scalar part
//! around a fixed 90° correction about +Y.

use glam::{Quat, Vec3};

/// Engine world units per meter used when no authoritative scale is known
pub const DEFAULT_WORLD_TO_METERS: f32 = 100.0;

const HALF_SQRT_2: f32 = 0.707_106_8;

/// Rotation from the hardware camera orientation to the engine camera orientation
const ROT_TO_ENGINE_CAMERA: Quat = Quat::from_xyzw(0.0, HALF_SQRT_2, 0.0, -HALF_SQRT_2);

/// Exact inverse of [`ROT_TO_ENGINE_CAMERA`]
const ROT_TO_HARDWARE_CAMERA: Quat = Quat::from_xyzw(0.0, -HALF_SQRT_2, 0.0, -HALF_SQRT_2);

/// Convert a hardware `rotToGLS_GBD` quaternion into an engine orientation
pub fn orientation_from_hardware(q: Quat) -> Quat {
    let swapped = Quat::from_xyzw(q.y, q.x, q.z, -q.w);
    let r = ROT_TO_ENGINE_CAMERA * swapped;
    Quat::from_xyzw(r.x, r.y, r.z, -r.w)
}

/// Convert an engine orientation back into the hardware convention
///
/// Inverse of [`orientation_from_hardware`] component for component.
pub fn orientation_to_hardware(q: Quat) -> Quat {
    let flipped = Quat::from_xyzw(q.x, q.y, q.z, -q.w);
    let r = ROT_TO_HARDWARE_CAMERA * flipped;
    Quat::from_xyzw(r.y, r.x, r.z, -r.w)
}

/// Hardware meters to engine units
pub fn position_from_hardware(v: Vec3, world_to_meters: f32) -> Vec3 {
    Vec3::new(v.y, v.x, v.z) * world_to_meters
}

/// Engine units to hardware meters
///
/// `world_to_meters` must be non-zero; pass it through [`sanitize_scale`] first
/// when it comes from an untrusted source.
pub fn position_to_hardware(v: Vec3, world_to_meters: f32) -> Vec3 {
    Vec3::new(v.y, v.x, v.z) / world_to_meters
}

/// Resolve a possibly missing or degenerate scale to a usable one
///
/// # Returns
/// The given scale when it is finite and non-zero, [`DEFAULT_WORLD_TO_METERS`] otherwise
pub fn sanitize_scale(world_to_meters: Option<f32>) -> f32 {
    match world_to_meters {
        Some(s) if s.is_finite() && s != 0.0 => s,
        _ => DEFAULT_WORLD_TO_METERS,
    }
}
