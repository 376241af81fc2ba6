//! Pose values cached per execution context

use glam::{Quat, Vec3};

use crate::coords::{self, DEFAULT_WORLD_TO_METERS};
use crate::sdk::{GameboardKind, GlassesPose};

/// Orientation and translation in engine space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidTransform {
    pub rotation: Quat,
    pub translation: Vec3,
}

impl RigidTransform {
    pub fn new(rotation: Quat, translation: Vec3) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// The transform's local right axis (+Y in engine space)
    pub fn right_vector(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }
}

/// A glasses pose reading together with the scale it was captured at
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseSnapshot {
    pub orientation: Quat,
    pub position: Vec3,
    pub gameboard: GameboardKind,
    pub valid: bool,
    pub world_to_meters: f32,
}

impl PoseSnapshot {
    pub fn invalid(world_to_meters: f32) -> Self {
        Self {
            orientation: Quat::IDENTITY,
            position: Vec3::ZERO,
            gameboard: GameboardKind::None,
            valid: false,
            world_to_meters,
        }
    }

    /// Convert a raw hardware pose into engine space at the given scale
    pub fn from_hardware(pose: &GlassesPose, world_to_meters: f32) -> Self {
        Self {
            orientation: coords::orientation_from_hardware(pose.rot_to_glasses),
            position: coords::position_from_hardware(pose.pos_glasses, world_to_meters),
            gameboard: pose.gameboard,
            valid: true,
            world_to_meters,
        }
    }

    pub fn transform(&self) -> Option<RigidTransform> {
        self.valid
            .then(|| RigidTransform::new(self.orientation, self.position))
    }
}

impl Default for PoseSnapshot {
    fn default() -> Self {
        Self::invalid(DEFAULT_WORLD_TO_METERS)
    }
}

/// Per-frame world settings published by the simulation context
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldState {
    pub world_to_meters: f32,
}

impl WorldState {
    /// Build from an engine-supplied scale, falling back to the default when
    /// the scale is missing or unusable
    pub fn new(world_to_meters: Option<f32>) -> Self {
        Self {
            world_to_meters: coords::sanitize_scale(world_to_meters),
        }
    }
}

impl Default for WorldState {
    fn default() -> Self {
        Self {
            world_to_meters: DEFAULT_WORLD_TO_METERS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_snapshot_has_no_transform() {
        assert!(PoseSnapshot::invalid(100.0).transform().is_none());
        assert!(PoseSnapshot::default().transform().is_none());
    }

    #[test]
    fn test_snapshot_from_hardware_scales_position() {
        let pose = GlassesPose {
            rot_to_glasses: Quat::IDENTITY,
            pos_glasses: Vec3::new(0.1, 0.2, 0.3),
            gameboard: GameboardKind::Xe,
        };
        let snap = PoseSnapshot::from_hardware(&pose, 100.0);
        assert!(snap.valid);
        assert_eq!(snap.gameboard, GameboardKind::Xe);
        assert!((snap.position - Vec3::new(20.0, 10.0, 30.0)).length() < 1e-4);
        assert_eq!(snap.transform().map(|t| t.translation), Some(snap.position));
    }

    #[test]
    fn test_world_state_fallback() {
        assert_eq!(WorldState::new(None).world_to_meters, 100.0);
        assert_eq!(WorldState::new(Some(0.0)).world_to_meters, 100.0);
        assert_eq!(WorldState::new(Some(250.0)).world_to_meters, 250.0);
    }

    #[test]
    fn test_right_vector_follows_rotation() {
        let t = RigidTransform::new(Quat::IDENTITY, Vec3::ZERO);
        assert_eq!(t.right_vector(), Vec3::Y);

        let yawed = RigidTransform::new(Quat::from_rotation_z(std::f32::consts::FRAC_PI_2), Vec3::ZERO);
        assert!((yawed.right_vector() - Vec3::new(-1.0, 0.0, 0.0)).length() < 1e-5);
    }
}
