//! Presentation side: per-slot eye geometry and frame submission
//!
//! The presentation context receives [`FrameSnapshot`]s from the simulation
//! context by value and keeps its own copy of every slot's glasses transform.
//! Late updates and the optional presentation-time pose refetch overwrite that
//! copy before frames are built.

pub mod layout;
pub mod submit;

use crossbeam::channel::Receiver;
use glam::{Mat4, Vec3};
use std::sync::Arc;
use tracing::{debug, trace, warn};

use crate::config::{AppConfig, DisplayConfig};
use crate::pool::{DevicePool, FrameSnapshot, MAX_SLOTS};
use crate::sdk::{GraphicsBinding, PoseUsage};
use crate::session::{RigidTransform, WorldState, DEFAULT_IPD};

pub use layout::{Eye, EyeLayout, ViewRect, DEFAULT_NEAR_Z};
pub use submit::{build_frame_info, EyeTargets, FrameOptics};

pub struct PresentationContext {
    pool: Arc<DevicePool>,
    handoff: Receiver<FrameSnapshot>,
    world: WorldState,
    frame: u64,
    transforms: [Option<RigidTransform>; MAX_SLOTS],
    targets: [Option<EyeTargets>; MAX_SLOTS],
    fov: [f32; MAX_SLOTS],
    layout: EyeLayout,
    graphics: GraphicsBinding,
    refetch_pose: bool,
}

impl PresentationContext {
    pub fn new(
        pool: Arc<DevicePool>,
        handoff: Receiver<FrameSnapshot>,
        display: &DisplayConfig,
        graphics: GraphicsBinding,
    ) -> Self {
        let mut ctx = Self {
            pool,
            handoff,
            world: WorldState::default(),
            frame: 0,
            transforms: [None; MAX_SLOTS],
            targets: [None; MAX_SLOTS],
            fov: [display.fov_degrees; MAX_SLOTS],
            layout: EyeLayout::from_render_target(display.render_target.width, display.render_target.height),
            graphics,
            refetch_pose: display.refetch_presentation_pose,
        };
        ctx.apply_display(display);
        ctx
    }

    pub fn from_config(pool: Arc<DevicePool>, handoff: Receiver<FrameSnapshot>, config: &AppConfig) -> Self {
        Self::new(pool, handoff, &config.display, config.graphics.binding())
    }

    /// Apply display settings (startup and hot reload)
    pub fn apply_display(&mut self, display: &DisplayConfig) {
        for (slot, fov) in self.fov.iter_mut().enumerate() {
            *fov = display.player_fov.get(slot).copied().unwrap_or(display.fov_degrees);
        }
        self.layout = EyeLayout::from_render_target(display.render_target.width, display.render_target.height);
        self.refetch_pose = display.refetch_presentation_pose;
    }

    pub fn world(&self) -> WorldState {
        self.world
    }

    /// Frame number of the last snapshot received
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn layout(&self) -> EyeLayout {
        self.layout
    }

    pub fn enabled_slots(&self) -> Vec<usize> {
        self.pool.enumerate_enabled()
    }

    /// Start a presentation step
    ///
    /// Takes the newest snapshot handed over by the simulation context (older
    /// ones are dropped), then applies presentation-time corrections.
    ///
    /// # Returns
    /// `true` when a new snapshot arrived
    pub fn begin_step(&mut self) -> bool {
        let latest = self.handoff.try_iter().last();
        let fresh = latest.is_some();

        if let Some(snapshot) = latest {
            self.world = snapshot.world;
            self.frame = snapshot.frame;
            for (slot, pose) in snapshot.poses.iter().enumerate() {
                self.transforms[slot] = pose.transform();
            }
        }

        for session in self.pool.sessions() {
            let slot = session.slot_index();

            if self.refetch_pose && session.is_enabled() {
                let pose = session.fetch_pose(PoseUsage::GlassesPresentation, self.world.world_to_meters);
                if let Some(transform) = pose.transform() {
                    self.transforms[slot] = Some(transform);
                }
            }

            if let Some(transform) = session.take_late_update() {
                trace!("{}: late update applied", session.control_prefix());
                self.transforms[slot] = Some(transform);
            }
        }

        fresh
    }

    /// Glasses transform the next frame of a slot will use
    pub fn glasses_transform(&self, slot: usize) -> Option<RigidTransform> {
        self.transforms.get(slot).copied().flatten()
    }

    pub fn set_eye_targets(&mut self, slot: usize, targets: EyeTargets) {
        if let Some(entry) = self.targets.get_mut(slot) {
            *entry = Some(targets);
        }
    }

    pub fn fov(&self, slot: usize) -> Option<f32> {
        self.fov.get(slot).copied()
    }

    /// Override the field of view of one slot
    pub fn override_fov(&mut self, slot: usize, fov_degrees: f32) -> bool {
        if !(fov_degrees > 0.0 && fov_degrees < 180.0) {
            warn!("Ignoring FOV {} for player {}: out of range", fov_degrees, slot + 1);
            return false;
        }
        match self.fov.get_mut(slot) {
            Some(fov) => {
                *fov = fov_degrees;
                debug!("player{}: FOV set to {:.1}°", slot + 1, fov_degrees);
                true
            }
            None => false,
        }
    }

    pub fn view_rect(&self, slot: usize, eye: Eye) -> ViewRect {
        self.layout.source_rect(slot, eye)
    }

    /// Projection matrix of a slot
    ///
    /// Both eyes render with the same symmetric frustum; only their view
    /// position differs (see [`Self::relative_eye_offset`]).
    pub fn stereo_projection(&self, slot: usize) -> Mat4 {
        let fov = self.fov(slot).unwrap_or(self.fov[0]);
        layout::stereo_projection(fov, &self.layout, DEFAULT_NEAR_Z)
    }

    /// Eye position relative to the glasses, in engine units
    pub fn relative_eye_offset(&self, slot: usize, eye: Eye) -> Vec3 {
        let ipd = self.pool.session(slot).map(|s| s.ipd()).unwrap_or(DEFAULT_IPD);
        layout::eye_offset(ipd, self.world.world_to_meters, eye)
    }

    /// Submit one frame per enabled slot that has a pose and render targets
    ///
    /// # Returns
    /// Number of frames accepted by the service
    pub fn submit_frames(&mut self) -> usize {
        let mut submitted = 0;

        for session in self.pool.sessions() {
            let slot = session.slot_index();
            if !session.is_enabled() {
                continue;
            }
            let (Some(transform), Some(targets)) = (self.transforms[slot], self.targets[slot]) else {
                trace!("{}: nothing to present", session.control_prefix());
                continue;
            };

            let optics = FrameOptics {
                ipd: session.ipd(),
                world_to_meters: self.world.world_to_meters,
                fov_degrees: self.fov[slot],
                width_to_height: self.layout.width_to_height(),
            };
            let info = build_frame_info(&transform, &optics, &targets);

            if session.submit_frame(&info, &self.graphics).is_ok() {
                submitted += 1;
            }
        }

        submitted
    }
}

#[cfg(test)]
mod tests;
