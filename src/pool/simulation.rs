//! Simulation side of the pose handoff
//!
//! The simulation context owns its pose cache outright. Each step it refreshes
//! the cache and sends an immutable [`FrameSnapshot`] to the presentation
//! context, which takes ownership of it for the rest of that frame.

use crossbeam::channel::Sender;
use glam::Vec3;
use std::sync::Arc;
use tracing::trace;

use super::{DevicePool, MAX_SLOTS};
use crate::frame::layout::{eye_offset, Eye};
use crate::sdk::PoseUsage;
use crate::session::{PoseSnapshot, WorldState};

/// Poses and world settings captured by one simulation step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSnapshot {
    pub frame: u64,
    pub world: WorldState,
    pub poses: [PoseSnapshot; MAX_SLOTS],
}

pub struct SimulationContext {
    pool: Arc<DevicePool>,
    world: WorldState,
    poses: [PoseSnapshot; MAX_SLOTS],
    frame: u64,
    handoff: Sender<FrameSnapshot>,
}

impl SimulationContext {
    pub fn new(pool: Arc<DevicePool>, handoff: Sender<FrameSnapshot>) -> Self {
        Self {
            pool,
            world: WorldState::default(),
            poses: [PoseSnapshot::default(); MAX_SLOTS],
            frame: 0,
            handoff,
        }
    }

    pub fn pool(&self) -> &Arc<DevicePool> {
        &self.pool
    }

    pub fn world(&self) -> WorldState {
        self.world
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Run one simulation step
    ///
    /// # Arguments
    /// * `now` - Monotonic time in seconds, drives the discovery cadence
    /// * `world_to_meters` - Engine scale for this step; `None` keeps the default
    pub fn begin_step(&mut self, now: f64, world_to_meters: Option<f32>) -> FrameSnapshot {
        self.world = WorldState::new(world_to_meters);
        self.pool.tick(now);

        let scale = self.world.world_to_meters;
        for (slot, session) in self.pool.sessions().iter().enumerate() {
            self.poses[slot] = if session.is_enabled() {
                session.fetch_pose(PoseUsage::GlassesPresentation, scale)
            } else {
                PoseSnapshot::invalid(scale)
            };
        }

        self.frame += 1;
        let snapshot = FrameSnapshot {
            frame: self.frame,
            world: self.world,
            poses: self.poses,
        };

        if self.handoff.send(snapshot).is_err() {
            trace!("Presentation side gone, snapshot {} dropped", self.frame);
        }
        snapshot
    }

    /// Latest valid pose of a slot on the simulation side
    pub fn current_pose(&self, slot: usize) -> Option<&PoseSnapshot> {
        self.poses.get(slot).filter(|p| p.valid)
    }

    /// Eye position relative to the glasses, scaled to engine units
    pub fn relative_eye_offset(&self, slot: usize, eye: Eye) -> Vec3 {
        let ipd = self
            .pool
            .session(slot)
            .map(|s| s.ipd())
            .unwrap_or(crate::session::DEFAULT_IPD);
        eye_offset(ipd, self.world.world_to_meters, eye)
    }
}
