//! Controller input decoding
//!
//! Once per tick, for every slot holding exclusive glasses, the decoder makes
//! sure the wand stream is configured, refreshes the wand roster, drains the
//! stream (bounded per tick) and turns the state difference into
//! [`InputEvent`]s.

pub mod axis;
pub mod events;
pub mod haptics;
pub mod wand;

use glam::{Quat, Vec3};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, trace, warn};

use crate::config::InputConfig;
use crate::pool::{DevicePool, MAX_SLOTS};
use crate::sdk::{GlassesHandle, SdkError, WandStreamEvent, MAX_WANDS_PER_GLASSES};
use crate::session::{DeviceSession, RigidTransform};

pub use events::{Hand, InputEvent};
pub use haptics::{HapticCapabilities, HapticFeedback};
pub use wand::{WandPose, WandState, WandUpdate};

/// Tracking quality of a wand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingStatus {
    NotTracked,
    InertialOnly,
    Tracked,
}

#[derive(Debug, Clone, Default)]
struct SlotInput {
    /// Glasses the wand stream was last configured for
    configured: Option<GlassesHandle>,
    wands: [WandState; MAX_WANDS_PER_GLASSES],
}

/// Wand input decoder for all slots of a pool
pub struct InputDecoder {
    pool: Arc<DevicePool>,
    tuning: InputConfig,
    slots: [SlotInput; MAX_SLOTS],
}

impl InputDecoder {
    pub fn new(pool: Arc<DevicePool>, tuning: InputConfig) -> Self {
        Self {
            pool,
            tuning,
            slots: Default::default(),
        }
    }

    /// Replace thresholds and budgets (config hot reload)
    pub fn set_tuning(&mut self, tuning: InputConfig) {
        self.tuning = tuning;
    }

    pub fn tuning(&self) -> &InputConfig {
        &self.tuning
    }

    pub fn wand_state(&self, slot: usize, hand: Hand) -> Option<&WandState> {
        self.slots.get(slot).map(|s| &s.wands[hand.index()])
    }

    /// Decode everything that arrived since the last tick
    pub fn poll(&mut self) -> Vec<InputEvent> {
        let pool = self.pool.clone();
        let mut events = Vec::new();

        for session in pool.sessions() {
            if !session.is_enabled() {
                continue;
            }
            let Some(glasses) = session.exclusive_glasses() else {
                continue;
            };
            events.extend(self.poll_slot(session, glasses));
        }

        events
    }

    fn poll_slot(&mut self, session: &DeviceSession, glasses: GlassesHandle) -> Vec<InputEvent> {
        let slot_index = session.slot_index();
        let prefix = session.control_prefix();

        if self.slots[slot_index].configured != Some(glasses) {
            match session.configure_wand_stream(glasses) {
                Ok(()) => {
                    debug!("{}: wand stream configured for {}", prefix, glasses);
                    self.slots[slot_index].configured = Some(glasses);
                }
                Err(e) => {
                    error!("{}: failed to configure wand stream: {}", prefix, e);
                    self.slots[slot_index].configured = None;
                    return Vec::new();
                }
            }
        }

        let old_wands = self.slots[slot_index].wands;
        self.refresh_roster(session, &prefix);
        self.drain_stream(session, glasses, &prefix);

        let tuning = &self.tuning;
        let slot = &mut self.slots[slot_index];
        let mut events = Vec::new();
        for hand in Hand::BOTH {
            let i = hand.index();
            let wand_prefix = events::wand_prefix(slot_index, hand);
            events.extend(events::emit_wand_events(
                &wand_prefix,
                &old_wands[i],
                &mut slot.wands[i],
                tuning,
            ));
        }
        events
    }

    /// Map the service's wand list onto the right and left hands
    ///
    /// A failed listing keeps the last known roster.
    fn refresh_roster(&mut self, session: &DeviceSession, prefix: &str) {
        let mut handles = match session.list_wands() {
            Ok(handles) => handles,
            Err(e) => {
                warn!("{}: failed to list wands: {}", prefix, e);
                return;
            }
        };
        handles.truncate(MAX_WANDS_PER_GLASSES);

        let wands = &mut self.slots[session.slot_index()].wands;
        for (index, wand) in wands.iter_mut().enumerate() {
            match handles.get(index) {
                Some(&handle) => {
                    wand.handle = Some(handle);
                    wand.connected = true;
                }
                None => {
                    wand.handle = None;
                    wand.connected = false;
                }
            }
        }
    }

    fn drain_stream(&mut self, session: &DeviceSession, glasses: GlassesHandle, prefix: &str) {
        let timeout = Duration::from_millis(self.tuning.read_timeout_ms);
        let max_events = self.tuning.max_events_per_tick;
        let wands = &mut self.slots[session.slot_index()].wands;

        let mut processed = 0;
        while processed < max_events {
            let event = match session.read_wand_event(glasses, timeout) {
                Ok(event) => event,
                Err(SdkError::Timeout) => break,
                Err(e) => {
                    error!("{}: failed to read wand stream: {}", prefix, e);
                    break;
                }
            };
            processed += 1;

            if matches!(event, WandStreamEvent::Desync { .. }) {
                continue;
            }
            let Some(wand) = wands.iter_mut().find(|w| w.handle == Some(event.wand())) else {
                trace!("{}: event for unknown wand {:?}", prefix, event.wand());
                continue;
            };

            match event {
                WandStreamEvent::Connect { .. } => wand.connected = true,
                WandStreamEvent::Disconnect { .. } => wand.connected = false,
                WandStreamEvent::Report { report, .. } => wand.merge(&WandUpdate::from_report(&report)),
                WandStreamEvent::Desync { .. } => {}
            }
        }

        if processed >= max_events {
            warn!("⚠️ {}: throttled wand stream input, read a maximum of {} events", prefix, processed);
        }
    }

    /// Send a haptic impulse to one wand
    ///
    /// Silently does nothing when the slot or hand is out of range, the slot
    /// has no exclusive glasses, or the wand is unknown.
    ///
    /// # Returns
    /// `true` when the impulse was handed to the service
    pub fn set_haptic_feedback(&self, slot: usize, hand: usize, feedback: HapticFeedback) -> bool {
        if slot >= MAX_SLOTS || hand >= MAX_WANDS_PER_GLASSES {
            return false;
        }
        let Some(session) = self.pool.session(slot) else {
            return false;
        };
        if session.exclusive_glasses().is_none() {
            return false;
        }
        let Some(wand) = self.slots[slot].wands[hand].handle else {
            return false;
        };

        match session.send_impulse(wand, feedback.amplitude, feedback.frequency) {
            Ok(()) => true,
            Err(e) => {
                debug!("{}: haptic impulse dropped: {}", session.control_prefix(), e);
                false
            }
        }
    }

    pub fn haptic_capabilities(&self) -> HapticCapabilities {
        HapticCapabilities::default()
    }

    pub fn tracking_status(&self, slot: usize, hand: Hand) -> TrackingStatus {
        let Some(wand) = self.wand_state(slot, hand) else {
            return TrackingStatus::NotTracked;
        };
        match (wand.handle.is_some() && wand.connected, wand.pose.is_some()) {
            (true, true) => TrackingStatus::Tracked,
            (true, false) => TrackingStatus::InertialOnly,
            _ => TrackingStatus::NotTracked,
        }
    }

    /// Wand pose in world units
    ///
    /// The grip frame is flipped half a turn about the right axis to match
    /// the engine's controller forward.
    pub fn controller_pose(&self, slot: usize, hand: Hand, world_to_meters: f32) -> Option<RigidTransform> {
        let wand = self.wand_state(slot, hand)?;
        if !wand.connected {
            return None;
        }
        let pose = wand.pose?;

        let rotation = pose.rotation * Quat::from_axis_angle(Vec3::Y, std::f32::consts::PI);
        let translation = pose.position * world_to_meters;
        if rotation.is_nan() || translation.is_nan() {
            trace!("player{}: NaN in {} wand pose", slot + 1, hand.name());
            return None;
        }
        Some(RigidTransform::new(rotation, translation))
    }
}
