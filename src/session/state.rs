//! Slot state machine values

use chrono::{DateTime, Local};
use serde::Serialize;

use super::pose::RigidTransform;
use crate::sdk::GlassesHandle;

/// Externally visible phase of a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotPhase {
    Disconnected,
    Discovering,
    Reserving,
    WaitingReady,
    ExclusiveReady,
}

/// Glasses exclusively held by a slot
#[derive(Debug, Clone)]
pub struct ExclusiveClaim {
    pub glasses: GlassesHandle,
    pub id: String,
    pub since: DateTime<Local>,
}

/// State of a slot, carrying the handle owned in each phase
#[derive(Debug, Clone)]
pub(crate) enum SlotState {
    Disconnected,
    Discovering,
    Reserving { glasses: GlassesHandle, id: String },
    WaitingReady { glasses: GlassesHandle, id: String },
    ExclusiveReady(ExclusiveClaim),
}

impl SlotState {
    pub(crate) fn phase(&self) -> SlotPhase {
        match self {
            SlotState::Disconnected => SlotPhase::Disconnected,
            SlotState::Discovering => SlotPhase::Discovering,
            SlotState::Reserving { .. } => SlotPhase::Reserving,
            SlotState::WaitingReady { .. } => SlotPhase::WaitingReady,
            SlotState::ExclusiveReady(_) => SlotPhase::ExclusiveReady,
        }
    }

    pub(crate) fn claim(&self) -> Option<&ExclusiveClaim> {
        match self {
            SlotState::ExclusiveReady(claim) => Some(claim),
            _ => None,
        }
    }
}

/// Everything guarded by the slot's hardware region
#[derive(Debug)]
pub(crate) struct SlotHardware {
    pub state: SlotState,
    /// Glasses the graphics context was last initialized for
    pub graphics_ready_for: Option<GlassesHandle>,
    /// Glasses whose graphics init failure has already been reported
    pub graphics_failure_logged_for: Option<GlassesHandle>,
    /// Pose correction delivered after the simulation step published
    pub late_update: Option<RigidTransform>,
}

impl SlotHardware {
    pub(crate) fn new() -> Self {
        Self {
            state: SlotState::Disconnected,
            graphics_ready_for: None,
            graphics_failure_logged_for: None,
            late_update: None,
        }
    }

    pub(crate) fn exclusive_glasses(&self) -> Option<GlassesHandle> {
        self.state.claim().map(|c| c.glasses)
    }
}

/// Result of one discovery/verification pass over a slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Slot already exclusive and the connection is still good
    StillExclusive,
    /// Nothing to claim (no visible glasses for this slot)
    NoCandidate,
    /// Glasses became exclusive
    Claimed { id: String },
    /// Service not reachable yet or busy; retried on the next cadence
    Transient,
    /// Service version mismatch
    Incompatible,
    /// Readiness retries ran out
    RetriesExhausted,
    /// Any other failure while claiming
    Failed,
    /// Exclusive glasses were lost and released
    Lost,
}
