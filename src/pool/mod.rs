//! Device pool: the fixed roster of player slots
//!
//! Owns one [`DeviceSession`] per slot, runs the discovery cadence with a
//! pool-wide round-robin cursor and answers roster-level queries (enabled
//! slots, spectated slot, version compatibility, status).

pub mod cadence;
pub mod discovery;
pub mod simulation;

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::config::AppConfig;
use crate::sdk::HardwareService;
use crate::session::{DeviceSession, RigidTransform, SessionPolicy, SlotPhase};

pub use cadence::PollCadence;
pub use discovery::RoundRobinCursor;
pub use simulation::{FrameSnapshot, SimulationContext};

/// Number of player slots
pub const MAX_SLOTS: usize = 4;

/// Serialisable view of one slot
#[derive(Debug, Clone, Serialize)]
pub struct SlotStatus {
    pub slot: usize,
    pub phase: SlotPhase,
    pub glasses_id: Option<String>,
    pub ipd: f32,
    pub version_compatible: bool,
    pub connected_since: Option<chrono::DateTime<chrono::Local>>,
}

struct Discovery {
    cursor: RoundRobinCursor,
    cadence: PollCadence,
}

/// All player slots sharing one hardware service
pub struct DevicePool {
    sessions: Vec<Arc<DeviceSession>>,
    spectated: AtomicUsize,
    discovery: Mutex<Discovery>,
}

impl DevicePool {
    pub fn new(service: Arc<dyn HardwareService>, policy: SessionPolicy, poll_interval_secs: f64) -> Self {
        let sessions = (0..MAX_SLOTS)
            .map(|slot| Arc::new(DeviceSession::new(slot, service.clone(), policy.clone())))
            .collect();

        Self {
            sessions,
            spectated: AtomicUsize::new(0),
            discovery: Mutex::new(Discovery {
                cursor: RoundRobinCursor::new(),
                cadence: PollCadence::new(poll_interval_secs),
            }),
        }
    }

    pub fn from_config(service: Arc<dyn HardwareService>, config: &AppConfig) -> Self {
        Self::new(
            service,
            SessionPolicy::from_config(config),
            config.session.poll_interval_secs,
        )
    }

    pub fn session(&self, slot: usize) -> Option<&Arc<DeviceSession>> {
        self.sessions.get(slot)
    }

    pub fn sessions(&self) -> &[Arc<DeviceSession>] {
        &self.sessions
    }

    pub fn set_poll_interval(&self, interval_secs: f64) {
        self.discovery.lock().cadence.set_interval(interval_secs);
    }

    /// Advance the discovery cadence
    ///
    /// # Arguments
    /// * `now` - Monotonic time in seconds
    ///
    /// # Returns
    /// `true` when a discovery/verification pass ran
    pub fn tick(&self, now: f64) -> bool {
        let mut discovery = self.discovery.lock();
        if !discovery.cadence.should_poll(now) {
            return false;
        }
        self.poll_devices(&mut discovery.cursor);
        true
    }

    /// Poll every slot once, whatever the cadence
    pub fn poll_now(&self) {
        let mut discovery = self.discovery.lock();
        self.poll_devices(&mut discovery.cursor);
    }

    fn poll_devices(&self, cursor: &mut RoundRobinCursor) {
        for session in &self.sessions {
            // One slot region at a time: collect the other slots' bindings first
            let bound: Vec<String> = self
                .sessions
                .iter()
                .filter(|other| other.slot_index() != session.slot_index())
                .filter_map(|other| other.glasses_id())
                .collect();

            let outcome = session.poll(cursor, &bound);
            debug!("{}: poll outcome {:?}", session.control_prefix(), outcome);
        }
    }

    /// Choose the slot mirrored to the spectator surface
    ///
    /// Out-of-range or disconnected slots are refused and the previous value
    /// is kept.
    pub fn set_spectated_player(&self, slot: usize) -> bool {
        let enabled = self.sessions.get(slot).is_some_and(|s| s.is_enabled());
        if !enabled {
            error!(
                "Cannot spectate player {}: slot is not connected (keeping player {})",
                slot + 1,
                self.spectated_player() + 1
            );
            return false;
        }

        let previous = self.spectated.swap(slot, Ordering::Relaxed);
        if previous != slot {
            info!("Spectating player {}", slot + 1);
        }
        true
    }

    pub fn spectated_player(&self) -> usize {
        self.spectated.load(Ordering::Relaxed)
    }

    /// Indexes of slots currently holding exclusive glasses
    pub fn enumerate_enabled(&self) -> Vec<usize> {
        self.sessions
            .iter()
            .filter(|s| s.is_enabled())
            .map(|s| s.slot_index())
            .collect()
    }

    /// False as soon as any slot has seen a service version mismatch
    pub fn is_version_compatible(&self) -> bool {
        self.sessions.iter().all(|s| s.is_version_compatible())
    }

    pub fn is_device_available(&self, slot: usize) -> bool {
        self.sessions
            .get(slot)
            .is_some_and(|s| s.is_device_available())
    }

    /// Forward a late pose correction to a slot's presentation side
    pub fn apply_late_update(&self, slot: usize, transform: RigidTransform) -> bool {
        match self.sessions.get(slot) {
            Some(session) if session.is_enabled() => {
                session.set_late_update(transform);
                true
            }
            _ => false,
        }
    }

    pub fn status(&self) -> Vec<SlotStatus> {
        self.sessions
            .iter()
            .map(|s| {
                let claim = s.claim();
                SlotStatus {
                    slot: s.slot_index(),
                    phase: s.phase(),
                    glasses_id: claim.as_ref().map(|c| c.id.clone()),
                    ipd: s.ipd(),
                    version_compatible: s.is_version_compatible(),
                    connected_since: claim.map(|c| c.since),
                }
            })
            .collect()
    }

    /// Release every exclusive claim
    pub fn shutdown(&self) {
        for session in &self.sessions {
            session.shutdown();
        }
        info!("Device pool shut down");
    }
}
