//! Per-slot glasses session
//!
//! A [`DeviceSession`] walks one slot through
//! `Disconnected → Discovering → Reserving → WaitingReady → ExclusiveReady`
//! and back. Every hardware call that touches the slot's glasses runs inside
//! the slot's hardware region; draining the wand stream uses a second region
//! so configuration and reads never interleave.

pub mod pose;
pub mod state;

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, trace, warn};

use crate::config::AppConfig;
use crate::pool::RoundRobinCursor;
use crate::sdk::{
    ConnectionState, FrameInfo, GlassesHandle, GlassesParam, GraphicsBinding, HardwareService,
    PoseUsage, SdkError, SdkResult, WandHandle, WandStreamConfig, WandStreamEvent,
};

pub use pose::{PoseSnapshot, RigidTransform, WorldState};
pub use state::{ExclusiveClaim, PollOutcome, SlotPhase};

use state::{SlotHardware, SlotState};

/// IPD reported until the glasses tell us otherwise (meters)
pub const DEFAULT_IPD: f32 = 0.064;

/// Claim policy shared by all slots
#[derive(Debug, Clone)]
pub struct SessionPolicy {
    /// Name shown by the service for reservations
    pub display_name: String,
    pub ready_retry_limit: u32,
    pub ready_retry_delay: Duration,
}

impl SessionPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            display_name: config.application.resolved_display_name(),
            ready_retry_limit: config.session.ready_retry_limit,
            ready_retry_delay: Duration::from_millis(config.session.ready_retry_delay_ms),
        }
    }
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            display_name: env!("CARGO_PKG_NAME").to_string(),
            ready_retry_limit: 10,
            ready_retry_delay: Duration::from_millis(100),
        }
    }
}

/// Frame submission failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("slot has no exclusive glasses")]
    NotExclusive,

    #[error("graphics context init failed: {0}")]
    GraphicsInit(SdkError),

    #[error("failed to send frame: {0}")]
    Send(SdkError),
}

/// One player slot bound to at most one pair of glasses
pub struct DeviceSession {
    slot_index: usize,
    service: Arc<dyn HardwareService>,
    policy: SessionPolicy,
    hardware: Mutex<SlotHardware>,
    stream: Mutex<()>,
    /// f32 bits of the cached IPD
    ipd: AtomicU32,
    version_compatible: AtomicBool,
    enabled: AtomicBool,
}

impl DeviceSession {
    pub fn new(slot_index: usize, service: Arc<dyn HardwareService>, policy: SessionPolicy) -> Self {
        Self {
            slot_index,
            service,
            policy,
            hardware: Mutex::new(SlotHardware::new()),
            stream: Mutex::new(()),
            ipd: AtomicU32::new(DEFAULT_IPD.to_bits()),
            version_compatible: AtomicBool::new(true),
            enabled: AtomicBool::new(false),
        }
    }

    pub fn slot_index(&self) -> usize {
        self.slot_index
    }

    /// Log/control prefix for this slot (e.g., "player1")
    pub fn control_prefix(&self) -> String {
        format!("player{}", self.slot_index + 1)
    }

    /// Whether the slot currently holds exclusive, ready glasses
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn phase(&self) -> SlotPhase {
        self.hardware.lock().state.phase()
    }

    pub fn exclusive_glasses(&self) -> Option<GlassesHandle> {
        self.hardware.lock().exclusive_glasses()
    }

    pub fn claim(&self) -> Option<ExclusiveClaim> {
        self.hardware.lock().state.claim().cloned()
    }

    pub fn glasses_id(&self) -> Option<String> {
        self.hardware.lock().state.claim().map(|c| c.id.clone())
    }

    /// Cached interpupillary distance in meters
    pub fn ipd(&self) -> f32 {
        f32::from_bits(self.ipd.load(Ordering::Relaxed))
    }

    pub fn is_version_compatible(&self) -> bool {
        self.version_compatible.load(Ordering::Relaxed)
    }

    /// Run one discovery or verification pass
    ///
    /// # Arguments
    /// * `cursor` - Pool-wide round-robin cursor, advanced once per claim attempt
    /// * `bound` - Identifiers currently held by other slots
    pub fn poll(&self, cursor: &mut RoundRobinCursor, bound: &[String]) -> PollOutcome {
        let mut hw = self.hardware.lock();

        if hw.state.claim().is_some() {
            return self.verify_connection(&mut hw);
        }

        self.discover_and_claim(&mut hw, cursor, bound)
    }

    fn discover_and_claim(
        &self,
        hw: &mut SlotHardware,
        cursor: &mut RoundRobinCursor,
        bound: &[String],
    ) -> PollOutcome {
        hw.state = SlotState::Discovering;

        let ids = match self.service.list_glasses() {
            Ok(ids) => ids,
            Err(e) => return self.abandon(hw, e, "list glasses"),
        };
        self.version_compatible.store(true, Ordering::Relaxed);

        if ids.len() <= self.slot_index {
            trace!("{}: no glasses available for this slot ({} visible)", self.control_prefix(), ids.len());
            hw.state = SlotState::Disconnected;
            return PollOutcome::NoCandidate;
        }

        let Some(id) = cursor.select(&ids, bound).map(str::to_owned) else {
            trace!("{}: every visible glasses is already bound", self.control_prefix());
            hw.state = SlotState::Disconnected;
            return PollOutcome::NoCandidate;
        };
        cursor.advance();

        let glasses = match self.service.create_glasses(&id) {
            Ok(glasses) => glasses,
            Err(e) => return self.abandon(hw, e, "create glasses"),
        };

        info!("{}: reserving glasses with ID: {}", self.control_prefix(), id);
        hw.state = SlotState::Reserving {
            glasses,
            id: id.clone(),
        };

        if let Err(e) = self.service.reserve_glasses(glasses, &self.policy.display_name) {
            self.service.destroy_glasses(glasses);
            return self.abandon(hw, e, "reserve glasses");
        }

        debug!("{}: reserved glasses {}", self.control_prefix(), id);
        hw.state = SlotState::WaitingReady {
            glasses,
            id: id.clone(),
        };

        if let Err(outcome) = self.wait_until_ready(glasses, &id) {
            self.drop_glasses(glasses);
            hw.state = SlotState::Disconnected;
            return outcome;
        }

        self.cache_ipd(glasses);

        hw.state = SlotState::ExclusiveReady(ExclusiveClaim {
            glasses,
            id: id.clone(),
            since: chrono::Local::now(),
        });
        hw.late_update = None;
        self.enabled.store(true, Ordering::Release);

        info!("✅ {}: glasses made exclusive: {}", self.control_prefix(), id);
        PollOutcome::Claimed { id }
    }

    /// Poll readiness with a bounded number of `TryAgain` retries
    fn wait_until_ready(&self, glasses: GlassesHandle, id: &str) -> Result<(), PollOutcome> {
        let limit = self.policy.ready_retry_limit.max(1);

        for attempt in 1..=limit {
            match self.service.ensure_ready(glasses) {
                Ok(()) => return Ok(()),
                Err(SdkError::TryAgain) if attempt < limit => {
                    debug!(
                        "{}: glasses {} not ready, trying again ({}/{})",
                        self.control_prefix(),
                        id,
                        attempt,
                        limit
                    );
                    std::thread::sleep(self.policy.ready_retry_delay);
                }
                Err(SdkError::TryAgain) => {
                    error!(
                        "{}: glasses {} not ready after {} attempts, releasing",
                        self.control_prefix(),
                        id,
                        limit
                    );
                    return Err(PollOutcome::RetriesExhausted);
                }
                Err(e) => {
                    error!(
                        "{}: failed to ensure glasses {} are ready, releasing: {}",
                        self.control_prefix(),
                        id,
                        e
                    );
                    return Err(PollOutcome::Failed);
                }
            }
        }

        Err(PollOutcome::RetriesExhausted)
    }

    fn cache_ipd(&self, glasses: GlassesHandle) {
        match self.service.float_param(glasses, GlassesParam::Ipd) {
            Ok(ipd) => {
                self.version_compatible.store(true, Ordering::Relaxed);
                self.ipd.store((ipd as f32).to_bits(), Ordering::Relaxed);
                debug!("{}: IPD {:.4} m", self.control_prefix(), ipd);
            }
            Err(SdkError::ServiceIncompatible) => {
                self.version_compatible.store(false, Ordering::Relaxed);
                error!("{}: version incompatible, needs service upgrade", self.control_prefix());
            }
            Err(e) => {
                error!("{}: failed to retrieve IPD value: {}", self.control_prefix(), e);
            }
        }
    }

    /// Classify a discovery failure and return the slot to `Disconnected`
    fn abandon(&self, hw: &mut SlotHardware, err: SdkError, op: &str) -> PollOutcome {
        hw.state = SlotState::Disconnected;

        match err {
            SdkError::ServiceIncompatible => {
                self.version_compatible.store(false, Ordering::Relaxed);
                error!("{}: version incompatible, needs service upgrade", self.control_prefix());
                PollOutcome::Incompatible
            }
            e if e.is_transient() => {
                trace!("{}: {} not possible yet: {}", self.control_prefix(), op, e);
                PollOutcome::Transient
            }
            e => {
                error!("{}: failed to {}: {}", self.control_prefix(), op, e);
                PollOutcome::Failed
            }
        }
    }

    fn verify_connection(&self, hw: &mut SlotHardware) -> PollOutcome {
        let Some(glasses) = hw.exclusive_glasses() else {
            return PollOutcome::NoCandidate;
        };

        match self.service.connection_state(glasses) {
            Ok(ConnectionState::ExclusiveConnection) => PollOutcome::StillExclusive,
            other => {
                let reason = match other {
                    Ok(state) => format!("{:?}", state),
                    Err(e) => e.to_string(),
                };
                warn!("🔌 {}: lost connection to glasses: {}", self.control_prefix(), reason);
                self.release_claim(hw);
                PollOutcome::Lost
            }
        }
    }

    fn drop_glasses(&self, glasses: GlassesHandle) {
        if let Err(e) = self.service.release_glasses(glasses) {
            debug!("{}: release of {} failed: {}", self.control_prefix(), glasses, e);
        }
        self.service.destroy_glasses(glasses);
    }

    fn release_claim(&self, hw: &mut SlotHardware) {
        if let SlotState::ExclusiveReady(claim) =
            std::mem::replace(&mut hw.state, SlotState::Disconnected)
        {
            self.drop_glasses(claim.glasses);
        }
        hw.graphics_ready_for = None;
        hw.late_update = None;
        self.enabled.store(false, Ordering::Release);
    }

    /// Release exclusive glasses, if any
    pub fn shutdown(&self) {
        let mut hw = self.hardware.lock();
        if let Some(claim) = hw.state.claim() {
            info!("{}: releasing glasses {}", self.control_prefix(), claim.id);
        }
        self.release_claim(&mut hw);
    }

    /// Whether glasses are usable by this slot right now or could be claimed
    pub fn is_device_available(&self) -> bool {
        let hw = self.hardware.lock();
        if hw.state.claim().is_some() {
            return true;
        }
        match self.service.list_glasses() {
            Ok(ids) => {
                self.version_compatible.store(true, Ordering::Relaxed);
                ids.len() > self.slot_index
            }
            Err(SdkError::ServiceIncompatible) => {
                self.version_compatible.store(false, Ordering::Relaxed);
                error!("{}: version incompatible, needs service upgrade", self.control_prefix());
                false
            }
            Err(_) => false,
        }
    }

    /// Read the current glasses pose, converted to engine space
    pub fn fetch_pose(&self, usage: PoseUsage, world_to_meters: f32) -> PoseSnapshot {
        let hw = self.hardware.lock();
        let Some(glasses) = hw.exclusive_glasses() else {
            return PoseSnapshot::invalid(world_to_meters);
        };

        match self.service.glasses_pose(glasses, usage) {
            Ok(pose) => PoseSnapshot::from_hardware(&pose, world_to_meters),
            Err(e) => {
                trace!("{}: pose unavailable: {}", self.control_prefix(), e);
                PoseSnapshot::invalid(world_to_meters)
            }
        }
    }

    /// Store a pose correction for the next presentation step
    pub fn set_late_update(&self, transform: RigidTransform) {
        let mut hw = self.hardware.lock();
        if hw.state.claim().is_some() {
            hw.late_update = Some(transform);
        }
    }

    pub fn take_late_update(&self) -> Option<RigidTransform> {
        self.hardware.lock().late_update.take()
    }

    /// Enable the wand stream for the given glasses
    pub fn configure_wand_stream(&self, glasses: GlassesHandle) -> SdkResult<()> {
        let _hw = self.hardware.lock();
        let _stream = self.stream.lock();
        self.service
            .configure_wand_stream(glasses, WandStreamConfig { enabled: true })
    }

    /// List wands paired with the current exclusive glasses
    pub fn list_wands(&self) -> SdkResult<Vec<WandHandle>> {
        let hw = self.hardware.lock();
        let glasses = hw.exclusive_glasses().ok_or(SdkError::Unavailable)?;
        self.service.list_wands(glasses)
    }

    /// Read one wand stream event without touching the hardware region
    pub fn read_wand_event(&self, glasses: GlassesHandle, timeout: Duration) -> SdkResult<WandStreamEvent> {
        let _stream = self.stream.lock();
        self.service.read_wand_stream(glasses, timeout)
    }

    /// Forward a haptic impulse to a wand of the exclusive glasses
    pub fn send_impulse(&self, wand: WandHandle, amplitude: f32, frequency: f32) -> SdkResult<()> {
        let hw = self.hardware.lock();
        let glasses = hw.exclusive_glasses().ok_or(SdkError::Unavailable)?;
        self.service.send_impulse(glasses, wand, amplitude, frequency)
    }

    /// Submit one frame, initializing the graphics context first if the
    /// exclusive glasses changed since the last successful init
    pub fn submit_frame(&self, frame: &FrameInfo, graphics: &GraphicsBinding) -> Result<(), FrameError> {
        let mut hw = self.hardware.lock();
        let glasses = hw.exclusive_glasses().ok_or(FrameError::NotExclusive)?;

        if hw.graphics_ready_for != Some(glasses) {
            if let Err(e) = self
                .service
                .init_graphics_context(glasses, graphics.api, graphics.native_device)
            {
                if hw.graphics_failure_logged_for != Some(glasses) {
                    error!("{}: failed to initialize graphics context: {}", self.control_prefix(), e);
                    hw.graphics_failure_logged_for = Some(glasses);
                } else {
                    trace!("{}: graphics context still failing: {}", self.control_prefix(), e);
                }
                return Err(FrameError::GraphicsInit(e));
            }
            info!("{}: graphics context initialized ({:?})", self.control_prefix(), graphics.api);
            hw.graphics_ready_for = Some(glasses);
        }

        self.service.send_frame(glasses, frame).map_err(|e| {
            error!("{}: failed to send frame: {}", self.control_prefix(), e);
            FrameError::Send(e)
        })
    }
}

#[cfg(test)]
mod tests;
