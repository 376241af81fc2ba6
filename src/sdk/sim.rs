//! In-memory glasses service
//!
//! Behaves like the native service closely enough to drive the session state
//! machine, wand stream and frame submission without hardware. Failures can be
//! injected per operation and every interesting call is recorded.

use glam::{Quat, Vec2, Vec3};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tracing::{debug, trace};

use super::{
    ClientInfo, ConnectionState, FrameInfo, GameboardKind, GlassesHandle, GlassesParam,
    GlassesPose, GraphicsApi, HardwareService, NativeDevice, PoseUsage, SdkError, SdkResult,
    WandButtons, WandHandle, WandReport, WandStreamConfig, WandStreamEvent, MAX_WANDS_PER_GLASSES,
};

/// Description of one simulated pair of glasses
#[derive(Debug, Clone)]
pub struct SimDevice {
    pub id: String,
    /// Interpupillary distance in meters
    pub ipd: f64,
    /// Number of `TryAgain` answers before `ensure_ready` succeeds
    pub ready_after: u32,
    pub pose: GlassesPose,
    pub wands: Vec<WandHandle>,
}

impl SimDevice {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ipd: 0.059,
            ready_after: 0,
            pose: GlassesPose {
                rot_to_glasses: Quat::IDENTITY,
                pos_glasses: Vec3::new(0.0, -0.5, 0.5),
                gameboard: GameboardKind::Le,
            },
            wands: vec![WandHandle(1)],
        }
    }

    pub fn with_ipd(mut self, ipd: f64) -> Self {
        self.ipd = ipd;
        self
    }

    pub fn with_ready_after(mut self, attempts: u32) -> Self {
        self.ready_after = attempts;
        self
    }

    pub fn with_wands(mut self, wands: Vec<WandHandle>) -> Self {
        self.wands = wands;
        self
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.pose.pos_glasses = position;
        self
    }
}

/// Errors to return from specific operations instead of simulating them
#[derive(Debug, Clone, Default)]
pub struct Faults {
    pub list: Option<SdkError>,
    pub create: Option<SdkError>,
    pub reserve: Option<SdkError>,
    /// Returned by `ensure_ready` instead of the usual `TryAgain` countdown
    pub ready: Option<SdkError>,
    pub ipd: Option<SdkError>,
    pub pose: Option<SdkError>,
    pub configure_stream: Option<SdkError>,
    pub list_wands: Option<SdkError>,
    pub graphics: Option<SdkError>,
    pub send_frame: Option<SdkError>,
    /// Wand stream never runs dry
    pub endless_stream: bool,
}

/// Calls observed by the simulated service
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    pub list_glasses: usize,
    pub created: Vec<String>,
    /// (glasses id, display name)
    pub reserved: Vec<(String, String)>,
    pub released: Vec<GlassesHandle>,
    pub destroyed: Vec<GlassesHandle>,
    pub ensure_ready: usize,
    pub stream_configs: usize,
    pub stream_reads: usize,
    pub graphics_inits: Vec<(GlassesHandle, GraphicsApi)>,
    pub frames: Vec<(GlassesHandle, FrameInfo)>,
    pub impulses: Vec<(GlassesHandle, WandHandle, f32, f32)>,
}

struct SimGlasses {
    device: SimDevice,
    reserved_by: Option<GlassesHandle>,
    ready: bool,
    try_again_left: u32,
    stream_enabled: bool,
    events: VecDeque<WandStreamEvent>,
}

impl SimGlasses {
    fn new(device: SimDevice) -> Self {
        Self {
            device,
            reserved_by: None,
            ready: false,
            try_again_left: 0,
            stream_enabled: false,
            events: VecDeque::new(),
        }
    }

    fn is_exclusive_for(&self, handle: GlassesHandle) -> bool {
        self.reserved_by == Some(handle) && self.ready
    }
}

#[derive(Default)]
struct SimState {
    devices: Vec<SimGlasses>,
    handles: HashMap<GlassesHandle, String>,
    next_handle: u64,
    faults: Faults,
    calls: CallLog,
}

impl SimState {
    fn glasses_mut(&mut self, handle: GlassesHandle) -> SdkResult<&mut SimGlasses> {
        let id = self.handles.get(&handle).ok_or(SdkError::InvalidArgs)?.clone();
        self.devices
            .iter_mut()
            .find(|g| g.device.id == id)
            .ok_or(SdkError::Unavailable)
    }
}

/// Simulated glasses service
pub struct SimulatedService {
    client: ClientInfo,
    state: Mutex<SimState>,
}

impl SimulatedService {
    /// Create a service context for the given client
    pub fn new(client: ClientInfo) -> Self {
        debug!(
            "Simulated service context created for {} {}",
            client.application_id, client.application_version
        );
        Self {
            client,
            state: Mutex::new(SimState {
                next_handle: 1,
                ..SimState::default()
            }),
        }
    }

    pub fn with_devices(client: ClientInfo, devices: Vec<SimDevice>) -> Self {
        let service = Self::new(client);
        for device in devices {
            service.add_device(device);
        }
        service
    }

    pub fn client_info(&self) -> &ClientInfo {
        &self.client
    }

    /// Make a pair of glasses visible
    pub fn add_device(&self, device: SimDevice) {
        self.state.lock().devices.push(SimGlasses::new(device));
    }

    /// Unplug a pair of glasses; outstanding handles report `Disconnected`
    pub fn remove_device(&self, id: &str) {
        self.state.lock().devices.retain(|g| g.device.id != id);
    }

    /// Change the answers of specific operations
    pub fn inject(&self, f: impl FnOnce(&mut Faults)) {
        f(&mut self.state.lock().faults);
    }

    pub fn calls(&self) -> CallLog {
        self.state.lock().calls.clone()
    }

    pub fn set_pose(&self, id: &str, pose: GlassesPose) {
        if let Some(g) = self.state.lock().devices.iter_mut().find(|g| g.device.id == id) {
            g.device.pose = pose;
        }
    }

    /// Queue a wand stream event for the given glasses
    pub fn push_wand_event(&self, id: &str, event: WandStreamEvent) {
        if let Some(g) = self.state.lock().devices.iter_mut().find(|g| g.device.id == id) {
            g.events.push_back(event);
        }
    }

    /// Advance a gentle demo motion: glasses yaw around the board and the first
    /// wand's stick traces a circle
    pub fn animate(&self, t_secs: f64) {
        let mut state = self.state.lock();
        for (idx, g) in state.devices.iter_mut().enumerate() {
            let phase = t_secs as f32 * 0.25 + idx as f32;
            g.device.pose.rot_to_glasses = Quat::from_rotation_z(phase.sin() * 0.3);
            if !(g.stream_enabled && g.ready) {
                continue;
            }
            if let Some(&wand) = g.device.wands.first() {
                let report = WandReport {
                    analog_valid: true,
                    stick: Vec2::new(phase.cos(), phase.sin()),
                    trigger: (phase * 0.5).sin().abs(),
                    buttons_valid: true,
                    buttons: WandButtons {
                        t5: phase.sin() > 0.9,
                        ..WandButtons::default()
                    },
                    ..WandReport::default()
                };
                g.events.push_back(WandStreamEvent::Report { wand, report });
            }
        }
    }
}

impl HardwareService for SimulatedService {
    fn list_glasses(&self) -> SdkResult<Vec<String>> {
        let mut state = self.state.lock();
        state.calls.list_glasses += 1;
        if let Some(err) = state.faults.list.clone() {
            return Err(err);
        }
        Ok(state.devices.iter().map(|g| g.device.id.clone()).collect())
    }

    fn create_glasses(&self, id: &str) -> SdkResult<GlassesHandle> {
        let mut state = self.state.lock();
        if let Some(err) = state.faults.create.clone() {
            return Err(err);
        }
        if !state.devices.iter().any(|g| g.device.id == id) {
            return Err(SdkError::Unavailable);
        }
        let handle = GlassesHandle(state.next_handle);
        state.next_handle += 1;
        state.handles.insert(handle, id.to_string());
        state.calls.created.push(id.to_string());
        trace!("Created {} for {}", handle, id);
        Ok(handle)
    }

    fn reserve_glasses(&self, glasses: GlassesHandle, display_name: &str) -> SdkResult<()> {
        let mut state = self.state.lock();
        if let Some(err) = state.faults.reserve.clone() {
            return Err(err);
        }
        let g = state.glasses_mut(glasses)?;
        match g.reserved_by {
            Some(owner) if owner != glasses => return Err(SdkError::Unavailable),
            _ => {}
        }
        g.reserved_by = Some(glasses);
        g.ready = false;
        g.try_again_left = g.device.ready_after;
        let id = g.device.id.clone();
        state.calls.reserved.push((id, display_name.to_string()));
        Ok(())
    }

    fn release_glasses(&self, glasses: GlassesHandle) -> SdkResult<()> {
        let mut state = self.state.lock();
        state.calls.released.push(glasses);
        if let Ok(g) = state.glasses_mut(glasses) {
            if g.reserved_by == Some(glasses) {
                g.reserved_by = None;
                g.ready = false;
                g.stream_enabled = false;
            }
        }
        Ok(())
    }

    fn destroy_glasses(&self, glasses: GlassesHandle) {
        let mut state = self.state.lock();
        state.calls.destroyed.push(glasses);
        if let Ok(g) = state.glasses_mut(glasses) {
            if g.reserved_by == Some(glasses) {
                g.reserved_by = None;
                g.ready = false;
                g.stream_enabled = false;
            }
        }
        state.handles.remove(&glasses);
    }

    fn connection_state(&self, glasses: GlassesHandle) -> SdkResult<ConnectionState> {
        let mut state = self.state.lock();
        let g = match state.glasses_mut(glasses) {
            Ok(g) => g,
            Err(SdkError::Unavailable) => return Ok(ConnectionState::Disconnected),
            Err(e) => return Err(e),
        };
        Ok(match g.reserved_by {
            Some(owner) if owner == glasses && g.ready => ConnectionState::ExclusiveConnection,
            Some(owner) if owner == glasses => ConnectionState::ExclusiveReservation,
            _ => ConnectionState::NotExclusivelyConnected,
        })
    }

    fn ensure_ready(&self, glasses: GlassesHandle) -> SdkResult<()> {
        let mut state = self.state.lock();
        state.calls.ensure_ready += 1;
        if let Some(err) = state.faults.ready.clone() {
            return Err(err);
        }
        let g = state.glasses_mut(glasses)?;
        if g.reserved_by != Some(glasses) {
            return Err(SdkError::InvalidArgs);
        }
        if g.try_again_left > 0 {
            g.try_again_left -= 1;
            return Err(SdkError::TryAgain);
        }
        g.ready = true;
        Ok(())
    }

    fn float_param(&self, glasses: GlassesHandle, param: GlassesParam) -> SdkResult<f64> {
        let mut state = self.state.lock();
        if let Some(err) = state.faults.ipd.clone() {
            return Err(err);
        }
        let g = state.glasses_mut(glasses)?;
        match param {
            GlassesParam::Ipd => Ok(g.device.ipd),
        }
    }

    fn glasses_pose(&self, glasses: GlassesHandle, _usage: PoseUsage) -> SdkResult<GlassesPose> {
        let mut state = self.state.lock();
        if let Some(err) = state.faults.pose.clone() {
            return Err(err);
        }
        let g = state.glasses_mut(glasses)?;
        if !g.is_exclusive_for(glasses) {
            return Err(SdkError::Unavailable);
        }
        Ok(g.device.pose)
    }

    fn configure_wand_stream(&self, glasses: GlassesHandle, config: WandStreamConfig) -> SdkResult<()> {
        let mut state = self.state.lock();
        state.calls.stream_configs += 1;
        if let Some(err) = state.faults.configure_stream.clone() {
            return Err(err);
        }
        let g = state.glasses_mut(glasses)?;
        g.stream_enabled = config.enabled;
        Ok(())
    }

    fn read_wand_stream(&self, glasses: GlassesHandle, _timeout: Duration) -> SdkResult<WandStreamEvent> {
        let mut state = self.state.lock();
        state.calls.stream_reads += 1;
        let endless = state.faults.endless_stream;
        let g = state.glasses_mut(glasses)?;
        if !g.stream_enabled {
            return Err(SdkError::Unavailable);
        }
        if let Some(event) = g.events.pop_front() {
            return Ok(event);
        }
        if endless {
            let wand = g.device.wands.first().copied().unwrap_or(WandHandle(0));
            return Ok(WandStreamEvent::Report {
                wand,
                report: WandReport {
                    buttons_valid: true,
                    ..WandReport::default()
                },
            });
        }
        Err(SdkError::Timeout)
    }

    fn list_wands(&self, glasses: GlassesHandle) -> SdkResult<Vec<WandHandle>> {
        let mut state = self.state.lock();
        if let Some(err) = state.faults.list_wands.clone() {
            return Err(err);
        }
        let g = state.glasses_mut(glasses)?;
        Ok(g.device.wands.iter().copied().take(MAX_WANDS_PER_GLASSES).collect())
    }

    fn send_impulse(
        &self,
        glasses: GlassesHandle,
        wand: WandHandle,
        amplitude: f32,
        frequency: f32,
    ) -> SdkResult<()> {
        let mut state = self.state.lock();
        state.glasses_mut(glasses)?;
        state.calls.impulses.push((glasses, wand, amplitude, frequency));
        Ok(())
    }

    fn init_graphics_context(
        &self,
        glasses: GlassesHandle,
        api: GraphicsApi,
        _device: Option<NativeDevice>,
    ) -> SdkResult<()> {
        let mut state = self.state.lock();
        state.calls.graphics_inits.push((glasses, api));
        if let Some(err) = state.faults.graphics.clone() {
            return Err(err);
        }
        state.glasses_mut(glasses).map(|_| ())
    }

    fn send_frame(&self, glasses: GlassesHandle, frame: &FrameInfo) -> SdkResult<()> {
        let mut state = self.state.lock();
        if let Some(err) = state.faults.send_frame.clone() {
            return Err(err);
        }
        state.calls.frames.push((glasses, *frame));
        Ok(())
    }
}
