//! Configuration management for the T5 bridge
//!
//! Handles loading, parsing, and hot-reloading of YAML configuration files.
//! Every section is optional; missing fields take the documented defaults.

pub mod watcher;

use anyhow::{Context, Result};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::pool::MAX_SLOTS;
use crate::sdk::sim::SimDevice;
use crate::sdk::{ClientInfo, GraphicsApi, GraphicsBinding, NativeDevice, WandHandle, SDK_TYPE_ENGINE_PLUGIN};

pub use watcher::ConfigWatcher;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub application: ApplicationConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub graphics: GraphicsConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub simulator: SimulatorConfig,
}

/// Identification sent to the glasses service
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ApplicationConfig {
    /// Empty means the package name
    #[serde(default)]
    pub id: String,
    /// Empty means the package version
    #[serde(default)]
    pub version: String,
    /// Shown by the service while glasses are reserved; empty means `id`
    #[serde(default)]
    pub display_name: String,
}

impl ApplicationConfig {
    pub fn resolved_id(&self) -> String {
        if self.id.is_empty() {
            env!("CARGO_PKG_NAME").to_string()
        } else {
            self.id.clone()
        }
    }

    pub fn resolved_version(&self) -> String {
        if self.version.is_empty() {
            env!("CARGO_PKG_VERSION").to_string()
        } else {
            self.version.clone()
        }
    }

    pub fn resolved_display_name(&self) -> String {
        if self.display_name.is_empty() {
            self.resolved_id()
        } else {
            self.display_name.clone()
        }
    }

    pub fn client_info(&self) -> ClientInfo {
        ClientInfo {
            application_id: self.resolved_id(),
            application_version: self.resolved_version(),
            sdk_type: SDK_TYPE_ENGINE_PLUGIN,
        }
    }
}

/// Discovery cadence and readiness retry policy
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SessionConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: f64,
    #[serde(default = "default_ready_retry_limit")]
    pub ready_retry_limit: u32,
    #[serde(default = "default_ready_retry_delay_ms")]
    pub ready_retry_delay_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            ready_retry_limit: default_ready_retry_limit(),
            ready_retry_delay_ms: default_ready_retry_delay_ms(),
        }
    }
}

/// Wand decoding thresholds and budgets
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct InputConfig {
    #[serde(default = "default_stick_button_threshold")]
    pub stick_button_threshold: f32,
    #[serde(default = "default_stick_deadzone")]
    pub stick_deadzone: f32,
    #[serde(default = "default_trigger_button_threshold")]
    pub trigger_button_threshold: f32,
    #[serde(default = "default_trigger_deadzone")]
    pub trigger_deadzone: f32,
    #[serde(default = "default_axis_epsilon")]
    pub axis_epsilon: f32,
    #[serde(default = "default_max_events_per_tick")]
    pub max_events_per_tick: usize,
    #[serde(default)]
    pub read_timeout_ms: u64,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            stick_button_threshold: default_stick_button_threshold(),
            stick_deadzone: default_stick_deadzone(),
            trigger_button_threshold: default_trigger_button_threshold(),
            trigger_deadzone: default_trigger_deadzone(),
            axis_epsilon: default_axis_epsilon(),
            max_events_per_tick: default_max_events_per_tick(),
            read_timeout_ms: 0,
        }
    }
}

/// Shared render target size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct RenderTargetConfig {
    #[serde(default = "default_rt_width")]
    pub width: u32,
    #[serde(default = "default_rt_height")]
    pub height: u32,
}

impl Default for RenderTargetConfig {
    fn default() -> Self {
        Self {
            width: default_rt_width(),
            height: default_rt_height(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DisplayConfig {
    #[serde(default = "default_fov")]
    pub fov_degrees: f32,
    /// Per-slot FOV, entry `i` applies to player `i + 1`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub player_fov: Vec<f32>,
    #[serde(default)]
    pub render_target: RenderTargetConfig,
    #[serde(default = "default_world_to_meters")]
    pub world_to_meters: f32,
    #[serde(default)]
    pub srgb: bool,
    /// Re-read the glasses pose at presentation time
    #[serde(default)]
    pub refetch_presentation_pose: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            fov_degrees: default_fov(),
            player_fov: Vec::new(),
            render_target: RenderTargetConfig::default(),
            world_to_meters: default_world_to_meters(),
            srgb: false,
            refetch_presentation_pose: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct GraphicsConfig {
    #[serde(default)]
    pub api: GraphicsApi,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native_device: Option<usize>,
}

impl GraphicsConfig {
    pub fn binding(&self) -> GraphicsBinding {
        GraphicsBinding {
            api: self.api,
            native_device: self.native_device.map(NativeDevice),
        }
    }
}

/// Loop rates of the simulation and presentation threads
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RuntimeConfig {
    #[serde(default = "default_hz")]
    pub simulation_hz: f64,
    #[serde(default = "default_hz")]
    pub presentation_hz: f64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            simulation_hz: default_hz(),
            presentation_hz: default_hz(),
        }
    }
}

/// Glasses exposed by the simulated service
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SimulatorConfig {
    #[serde(default = "default_sim_devices")]
    pub devices: Vec<SimDeviceConfig>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            devices: default_sim_devices(),
        }
    }
}

impl SimulatorConfig {
    pub fn to_devices(&self) -> Vec<SimDevice> {
        self.devices.iter().map(SimDeviceConfig::to_device).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SimDeviceConfig {
    pub id: String,
    #[serde(default = "default_sim_ipd")]
    pub ipd: f64,
    /// Number of "try again" answers before the glasses report ready
    #[serde(default)]
    pub ready_after: u32,
    #[serde(default = "default_sim_wands")]
    pub wands: u8,
    /// Glasses position on the board in meters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<[f32; 3]>,
}

impl SimDeviceConfig {
    pub fn to_device(&self) -> SimDevice {
        let wands = (1..=self.wands).map(WandHandle).collect();
        let mut device = SimDevice::new(self.id.clone())
            .with_ipd(self.ipd)
            .with_ready_after(self.ready_after)
            .with_wands(wands);
        if let Some(position) = self.position {
            device = device.with_position(Vec3::from_array(position));
        }
        device
    }
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: AppConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML config: {}", path))?;

        config.validate()?;

        Ok(config)
    }

    /// Load the file if it exists, defaults otherwise
    pub async fn load_or_default(path: &str) -> Result<Self> {
        if fs::try_exists(path).await.unwrap_or(false) {
            Self::load(path).await
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub async fn save(&self, path: &str) -> Result<()> {
        let yaml = serde_yaml::to_string(self)
            .context("Failed to serialize config to YAML")?;

        fs::write(path, yaml)
            .await
            .with_context(|| format!("Failed to write config file: {}", path))?;

        Ok(())
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        let session = &self.session;
        if !(session.poll_interval_secs > 0.0) {
            anyhow::bail!(
                "session.poll_interval_secs must be positive (got {})",
                session.poll_interval_secs
            );
        }
        if session.ready_retry_limit == 0 {
            anyhow::bail!("session.ready_retry_limit must be at least 1");
        }

        let input = &self.input;
        for (name, value) in [
            ("stick_button_threshold", input.stick_button_threshold),
            ("stick_deadzone", input.stick_deadzone),
            ("trigger_button_threshold", input.trigger_button_threshold),
            ("trigger_deadzone", input.trigger_deadzone),
        ] {
            if !(0.0..1.0).contains(&value) {
                anyhow::bail!("input.{} must be in [0, 1) (got {})", name, value);
            }
        }
        if input.max_events_per_tick == 0 {
            anyhow::bail!("input.max_events_per_tick must be at least 1");
        }

        let display = &self.display;
        if !(display.world_to_meters.is_finite() && display.world_to_meters > 0.0) {
            anyhow::bail!(
                "display.world_to_meters must be positive and finite (got {})",
                display.world_to_meters
            );
        }
        if display.render_target.width < 2 || display.render_target.height < 4 {
            anyhow::bail!(
                "display.render_target {}x{} is too small (minimum 2x4)",
                display.render_target.width,
                display.render_target.height
            );
        }
        if display.player_fov.len() > MAX_SLOTS {
            anyhow::bail!(
                "display.player_fov has {} entries, at most {} players are supported",
                display.player_fov.len(),
                MAX_SLOTS
            );
        }
        for (idx, fov) in std::iter::once(&display.fov_degrees)
            .chain(display.player_fov.iter())
            .enumerate()
        {
            if !(*fov > 0.0 && *fov < 180.0) {
                let what = if idx == 0 {
                    "display.fov_degrees".to_string()
                } else {
                    format!("display.player_fov[{}]", idx - 1)
                };
                anyhow::bail!("{} must be in (0, 180) (got {})", what, fov);
            }
        }

        if !(self.runtime.simulation_hz > 0.0 && self.runtime.presentation_hz > 0.0) {
            anyhow::bail!("runtime rates must be positive");
        }

        for (idx, device) in self.simulator.devices.iter().enumerate() {
            if device.id.is_empty() {
                anyhow::bail!("simulator.devices[{}] id cannot be empty", idx);
            }
        }

        Ok(())
    }
}

// Default value functions
fn default_poll_interval_secs() -> f64 { 1.0 }
fn default_ready_retry_limit() -> u32 { 10 }
fn default_ready_retry_delay_ms() -> u64 { 100 }
fn default_stick_button_threshold() -> f32 { 0.3 }
fn default_stick_deadzone() -> f32 { 0.15 }
fn default_trigger_button_threshold() -> f32 { 0.5 }
fn default_trigger_deadzone() -> f32 { 0.07 }
fn default_axis_epsilon() -> f32 { 1e-3 }
fn default_max_events_per_tick() -> usize { 1000 }
fn default_rt_width() -> u32 { 2432 }
fn default_rt_height() -> u32 { 3072 }
fn default_fov() -> f32 { 70.0 }
fn default_world_to_meters() -> f32 { 100.0 }
fn default_hz() -> f64 { 60.0 }
fn default_sim_ipd() -> f64 { 0.059 }
fn default_sim_wands() -> u8 { 1 }
fn default_sim_devices() -> Vec<SimDeviceConfig> {
    vec![SimDeviceConfig {
        id: "T5-SIM-0001".to_string(),
        ipd: default_sim_ipd(),
        ready_after: 0,
        wands: default_sim_wands(),
        position: None,
    }]
}
