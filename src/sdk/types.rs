//! Value types exchanged with the glasses service

use glam::{Quat, Vec2, Vec3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// SDK type bit advertised by engine plugins in [`ClientInfo`]
pub const SDK_TYPE_ENGINE_PLUGIN: u8 = 0b0010_0000;

/// Maximum number of wands tracked per pair of glasses
pub const MAX_WANDS_PER_GLASSES: usize = 2;

/// Opaque handle to a pair of glasses created from an identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GlassesHandle(pub u64);

impl fmt::Display for GlassesHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "glasses#{}", self.0)
    }
}

/// Opaque wand identifier, scoped to the glasses it is paired with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WandHandle(pub u8);

/// Native texture resource handed to the service with each frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TextureHandle(pub u64);

/// Native graphics device pointer, carried as an integer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeDevice(pub usize);

/// Identification sent when the service context is created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub application_id: String,
    pub application_version: String,
    pub sdk_type: u8,
}

/// Connection state reported for a pair of glasses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Reserved and ready for exclusive use by this client
    ExclusiveConnection,
    /// Reserved, not yet ready
    ExclusiveReservation,
    /// Connected but not reserved by this client
    NotExclusivelyConnected,
    Disconnected,
}

/// Kind of gameboard the glasses are tracking against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameboardKind {
    #[default]
    None,
    Le,
    Xe,
    XeRaised,
}

/// What a pose is going to be used for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoseUsage {
    GlassesPresentation,
    SpectatorPresentation,
}

/// Floating point glasses parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlassesParam {
    /// Interpupillary distance in meters
    Ipd,
}

/// Raw glasses pose in the hardware convention
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlassesPose {
    /// Rotation taking gameboard points into the glasses frame
    pub rot_to_glasses: Quat,
    /// Glasses position on the gameboard in meters
    pub pos_glasses: Vec3,
    pub gameboard: GameboardKind,
}

/// Wand stream configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WandStreamConfig {
    pub enabled: bool,
}

/// Button states in a wand report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WandButtons {
    pub t5: bool,
    pub one: bool,
    pub two: bool,
    pub three: bool,
    pub a: bool,
    pub b: bool,
    pub x: bool,
    pub y: bool,
}

/// A single wand report; each group of fields is only meaningful when its
/// validity flag is set
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WandReport {
    pub analog_valid: bool,
    pub stick: Vec2,
    pub trigger: f32,
    pub buttons_valid: bool,
    pub buttons: WandButtons,
    pub pose_valid: bool,
    pub rot_to_wand: Quat,
    pub pos_grip: Vec3,
}

/// Event read from the wand stream
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WandStreamEvent {
    Connect { wand: WandHandle },
    Disconnect { wand: WandHandle },
    Desync { wand: WandHandle },
    Report { wand: WandHandle, report: WandReport },
}

impl WandStreamEvent {
    pub fn wand(&self) -> WandHandle {
        match *self {
            WandStreamEvent::Connect { wand }
            | WandStreamEvent::Disconnect { wand }
            | WandStreamEvent::Desync { wand }
            | WandStreamEvent::Report { wand, .. } => wand,
        }
    }
}

/// Graphics API the presentation surface is driven with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphicsApi {
    #[default]
    None,
    Gl,
    D3d11,
}

/// Virtual camera image rectangle on the unit plane
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ViewCone {
    pub start_x: f32,
    pub start_y: f32,
    pub width: f32,
    pub height: f32,
}

/// Everything the service needs to present one stereo frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInfo {
    pub left_texture: TextureHandle,
    pub right_texture: TextureHandle,
    pub texture_width: u32,
    pub texture_height: u32,
    pub is_srgb: bool,
    pub is_upside_down: bool,
    pub view_cone: ViewCone,
    pub rot_to_left_eye: Quat,
    pub rot_to_right_eye: Quat,
    pub pos_left_eye: Vec3,
    pub pos_right_eye: Vec3,
}

/// Graphics backend the glasses' graphics context is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GraphicsBinding {
    pub api: GraphicsApi,
    pub native_device: Option<NativeDevice>,
}
