//! Haptic feedback values and device capabilities

use serde::{Deserialize, Serialize};

/// Lowest supported impulse frequency
pub const MIN_FREQUENCY: f32 = 0.0;
/// Highest supported impulse frequency
pub const MAX_FREQUENCY: f32 = 0.320;
/// Scale applied by the host to amplitudes before dispatch
pub const AMPLITUDE_SCALE: f32 = 1.0;

/// One haptic impulse request
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HapticFeedback {
    pub amplitude: f32,
    pub frequency: f32,
}

impl HapticFeedback {
    pub fn new(amplitude: f32, frequency: f32) -> Self {
        Self {
            amplitude,
            frequency,
        }
    }
}

/// Haptic ranges reported to the host
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HapticCapabilities {
    pub min_frequency: f32,
    pub max_frequency: f32,
    pub amplitude_scale: f32,
}

impl Default for HapticCapabilities {
    fn default() -> Self {
        Self {
            min_frequency: MIN_FREQUENCY,
            max_frequency: MAX_FREQUENCY,
            amplitude_scale: AMPLITUDE_SCALE,
        }
    }
}
