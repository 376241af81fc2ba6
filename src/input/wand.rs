//! Running per-wand state and report decoding

use glam::{Quat, Vec2, Vec3};

use crate::coords;
use crate::sdk::{WandHandle, WandReport};

/// Wand button bit offsets in the packed button mask
pub mod button_bits {
    pub const T5: u8 = 0;
    pub const ONE: u8 = 1;
    pub const TWO: u8 = 2;
    pub const THREE: u8 = 3;
    pub const Y: u8 = 4;
    pub const B: u8 = 5;
    pub const A: u8 = 6;
    pub const X: u8 = 7;
}

/// Wand grip pose in engine axes, meters (not scaled to world units)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WandPose {
    pub position: Vec3,
    pub rotation: Quat,
}

/// Fields carried by a single report; `None` means "not reported"
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WandUpdate {
    pub buttons: Option<u8>,
    pub stick: Option<Vec2>,
    pub trigger: Option<f32>,
    pub pose: Option<WandPose>,
}

impl WandUpdate {
    pub fn from_report(report: &WandReport) -> Self {
        let mut update = Self::default();

        // Stick and trigger share one validity flag
        if report.analog_valid {
            update.stick = Some(report.stick);
            update.trigger = Some(report.trigger);
        }

        if report.buttons_valid {
            let b = &report.buttons;
            let mask = [
                (b.t5, button_bits::T5),
                (b.one, button_bits::ONE),
                (b.two, button_bits::TWO),
                (b.three, button_bits::THREE),
                (b.y, button_bits::Y),
                (b.b, button_bits::B),
                (b.a, button_bits::A),
                (b.x, button_bits::X),
            ]
            .iter()
            .filter(|(pressed, _)| *pressed)
            .fold(0u8, |acc, (_, bit)| acc | (1 << bit));
            update.buttons = Some(mask);
        }

        if report.pose_valid {
            update.pose = Some(WandPose {
                position: coords::position_from_hardware(report.pos_grip, 1.0),
                rotation: coords::orientation_from_hardware(report.rot_to_wand),
            });
        }

        update
    }
}

/// Decoded state of one wand
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WandState {
    pub connected: bool,
    pub buttons: Option<u8>,
    pub stick: Option<Vec2>,
    pub trigger: Option<f32>,
    pub pose: Option<WandPose>,
    pub handle: Option<WandHandle>,
}

impl WandState {
    /// Merge reported fields; unreported fields keep their previous value
    pub fn merge(&mut self, update: &WandUpdate) {
        if update.buttons.is_some() {
            self.buttons = update.buttons;
        }
        if update.stick.is_some() {
            self.stick = update.stick;
        }
        if update.trigger.is_some() {
            self.trigger = update.trigger;
        }
        if update.pose.is_some() {
            self.pose = update.pose;
        }
    }

    /// Whether any input field differs (connection and handle are ignored)
    pub fn input_changed(&self, other: &WandState) -> bool {
        self.buttons != other.buttons
            || self.stick != other.stick
            || self.trigger != other.trigger
            || self.pose != other.pose
    }

    pub fn is_pressed(&self, bit: u8) -> bool {
        self.buttons.is_some_and(|b| b & (1 << bit) != 0)
    }
}
