//! Edge-triggered events produced by the decoder
//!
//! Control ids follow `player{n}.wand.{hand}.{group}.{name}`, for example
//! `player1.wand.right.btn.t5` or `player2.wand.left.axis.stick_x`.

use serde::Serialize;
use tracing::{debug, trace};

use super::axis::{analog_changed, apply_deadzone, axis_key_edge};
use super::wand::{button_bits, WandState};
use crate::config::InputConfig;

/// Which hand a wand is assigned to; right is wand index 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Hand {
    Right,
    Left,
}

impl Hand {
    pub const BOTH: [Hand; 2] = [Hand::Right, Hand::Left];

    pub fn index(self) -> usize {
        match self {
            Hand::Right => 0,
            Hand::Left => 1,
        }
    }

    pub fn from_index(index: usize) -> Option<Hand> {
        match index {
            0 => Some(Hand::Right),
            1 => Some(Hand::Left),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Hand::Right => "right",
            Hand::Left => "left",
        }
    }
}

/// Decoded input event
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputEvent {
    Connection { control_id: String, connected: bool },
    Button { control_id: String, pressed: bool },
    Analog { control_id: String, value: f32 },
}

impl InputEvent {
    pub fn control_id(&self) -> &str {
        match self {
            InputEvent::Connection { control_id, .. }
            | InputEvent::Button { control_id, .. }
            | InputEvent::Analog { control_id, .. } => control_id,
        }
    }
}

/// Control id prefix of one wand (e.g., "player1.wand.right")
pub fn wand_prefix(slot: usize, hand: Hand) -> String {
    format!("player{}.wand.{}", slot + 1, hand.name())
}

const BUTTON_NAMES: [(u8, &str); 8] = [
    (button_bits::T5, "t5"),
    (button_bits::ONE, "one"),
    (button_bits::TWO, "two"),
    (button_bits::THREE, "three"),
    (button_bits::Y, "y"),
    (button_bits::B, "b"),
    (button_bits::A, "a"),
    (button_bits::X, "x"),
];

/// Compare button masks and emit press/release events
///
/// An unset old mask counts as all released.
pub fn diff_buttons(old: Option<u8>, new: u8, prefix: &str) -> Vec<InputEvent> {
    let mut events = Vec::new();

    for (bit, name) in BUTTON_NAMES {
        let mask = 1u8 << bit;
        let old_pressed = old.is_some_and(|b| b & mask != 0);
        let new_pressed = new & mask != 0;

        if old_pressed != new_pressed {
            events.push(InputEvent::Button {
                control_id: format!("{}.btn.{}", prefix, name),
                pressed: new_pressed,
            });
        }
    }

    events
}

fn push_axis_key(events: &mut Vec<InputEvent>, old: f32, new: f32, positive: bool, threshold: f32, control_id: String) {
    if let Some(pressed) = axis_key_edge(old, new, positive, threshold) {
        trace!("{} {}", control_id, if pressed { "pressed" } else { "released" });
        events.push(InputEvent::Button { control_id, pressed });
    }
}

/// Emit every event for one wand after a drain
///
/// `new` is updated in place: stick and trigger values are stored
/// deadzoned so the next tick compares against what was reported.
pub fn emit_wand_events(
    prefix: &str,
    old: &WandState,
    new: &mut WandState,
    tuning: &InputConfig,
) -> Vec<InputEvent> {
    let mut events = Vec::new();

    if old.connected != new.connected {
        debug!(
            "{} {}",
            prefix,
            if new.connected { "connected" } else { "disconnected" }
        );
        events.push(InputEvent::Connection {
            control_id: prefix.to_string(),
            connected: new.connected,
        });
    }

    if !old.input_changed(new) {
        return events;
    }

    if let Some(buttons) = new.buttons {
        events.extend(diff_buttons(old.buttons, buttons, prefix));
    }

    if let Some(stick) = new.stick.as_mut() {
        let prev = old.stick.unwrap_or_default();
        let threshold = tuning.stick_button_threshold;

        push_axis_key(&mut events, prev.x, stick.x, true, threshold, format!("{}.stick.right", prefix));
        push_axis_key(&mut events, prev.x, stick.x, false, threshold, format!("{}.stick.left", prefix));
        push_axis_key(&mut events, prev.y, stick.y, true, threshold, format!("{}.stick.up", prefix));
        push_axis_key(&mut events, prev.y, stick.y, false, threshold, format!("{}.stick.down", prefix));

        stick.x = apply_deadzone(stick.x, tuning.stick_deadzone);
        stick.y = apply_deadzone(stick.y, tuning.stick_deadzone);

        for (axis, prev_value, value) in [("stick_x", prev.x, stick.x), ("stick_y", prev.y, stick.y)] {
            if analog_changed(prev_value, value, tuning.axis_epsilon) {
                trace!("{}.axis.{} = {:.3}", prefix, axis, value);
                events.push(InputEvent::Analog {
                    control_id: format!("{}.axis.{}", prefix, axis),
                    value,
                });
            }
        }
    }

    if let Some(trigger) = new.trigger.as_mut() {
        let prev = old.trigger.unwrap_or(0.0);

        push_axis_key(
            &mut events,
            prev,
            *trigger,
            true,
            tuning.trigger_button_threshold,
            format!("{}.btn.trigger", prefix),
        );

        *trigger = apply_deadzone(*trigger, tuning.trigger_deadzone);

        // No analog report until a previous trigger value exists
        if old.trigger.is_some() && analog_changed(prev, *trigger, tuning.axis_epsilon) {
            trace!("{}.axis.trigger = {:.3}", prefix, trigger);
            events.push(InputEvent::Analog {
                control_id: format!("{}.axis.trigger", prefix),
                value: *trigger,
            });
        }
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    fn buttons(events: &[InputEvent]) -> Vec<(&str, bool)> {
        events
            .iter()
            .filter_map(|e| match e {
                InputEvent::Button { control_id, pressed } => Some((control_id.as_str(), *pressed)),
                _ => None,
            })
            .collect()
    }

    fn analogs(events: &[InputEvent]) -> Vec<(&str, f32)> {
        events
            .iter()
            .filter_map(|e| match e {
                InputEvent::Analog { control_id, value } => Some((control_id.as_str(), *value)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_single_press_on_new_bit() {
        let events = diff_buttons(Some(0b0000_0001), 0b0000_0011, "p");
        assert_eq!(buttons(&events), vec![("p.btn.one", true)]);
    }

    #[test]
    fn test_release_and_unset_old() {
        let events = diff_buttons(Some(0b1000_0000), 0, "p");
        assert_eq!(buttons(&events), vec![("p.btn.x", false)]);

        let events = diff_buttons(None, 0b0100_0000, "p");
        assert_eq!(buttons(&events), vec![("p.btn.a", true)]);
    }

    #[test]
    fn test_stick_deadzone_scenario() {
        let tuning = InputConfig::default();
        let old = WandState {
            connected: true,
            stick: Some(Vec2::ZERO),
            ..WandState::default()
        };
        let mut new = WandState {
            stick: Some(Vec2::new(0.05, 0.20)),
            ..old
        };

        let events = emit_wand_events("p", &old, &mut new, &tuning);

        assert!(buttons(&events).is_empty());
        assert_eq!(analogs(&events), vec![("p.axis.stick_y", 0.20)]);
        assert_eq!(new.stick, Some(Vec2::new(0.0, 0.20)));
    }

    #[test]
    fn test_stick_direction_keys() {
        let tuning = InputConfig::default();
        let old = WandState {
            stick: Some(Vec2::new(0.5, 0.0)),
            ..WandState::default()
        };
        let mut new = WandState {
            stick: Some(Vec2::new(-0.5, 0.0)),
            ..WandState::default()
        };

        let events = emit_wand_events("p", &old, &mut new, &tuning);
        assert_eq!(
            buttons(&events),
            vec![("p.stick.right", false), ("p.stick.left", true)]
        );
    }

    #[test]
    fn test_trigger_analog_needs_previous_value() {
        let tuning = InputConfig::default();
        let old = WandState::default();
        let mut new = WandState {
            trigger: Some(0.8),
            ..WandState::default()
        };

        let events = emit_wand_events("p", &old, &mut new, &tuning);
        assert_eq!(buttons(&events), vec![("p.btn.trigger", true)]);
        assert!(analogs(&events).is_empty());

        let old = new;
        let mut newer = WandState {
            trigger: Some(0.03),
            ..old
        };
        let events = emit_wand_events("p", &old, &mut newer, &tuning);
        assert_eq!(buttons(&events), vec![("p.btn.trigger", false)]);
        assert_eq!(analogs(&events), vec![("p.axis.trigger", 0.0)]);
        assert_eq!(newer.trigger, Some(0.0));
    }

    #[test]
    fn test_unchanged_input_emits_only_connection() {
        let tuning = InputConfig::default();
        let old = WandState {
            stick: Some(Vec2::new(0.5, 0.5)),
            ..WandState::default()
        };
        let mut new = WandState {
            connected: true,
            ..old
        };

        let events = emit_wand_events("p", &old, &mut new, &tuning);
        assert_eq!(
            events,
            vec![InputEvent::Connection {
                control_id: "p".into(),
                connected: true
            }]
        );
    }

    #[test]
    fn test_wand_prefix() {
        assert_eq!(wand_prefix(0, Hand::Right), "player1.wand.right");
        assert_eq!(wand_prefix(3, Hand::Left), "player4.wand.left");
    }
}
