//! Analog axis helpers: virtual direction keys, deadzone, change detection

/// Edge of a virtual button driven by an axis crossing a threshold
///
/// # Arguments
/// * `old` / `new` - Raw axis values before and after this tick
/// * `positive` - Direction of the virtual key; negative keys mirror the values
/// * `threshold` - Pressed when the (mirrored) value is at or above this
///
/// # Returns
/// `Some(pressed)` when the virtual key changed state
pub fn axis_key_edge(old: f32, new: f32, positive: bool, threshold: f32) -> Option<bool> {
    let (old, new) = if positive { (old, new) } else { (-old, -new) };
    let was_pressed = old >= threshold;
    let is_pressed = new >= threshold;
    (was_pressed != is_pressed).then_some(is_pressed)
}

/// Zero out values inside the deadzone; values outside pass unchanged
pub fn apply_deadzone(value: f32, deadzone: f32) -> f32 {
    if value.abs() < deadzone {
        0.0
    } else {
        value
    }
}

/// Whether an analog value should be reported
///
/// Reported when it moved by more than `epsilon`, or whenever it is off rest.
pub fn analog_changed(old: f32, new: f32, epsilon: f32) -> bool {
    (old - new).abs() > epsilon || new.abs() > 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_key_positive() {
        assert_eq!(axis_key_edge(0.0, 0.3, true, 0.3), Some(true));
        assert_eq!(axis_key_edge(0.5, 0.1, true, 0.3), Some(false));
        assert_eq!(axis_key_edge(0.0, 0.2, true, 0.3), None);
        assert_eq!(axis_key_edge(0.4, 0.6, true, 0.3), None);
    }

    #[test]
    fn test_axis_key_negative_mirrors() {
        assert_eq!(axis_key_edge(0.0, -0.5, false, 0.3), Some(true));
        assert_eq!(axis_key_edge(0.0, 0.5, false, 0.3), None);
        assert_eq!(axis_key_edge(-0.5, 0.0, false, 0.3), Some(false));
    }

    #[test]
    fn test_deadzone() {
        assert_eq!(apply_deadzone(0.05, 0.15), 0.0);
        assert_eq!(apply_deadzone(-0.149, 0.15), 0.0);
        assert_eq!(apply_deadzone(0.15, 0.15), 0.15);
        assert_eq!(apply_deadzone(-0.8, 0.15), -0.8);
    }

    #[test]
    fn test_analog_changed() {
        // At rest and unchanged: suppressed
        assert!(!analog_changed(0.0, 0.0, 1e-3));
        // Return to rest is reported once
        assert!(analog_changed(0.4, 0.0, 1e-3));
        // Held off rest keeps reporting
        assert!(analog_changed(0.4, 0.4, 1e-3));
    }
}
