use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Normalized screen-space position, (0,0) top-left to (1,1) bottom-right
pub type Position = (f64, f64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modifier {
    Shift,
    Ctrl,
    Alt,
}

impl Modifier {
    pub const ALL: [Modifier; 3] = [Modifier::Shift, Modifier::Ctrl, Modifier::Alt];

    /// Key names that count as this modifier, left and right variants included
    pub fn key_names(self) -> &'static [&'static str] {
        match self {
            Modifier::Shift => &["shift", "shift_l", "shift_r"],
            Modifier::Ctrl => &["ctrl", "ctrl_l", "ctrl_r"],
            Modifier::Alt => &["alt", "alt_l", "alt_r", "alt_gr"],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Up,
    Down,
}

impl ScrollDirection {
    pub fn from_delta(dy: f64) -> Self {
        if dy > 0.0 {
            ScrollDirection::Up
        } else {
            ScrollDirection::Down
        }
    }
}

/// Currently pressed buttons and keys
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeldState {
    pub mouse_left: bool,
    pub mouse_right: bool,
    pub mouse_middle: bool,
    pub keys: BTreeSet<String>,
}

impl HeldState {
    pub fn is_pressed(&self, button: MouseButton) -> bool {
        match button {
            MouseButton::Left => self.mouse_left,
            MouseButton::Right => self.mouse_right,
            MouseButton::Middle => self.mouse_middle,
        }
    }

    pub fn set_pressed(&mut self, button: MouseButton, pressed: bool) {
        match button {
            MouseButton::Left => self.mouse_left = pressed,
            MouseButton::Right => self.mouse_right = pressed,
            MouseButton::Middle => self.mouse_middle = pressed,
        }
    }

    pub fn active_modifiers(&self) -> Vec<Modifier> {
        Modifier::ALL
            .into_iter()
            .filter(|m| m.key_names().iter().any(|k| self.keys.contains(*k)))
            .collect()
    }
}

/// One normalized input event. Timestamps are seconds since session start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputEvent {
    Move {
        timestamp: f64,
        position: Position,
        velocity: Position,
    },
    Click {
        timestamp: f64,
        position: Position,
        button: MouseButton,
        pressed: bool,
        modifiers: Vec<Modifier>,
    },
    KeyPress {
        timestamp: f64,
        key: String,
    },
    KeyRelease {
        timestamp: f64,
        key: String,
    },
    ScrollStart {
        timestamp: f64,
        direction: ScrollDirection,
    },
    ScrollTick {
        timestamp: f64,
        direction: ScrollDirection,
        direction_change: bool,
    },
    ScrollStop {
        timestamp: f64,
        duration: f64,
        total_ticks: u32,
        ticks_up: u32,
        ticks_down: u32,
    },
    Held {
        timestamp: f64,
        held: HeldState,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        frame_id: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tick_number: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        frame_number: Option<u32>,
    },
}

impl InputEvent {
    pub fn timestamp(&self) -> f64 {
        match self {
            InputEvent::Move { timestamp, .. }
            | InputEvent::Click { timestamp, .. }
            | InputEvent::KeyPress { timestamp, .. }
            | InputEvent::KeyRelease { timestamp, .. }
            | InputEvent::ScrollStart { timestamp, .. }
            | InputEvent::ScrollTick { timestamp, .. }
            | InputEvent::ScrollStop { timestamp, .. }
            | InputEvent::Held { timestamp, .. } => *timestamp,
        }
    }

    pub fn held(timestamp: f64, held: HeldState) -> Self {
        InputEvent::Held {
            timestamp,
            held,
            frame_id: None,
            tick_number: None,
            frame_number: None,
        }
    }
}

/// Raw callback payload delivered by the platform input hook.
/// Coordinates are global screen pixels.
#[derive(Debug, Clone, PartialEq)]
pub enum RawInput {
    Move {
        x: f64,
        y: f64,
    },
    Click {
        x: f64,
        y: f64,
        button: MouseButton,
        pressed: bool,
    },
    KeyDown {
        key: String,
    },
    KeyUp {
        key: String,
    },
    Scroll {
        dx: f64,
        dy: f64,
    },
}

/// A `RawInput` stamped by the hook at the moment it fired (seconds since
/// the UNIX epoch). Queueing delay on the way to the pump does not move the
/// event into a later frame window.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedInput {
    pub input: RawInput,
    pub at: f64,
}

impl TimedInput {
    pub fn new(input: RawInput, at: f64) -> Self {
        Self { input, at }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_shape() {
        let event = InputEvent::Click {
            timestamp: 1.25,
            position: (0.5, 0.25),
            button: MouseButton::Left,
            pressed: true,
            modifiers: vec![Modifier::Shift],
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "click");
        assert_eq!(json["button"], "left");
        assert_eq!(json["position"][1], 0.25);
        assert_eq!(json["modifiers"][0], "shift");
    }

    #[test]
    fn test_held_omits_unset_frame_fields() {
        let json = serde_json::to_value(InputEvent::held(0.0, HeldState::default())).unwrap();
        assert_eq!(json["type"], "held");
        assert!(json.get("frame_id").is_none());
        assert_eq!(json["held"]["mouse_middle"], false);
    }

    #[test]
    fn test_active_modifiers_checks_both_sides() {
        let mut held = HeldState::default();
        held.keys.insert("ctrl_r".to_string());
        held.keys.insert("alt_l".to_string());
        held.keys.insert("a".to_string());
        assert_eq!(held.active_modifiers(), vec![Modifier::Ctrl, Modifier::Alt]);
    }

    #[test]
    fn test_scroll_direction_from_delta() {
        assert_eq!(ScrollDirection::from_delta(1.0), ScrollDirection::Up);
        assert_eq!(ScrollDirection::from_delta(-3.0), ScrollDirection::Down);
    }
}
