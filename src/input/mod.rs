//! Input subsystem: host events in, engine commands out
//!
//! ```text
//! Host hook ──► InputEvent ──► InputEventRouter ──► CorrectionEngine
//!  (os.rs)      (this file)     (router.rs)     └─► ProfileStore lookups
//!                                    │
//!                               hotkeys.rs (weapon + reserved bindings)
//! ```
//!
//! Every event carries a normalized identifier string (`F9`, `MOUSE_X1`,
//! `SCROLL_UP`); that string is what hotkey bindings store and match against.

pub mod hotkeys;
pub mod os;
pub mod router;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

pub use hotkeys::{ControlAction, HotkeyAction, HotkeyDispatcher};
pub use router::{InputEventRouter, RouteOutcome, RouterCommand, RouterHandle, ShellCommand};

// Mouse buttons the host reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    X1,
    X2,
}

impl MouseButton {
    pub fn identifier(&self) -> &'static str {
        match self {
            MouseButton::Left => "MOUSE_LEFT",
            MouseButton::Right => "MOUSE_RIGHT",
            MouseButton::Middle => "MOUSE_MIDDLE",
            MouseButton::X1 => "MOUSE_X1",
            MouseButton::X2 => "MOUSE_X2",
        }
    }
}

// Button state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonState {
    Pressed,
    Released,
}

// Wheel direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScrollDirection {
    Up,
    Down,
}

impl ScrollDirection {
    pub fn identifier(&self) -> &'static str {
        match self {
            ScrollDirection::Up => "SCROLL_UP",
            ScrollDirection::Down => "SCROLL_DOWN",
        }
    }

    /// Maps a vertical wheel delta; zero means no direction
    pub fn from_delta(delta_y: i64) -> Option<Self> {
        match delta_y {
            d if d > 0 => Some(ScrollDirection::Up),
            d if d < 0 => Some(ScrollDirection::Down),
            _ => None,
        }
    }
}

/// Event delivered by the host listener, with a local timestamp
#[derive(Debug, Clone)]
pub enum InputEvent {
    Button {
        button: MouseButton,
        state: ButtonState,
        timestamp: DateTime<Local>,
    },
    Key {
        /// Already normalized key name, e.g. `F9`, `A`, `SHIFTLEFT`
        key: String,
        timestamp: DateTime<Local>,
    },
    Scroll {
        direction: ScrollDirection,
        timestamp: DateTime<Local>,
    },
}

impl InputEvent {
    pub fn button(button: MouseButton, state: ButtonState) -> Self {
        InputEvent::Button {
            button,
            state,
            timestamp: Local::now(),
        }
    }

    /// Returns `None` for names that normalize to nothing
    pub fn key(name: &str) -> Option<Self> {
        normalize_identifier(name).map(|key| InputEvent::Key {
            key,
            timestamp: Local::now(),
        })
    }

    pub fn scroll(direction: ScrollDirection) -> Self {
        InputEvent::Scroll {
            direction,
            timestamp: Local::now(),
        }
    }

    /// Identifier used for hotkey matching and recording.
    ///
    /// Button releases have no identifier: only presses trigger hotkeys.
    pub fn identifier(&self) -> Option<String> {
        match self {
            InputEvent::Button {
                button,
                state: ButtonState::Pressed,
                ..
            } => Some(button.identifier().to_string()),
            InputEvent::Button { .. } => None,
            InputEvent::Key { key, .. } => Some(key.clone()),
            InputEvent::Scroll { direction, .. } => Some(direction.identifier().to_string()),
        }
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        match self {
            InputEvent::Button { timestamp, .. }
            | InputEvent::Key { timestamp, .. }
            | InputEvent::Scroll { timestamp, .. } => *timestamp,
        }
    }
}

impl fmt::Display for InputEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputEvent::Button { button, state, .. } => {
                write!(f, "{} {:?}", button.identifier(), state)
            }
            InputEvent::Key { key, .. } => write!(f, "key {}", key),
            InputEvent::Scroll { direction, .. } => write!(f, "{}", direction.identifier()),
        }
    }
}

/// Case-normalizes a hotkey identifier (trimmed, upper-case).
///
/// Returns `None` for empty input.
pub fn normalize_identifier(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_uppercase())
    }
}

/// Failures of the input subsystem
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    /// The global hook could not be installed; the tool cannot work without it
    #[error("Global input hook unavailable: {0}")]
    HookUnavailable(String),

    #[error("Channel error: {0}")]
    ChannelError(String),

    #[error("Engine error: {0}")]
    Engine(#[from] crate::correction::EngineError),

    #[error("Profile error: {0}")]
    Profile(#[from] crate::profiles::ProfileError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_are_case_normalized() {
        assert_eq!(normalize_identifier(" f9 "), Some("F9".to_string()));
        assert_eq!(normalize_identifier("Mouse_x2"), Some("MOUSE_X2".to_string()));
        assert_eq!(normalize_identifier(""), None);
        assert_eq!(normalize_identifier("  \t"), None);
    }

    #[test]
    fn only_presses_carry_identifiers() {
        let press = InputEvent::button(MouseButton::X1, ButtonState::Pressed);
        let release = InputEvent::button(MouseButton::X1, ButtonState::Released);
        assert_eq!(press.identifier().as_deref(), Some("MOUSE_X1"));
        assert_eq!(release.identifier(), None);

        let key = InputEvent::key("a").unwrap();
        assert_eq!(key.identifier().as_deref(), Some("A"));
        assert!(InputEvent::key(" ").is_none());
    }

    #[test]
    fn wheel_deltas_map_to_directions() {
        assert_eq!(ScrollDirection::from_delta(1), Some(ScrollDirection::Up));
        assert_eq!(ScrollDirection::from_delta(-3), Some(ScrollDirection::Down));
        assert_eq!(ScrollDirection::from_delta(0), None);
        assert_eq!(
            InputEvent::scroll(ScrollDirection::Down).identifier().as_deref(),
            Some("SCROLL_DOWN")
        );
    }
}
