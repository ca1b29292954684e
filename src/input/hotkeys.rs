//! Hotkey dispatch table
//!
//! Resolution order for a normalized identifier:
//!
//! 1. primary weapon bindings
//! 2. secondary weapon bindings
//! 3. reserved control bindings (`F6`, `F7`, `F8`), fixed and not user-configurable
//!
//! Anything else is ignored. Whether a resolved action is allowed to run
//! (secondary gate, master enable) is the router's decision, not the table's.

use crate::profiles::{ProfileSettings, WeaponSlot};
use std::fmt;

pub const TOGGLE_CORRECTION_HOTKEY: &str = "F6";
pub const OPEN_SETTINGS_HOTKEY: &str = "F7";
pub const TOGGLE_MASTER_HOTKEY: &str = "F8";

/// Fixed control functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlAction {
    ToggleCorrection,
    OpenSettings,
    ToggleMasterEnable,
}

impl ControlAction {
    pub fn from_identifier(identifier: &str) -> Option<Self> {
        match identifier {
            TOGGLE_CORRECTION_HOTKEY => Some(ControlAction::ToggleCorrection),
            OPEN_SETTINGS_HOTKEY => Some(ControlAction::OpenSettings),
            TOGGLE_MASTER_HOTKEY => Some(ControlAction::ToggleMasterEnable),
            _ => None,
        }
    }
}

impl fmt::Display for ControlAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlAction::ToggleCorrection => write!(f, "toggle correction"),
            ControlAction::OpenSettings => write!(f, "open settings"),
            ControlAction::ToggleMasterEnable => write!(f, "toggle master enable"),
        }
    }
}

/// What an identifier resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyAction {
    SelectWeapon(WeaponSlot),
    Control(ControlAction),
}

/// Stateless resolver over the current profile bindings
#[derive(Debug, Default, Clone, Copy)]
pub struct HotkeyDispatcher;

impl HotkeyDispatcher {
    pub fn new() -> Self {
        Self
    }

    /// `identifier` must already be normalized
    pub fn resolve(&self, identifier: &str, settings: &ProfileSettings) -> Option<HotkeyAction> {
        if settings.primary.matches(identifier) {
            return Some(HotkeyAction::SelectWeapon(WeaponSlot::Primary));
        }
        if settings.secondary.matches(identifier) {
            return Some(HotkeyAction::SelectWeapon(WeaponSlot::Secondary));
        }
        ControlAction::from_identifier(identifier).map(HotkeyAction::Control)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiles::BindingIndex;

    #[test]
    fn weapon_bindings_resolve_to_their_slot() {
        let dispatcher = HotkeyDispatcher::new();
        let mut settings = ProfileSettings::default();
        settings
            .secondary
            .set_hotkey(BindingIndex::Second, Some("SCROLL_DOWN".to_string()));

        assert_eq!(
            dispatcher.resolve("F9", &settings),
            Some(HotkeyAction::SelectWeapon(WeaponSlot::Primary))
        );
        assert_eq!(
            dispatcher.resolve("SCROLL_DOWN", &settings),
            Some(HotkeyAction::SelectWeapon(WeaponSlot::Secondary))
        );
        assert_eq!(dispatcher.resolve("Q", &settings), None);
    }

    #[test]
    fn reserved_bindings_are_fixed() {
        let dispatcher = HotkeyDispatcher::new();
        let settings = ProfileSettings::default();
        assert_eq!(
            dispatcher.resolve("F6", &settings),
            Some(HotkeyAction::Control(ControlAction::ToggleCorrection))
        );
        assert_eq!(
            dispatcher.resolve("F7", &settings),
            Some(HotkeyAction::Control(ControlAction::OpenSettings))
        );
        assert_eq!(
            dispatcher.resolve("F8", &settings),
            Some(HotkeyAction::Control(ControlAction::ToggleMasterEnable))
        );
        // matching is exact on the normalized form
        assert_eq!(dispatcher.resolve("f6", &settings), None);
    }

    #[test]
    fn weapon_bindings_shadow_reserved_keys() {
        let dispatcher = HotkeyDispatcher::new();
        let mut settings = ProfileSettings::default();
        settings
            .primary
            .set_hotkey(BindingIndex::Second, Some("F6".to_string()));
        assert_eq!(
            dispatcher.resolve("F6", &settings),
            Some(HotkeyAction::SelectWeapon(WeaponSlot::Primary))
        );
    }
}
