//! # Weapon profiles and tuning parameters
//!
//! Two weapon slots (primary, secondary), each with a vertical and horizontal
//! recoil offset and up to two hotkeys, plus the global tuning shared by both.
//! The [`ProfileStore`] is the live, shared copy the shell edits and the
//! router reads when a weapon hotkey fires; the engine never reads it
//! directly and only receives the selected slot's offsets.

pub mod error;
pub mod store;

pub use error::ProfileError;
pub use store::ProfileStore;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Weapon slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WeaponSlot {
    #[default]
    Primary,
    Secondary,
}

impl fmt::Display for WeaponSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeaponSlot::Primary => write!(f, "primary"),
            WeaponSlot::Secondary => write!(f, "secondary"),
        }
    }
}

/// Correction axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Vertical,
    Horizontal,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Vertical => write!(f, "vertical"),
            Axis::Horizontal => write!(f, "horizontal"),
        }
    }
}

/// Per-axis recoil compensation target.
///
/// Vertical is >= 0 by convention (pull down), horizontal is signed. Neither
/// is clamped here; the engine clamps the computed per-tick movement.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RecoilOffsets {
    pub vertical: f64,
    pub horizontal: f64,
}

impl RecoilOffsets {
    pub fn new(vertical: f64, horizontal: f64) -> Self {
        Self {
            vertical,
            horizontal,
        }
    }

    pub fn set(&mut self, axis: Axis, value: f64) {
        match axis {
            Axis::Vertical => self.vertical = value,
            Axis::Horizontal => self.horizontal = value,
        }
    }
}

// Which of the two hotkey entries of a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingIndex {
    First,
    Second,
}

impl BindingIndex {
    fn position(self) -> usize {
        match self {
            BindingIndex::First => 0,
            BindingIndex::Second => 1,
        }
    }
}

/// Addresses one of the four user-configurable weapon hotkeys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HotkeyBinding {
    pub weapon: WeaponSlot,
    pub index: BindingIndex,
}

impl HotkeyBinding {
    pub const fn new(weapon: WeaponSlot, index: BindingIndex) -> Self {
        Self { weapon, index }
    }
}

impl fmt::Display for HotkeyBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            BindingIndex::First => write!(f, "{} weapon hotkey", self.weapon),
            BindingIndex::Second => write!(f, "{} weapon hotkey 2", self.weapon),
        }
    }
}

/// One weapon slot: offsets plus its hotkeys (0 to 2, stored normalized)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WeaponProfile {
    pub offsets: RecoilOffsets,
    pub hotkeys: [Option<String>; 2],
}

impl WeaponProfile {
    pub fn with_hotkey(hotkey: &str) -> Self {
        Self {
            offsets: RecoilOffsets::default(),
            hotkeys: [Some(hotkey.to_string()), None],
        }
    }

    pub fn hotkey(&self, index: BindingIndex) -> Option<&str> {
        self.hotkeys[index.position()].as_deref()
    }

    pub fn set_hotkey(&mut self, index: BindingIndex, hotkey: Option<String>) {
        self.hotkeys[index.position()] = hotkey;
    }

    /// Exact match against an already normalized identifier
    pub fn matches(&self, identifier: &str) -> bool {
        self.hotkeys
            .iter()
            .flatten()
            .any(|hotkey| hotkey == identifier)
    }
}

/// Global tuning shared by both weapon slots
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TuningParameters {
    /// Cadence of the correction loop in seconds (> 0)
    pub correction_interval_secs: f64,
    /// Multiplier applied when the loop reads the active offsets
    pub sensitivity: f64,
    /// Symmetric per-axis clamp for one tick's movement
    pub max_movement: u32,
    /// Reserved; persisted and validated but not applied to the output
    pub smoothing_factor: f64,
    /// Carried through persistence only
    pub max_shots: u32,
    /// Carried through persistence only
    pub timeout_secs: u64,
}

impl Default for TuningParameters {
    fn default() -> Self {
        Self {
            correction_interval_secs: 0.01,
            sensitivity: 1.0,
            max_movement: 500,
            smoothing_factor: 0.5,
            max_shots: 1000,
            timeout_secs: 30,
        }
    }
}

impl TuningParameters {
    pub fn validate(&self) -> Result<(), ProfileError> {
        let interval = self.correction_interval_secs;
        if !interval.is_finite() || interval <= 0.0 {
            return Err(ProfileError::invalid(
                "shoot_delay",
                format!("{} is not a positive number of seconds", interval),
            ));
        }
        if Duration::try_from_secs_f64(interval).is_err() {
            return Err(ProfileError::invalid(
                "shoot_delay",
                format!("{} seconds is out of range", interval),
            ));
        }
        ensure_finite("sensitivity", self.sensitivity)?;
        ensure_finite("smoothing_factor", self.smoothing_factor)?;
        Ok(())
    }

    /// Tick interval, `None` if the stored value is unusable
    pub fn interval(&self) -> Option<Duration> {
        if self.correction_interval_secs > 0.0 {
            Duration::try_from_secs_f64(self.correction_interval_secs).ok()
        } else {
            None
        }
    }
}

/// Complete live profile state: tuning, both weapon slots and the secondary gate
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileSettings {
    pub tuning: TuningParameters,
    pub primary: WeaponProfile,
    pub secondary: WeaponProfile,
    pub secondary_enabled: bool,
}

impl Default for ProfileSettings {
    fn default() -> Self {
        Self {
            tuning: TuningParameters::default(),
            primary: WeaponProfile::with_hotkey("F9"),
            secondary: WeaponProfile::with_hotkey("F10"),
            secondary_enabled: false,
        }
    }
}

impl ProfileSettings {
    pub fn profile(&self, slot: WeaponSlot) -> &WeaponProfile {
        match slot {
            WeaponSlot::Primary => &self.primary,
            WeaponSlot::Secondary => &self.secondary,
        }
    }

    pub fn profile_mut(&mut self, slot: WeaponSlot) -> &mut WeaponProfile {
        match slot {
            WeaponSlot::Primary => &mut self.primary,
            WeaponSlot::Secondary => &mut self.secondary,
        }
    }
}

pub(crate) fn ensure_finite(field: &str, value: f64) -> Result<f64, ProfileError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ProfileError::invalid(field, format!("{} is not finite", value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bindings_match_function_keys() {
        let settings = ProfileSettings::default();
        assert!(settings.primary.matches("F9"));
        assert!(settings.secondary.matches("F10"));
        assert!(!settings.primary.matches("F10"));
        assert!(!settings.secondary_enabled);
    }

    #[test]
    fn tuning_rejects_unusable_interval() {
        let mut tuning = TuningParameters::default();
        assert!(tuning.validate().is_ok());
        assert_eq!(tuning.interval(), Some(Duration::from_millis(10)));

        tuning.correction_interval_secs = 0.0;
        assert!(tuning.validate().is_err());
        assert_eq!(tuning.interval(), None);

        tuning.correction_interval_secs = f64::NAN;
        assert!(tuning.validate().is_err());

        tuning.correction_interval_secs = 0.02;
        tuning.sensitivity = f64::INFINITY;
        assert!(tuning.validate().is_err());
    }

    #[test]
    fn second_binding_matches_independently() {
        let mut profile = WeaponProfile::default();
        assert!(!profile.matches("MOUSE_X1"));
        profile.set_hotkey(BindingIndex::Second, Some("MOUSE_X1".to_string()));
        assert!(profile.matches("MOUSE_X1"));
        assert_eq!(profile.hotkey(BindingIndex::First), None);
        assert_eq!(profile.hotkey(BindingIndex::Second), Some("MOUSE_X1"));
    }
}
