//! # Profile Store - live weapon profiles and tuning
//!
//! Holds the one shared copy of [`ProfileSettings`]. The shell edits it, the
//! input router reads it when a weapon hotkey fires, and every committed edit
//! schedules a full rewrite of the settings document through the persistence
//! worker. Writes are fire-and-forget from the store's point of view.
//!
//! Validation happens before the lock is taken for writing; a rejected value
//! leaves the stored state untouched.

use super::{
    ensure_finite, Axis, HotkeyBinding, ProfileError, ProfileSettings, RecoilOffsets,
    TuningParameters, WeaponProfile, WeaponSlot,
};
use crate::input::normalize_identifier;
use crate::persistence::persistence_worker::PersistenceClient;
use crate::persistence::presets::PresetRecord;
use crate::persistence::settings_file::SettingsRecord;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Lock retry with a bounded number of attempts.
///
/// The store is touched from the router task, the shell and the runtime's
/// blocking contexts alike, so it never awaits a lock: five `try_*` attempts
/// 10ms apart, then [`ProfileError::LockTimeout`].
macro_rules! try_lock {
    (@write_lock_retry, $accessor:expr, $operation:expr) => {{
        let mut attempts = 0;
        const MAX_ATTEMPTS: usize = 5;

        loop {
            match $accessor.try_write() {
                Ok(mut guard) => {
                    break Ok($operation(&mut *guard));
                }
                Err(e) => {
                    attempts += 1;
                    tracing::warn!(
                        "Profile write lock blocked: {} (attempt {}/{})",
                        e,
                        attempts,
                        MAX_ATTEMPTS
                    );

                    if attempts >= MAX_ATTEMPTS {
                        break Err(ProfileError::LockTimeout);
                    }

                    std::thread::sleep(std::time::Duration::from_millis(10));
                }
            }
        }
    }};

    (@read_lock_retry, $accessor:expr, $operation:expr) => {{
        let mut attempts = 0;
        const MAX_ATTEMPTS: usize = 5;

        loop {
            match $accessor.try_read() {
                Ok(guard) => {
                    break Ok($operation(&*guard));
                }
                Err(e) => {
                    attempts += 1;
                    tracing::warn!(
                        "Profile read lock blocked: {} (attempt {}/{})",
                        e,
                        attempts,
                        MAX_ATTEMPTS
                    );

                    if attempts >= MAX_ATTEMPTS {
                        break Err(ProfileError::LockTimeout);
                    }

                    std::thread::sleep(std::time::Duration::from_millis(10));
                }
            }
        }
    }};
}

/// Shared, validated profile state
#[derive(Debug, Clone)]
pub struct ProfileStore {
    settings: Arc<RwLock<ProfileSettings>>,
    persistence: Option<PersistenceClient>,
}

impl ProfileStore {
    pub fn new(settings: ProfileSettings) -> Self {
        Self {
            settings: Arc::new(RwLock::new(settings)),
            persistence: None,
        }
    }

    /// Every committed edit is written back through `client`
    pub fn with_persistence(mut self, client: PersistenceClient) -> Self {
        self.persistence = Some(client);
        self
    }

    pub fn snapshot(&self) -> Result<ProfileSettings, ProfileError> {
        try_lock!(@read_lock_retry, self.settings, |guard: &ProfileSettings| guard.clone())
    }

    pub fn tuning(&self) -> Result<TuningParameters, ProfileError> {
        try_lock!(@read_lock_retry, self.settings, |guard: &ProfileSettings| guard.tuning)
    }

    pub fn profile(&self, slot: WeaponSlot) -> Result<WeaponProfile, ProfileError> {
        try_lock!(@read_lock_retry, self.settings, |guard: &ProfileSettings| {
            guard.profile(slot).clone()
        })
    }

    pub fn offsets(&self, slot: WeaponSlot) -> Result<RecoilOffsets, ProfileError> {
        try_lock!(@read_lock_retry, self.settings, |guard: &ProfileSettings| {
            guard.profile(slot).offsets
        })
    }

    pub fn secondary_enabled(&self) -> Result<bool, ProfileError> {
        try_lock!(@read_lock_retry, self.settings, |guard: &ProfileSettings| {
            guard.secondary_enabled
        })
    }

    /// Persisted form of the current state
    pub fn record(&self) -> Result<SettingsRecord, ProfileError> {
        try_lock!(@read_lock_retry, self.settings, |guard: &ProfileSettings| {
            SettingsRecord::from(guard)
        })
    }

    /// The five fields a preset carries
    pub fn preset(&self) -> Result<PresetRecord, ProfileError> {
        try_lock!(@read_lock_retry, self.settings, |guard: &ProfileSettings| {
            PresetRecord::from(guard)
        })
    }

    pub fn set_offset(&self, slot: WeaponSlot, axis: Axis, value: f64) -> Result<(), ProfileError> {
        let field = offset_field(slot, axis);
        ensure_finite(&field, value)?;

        try_lock!(@write_lock_retry, self.settings, |guard: &mut ProfileSettings| {
            guard.profile_mut(slot).offsets.set(axis, value);
        })?;

        info!("{} updated to {:.3}", field, value);
        self.persist();
        Ok(())
    }

    /// Parses user-entered text; on failure the stored value is kept
    pub fn set_offset_from_text(
        &self,
        slot: WeaponSlot,
        axis: Axis,
        text: &str,
    ) -> Result<f64, ProfileError> {
        let value: f64 = text.trim().parse().map_err(|_| {
            warn!("Rejected {} input '{}'", offset_field(slot, axis), text);
            ProfileError::Parse {
                field: offset_field(slot, axis),
                text: text.to_string(),
            }
        })?;

        self.set_offset(slot, axis, value)?;
        Ok(value)
    }

    pub fn set_secondary_enabled(&self, enabled: bool) -> Result<(), ProfileError> {
        try_lock!(@write_lock_retry, self.settings, |guard: &mut ProfileSettings| {
            guard.secondary_enabled = enabled;
        })?;

        info!("Secondary weapon enabled: {}", enabled);
        self.persist();
        Ok(())
    }

    /// Binds (or with `None` clears) one weapon hotkey.
    ///
    /// Returns the stored, normalized identifier.
    pub fn set_hotkey(
        &self,
        binding: HotkeyBinding,
        hotkey: Option<&str>,
    ) -> Result<Option<String>, ProfileError> {
        let normalized = match hotkey {
            Some(raw) => Some(
                normalize_identifier(raw)
                    .ok_or_else(|| ProfileError::InvalidHotkey(raw.to_string()))?,
            ),
            None => None,
        };

        let stored = normalized.clone();
        try_lock!(@write_lock_retry, self.settings, |guard: &mut ProfileSettings| {
            guard
                .profile_mut(binding.weapon)
                .set_hotkey(binding.index, stored);
        })?;

        info!("{} set to {:?}", binding, normalized);
        self.persist();
        Ok(normalized)
    }

    pub fn set_tuning(&self, tuning: TuningParameters) -> Result<(), ProfileError> {
        tuning.validate()?;

        try_lock!(@write_lock_retry, self.settings, |guard: &mut ProfileSettings| {
            guard.tuning = tuning;
        })?;

        info!(
            "Tuning updated: interval={}s sensitivity={} max_movement={}",
            tuning.correction_interval_secs, tuning.sensitivity, tuning.max_movement
        );
        self.persist();
        Ok(())
    }

    /// Overwrites only the five preset fields
    pub fn apply_preset(&self, preset: &PresetRecord) -> Result<(), ProfileError> {
        ensure_finite("primary_recoil_y", preset.primary_recoil_y)?;
        ensure_finite("primary_recoil_x", preset.primary_recoil_x)?;
        ensure_finite("secondary_recoil_y", preset.secondary_recoil_y)?;
        ensure_finite("secondary_recoil_x", preset.secondary_recoil_x)?;

        try_lock!(@write_lock_retry, self.settings, |guard: &mut ProfileSettings| {
            guard.primary.offsets =
                RecoilOffsets::new(preset.primary_recoil_y, preset.primary_recoil_x);
            guard.secondary.offsets =
                RecoilOffsets::new(preset.secondary_recoil_y, preset.secondary_recoil_x);
            guard.secondary_enabled = preset.secondary_weapon_enabled;
        })?;

        info!(
            "Preset applied: primary (x={:.3}, y={:.2}) secondary (x={:.3}, y={:.2}) secondary enabled={}",
            preset.primary_recoil_x,
            preset.primary_recoil_y,
            preset.secondary_recoil_x,
            preset.secondary_recoil_y,
            preset.secondary_weapon_enabled
        );
        self.persist();
        Ok(())
    }

    fn persist(&self) {
        let Some(client) = &self.persistence else {
            debug!("No persistence attached, skipping settings write");
            return;
        };

        match self.record() {
            Ok(record) => client.save_settings(record),
            Err(e) => warn!("Could not snapshot settings for saving: {}", e),
        }
    }
}

fn offset_field(slot: WeaponSlot, axis: Axis) -> String {
    let axis = match axis {
        Axis::Vertical => "y",
        Axis::Horizontal => "x",
    };
    format!("{}_recoil_{}", slot, axis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiles::BindingIndex;

    fn store() -> ProfileStore {
        ProfileStore::new(ProfileSettings::default())
    }

    #[test]
    fn offsets_are_stored_per_slot() {
        let store = store();
        store.set_offset(WeaponSlot::Primary, Axis::Vertical, 3.5).unwrap();
        store.set_offset(WeaponSlot::Secondary, Axis::Horizontal, -0.25).unwrap();

        assert_eq!(
            store.offsets(WeaponSlot::Primary).unwrap(),
            RecoilOffsets::new(3.5, 0.0)
        );
        assert_eq!(
            store.offsets(WeaponSlot::Secondary).unwrap(),
            RecoilOffsets::new(0.0, -0.25)
        );
    }

    #[test]
    fn invalid_text_keeps_previous_value() {
        let store = store();
        store.set_offset(WeaponSlot::Primary, Axis::Vertical, 1.25).unwrap();

        let err = store
            .set_offset_from_text(WeaponSlot::Primary, Axis::Vertical, "fast")
            .unwrap_err();
        assert!(matches!(err, ProfileError::Parse { .. }));

        let err = store
            .set_offset(WeaponSlot::Primary, Axis::Vertical, f64::NAN)
            .unwrap_err();
        assert!(matches!(err, ProfileError::InvalidValue { .. }));

        assert_eq!(store.offsets(WeaponSlot::Primary).unwrap().vertical, 1.25);
        assert_eq!(
            store
                .set_offset_from_text(WeaponSlot::Primary, Axis::Vertical, " 2.5 ")
                .unwrap(),
            2.5
        );
    }

    #[test]
    fn hotkeys_are_normalized_and_clearable() {
        let store = store();
        let binding = HotkeyBinding::new(WeaponSlot::Secondary, BindingIndex::Second);

        let stored = store.set_hotkey(binding, Some(" scroll_up ")).unwrap();
        assert_eq!(stored.as_deref(), Some("SCROLL_UP"));
        assert!(store.profile(WeaponSlot::Secondary).unwrap().matches("SCROLL_UP"));

        assert!(matches!(
            store.set_hotkey(binding, Some("   ")),
            Err(ProfileError::InvalidHotkey(_))
        ));

        store.set_hotkey(binding, None).unwrap();
        assert!(!store.profile(WeaponSlot::Secondary).unwrap().matches("SCROLL_UP"));
    }

    #[test]
    fn rejected_tuning_leaves_state_unchanged() {
        let store = store();
        let mut tuning = store.tuning().unwrap();
        tuning.correction_interval_secs = -1.0;
        assert!(store.set_tuning(tuning).is_err());
        assert_eq!(store.tuning().unwrap(), TuningParameters::default());

        tuning.correction_interval_secs = 0.02;
        tuning.max_movement = 40;
        store.set_tuning(tuning).unwrap();
        assert_eq!(store.tuning().unwrap().max_movement, 40);
    }

    #[test]
    fn preset_overwrites_only_its_fields() {
        let store = store();
        let mut tuning = store.tuning().unwrap();
        tuning.sensitivity = 2.0;
        store.set_tuning(tuning).unwrap();

        let preset = PresetRecord {
            primary_recoil_y: 4.0,
            primary_recoil_x: 0.125,
            secondary_recoil_y: 1.5,
            secondary_recoil_x: -0.5,
            secondary_weapon_enabled: true,
        };
        store.apply_preset(&preset).unwrap();

        let snapshot = store.snapshot().unwrap();
        assert_eq!(snapshot.primary.offsets, RecoilOffsets::new(4.0, 0.125));
        assert_eq!(snapshot.secondary.offsets, RecoilOffsets::new(1.5, -0.5));
        assert!(snapshot.secondary_enabled);
        assert_eq!(snapshot.tuning.sensitivity, 2.0);
        assert!(snapshot.primary.matches("F9"));
        assert_eq!(store.preset().unwrap(), preset);
    }
}
