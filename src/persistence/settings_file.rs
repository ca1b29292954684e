//! Settings document (`settings.toml`)
//!
//! Loading is an explicit field-by-field mapping: every known key is read and
//! validated on its own, unknown keys are ignored and a malformed value falls
//! back to its default with a notice for the shell. Nothing here ever fails
//! the startup; the worst case is the all-defaults record.

use crate::input::normalize_identifier;
use crate::profiles::{ProfileSettings, RecoilOffsets, TuningParameters, WeaponProfile};
use color_eyre::{eyre::eyre, Result};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use toml::{Table, Value};
use tracing::{debug, info, warn};

pub const SETTINGS_FILE: &str = "settings.toml";

/// Persisted configuration record, one per installation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettingsRecord {
    pub shoot_delay: f64,
    pub max_shots: u32,
    pub smoothing_factor: f64,
    pub sensitivity: f64,
    pub max_movement: u32,
    pub timeout: u64,
    pub primary_weapon_hotkey: Vec<String>,
    pub primary_weapon_hotkey_2: Vec<String>,
    pub secondary_weapon_hotkey: Vec<String>,
    pub secondary_weapon_hotkey_2: Vec<String>,
    pub secondary_weapon_enabled: bool,
    pub primary_recoil_y: f64,
    pub primary_recoil_x: f64,
    pub secondary_recoil_y: f64,
    pub secondary_recoil_x: f64,
}

impl Default for SettingsRecord {
    fn default() -> Self {
        SettingsRecord::from(&ProfileSettings::default())
    }
}

fn hotkey_list(hotkey: &Option<String>) -> Vec<String> {
    hotkey.iter().cloned().collect()
}

impl From<&ProfileSettings> for SettingsRecord {
    fn from(settings: &ProfileSettings) -> Self {
        let tuning = &settings.tuning;
        Self {
            shoot_delay: tuning.correction_interval_secs,
            max_shots: tuning.max_shots,
            smoothing_factor: tuning.smoothing_factor,
            sensitivity: tuning.sensitivity,
            max_movement: tuning.max_movement,
            timeout: tuning.timeout_secs,
            primary_weapon_hotkey: hotkey_list(&settings.primary.hotkeys[0]),
            primary_weapon_hotkey_2: hotkey_list(&settings.primary.hotkeys[1]),
            secondary_weapon_hotkey: hotkey_list(&settings.secondary.hotkeys[0]),
            secondary_weapon_hotkey_2: hotkey_list(&settings.secondary.hotkeys[1]),
            secondary_weapon_enabled: settings.secondary_enabled,
            primary_recoil_y: settings.primary.offsets.vertical,
            primary_recoil_x: settings.primary.offsets.horizontal,
            secondary_recoil_y: settings.secondary.offsets.vertical,
            secondary_recoil_x: settings.secondary.offsets.horizontal,
        }
    }
}

impl SettingsRecord {
    pub fn into_settings(self) -> ProfileSettings {
        let first = |list: Vec<String>| list.into_iter().next();
        ProfileSettings {
            tuning: TuningParameters {
                correction_interval_secs: self.shoot_delay,
                sensitivity: self.sensitivity,
                max_movement: self.max_movement,
                smoothing_factor: self.smoothing_factor,
                max_shots: self.max_shots,
                timeout_secs: self.timeout,
            },
            primary: WeaponProfile {
                offsets: RecoilOffsets::new(self.primary_recoil_y, self.primary_recoil_x),
                hotkeys: [
                    first(self.primary_weapon_hotkey),
                    first(self.primary_weapon_hotkey_2),
                ],
            },
            secondary: WeaponProfile {
                offsets: RecoilOffsets::new(self.secondary_recoil_y, self.secondary_recoil_x),
                hotkeys: [
                    first(self.secondary_weapon_hotkey),
                    first(self.secondary_weapon_hotkey_2),
                ],
            },
            secondary_enabled: self.secondary_weapon_enabled,
        }
    }

    /// Maps a parsed document onto a record.
    ///
    /// Returns the record and one notice per value that was replaced by its default.
    pub fn from_table(table: &Table) -> (Self, Vec<String>) {
        let mut record = SettingsRecord::default();
        let mut notices = Vec::new();

        let mut reader = FieldReader {
            table,
            notices: &mut notices,
        };

        reader.float("shoot_delay", &mut record.shoot_delay, |v| {
            v > 0.0 && Duration::try_from_secs_f64(v).is_ok()
        });
        reader.unsigned("max_shots", &mut record.max_shots);
        reader.float("smoothing_factor", &mut record.smoothing_factor, |_| true);
        reader.float("sensitivity", &mut record.sensitivity, |_| true);
        reader.unsigned("max_movement", &mut record.max_movement);
        reader.unsigned("timeout", &mut record.timeout);
        reader.hotkeys("primary_weapon_hotkey", &mut record.primary_weapon_hotkey);
        reader.hotkeys("primary_weapon_hotkey_2", &mut record.primary_weapon_hotkey_2);
        reader.hotkeys("secondary_weapon_hotkey", &mut record.secondary_weapon_hotkey);
        reader.hotkeys("secondary_weapon_hotkey_2", &mut record.secondary_weapon_hotkey_2);
        reader.boolean("secondary_weapon_enabled", &mut record.secondary_weapon_enabled);
        reader.float("primary_recoil_y", &mut record.primary_recoil_y, |_| true);
        reader.float("primary_recoil_x", &mut record.primary_recoil_x, |_| true);
        reader.float("secondary_recoil_y", &mut record.secondary_recoil_y, |_| true);
        reader.float("secondary_recoil_x", &mut record.secondary_recoil_x, |_| true);

        (record, notices)
    }
}

struct FieldReader<'a> {
    table: &'a Table,
    notices: &'a mut Vec<String>,
}

impl FieldReader<'_> {
    fn reject(&mut self, key: &str, value: &Value) {
        let notice = format!("Ignoring invalid value for {}: {}, using default", key, value);
        warn!("{}", notice);
        self.notices.push(notice);
    }

    fn float(&mut self, key: &str, target: &mut f64, accept: impl Fn(f64) -> bool) {
        let Some(value) = self.table.get(key) else {
            return;
        };
        let parsed = match value {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        };
        match parsed {
            Some(f) if f.is_finite() && accept(f) => *target = f,
            _ => self.reject(key, value),
        }
    }

    fn unsigned<T: TryFrom<i64>>(&mut self, key: &str, target: &mut T) {
        let Some(value) = self.table.get(key) else {
            return;
        };
        match value.as_integer().map(T::try_from) {
            Some(Ok(parsed)) => *target = parsed,
            _ => self.reject(key, value),
        }
    }

    fn boolean(&mut self, key: &str, target: &mut bool) {
        let Some(value) = self.table.get(key) else {
            return;
        };
        match value.as_bool() {
            Some(parsed) => *target = parsed,
            None => self.reject(key, value),
        }
    }

    /// Lists of at most one identifier; only the first entry is kept
    fn hotkeys(&mut self, key: &str, target: &mut Vec<String>) {
        let Some(value) = self.table.get(key) else {
            return;
        };
        let Some(list) = value.as_array() else {
            self.reject(key, value);
            return;
        };

        match list.first() {
            None => target.clear(),
            Some(first) => match first.as_str().and_then(normalize_identifier) {
                Some(hotkey) => {
                    if list.len() > 1 {
                        debug!("{} has {} entries, keeping the first", key, list.len());
                    }
                    *target = vec![hotkey];
                }
                None => self.reject(key, value),
            },
        }
    }
}

/// Reads the settings document; a missing or unparsable file yields defaults.
///
/// The notices describe every fallback that happened.
pub async fn load_settings(path: &Path) -> (SettingsRecord, Vec<String>) {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("No settings file at {}, using defaults", path.display());
            return (SettingsRecord::default(), Vec::new());
        }
        Err(e) => {
            let notice = format!("Failed to read settings file {}: {}", path.display(), e);
            warn!("{}", notice);
            return (SettingsRecord::default(), vec![notice]);
        }
    };

    match content.parse::<Table>() {
        Ok(table) => {
            let (record, notices) = SettingsRecord::from_table(&table);
            info!(
                "Settings loaded from {} ({} fallbacks)",
                path.display(),
                notices.len()
            );
            (record, notices)
        }
        Err(e) => {
            let notice = format!("Settings file {} is malformed, using defaults: {}", path.display(), e);
            warn!("{}", notice);
            (SettingsRecord::default(), vec![notice])
        }
    }
}

/// Rewrites the whole document
pub async fn save_settings(path: &Path, record: &SettingsRecord) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| eyre!("Failed to create settings directory: {}", e))?;
    }

    let content = toml::to_string_pretty(record)
        .map_err(|e| eyre!("Failed to serialize settings: {}", e))?;

    tokio::fs::write(path, content)
        .await
        .map_err(|e| eyre!("Failed to write settings file: {}", e))?;

    debug!("Settings written to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiles::WeaponSlot;

    fn parse(text: &str) -> (SettingsRecord, Vec<String>) {
        SettingsRecord::from_table(&text.parse::<Table>().unwrap())
    }

    #[test]
    fn empty_document_yields_defaults() {
        let (record, notices) = parse("");
        assert!(notices.is_empty());
        assert_eq!(record, SettingsRecord::default());
        assert_eq!(record.shoot_delay, 0.01);
        assert_eq!(record.max_shots, 1000);
        assert_eq!(record.max_movement, 500);
        assert_eq!(record.timeout, 30);
        assert_eq!(record.primary_weapon_hotkey, vec!["F9".to_string()]);
        assert_eq!(record.secondary_weapon_hotkey, vec!["F10".to_string()]);
        assert!(record.primary_weapon_hotkey_2.is_empty());
        assert!(!record.secondary_weapon_enabled);
    }

    #[test]
    fn unknown_keys_are_ignored_and_bad_values_defaulted() {
        let (record, notices) = parse(
            r#"
            shoot_delay = -0.5
            sensitivity = 1.75
            max_movement = "lots"
            max_shots = -3
            timeout = 45
            secondary_weapon_enabled = true
            primary_weapon_hotkey_2 = ["mouse_x1", "F1"]
            secondary_weapon_hotkey = []
            favourite_colour = "teal"
            "#,
        );

        assert_eq!(notices.len(), 3);
        assert_eq!(record.shoot_delay, 0.01);
        assert_eq!(record.sensitivity, 1.75);
        assert_eq!(record.max_movement, 500);
        assert_eq!(record.max_shots, 1000);
        assert_eq!(record.timeout, 45);
        assert!(record.secondary_weapon_enabled);
        assert_eq!(record.primary_weapon_hotkey_2, vec!["MOUSE_X1".to_string()]);
        assert!(record.secondary_weapon_hotkey.is_empty());
    }

    #[tokio::test]
    async fn unrepresentable_interval_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        tokio::fs::write(&path, "shoot_delay = 1e300\nsensitivity = 0.5").await.unwrap();

        let (record, notices) = load_settings(&path).await;
        assert_eq!(notices.len(), 1);
        assert!(notices[0].contains("shoot_delay"));
        assert_eq!(record.shoot_delay, 0.01);
        assert_eq!(record.sensitivity, 0.5);
        assert!(record.into_settings().tuning.validate().is_ok());
    }

    #[test]
    fn integers_are_accepted_for_float_fields() {
        let (record, notices) = parse("primary_recoil_y = 3\nsmoothing_factor = 1");
        assert!(notices.is_empty());
        assert_eq!(record.primary_recoil_y, 3.0);
        assert_eq!(record.smoothing_factor, 1.0);
    }

    #[test]
    fn record_maps_to_settings() {
        let (record, _) = parse(
            r#"
            primary_recoil_y = 2.5
            secondary_recoil_x = -0.75
            secondary_weapon_hotkey_2 = ["SCROLL_DOWN"]
            "#,
        );
        let settings = record.clone().into_settings();
        assert_eq!(settings.profile(WeaponSlot::Primary).offsets.vertical, 2.5);
        assert_eq!(settings.profile(WeaponSlot::Secondary).offsets.horizontal, -0.75);
        assert!(settings.secondary.matches("SCROLL_DOWN"));
        assert!(settings.secondary.matches("F10"));
        assert_eq!(SettingsRecord::from(&settings), record);
    }

    #[tokio::test]
    async fn saved_settings_load_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(SETTINGS_FILE);

        let mut settings = ProfileSettings::default();
        settings.tuning.sensitivity = 0.8;
        settings.tuning.max_movement = 25;
        settings.secondary_enabled = true;
        settings.primary.offsets = RecoilOffsets::new(4.0, 0.5);
        settings.secondary.hotkeys = [None, Some("MOUSE_X2".to_string())];
        let record = SettingsRecord::from(&settings);

        save_settings(&path, &record).await.unwrap();
        let (loaded, notices) = load_settings(&path).await;
        assert!(notices.is_empty());
        assert_eq!(loaded, record);
        assert_eq!(loaded.into_settings(), settings);
    }

    #[tokio::test]
    async fn missing_or_malformed_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);

        let (record, notices) = load_settings(&path).await;
        assert_eq!(record, SettingsRecord::default());
        assert!(notices.is_empty());

        tokio::fs::write(&path, "shoot_delay = [").await.unwrap();
        let (record, notices) = load_settings(&path).await;
        assert_eq!(record, SettingsRecord::default());
        assert_eq!(notices.len(), 1);
    }
}
