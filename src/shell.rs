//! Control shell - the application side of the engine
//!
//! Couples the profile store with the engine: an edit to the active weapon's
//! offsets reaches the running loop immediately, a preset load re-applies the
//! active slot, tuning edits are validated once and pushed to the engine.

use crate::correction::{CorrectionEngine, SessionStats};
use crate::persistence::PersistenceClient;
use crate::profiles::{Axis, ProfileStore, TuningParameters, WeaponSlot};
use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Clone)]
pub struct ControlShell {
    engine: Arc<CorrectionEngine>,
    store: ProfileStore,
    persistence: PersistenceClient,
}

impl ControlShell {
    pub fn new(
        engine: Arc<CorrectionEngine>,
        store: ProfileStore,
        persistence: PersistenceClient,
    ) -> Self {
        Self {
            engine,
            store,
            persistence,
        }
    }

    pub fn engine(&self) -> &Arc<CorrectionEngine> {
        &self.engine
    }

    pub fn store(&self) -> &ProfileStore {
        &self.store
    }

    fn follow_slot(&self, slot: WeaponSlot) -> Result<()> {
        let offsets = self.store.offsets(slot)?;
        if self.engine.refresh_slot(slot, offsets)? {
            debug!("Engine follows {} edit", slot);
        }
        Ok(())
    }

    pub fn set_offset(&self, slot: WeaponSlot, axis: Axis, value: f64) -> Result<()> {
        self.store.set_offset(slot, axis, value)?;
        self.follow_slot(slot)
    }

    /// Parses user text; the previous value stays on failure
    pub fn edit_offset(&self, slot: WeaponSlot, axis: Axis, text: &str) -> Result<f64> {
        let value = self.store.set_offset_from_text(slot, axis, text)?;
        self.follow_slot(slot)?;
        Ok(value)
    }

    pub fn set_tuning(&self, tuning: TuningParameters) -> Result<()> {
        self.store.set_tuning(tuning)?;
        self.engine.apply_tuning(tuning)?;
        Ok(())
    }

    pub fn set_secondary_enabled(&self, enabled: bool) -> Result<()> {
        self.store.set_secondary_enabled(enabled)?;
        Ok(())
    }

    pub fn select_agent(&self, agent: &str, scope: &str) -> Result<()> {
        self.engine.set_agent_scope(agent, scope)?;
        Ok(())
    }

    fn current_agent(&self) -> Result<String> {
        Ok(self.engine.agent_scope()?.0)
    }

    /// Stores the five preset fields under the current agent
    pub async fn save_preset(&self, name: &str) -> Result<()> {
        let agent = self.current_agent()?;
        let preset = self.store.preset()?;
        self.persistence.save_preset(&agent, name, preset).await
    }

    /// Loads a preset of the current agent and re-applies the active slot
    pub async fn load_preset(&self, name: &str) -> Result<()> {
        let agent = self.current_agent()?;
        let preset = self.persistence.load_preset(&agent, name).await?;
        self.store.apply_preset(&preset)?;

        let slot = self.engine.active_weapon()?;
        self.engine.set_active_offsets(self.store.offsets(slot)?)?;
        info!("Preset '{}' of {} applied", name, agent);
        Ok(())
    }

    pub async fn delete_preset(&self, name: &str) -> Result<()> {
        let agent = self.current_agent()?;
        self.persistence.delete_preset(&agent, name).await
    }

    pub async fn list_presets(&self) -> Result<Vec<String>> {
        let agent = self.current_agent()?;
        self.persistence.list_presets(&agent).await
    }

    pub async fn list_agents(&self) -> Result<Vec<String>> {
        self.persistence.list_agents().await
    }

    /// Waits until the current settings are on disk
    pub async fn flush(&self) -> Result<()> {
        let record = self.store.record()?;
        self.persistence
            .flush_settings(record)
            .await
            .map_err(|e| eyre!("Final settings write failed: {}", e))
    }

    pub fn session_stats(&self) -> Result<SessionStats> {
        Ok(self.engine.session_stats()?)
    }

    /// One-line status for the log
    pub fn status_line(&self) -> Result<String> {
        let snapshot = self.engine.snapshot()?;
        let stats = self.engine.session_stats()?;
        let (agent, scope) = self.engine.agent_scope()?;
        Ok(format!(
            "{:?} | correction {} | system {} | {} weapon (x={:.3}, y={:.2}) | agent {} ({}) | {} loops, {} corrections in {}s",
            snapshot.phase,
            if snapshot.correction_enabled { "on" } else { "off" },
            if snapshot.system_enabled { "on" } else { "off" },
            snapshot.active_weapon,
            snapshot.offsets.horizontal,
            snapshot.offsets.vertical,
            agent,
            scope,
            stats.loops_started,
            stats.corrections_applied,
            stats.session_duration.num_seconds()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{PersistenceManager, PersistencePaths};
    use crate::profiles::{ProfileSettings, RecoilOffsets};
    use crate::test_support::RecordingPointer;

    fn shell(dir: &std::path::Path) -> (ControlShell, PersistenceManager) {
        let manager = PersistenceManager::spawn(PersistencePaths {
            settings_file: dir.join("settings.toml"),
            presets_dir: dir.join("presets"),
        });
        let store = ProfileStore::new(ProfileSettings::default()).with_persistence(manager.client());
        let engine = Arc::new(
            CorrectionEngine::new(Arc::new(RecordingPointer::new()), store.tuning().unwrap())
                .unwrap(),
        );
        (ControlShell::new(engine, store, manager.client()), manager)
    }

    #[tokio::test]
    async fn edits_to_the_active_slot_reach_the_engine() {
        let dir = tempfile::tempdir().unwrap();
        let (shell, _manager) = shell(dir.path());

        shell.edit_offset(WeaponSlot::Primary, Axis::Vertical, "3.5").unwrap();
        assert_eq!(shell.engine().active_offsets().unwrap(), RecoilOffsets::new(3.5, 0.0));

        shell.set_offset(WeaponSlot::Secondary, Axis::Vertical, 9.0).unwrap();
        assert_eq!(shell.engine().active_offsets().unwrap(), RecoilOffsets::new(3.5, 0.0));

        assert!(shell.edit_offset(WeaponSlot::Primary, Axis::Vertical, "abc").is_err());
        assert_eq!(shell.engine().active_offsets().unwrap().vertical, 3.5);
    }

    #[tokio::test]
    async fn preset_load_reapplies_active_slot() {
        let dir = tempfile::tempdir().unwrap();
        let (shell, _manager) = shell(dir.path());
        shell.select_agent("Kay O", "1x").unwrap();

        shell.set_offset(WeaponSlot::Primary, Axis::Vertical, 4.0).unwrap();
        shell.set_offset(WeaponSlot::Primary, Axis::Horizontal, 0.5).unwrap();
        shell.save_preset("vandal").await.unwrap();
        assert_eq!(shell.list_presets().await.unwrap(), vec!["vandal"]);
        assert_eq!(shell.list_agents().await.unwrap(), vec!["kay_o"]);

        shell.set_offset(WeaponSlot::Primary, Axis::Vertical, 1.0).unwrap();
        shell.load_preset("vandal").await.unwrap();
        assert_eq!(shell.engine().active_offsets().unwrap(), RecoilOffsets::new(4.0, 0.5));

        shell.delete_preset("vandal").await.unwrap();
        assert!(shell.load_preset("vandal").await.is_err());
    }

    #[tokio::test]
    async fn tuning_reaches_engine_only_when_valid() {
        let dir = tempfile::tempdir().unwrap();
        let (shell, _manager) = shell(dir.path());

        let mut tuning = TuningParameters::default();
        tuning.correction_interval_secs = 0.0;
        assert!(shell.set_tuning(tuning).is_err());

        tuning.correction_interval_secs = 0.02;
        shell.set_tuning(tuning).unwrap();
        assert_eq!(shell.store().tuning().unwrap().correction_interval_secs, 0.02);
        assert!(shell.status_line().unwrap().contains("correction off"));
        shell.flush().await.unwrap();
        assert!(dir.path().join("settings.toml").exists());
    }
}
