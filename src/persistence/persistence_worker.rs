use super::presets::{PresetLibrary, PresetRecord};
use super::settings_file::{save_settings, SettingsRecord};
use color_eyre::Result;
use std::path::PathBuf;
use tokio::sync::mpsc::{channel, error::TrySendError, Sender};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

macro_rules! handle_action {
    ($action:expr, $response_tx:expr) => {
        if let Err(_) = $response_tx.send($action.await) {
            error!("Failed to send response");
        }
    };
}

/// Where the worker writes
#[derive(Debug, Clone)]
pub struct PersistencePaths {
    pub settings_file: PathBuf,
    pub presets_dir: PathBuf,
}

/// Owns all file writes; runs as one tokio task
pub struct PersistenceManager {
    tx: Sender<PersistenceAction>,
    worker_handle: JoinHandle<()>,
}

impl PersistenceManager {
    pub fn spawn(paths: PersistencePaths) -> Self {
        let (tx, mut rx) = channel::<PersistenceAction>(32);
        let library = PresetLibrary::new(paths.presets_dir.clone());
        let settings_file = paths.settings_file;

        let handle = tokio::spawn(async move {
            info!("Persistence worker started");
            while let Some(action) = rx.recv().await {
                match action {
                    PersistenceAction::SaveSettings { record } => {
                        if let Err(e) = save_settings(&settings_file, &record).await {
                            error!("Failed to save settings: {}", e);
                        }
                    }
                    PersistenceAction::FlushSettings {
                        record,
                        response_tx,
                    } => {
                        handle_action!(save_settings(&settings_file, &record), response_tx);
                    }
                    PersistenceAction::SavePreset {
                        agent,
                        name,
                        preset,
                        response_tx,
                    } => {
                        handle_action!(library.save(&agent, &name, &preset), response_tx);
                    }
                    PersistenceAction::LoadPreset {
                        agent,
                        name,
                        response_tx,
                    } => {
                        handle_action!(library.load(&agent, &name), response_tx);
                    }
                    PersistenceAction::DeletePreset {
                        agent,
                        name,
                        response_tx,
                    } => {
                        handle_action!(library.delete(&agent, &name), response_tx);
                    }
                    PersistenceAction::ListPresets { agent, response_tx } => {
                        handle_action!(library.list(&agent), response_tx);
                    }
                    PersistenceAction::ListAgents { response_tx } => {
                        handle_action!(library.list_agents(), response_tx);
                    }
                }
            }
            debug!("Persistence worker channel closed");
        });

        Self {
            tx,
            worker_handle: handle,
        }
    }

    pub fn client(&self) -> PersistenceClient {
        PersistenceClient {
            tx: self.tx.clone(),
        }
    }

    /// Drops the manager's sender and waits for queued writes to finish.
    ///
    /// Clients still alive keep the worker running, so drop them first.
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.worker_handle.await {
            error!("Persistence worker ended abnormally: {}", e);
        }
        info!("Persistence worker stopped");
    }
}

#[derive(Debug)]
pub enum PersistenceAction {
    SaveSettings {
        record: SettingsRecord,
    },
    FlushSettings {
        record: SettingsRecord,
        response_tx: oneshot::Sender<Result<()>>,
    },
    SavePreset {
        agent: String,
        name: String,
        preset: PresetRecord,
        response_tx: oneshot::Sender<Result<()>>,
    },
    LoadPreset {
        agent: String,
        name: String,
        response_tx: oneshot::Sender<Result<PresetRecord>>,
    },
    DeletePreset {
        agent: String,
        name: String,
        response_tx: oneshot::Sender<Result<()>>,
    },
    ListPresets {
        agent: String,
        response_tx: oneshot::Sender<Result<Vec<String>>>,
    },
    ListAgents {
        response_tx: oneshot::Sender<Result<Vec<String>>>,
    },
}

/// Cloneable front for the persistence worker
#[derive(Debug, Clone)]
pub struct PersistenceClient {
    tx: Sender<PersistenceAction>,
}

impl PersistenceClient {
    /// Fire-and-forget settings rewrite; never blocks the caller
    pub fn save_settings(&self, record: SettingsRecord) {
        match self.tx.try_send(PersistenceAction::SaveSettings { record }) {
            Ok(()) => debug!("Settings write queued"),
            Err(TrySendError::Full(_)) => warn!("Persistence queue full, settings write dropped"),
            Err(TrySendError::Closed(_)) => error!("Persistence worker gone, settings not saved"),
        }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T>>) -> PersistenceAction,
    ) -> Result<T> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(build(response_tx))
            .await
            .map_err(|e| color_eyre::eyre::eyre!("Persistence worker unavailable: {}", e))?;
        response_rx
            .await
            .map_err(|e| color_eyre::eyre::eyre!("Persistence worker dropped request: {}", e))?
    }

    /// Writes settings and waits for the result
    pub async fn flush_settings(&self, record: SettingsRecord) -> Result<()> {
        self.request(|response_tx| PersistenceAction::FlushSettings {
            record,
            response_tx,
        })
        .await
    }

    pub async fn save_preset(&self, agent: &str, name: &str, preset: PresetRecord) -> Result<()> {
        self.request(|response_tx| PersistenceAction::SavePreset {
            agent: agent.to_string(),
            name: name.to_string(),
            preset,
            response_tx,
        })
        .await
    }

    pub async fn load_preset(&self, agent: &str, name: &str) -> Result<PresetRecord> {
        self.request(|response_tx| PersistenceAction::LoadPreset {
            agent: agent.to_string(),
            name: name.to_string(),
            response_tx,
        })
        .await
    }

    pub async fn delete_preset(&self, agent: &str, name: &str) -> Result<()> {
        self.request(|response_tx| PersistenceAction::DeletePreset {
            agent: agent.to_string(),
            name: name.to_string(),
            response_tx,
        })
        .await
    }

    pub async fn list_presets(&self, agent: &str) -> Result<Vec<String>> {
        self.request(|response_tx| PersistenceAction::ListPresets {
            agent: agent.to_string(),
            response_tx,
        })
        .await
    }

    pub async fn list_agents(&self) -> Result<Vec<String>> {
        self.request(|response_tx| PersistenceAction::ListAgents { response_tx })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::settings_file::load_settings;
    use crate::profiles::{Axis, ProfileSettings, ProfileStore, WeaponSlot};

    fn paths(dir: &std::path::Path) -> PersistencePaths {
        PersistencePaths {
            settings_file: dir.join("settings.toml"),
            presets_dir: dir.join("presets"),
        }
    }

    #[tokio::test]
    async fn store_edits_are_written_through() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths(dir.path());
        let manager = PersistenceManager::spawn(paths.clone());
        let store = ProfileStore::new(ProfileSettings::default()).with_persistence(manager.client());

        store.set_offset(WeaponSlot::Primary, Axis::Vertical, 6.5).unwrap();
        store.set_secondary_enabled(true).unwrap();

        // the flush is queued behind the fire-and-forget writes
        manager.client().flush_settings(store.record().unwrap()).await.unwrap();

        let (record, notices) = load_settings(&paths.settings_file).await;
        assert!(notices.is_empty());
        assert_eq!(record.primary_recoil_y, 6.5);
        assert!(record.secondary_weapon_enabled);

        drop(store);
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn preset_requests_round_trip_through_the_worker() {
        let dir = tempfile::tempdir().unwrap();
        let manager = PersistenceManager::spawn(paths(dir.path()));
        let client = manager.client();

        let preset = PresetRecord {
            primary_recoil_y: 2.0,
            secondary_weapon_enabled: true,
            ..PresetRecord::default()
        };
        client.save_preset("Sova", "guardian", preset).await.unwrap();
        assert_eq!(client.list_agents().await.unwrap(), vec!["sova"]);
        assert_eq!(client.list_presets("Sova").await.unwrap(), vec!["guardian"]);
        assert_eq!(client.load_preset("Sova", "guardian").await.unwrap(), preset);

        assert!(client.save_preset("Sova", "../escape", preset).await.is_err());
        client.delete_preset("Sova", "guardian").await.unwrap();
        assert!(client.load_preset("Sova", "guardian").await.is_err());

        drop(client);
        manager.shutdown().await;
    }
}
