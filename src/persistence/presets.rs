//! Per-agent preset library
//!
//! Layout: `<root>/<agent_slug>/<preset>.toml`, one small document per preset
//! holding exactly the five preset fields.

use crate::profiles::{ProfileError, ProfileSettings};
use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const PRESET_EXTENSION: &str = "toml";

/// The fields a preset carries; loading one touches nothing else
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PresetRecord {
    pub primary_recoil_y: f64,
    pub primary_recoil_x: f64,
    pub secondary_recoil_y: f64,
    pub secondary_recoil_x: f64,
    pub secondary_weapon_enabled: bool,
}

impl From<&ProfileSettings> for PresetRecord {
    fn from(settings: &ProfileSettings) -> Self {
        Self {
            primary_recoil_y: settings.primary.offsets.vertical,
            primary_recoil_x: settings.primary.offsets.horizontal,
            secondary_recoil_y: settings.secondary.offsets.vertical,
            secondary_recoil_x: settings.secondary.offsets.horizontal,
            secondary_weapon_enabled: settings.secondary_enabled,
        }
    }
}

/// Directory name for an agent: lower-case, spaces become underscores
pub fn agent_slug(agent: &str) -> String {
    agent.trim().to_lowercase().replace(' ', "_")
}

/// Rejects names that would escape the agent directory
pub fn validate_preset_name(name: &str) -> Result<&str, ProfileError> {
    let trimmed = name.trim();
    if trimmed.is_empty()
        || trimmed.contains('/')
        || trimmed.contains('\\')
        || trimmed.contains("..")
    {
        return Err(ProfileError::InvalidPresetName(name.to_string()));
    }
    Ok(trimmed)
}

#[derive(Debug, Clone)]
pub struct PresetLibrary {
    root: PathBuf,
}

impl PresetLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn agent_dir(&self, agent: &str) -> Result<PathBuf> {
        let slug = agent_slug(agent);
        validate_preset_name(&slug).map_err(|_| eyre!("Invalid agent name: '{}'", agent))?;
        Ok(self.root.join(slug))
    }

    fn preset_path(&self, agent: &str, name: &str) -> Result<PathBuf> {
        let name = validate_preset_name(name)?;
        let mut path = self.agent_dir(agent)?;
        path.push(format!("{}.{}", name, PRESET_EXTENSION));
        Ok(path)
    }

    pub async fn save(&self, agent: &str, name: &str, preset: &PresetRecord) -> Result<()> {
        let path = self.preset_path(agent, name)?;
        let dir = self.agent_dir(agent)?;

        if !tokio::fs::try_exists(&dir)
            .await
            .map_err(|e| eyre!("Failed to check if agent directory exists: {}", e))?
        {
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| eyre!("Failed to create agent directory: {}", e))?;
        }

        let content = toml::to_string_pretty(preset)
            .map_err(|e| eyre!("Failed to serialize preset: {}", e))?;

        tokio::fs::write(&path, content)
            .await
            .map_err(|e| eyre!("Failed to write preset file: {}", e))?;

        info!("Preset '{}' saved for agent {}", name, agent);
        Ok(())
    }

    pub async fn load(&self, agent: &str, name: &str) -> Result<PresetRecord> {
        let path = self.preset_path(agent, name)?;

        if !tokio::fs::try_exists(&path)
            .await
            .map_err(|e| eyre!("Failed to check if preset exists: {}", e))?
        {
            return Err(eyre!("Preset '{}' does not exist for agent {}", name, agent));
        }

        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| eyre!("Failed to read preset file: {}", e))?;

        let preset: PresetRecord =
            toml::from_str(&content).map_err(|e| eyre!("Failed to parse preset file: {}", e))?;

        debug!("Preset '{}' loaded for agent {}: {:?}", name, agent, preset);
        Ok(preset)
    }

    pub async fn delete(&self, agent: &str, name: &str) -> Result<()> {
        let path = self.preset_path(agent, name)?;

        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| eyre!("Failed to delete preset '{}': {}", name, e))?;

        info!("Preset '{}' deleted for agent {}", name, agent);
        Ok(())
    }

    /// Preset names for an agent, sorted; an unknown agent has none
    pub async fn list(&self, agent: &str) -> Result<Vec<String>> {
        let dir = self.agent_dir(agent)?;
        let mut names = Self::scan(&dir, |path| {
            let is_preset = path
                .extension()
                .is_some_and(|ext| ext == PRESET_EXTENSION);
            if is_preset {
                path.file_stem().map(|s| s.to_string_lossy().into_owned())
            } else {
                None
            }
        })
        .await?;
        names.sort();
        Ok(names)
    }

    /// Agent directories that exist under the root, sorted
    pub async fn list_agents(&self) -> Result<Vec<String>> {
        let mut agents = Self::scan(&self.root, |path| {
            if path.is_dir() {
                path.file_name().map(|s| s.to_string_lossy().into_owned())
            } else {
                None
            }
        })
        .await?;
        agents.sort();
        Ok(agents)
    }

    async fn scan(dir: &Path, select: impl Fn(&Path) -> Option<String>) -> Result<Vec<String>> {
        if !tokio::fs::try_exists(dir)
            .await
            .map_err(|e| eyre!("Failed to check directory {}: {}", dir.display(), e))?
        {
            return Ok(Vec::new());
        }

        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| eyre!("Failed to read directory {}: {}", dir.display(), e))?;

        let mut found = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| eyre!("Failed to read directory entry: {}", e))?
        {
            match select(&entry.path()) {
                Some(name) => found.push(name),
                None => warn!("Skipping {}", entry.path().display()),
            }
        }
        Ok(found)
    }
}
