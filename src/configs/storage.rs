use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::common::types::GuildId;

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory for all durable state.
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

impl StorageConfig {
    pub fn registry_file(&self) -> PathBuf {
        self.data_dir.join("songs.csv")
    }

    pub fn guild_sets_dir(&self) -> PathBuf {
        self.data_dir.join("sets")
    }

    pub fn guild_set_file(&self, guild_id: GuildId) -> PathBuf {
        self.guild_sets_dir().join(format!("{}.csv", guild_id))
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.data_dir.join("sessions")
    }

    pub fn snapshot_file(&self, guild_id: GuildId) -> PathBuf {
        self.sessions_dir().join(format!("{}.json", guild_id))
    }

    /// Create every directory durable state lands in.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(self.guild_sets_dir())?;
        std::fs::create_dir_all(self.sessions_dir())?;
        Ok(())
    }
}

impl AsRef<Path> for StorageConfig {
    fn as_ref(&self) -> &Path {
        &self.data_dir
    }
}
