use std::sync::Arc;

use dashmap::DashMap;
use tracing::{info, warn};

use crate::common::errors::MusicResult;
use crate::common::types::{ChannelId, GuildId};
use crate::player::session::{PlaybackSession, SessionContext};
use crate::player::snapshot::SessionSnapshot;

/// Owns every live [`PlaybackSession`], one per guild.
///
/// Sessions are created lazily on first interaction and never evicted
/// while the process runs; an idle session is just a queue, a mode and a
/// parked inbox task.
pub struct SessionManager {
    ctx: Arc<SessionContext>,
    sessions: DashMap<GuildId, Arc<PlaybackSession>>,
}

impl SessionManager {
    pub fn new(ctx: Arc<SessionContext>) -> Self {
        Self {
            ctx,
            sessions: DashMap::new(),
        }
    }

    pub fn get(&self, guild_id: GuildId) -> Option<Arc<PlaybackSession>> {
        self.sessions.get(&guild_id).map(|s| s.clone())
    }

    /// Fetch the guild's session, creating it on first interaction.
    /// `text_channel_id` binds status messages for a fresh session only.
    pub fn get_or_create(
        &self,
        guild_id: GuildId,
        text_channel_id: ChannelId,
    ) -> MusicResult<Arc<PlaybackSession>> {
        if let Some(session) = self.sessions.get(&guild_id) {
            return Ok(session.clone());
        }
        // racing creators both build; the map keeps the first insert
        let session = PlaybackSession::create(self.ctx.clone(), guild_id, text_channel_id)?;
        let entry = self
            .sessions
            .entry(guild_id)
            .or_insert(session);
        Ok(entry.clone())
    }

    /// Rebuild sessions from the snapshots on disk at process start.
    /// A corrupt or unreadable snapshot skips that guild with a warning.
    /// Returns the number of sessions restored.
    pub async fn restore_all(&self) -> usize {
        let dir = self.ctx.storage.sessions_dir();
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(path = %dir.display(), %err, "could not list session snapshots");
                return 0;
            }
        };

        let mut restored = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(guild_id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<u64>().ok())
                .map(GuildId)
            else {
                warn!(path = %path.display(), "skipping snapshot with unparseable name");
                continue;
            };

            let snapshot = match SessionSnapshot::read(&path) {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    warn!(guild = %guild_id, %err, "skipping unreadable session snapshot");
                    continue;
                }
            };

            match PlaybackSession::restore(self.ctx.clone(), guild_id, snapshot).await {
                Ok(session) => {
                    self.sessions.insert(guild_id, session);
                    restored += 1;
                }
                Err(err) => {
                    warn!(guild = %guild_id, %err, "failed to restore session");
                }
            }
        }
        info!(restored, "session restore complete");
        restored
    }

    /// Snapshot every session. Voice connections are left alone; restore
    /// reconnects them on the next start.
    pub async fn shutdown(&self) {
        for entry in self.sessions.iter() {
            entry.value().save().await;
        }
        info!(sessions = self.sessions.len(), "session state saved");
    }

    /// Process-wide summary for health reporting.
    pub fn status(&self) -> ManagerStatus {
        ManagerStatus {
            sessions: self.sessions.len(),
            songs_known: self.ctx.registry.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerStatus {
    /// Live sessions, idle ones included.
    pub sessions: usize,
    /// Distinct songs in the shared registry.
    pub songs_known: usize,
}
