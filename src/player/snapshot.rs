use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::common::errors::{MusicError, MusicResult};
use crate::common::types::{ChannelId, MessageId};
use crate::player::selection::SelectMode;

/// Identity of a tracked chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRef {
    pub channel_id: ChannelId,
    pub message_id: MessageId,
}

/// Durable per-guild session state, one JSON file per guild.
///
/// This is the complete on-disk schema; queue and history are transient by
/// design and deliberately absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub mode: SelectMode,
    pub min_repeat_interval: usize,
    pub text_channel_id: ChannelId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_channel_id: Option<ChannelId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub now_playing_message: Option<MessageRef>,
}

impl SessionSnapshot {
    /// Write the snapshot atomically: serialize to a sibling `.tmp` file,
    /// then rename over the target so a reader never observes a torn file.
    pub fn write(&self, path: &Path) -> MusicResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let tmp = path.with_extension("json.tmp");
        let payload = serde_json::to_vec_pretty(self)
            .map_err(|e| MusicError::CorruptSnapshot(e.to_string()))?;
        std::fs::write(&tmp, payload)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn read(path: &Path) -> MusicResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|e| MusicError::CorruptSnapshot(e.to_string()))
    }
}
