use std::sync::Arc;

use crate::common::types::{ChannelId, MessageId};
use crate::player::snapshot::MessageRef;
use crate::transport::chat::{ChatChannel, ChatError};

/// A message that sticks to the bottom of a channel until deleted.
///
/// On update, if the tracked message is still the newest in the channel it
/// is edited in place; otherwise it is deleted and resent, retargeting the
/// tracked identity. Checking "latest message" is the only way to decide
/// edit-vs-resend without subscribing to full channel history.
pub struct NowPlayingMessage {
    channel: Arc<dyn ChatChannel>,
    message_id: MessageId,
}

impl NowPlayingMessage {
    /// Send a fresh sticky message.
    pub async fn send(channel: Arc<dyn ChatChannel>, content: &str) -> Result<Self, ChatError> {
        let message_id = channel.send(content).await?;
        Ok(Self {
            channel,
            message_id,
        })
    }

    /// Re-attach to a message recorded in a snapshot.
    pub fn attach(channel: Arc<dyn ChatChannel>, message_id: MessageId) -> Self {
        Self {
            channel,
            message_id,
        }
    }

    pub async fn update(&mut self, content: &str) -> Result<(), ChatError> {
        let latest = self.channel.fetch_latest().await?;
        if latest == Some(self.message_id) {
            self.channel.edit(self.message_id, content).await
        } else {
            // stale: something was posted after us, resend at the bottom
            let _ = self.channel.delete(self.message_id).await;
            self.message_id = self.channel.send(content).await?;
            Ok(())
        }
    }

    /// Remove the tracked message, consuming the identity.
    pub async fn delete(self) -> Result<(), ChatError> {
        self.channel.delete(self.message_id).await
    }

    pub fn message_id(&self) -> MessageId {
        self.message_id
    }

    pub fn channel_id(&self) -> ChannelId {
        self.channel.id()
    }

    pub fn message_ref(&self) -> MessageRef {
        MessageRef {
            channel_id: self.channel.id(),
            message_id: self.message_id,
        }
    }
}
