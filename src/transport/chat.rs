use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::common::types::{ChannelId, MessageId};

#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ChatError(pub String);

/// Handle to the chat platform, scoped to what the playback core needs:
/// fetching channels to post status messages into.
pub trait ChatClient: Send + Sync {
    fn channel(&self, id: ChannelId) -> Arc<dyn ChatChannel>;
}

/// A single text channel.
#[async_trait]
pub trait ChatChannel: Send + Sync {
    fn id(&self) -> ChannelId;

    async fn send(&self, content: &str) -> Result<MessageId, ChatError>;

    async fn edit(&self, message_id: MessageId, content: &str) -> Result<(), ChatError>;

    /// Id of the newest message in the channel, if any.
    async fn fetch_latest(&self) -> Result<Option<MessageId>, ChatError>;

    async fn delete(&self, message_id: MessageId) -> Result<(), ChatError>;
}
