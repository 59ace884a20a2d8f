use async_trait::async_trait;
use thiserror::Error;

use crate::common::types::{ChannelId, GuildId};

/// Failure reported by the voice transport, either when starting playback
/// or through the completion callback.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct PlaybackError(pub String);

/// Callback invoked by the transport once a track stops playing, with the
/// outcome. Invoked exactly once, possibly from a transport-owned thread.
pub type TrackCallback = Box<dyn FnOnce(Result<(), PlaybackError>) + Send>;

/// Opaque playable payload handed from the resolver to the voice transport.
///
/// The core never inspects it; concrete transports downcast or wrap.
pub trait AudioSource: Send {
    /// MIME / content-type of the stream, if known.
    fn content_type(&self) -> Option<String> {
        None
    }
}

/// Factory for per-channel voice connections.
#[async_trait]
pub trait VoiceConnector: Send + Sync {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Box<dyn VoiceConnection>, PlaybackError>;
}

/// A live connection to one voice channel. Exactly one per guild, owned by
/// that guild's playback session.
#[async_trait]
pub trait VoiceConnection: Send + Sync {
    /// The channel this connection is currently bound to.
    fn channel_id(&self) -> ChannelId;

    /// Move the connection to another channel in the same guild.
    async fn move_to(&self, channel_id: ChannelId) -> Result<(), PlaybackError>;

    /// Start playing `source`; `on_finished` fires once playback ends.
    /// Replacing a track that is still playing discards the replaced
    /// track's callback without firing it.
    async fn play(
        &self,
        source: Box<dyn AudioSource>,
        on_finished: TrackCallback,
    ) -> Result<(), PlaybackError>;

    async fn pause(&self);
    async fn resume(&self);
    async fn stop(&self);

    fn is_playing(&self) -> bool;
    fn is_paused(&self) -> bool;

    /// Whether the bound channel currently has members that would actually
    /// hear playback (non-deaf, non-AFK).
    fn has_listeners(&self) -> bool;

    async fn disconnect(&self);
}
