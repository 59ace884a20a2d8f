use thiserror::Error;

use crate::common::types::GuildId;
use crate::library::song::SongKey;

/// Everything that can go wrong inside the playback core.
///
/// All session-internal failures are converted to one of these at the
/// session boundary; none of them is allowed to take the process down.
#[derive(Debug, Error)]
pub enum MusicError {
    /// The requester tried to pull the bot away from a channel where it is
    /// still playing for other listeners.
    #[error("already playing for listeners in another channel")]
    AuthorNotInPlayingChannel,

    /// An operation that needs a live voice connection was called without one.
    #[error("no live voice connection for guild {0}")]
    NotConnected(GuildId),

    /// The queue cap configured for this deployment was reached.
    #[error("song queue is full ({0} entries)")]
    QueueFull(usize),

    /// Resolving or opening an audio source failed. The affected track is
    /// skipped; auto-advance retries the next track exactly once.
    #[error("failed to open audio for {key}: {reason}")]
    ResourceUnavailable { key: SongKey, reason: String },

    /// The voice transport dropped underneath us.
    #[error("voice connection lost for guild {0}")]
    ConnectionLost(GuildId),

    /// A persisted session snapshot could not be parsed. Never fatal to
    /// startup; the guild starts over from defaults.
    #[error("corrupt session snapshot: {0}")]
    CorruptSnapshot(String),

    /// Voice transport refused a connect/move/play request.
    #[error("voice transport error: {0}")]
    Voice(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Chat-side failure while maintaining the now-playing message.
    #[error("chat error: {0}")]
    Chat(String),
}

pub type MusicResult<T> = std::result::Result<T, MusicError>;
