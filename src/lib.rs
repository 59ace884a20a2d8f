//! Per-guild music playback core: durable song library, queue/shuffle/radio
//! selection, and playback sessions that survive restarts.
//!
//! The crate is transport-agnostic. A host binary supplies implementations
//! of the [`transport`] traits (voice, chat, resolver) and drives commands
//! through [`player::SessionManager`]; everything guild-scoped lives in a
//! [`player::PlaybackSession`].

pub mod common;
pub mod configs;
pub mod library;
pub mod player;
pub mod transport;

pub use common::errors::{MusicError, MusicResult};
pub use configs::Config;
pub use library::{GuildSongSet, SongInfo, SongKey, SongQueue, SongRegistry};
pub use player::{PlaybackSession, SelectMode, SessionManager};
