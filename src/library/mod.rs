pub mod guild_set;
pub mod queue;
pub mod registry;
pub mod song;

pub use guild_set::GuildSongSet;
pub use queue::SongQueue;
pub use registry::SongRegistry;
pub use song::{SongInfo, SongKey};
