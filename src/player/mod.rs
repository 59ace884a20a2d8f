pub mod events;
pub mod manager;
pub mod selection;
pub mod session;
pub mod snapshot;
pub mod sticky;

#[cfg(test)]
pub(crate) mod testing;

pub use events::SessionEvent;
pub use manager::{ManagerStatus, SessionManager};
pub use selection::{SelectMode, SelectionEngine};
pub use session::{PlaybackSession, QueueStatus, SessionContext, SessionPhase};
pub use snapshot::{MessageRef, SessionSnapshot};
pub use sticky::NowPlayingMessage;
