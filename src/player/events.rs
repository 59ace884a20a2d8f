use crate::transport::voice::PlaybackError;

/// Asynchronous signals delivered to a session's inbox.
///
/// Transport callbacks fire on transport-owned threads; routing them
/// through the inbox marshals every mutation onto the session's driver
/// task and gives the generation staleness check a single home.
#[derive(Debug)]
pub enum SessionEvent {
    /// A track stopped playing. `generation` is the connection generation
    /// captured when playback started; events from superseded connections
    /// are dropped.
    TrackFinished {
        generation: u64,
        result: Result<(), PlaybackError>,
    },
    /// A listening member appeared in the bound voice channel; playback
    /// paused for an empty room may resume.
    ListenerJoined,
    /// The voice transport dropped the connection.
    ConnectionLost { generation: u64 },
}
