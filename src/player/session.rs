use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::common::errors::{MusicError, MusicResult};
use crate::common::fmt::format_duration;
use crate::common::types::{ChannelId, GuildId, Shared};
use crate::configs::{PlayerConfig, StorageConfig};
use crate::library::guild_set::GuildSongSet;
use crate::library::registry::SongRegistry;
use crate::library::song::{SongInfo, SongKey};
use crate::player::events::SessionEvent;
use crate::player::selection::{SelectMode, SelectionEngine};
use crate::player::snapshot::SessionSnapshot;
use crate::player::sticky::NowPlayingMessage;
use crate::transport::chat::ChatClient;
use crate::transport::resolver::AudioResolver;
use crate::transport::voice::{TrackCallback, VoiceConnection, VoiceConnector};

/// Sticky content shown while the session waits for listeners.
const IDLE_NOTICE: &str = "…";
/// Sticky content left behind when auto-advance gives up.
const FAILURE_NOTICE: &str = "Playback stopped after repeated failures. Queue something to try again.";

/// Shared collaborators and configuration handed to every session.
pub struct SessionContext {
    pub registry: Arc<SongRegistry>,
    pub resolver: Arc<dyn AudioResolver>,
    pub voice: Arc<dyn VoiceConnector>,
    pub chat: Arc<dyn ChatClient>,
    pub player: PlayerConfig,
    pub storage: StorageConfig,
}

/// Lifecycle phase of a playback session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No voice connection.
    Idle,
    /// Connected, nothing selected.
    ConnectedIdle,
    Playing,
    Paused,
}

/// Summary of the transient selection state, for command handlers.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueStatus {
    pub mode: SelectMode,
    pub queue_len: usize,
    pub queue_duration_secs: u64,
    pub set_len: usize,
    pub current: Option<SongKey>,
}

struct SessionState {
    engine: SelectionEngine,
    connection: Option<Box<dyn VoiceConnection>>,
    text_channel_id: ChannelId,
    now_playing: Option<NowPlayingMessage>,
    /// Failed picks since the last successful track completion; two in a
    /// row halt auto-advance.
    consecutive_failures: u8,
}

/// Per-guild playback orchestrator.
///
/// Owns the voice connection, the selection engine and the now-playing
/// message, and persists a snapshot after every state-affecting mutation.
/// Command handlers call the async methods directly; asynchronous transport
/// signals go through the inbox and are applied by a driver task, so all
/// mutation for one guild is serialized.
///
/// Each voice connection carries a generation number. `stop`/`reset` and
/// teardown bump it, so completion callbacks captured under an older
/// generation are dropped on arrival instead of mutating fresh state.
pub struct PlaybackSession {
    guild_id: GuildId,
    ctx: Arc<SessionContext>,
    state: Shared<SessionState>,
    generation: AtomicU64,
    events: flume::Sender<SessionEvent>,
}

impl PlaybackSession {
    /// Create a session for first interaction with a guild.
    pub fn create(
        ctx: Arc<SessionContext>,
        guild_id: GuildId,
        text_channel_id: ChannelId,
    ) -> MusicResult<Arc<Self>> {
        let set = Arc::new(GuildSongSet::open(
            guild_id,
            ctx.storage.guild_set_file(guild_id),
            ctx.registry.clone(),
        )?);
        let engine =
            SelectionEngine::new(ctx.registry.clone(), set, ctx.player.min_repeat_interval);
        Ok(Self::start(ctx, guild_id, text_channel_id, engine))
    }

    /// Rebuild a session from its snapshot at process start: reconnect
    /// voice if one was recorded, re-attach the now-playing message, and
    /// resume playback.
    pub async fn restore(
        ctx: Arc<SessionContext>,
        guild_id: GuildId,
        snapshot: SessionSnapshot,
    ) -> MusicResult<Arc<Self>> {
        let session = Self::create(ctx.clone(), guild_id, snapshot.text_channel_id)?;
        {
            let mut st = session.state.lock().await;
            st.engine
                .set_min_repeat_interval(snapshot.min_repeat_interval);
            st.engine.set_mode(snapshot.mode);

            if let Some(message) = snapshot.now_playing_message {
                st.now_playing = Some(NowPlayingMessage::attach(
                    ctx.chat.channel(message.channel_id),
                    message.message_id,
                ));
            }

            if let Some(channel_id) = snapshot.voice_channel_id {
                match ctx.voice.connect(guild_id, channel_id).await {
                    Ok(connection) => {
                        session.generation.fetch_add(1, Ordering::SeqCst);
                        st.connection = Some(connection);
                    }
                    Err(err) => {
                        warn!(guild = %guild_id, %err, "could not reconnect voice on restore")
                    }
                }
            }

            if st.connection.is_some() {
                debug!(guild = %guild_id, "resuming playback after restore");
                session.advance_with_retry(&mut st).await;
            }
        }
        Ok(session)
    }

    fn start(
        ctx: Arc<SessionContext>,
        guild_id: GuildId,
        text_channel_id: ChannelId,
        engine: SelectionEngine,
    ) -> Arc<Self> {
        let (events, inbox) = flume::unbounded();
        let session = Arc::new(Self {
            guild_id,
            ctx,
            state: Arc::new(Mutex::new(SessionState {
                engine,
                connection: None,
                text_channel_id,
                now_playing: None,
                consecutive_failures: 0,
            })),
            generation: AtomicU64::new(0),
            events,
        });

        // driver task: the single place transport signals touch state
        let weak = Arc::downgrade(&session);
        tokio::spawn(async move {
            while let Ok(event) = inbox.recv_async().await {
                let Some(session) = weak.upgrade() else { break };
                session.handle_event(event).await;
            }
        });

        session
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    /// Connect to (or move to) a voice channel.
    ///
    /// Refused while playing in a different channel that still has
    /// listening members; the requester should join that channel instead.
    pub async fn join(&self, channel_id: ChannelId) -> MusicResult<()> {
        let mut st = self.state.lock().await;
        if let Some(connection) = &st.connection {
            if connection.channel_id() == channel_id {
                return Ok(());
            }
            if connection.is_playing() && connection.has_listeners() {
                return Err(MusicError::AuthorNotInPlayingChannel);
            }
            connection
                .move_to(channel_id)
                .await
                .map_err(|err| MusicError::Voice(err.to_string()))?;
        } else {
            let connection = self
                .ctx
                .voice
                .connect(self.guild_id, channel_id)
                .await
                .map_err(|err| MusicError::Voice(err.to_string()))?;
            self.generation.fetch_add(1, Ordering::SeqCst);
            st.connection = Some(connection);
        }
        self.write_snapshot(&st);
        Ok(())
    }

    /// Queue one song; starts playback if nothing is playing yet.
    pub async fn enqueue(&self, song: &SongInfo) -> MusicResult<()> {
        let mut st = self.state.lock().await;
        self.admit(&mut st, song)?;
        self.write_snapshot(&st);
        if !self.is_playing_locked(&st) && st.connection.is_some() {
            self.advance_with_retry(&mut st).await;
        }
        Ok(())
    }

    /// Queue a batch of resolved songs.
    ///
    /// While shuffling and idle, the first pick of a multi-song batch is
    /// randomized so playback does not always open on the first resolved
    /// item. Returns how many songs were admitted; a configured queue cap
    /// stops admission mid-batch with `QueueFull`.
    pub async fn enqueue_batch(&self, songs: &[SongInfo]) -> MusicResult<usize> {
        use rand::Rng;

        let mut st = self.state.lock().await;
        let mut order: Vec<&SongInfo> = songs.iter().collect();
        if st.engine.mode() == SelectMode::Shuffle && !self.is_playing_locked(&st) && order.len() > 1
        {
            debug!(guild = %self.guild_id, "randomizing first song of shuffled batch");
            let idx = rand::thread_rng().gen_range(0..order.len());
            order.swap(0, idx);
        }

        let mut admitted = 0;
        let mut capped = None;
        for song in order {
            match self.admit(&mut st, song) {
                Ok(()) => admitted += 1,
                Err(err) => {
                    capped = Some(err);
                    break;
                }
            }
        }

        if admitted > 0 {
            self.write_snapshot(&st);
            if !self.is_playing_locked(&st) && st.connection.is_some() {
                self.advance_with_retry(&mut st).await;
            }
        }
        match capped {
            Some(err) => Err(err),
            None => Ok(admitted),
        }
    }

    /// Queue every song ever played in this guild. A configured queue cap
    /// truncates the refill silently; returns how many songs were queued.
    pub async fn enqueue_all(&self) -> MusicResult<usize> {
        let mut st = self.state.lock().await;
        let keys = st.engine.song_set().keys();
        let mut queued = 0;
        for key in keys {
            if self.queue_is_full(&st) {
                warn!(guild = %self.guild_id, "queue cap reached while queueing the guild set");
                break;
            }
            st.engine.enqueue(key);
            queued += 1;
        }
        if queued > 0 {
            self.write_snapshot(&st);
            if !self.is_playing_locked(&st) && st.connection.is_some() {
                self.advance_with_retry(&mut st).await;
            }
        }
        Ok(queued)
    }

    /// Skip to the next pick. Requires a live voice connection.
    pub async fn play_next(&self) -> MusicResult<()> {
        let mut st = self.state.lock().await;
        if st.connection.is_none() {
            return Err(MusicError::NotConnected(self.guild_id));
        }
        self.advance_with_retry(&mut st).await;
        Ok(())
    }

    /// Pause current playback. No-op unless playing.
    pub async fn pause(&self) {
        let st = self.state.lock().await;
        if let Some(connection) = &st.connection {
            if connection.is_playing() {
                connection.pause().await;
            }
        }
    }

    /// Resume paused playback. No-op unless paused.
    pub async fn resume(&self) {
        let st = self.state.lock().await;
        if let Some(connection) = &st.connection {
            if connection.is_paused() {
                connection.resume().await;
            }
        }
    }

    /// Stop playback and reset the session to defaults. See [`Self::reset`].
    pub async fn stop(&self) {
        self.reset().await;
    }

    /// Reset to a clean state ready for a new play attempt: drop the voice
    /// connection, empty queue and history, return to queue mode, and write
    /// a clean snapshot. The guild song set is durable and survives.
    pub async fn reset(&self) {
        // invalidate in-flight completions before touching state
        self.generation.fetch_add(1, Ordering::SeqCst);
        let mut st = self.state.lock().await;
        if let Some(connection) = st.connection.take() {
            connection.stop().await;
            connection.disconnect().await;
        }
        st.engine.reset();
        st.consecutive_failures = 0;
        self.clear_now_playing(&mut st).await;
        self.write_snapshot(&st);
    }

    /// Switch the selection mode. Entering radio while connected and idle
    /// starts playback immediately.
    pub async fn set_mode(&self, mode: SelectMode) {
        let mut st = self.state.lock().await;
        if st.engine.mode() == mode {
            return;
        }
        st.engine.set_mode(mode);
        self.write_snapshot(&st);
        if mode == SelectMode::Radio && !self.is_playing_locked(&st) && st.connection.is_some() {
            self.advance_with_retry(&mut st).await;
        }
    }

    /// Adjust the radio anti-repeat window (clamped to the supported range).
    pub async fn set_min_repeat_interval(&self, value: usize) {
        let mut st = self.state.lock().await;
        st.engine.set_min_repeat_interval(value);
        self.write_snapshot(&st);
    }

    /// Re-bind the text channel status messages go to.
    pub async fn set_text_channel(&self, channel_id: ChannelId) {
        let mut st = self.state.lock().await;
        if st.text_channel_id == channel_id {
            return;
        }
        st.text_channel_id = channel_id;
        self.write_snapshot(&st);
    }

    /// Create (or refresh) the sticky now-playing message for the current
    /// track. Returns false when nothing is playing.
    pub async fn display_now_playing(&self) -> MusicResult<bool> {
        let mut st = self.state.lock().await;
        let Some(current) = st.engine.current().cloned() else {
            return Ok(false);
        };
        let Some(song) = self.ctx.registry.get(&current) else {
            return Ok(false);
        };
        let line = now_playing_line(&song);

        match st.now_playing.as_mut() {
            Some(message) => message
                .update(&line)
                .await
                .map_err(|err| MusicError::Chat(err.to_string()))?,
            None => {
                let channel = self.ctx.chat.channel(st.text_channel_id);
                let message = NowPlayingMessage::send(channel, &line)
                    .await
                    .map_err(|err| MusicError::Chat(err.to_string()))?;
                st.now_playing = Some(message);
            }
        }
        self.write_snapshot(&st);
        Ok(true)
    }

    /// Deliver a "listening member appeared" signal; playback parked for an
    /// empty channel resumes from the driver task.
    pub fn notify_listener_joined(&self) {
        let _ = self.events.send(SessionEvent::ListenerJoined);
    }

    /// Deliver a transport-side connection drop.
    pub fn notify_connection_lost(&self) {
        let generation = self.generation.load(Ordering::SeqCst);
        let _ = self
            .events
            .send(SessionEvent::ConnectionLost { generation });
    }

    pub async fn phase(&self) -> SessionPhase {
        let st = self.state.lock().await;
        self.phase_of(&st)
    }

    pub async fn is_playing(&self) -> bool {
        self.phase().await == SessionPhase::Playing
    }

    pub async fn queue_status(&self) -> QueueStatus {
        let st = self.state.lock().await;
        QueueStatus {
            mode: st.engine.mode(),
            queue_len: st.engine.queue_len(),
            queue_duration_secs: st.engine.queue_duration_secs(),
            set_len: st.engine.song_set().len(),
            current: st.engine.current().cloned(),
        }
    }

    /// Persist the current state. Called once more at shutdown; every
    /// state-affecting mutation already snapshots on its own.
    pub async fn save(&self) {
        let st = self.state.lock().await;
        self.write_snapshot(&st);
    }

    async fn handle_event(&self, event: SessionEvent) {
        match event {
            SessionEvent::TrackFinished { generation, result } => {
                if generation != self.generation.load(Ordering::SeqCst) {
                    debug!(guild = %self.guild_id, "dropping stale track completion");
                    return;
                }
                let mut st = self.state.lock().await;
                // re-check under the lock: reset() bumps before mutating
                if generation != self.generation.load(Ordering::SeqCst)
                    || st.connection.is_none()
                {
                    return;
                }
                match result {
                    Ok(()) => {
                        st.consecutive_failures = 0;
                        if st.engine.has_pending() {
                            self.advance_with_retry(&mut st).await;
                        } else {
                            st.engine.clear_current();
                            self.teardown(&mut st).await;
                        }
                    }
                    Err(err) => {
                        warn!(guild = %self.guild_id, %err, "track ended with error");
                        st.consecutive_failures += 1;
                        if st.consecutive_failures >= 2 {
                            self.halt_with_notice(&mut st).await;
                        } else {
                            self.advance_with_retry(&mut st).await;
                        }
                    }
                }
            }
            SessionEvent::ListenerJoined => {
                let mut st = self.state.lock().await;
                if self.phase_of(&st) == SessionPhase::ConnectedIdle && st.engine.has_pending() {
                    debug!(guild = %self.guild_id, "resuming playback on member connect");
                    self.advance_with_retry(&mut st).await;
                }
            }
            SessionEvent::ConnectionLost { generation } => {
                if generation != self.generation.load(Ordering::SeqCst) {
                    return;
                }
                let mut st = self.state.lock().await;
                if st.connection.is_none() {
                    return;
                }
                warn!(guild = %self.guild_id, "voice connection lost");
                // queue and history stay put for a manual resume
                self.generation.fetch_add(1, Ordering::SeqCst);
                st.connection = None;
                self.write_snapshot(&st);
            }
        }
    }

    /// One selection + playback attempt. Errors mean "this pick failed";
    /// an empty pick is not an error.
    async fn advance(&self, st: &mut SessionState) -> MusicResult<()> {
        if st.connection.is_none() {
            return Err(MusicError::NotConnected(self.guild_id));
        }

        let listeners = st
            .connection
            .as_ref()
            .is_some_and(|c| c.has_listeners());
        if !listeners {
            // parked; a ListenerJoined signal picks this back up
            debug!(guild = %self.guild_id, "playback skipped, no listening members");
            if let Some(message) = st.now_playing.as_mut() {
                if let Err(err) = message.update(IDLE_NOTICE).await {
                    warn!(guild = %self.guild_id, %err, "failed to update now-playing message");
                }
            }
            return Ok(());
        }

        let Some(song) = st.engine.select_next() else {
            if let Some(connection) = &st.connection {
                if connection.is_playing() {
                    connection.stop().await;
                }
            }
            self.clear_now_playing(st).await;
            self.write_snapshot(st);
            return Ok(());
        };

        let source = self
            .ctx
            .resolver
            .open(&song)
            .await
            .map_err(|err| MusicError::ResourceUnavailable {
                key: song.key.clone(),
                reason: err.to_string(),
            })?;

        let generation = self.generation.load(Ordering::SeqCst);
        let events = self.events.clone();
        let on_finished: TrackCallback = Box::new(move |result| {
            let _ = events.send(SessionEvent::TrackFinished { generation, result });
        });

        {
            let Some(connection) = st.connection.as_ref() else {
                return Err(MusicError::NotConnected(self.guild_id));
            };
            if connection.is_playing() {
                connection.pause().await;
            }
            connection
                .play(source, on_finished)
                .await
                .map_err(|err| MusicError::ResourceUnavailable {
                    key: song.key.clone(),
                    reason: err.to_string(),
                })?;
        }

        info!(guild = %self.guild_id, song = %song.key, "playing");
        if let Some(message) = st.now_playing.as_mut() {
            if let Err(err) = message.update(&now_playing_line(&song)).await {
                warn!(guild = %self.guild_id, %err, "failed to update now-playing message");
            }
        }
        self.write_snapshot(st);
        Ok(())
    }

    /// Advance, skipping over failed picks. The second consecutive failure
    /// since the last clean completion halts auto-advance with a passive
    /// notice instead of looping over a broken library.
    async fn advance_with_retry(&self, st: &mut SessionState) {
        loop {
            match self.advance(st).await {
                Ok(()) => return,
                Err(err) => {
                    warn!(guild = %self.guild_id, %err, "failed to start next track");
                    st.consecutive_failures += 1;
                    if st.consecutive_failures >= 2 {
                        self.halt_with_notice(st).await;
                        return;
                    }
                }
            }
        }
    }

    /// Natural end of playback: clear the status message and disconnect.
    async fn teardown(&self, st: &mut SessionState) {
        self.clear_now_playing(st).await;
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(connection) = st.connection.take() {
            connection.disconnect().await;
        }
        self.write_snapshot(st);
    }

    /// Auto-advance has no synchronous requester, so failure is surfaced
    /// through the now-playing message. Stays connected-idle.
    async fn halt_with_notice(&self, st: &mut SessionState) {
        warn!(guild = %self.guild_id, "auto-advance halted after repeated failures");
        st.engine.clear_current();
        if let Some(connection) = &st.connection {
            if connection.is_playing() {
                connection.stop().await;
            }
        }
        match st.now_playing.as_mut() {
            Some(message) => {
                if let Err(err) = message.update(FAILURE_NOTICE).await {
                    warn!(guild = %self.guild_id, %err, "failed to post failure notice");
                }
            }
            None => {
                let channel = self.ctx.chat.channel(st.text_channel_id);
                match NowPlayingMessage::send(channel, FAILURE_NOTICE).await {
                    Ok(message) => st.now_playing = Some(message),
                    Err(err) => {
                        warn!(guild = %self.guild_id, %err, "failed to post failure notice")
                    }
                }
            }
        }
        self.write_snapshot(st);
    }

    /// Record a song everywhere it belongs and queue it. Durable-log append
    /// failures are logged, never surfaced; only the queue cap rejects.
    fn admit(&self, st: &mut SessionState, song: &SongInfo) -> MusicResult<()> {
        if self.queue_is_full(st) {
            let cap = self.ctx.player.max_queue_length.unwrap_or(0);
            return Err(MusicError::QueueFull(cap));
        }
        if let Err(err) = self.ctx.registry.put(song) {
            warn!(guild = %self.guild_id, %err, "failed to append to song registry");
        }
        if let Err(err) = st.engine.song_set().add(&song.key) {
            warn!(guild = %self.guild_id, %err, "failed to append to guild song set");
        }
        st.engine.enqueue(song.key.clone());
        Ok(())
    }

    fn queue_is_full(&self, st: &SessionState) -> bool {
        self.ctx
            .player
            .max_queue_length
            .is_some_and(|cap| st.engine.queue_len() >= cap)
    }

    fn is_playing_locked(&self, st: &SessionState) -> bool {
        self.phase_of(st) == SessionPhase::Playing
    }

    fn phase_of(&self, st: &SessionState) -> SessionPhase {
        match &st.connection {
            None => SessionPhase::Idle,
            Some(c) if c.is_playing() => SessionPhase::Playing,
            Some(c) if c.is_paused() => SessionPhase::Paused,
            Some(_) => SessionPhase::ConnectedIdle,
        }
    }

    async fn clear_now_playing(&self, st: &mut SessionState) {
        if let Some(message) = st.now_playing.take() {
            if let Err(err) = message.delete().await {
                warn!(guild = %self.guild_id, %err, "failed to delete now-playing message");
            }
        }
    }

    fn write_snapshot(&self, st: &SessionState) {
        let snapshot = SessionSnapshot {
            mode: st.engine.mode(),
            min_repeat_interval: st.engine.min_repeat_interval(),
            text_channel_id: st.text_channel_id,
            voice_channel_id: st.connection.as_ref().map(|c| c.channel_id()),
            now_playing_message: st.now_playing.as_ref().map(|m| m.message_ref()),
        };
        let path = self.ctx.storage.snapshot_file(self.guild_id);
        if let Err(err) = snapshot.write(&path) {
            warn!(guild = %self.guild_id, %err, "failed to write session snapshot");
        }
    }
}

fn now_playing_line(song: &SongInfo) -> String {
    format!("♪ {} ({})", song.title, format_duration(song.duration_secs))
}
