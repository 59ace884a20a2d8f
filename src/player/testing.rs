//! Shared in-memory doubles for the transport traits, used by the player
//! tests in this crate.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::common::types::{ChannelId, GuildId, MessageId};
use crate::configs::{PlayerConfig, StorageConfig};
use crate::library::registry::SongRegistry;
use crate::library::song::{SongInfo, SongKey};
use crate::player::session::SessionContext;
use crate::transport::chat::{ChatChannel, ChatClient, ChatError};
use crate::transport::resolver::{AudioResolver, ResolveError};
use crate::transport::voice::{
    AudioSource, PlaybackError, TrackCallback, VoiceConnection, VoiceConnector,
};

pub fn song(id: &str, duration_secs: u64) -> SongInfo {
    SongInfo::new(
        SongKey::new("youtube", id),
        duration_secs,
        format!("Song {id}"),
    )
}

/// Poll until `condition` holds or a second passes.
pub async fn wait_until(what: &str, condition: impl Fn() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for {what}");
}

struct SilentSource;

impl AudioSource for SilentSource {}

#[derive(Default)]
pub struct MockResolver {
    fail_ids: Mutex<HashSet<String>>,
    opened: Mutex<Vec<SongKey>>,
}

impl MockResolver {
    /// Make `open` fail for this song id from now on.
    pub fn fail(&self, id: &str) {
        self.fail_ids.lock().insert(id.to_string());
    }

    /// How many opens were attempted, failed ones included.
    pub fn opened_count(&self) -> usize {
        self.opened.lock().len()
    }

    pub fn opened(&self) -> Vec<SongKey> {
        self.opened.lock().clone()
    }
}

#[async_trait]
impl AudioResolver for MockResolver {
    async fn resolve(&self, _query: &str) -> Result<Vec<SongInfo>, ResolveError> {
        Ok(Vec::new())
    }

    async fn open(&self, song: &SongInfo) -> Result<Box<dyn AudioSource>, ResolveError> {
        self.opened.lock().push(song.key.clone());
        if self.fail_ids.lock().contains(&song.key.id) {
            return Err(ResolveError(format!("no source for {}", song.key)));
        }
        Ok(Box::new(SilentSource))
    }
}

/// Backing state for one fake voice connection. Tests drive completions by
/// hand via [`MockConnection::finish_current`]; `stop` keeps the stored
/// callback so a test can model a completion delivered after teardown.
pub struct MockConnection {
    channel: Mutex<ChannelId>,
    playing: AtomicBool,
    paused: AtomicBool,
    listeners: Arc<AtomicBool>,
    callbacks: Mutex<Vec<TrackCallback>>,
    pub plays: AtomicUsize,
    pub disconnected: AtomicBool,
}

impl MockConnection {
    pub fn channel_id(&self) -> ChannelId {
        *self.channel.lock()
    }

    pub fn finish_current(&self, result: Result<(), PlaybackError>) {
        let callback = self.callbacks.lock().pop().expect("no track playing");
        self.playing.store(false, Ordering::SeqCst);
        self.paused.store(false, Ordering::SeqCst);
        callback(result);
    }
}

struct Handle(Arc<MockConnection>);

#[async_trait]
impl VoiceConnection for Handle {
    fn channel_id(&self) -> ChannelId {
        *self.0.channel.lock()
    }

    async fn move_to(&self, channel_id: ChannelId) -> Result<(), PlaybackError> {
        *self.0.channel.lock() = channel_id;
        Ok(())
    }

    async fn play(
        &self,
        _source: Box<dyn AudioSource>,
        on_finished: TrackCallback,
    ) -> Result<(), PlaybackError> {
        // replacing a track drops its callback without firing it
        let mut callbacks = self.0.callbacks.lock();
        callbacks.clear();
        callbacks.push(on_finished);
        drop(callbacks);
        self.0.plays.fetch_add(1, Ordering::SeqCst);
        self.0.playing.store(true, Ordering::SeqCst);
        self.0.paused.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn pause(&self) {
        if self.0.playing.load(Ordering::SeqCst) {
            self.0.paused.store(true, Ordering::SeqCst);
        }
    }

    async fn resume(&self) {
        self.0.paused.store(false, Ordering::SeqCst);
    }

    async fn stop(&self) {
        self.0.playing.store(false, Ordering::SeqCst);
        self.0.paused.store(false, Ordering::SeqCst);
    }

    fn is_playing(&self) -> bool {
        self.0.playing.load(Ordering::SeqCst) && !self.0.paused.load(Ordering::SeqCst)
    }

    fn is_paused(&self) -> bool {
        self.0.playing.load(Ordering::SeqCst) && self.0.paused.load(Ordering::SeqCst)
    }

    fn has_listeners(&self) -> bool {
        self.0.listeners.load(Ordering::SeqCst)
    }

    async fn disconnect(&self) {
        self.0.playing.store(false, Ordering::SeqCst);
        self.0.disconnected.store(true, Ordering::SeqCst);
    }
}

pub struct MockVoice {
    /// Shared across all connections; flip to simulate the channel
    /// emptying or filling.
    pub listeners: Arc<AtomicBool>,
    pub fail_connect: AtomicBool,
    connections: Mutex<Vec<Arc<MockConnection>>>,
}

impl MockVoice {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            listeners: Arc::new(AtomicBool::new(true)),
            fail_connect: AtomicBool::new(false),
            connections: Mutex::new(Vec::new()),
        })
    }

    pub fn last_connection(&self) -> Arc<MockConnection> {
        self.connections
            .lock()
            .last()
            .expect("no voice connection made")
            .clone()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }
}

#[async_trait]
impl VoiceConnector for MockVoice {
    async fn connect(
        &self,
        _guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Box<dyn VoiceConnection>, PlaybackError> {
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(PlaybackError("voice unavailable".into()));
        }
        let connection = Arc::new(MockConnection {
            channel: Mutex::new(channel_id),
            playing: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            listeners: self.listeners.clone(),
            callbacks: Mutex::new(Vec::new()),
            plays: AtomicUsize::new(0),
            disconnected: AtomicBool::new(false),
        });
        self.connections.lock().push(connection.clone());
        Ok(Box::new(Handle(connection)))
    }
}

pub struct MockChannel {
    id: ChannelId,
    messages: Mutex<Vec<(MessageId, String)>>,
    next_id: AtomicU64,
}

impl MockChannel {
    fn new(id: ChannelId) -> Self {
        Self {
            id,
            messages: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn alloc(&self) -> MessageId {
        MessageId(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Drop a message into the channel as if a user chatted.
    pub fn post_noise(&self, content: &str) -> MessageId {
        let id = self.alloc();
        self.messages.lock().push((id, content.to_string()));
        id
    }

    pub fn contents(&self) -> Vec<String> {
        self.messages
            .lock()
            .iter()
            .map(|(_, content)| content.clone())
            .collect()
    }

    pub fn latest(&self) -> Option<(MessageId, String)> {
        self.messages.lock().last().cloned()
    }
}

#[async_trait]
impl ChatChannel for MockChannel {
    fn id(&self) -> ChannelId {
        self.id
    }

    async fn send(&self, content: &str) -> Result<MessageId, ChatError> {
        let id = self.alloc();
        self.messages.lock().push((id, content.to_string()));
        Ok(id)
    }

    async fn edit(&self, message_id: MessageId, content: &str) -> Result<(), ChatError> {
        let mut messages = self.messages.lock();
        match messages.iter_mut().find(|(id, _)| *id == message_id) {
            Some((_, stored)) => {
                *stored = content.to_string();
                Ok(())
            }
            None => Err(ChatError(format!("unknown message {message_id}"))),
        }
    }

    async fn fetch_latest(&self) -> Result<Option<MessageId>, ChatError> {
        Ok(self.messages.lock().last().map(|(id, _)| *id))
    }

    async fn delete(&self, message_id: MessageId) -> Result<(), ChatError> {
        self.messages.lock().retain(|(id, _)| *id != message_id);
        Ok(())
    }
}

pub struct MockChat {
    channels: DashMap<ChannelId, Arc<MockChannel>>,
}

impl MockChat {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            channels: DashMap::new(),
        })
    }

    pub fn mock_channel(&self, id: ChannelId) -> Arc<MockChannel> {
        self.channels
            .entry(id)
            .or_insert_with(|| Arc::new(MockChannel::new(id)))
            .clone()
    }
}

impl ChatClient for MockChat {
    fn channel(&self, id: ChannelId) -> Arc<dyn ChatChannel> {
        self.mock_channel(id)
    }
}

pub struct TestRig {
    pub ctx: Arc<SessionContext>,
    pub voice: Arc<MockVoice>,
    pub chat: Arc<MockChat>,
    pub resolver: Arc<MockResolver>,
    // temp dir lives as long as the rig
    _dir: tempfile::TempDir,
}

/// Build a full session context over a temp data dir, pre-seeding the
/// registry with `songs` as `(id, duration_secs)` pairs.
pub fn rig(player: PlayerConfig, songs: &[(&str, u64)]) -> TestRig {
    let dir = tempfile::tempdir().unwrap();
    let storage = StorageConfig {
        data_dir: dir.path().to_path_buf(),
    };
    storage.ensure_dirs().unwrap();

    let registry = Arc::new(SongRegistry::open(storage.registry_file()).unwrap());
    for (id, duration_secs) in songs {
        registry.put(&song(id, *duration_secs)).unwrap();
    }

    let voice = MockVoice::new();
    let chat = MockChat::new();
    let resolver = Arc::new(MockResolver::default());
    let ctx = Arc::new(SessionContext {
        registry,
        resolver: resolver.clone(),
        voice: voice.clone(),
        chat: chat.clone(),
        player,
        storage,
    });
    TestRig {
        ctx,
        voice,
        chat,
        resolver,
        _dir: dir,
    }
}
