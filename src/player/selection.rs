use std::collections::HashSet;
use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::configs::player::clamp_repeat_interval;
use crate::library::guild_set::GuildSongSet;
use crate::library::queue::SongQueue;
use crate::library::registry::SongRegistry;
use crate::library::song::{SongInfo, SongKey};

/// How the next track is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectMode {
    /// Strict FIFO over the explicit queue.
    #[default]
    Queue,
    /// Random order over the explicit queue.
    Shuffle,
    /// Continuous playback over the guild's whole song set, with an
    /// anti-repeat window.
    Radio,
}

impl std::fmt::Display for SelectMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectMode::Queue => write!(f, "queue"),
            SelectMode::Shuffle => write!(f, "shuffle"),
            SelectMode::Radio => write!(f, "radio"),
        }
    }
}

/// Whether switching `from -> to` must drop the anti-repeat history.
///
/// Entering radio starts the window fresh; leaving it keeps stale radio
/// bias from leaking into queue/shuffle picks.
pub fn transition_clears_history(from: SelectMode, to: SelectMode) -> bool {
    from == SelectMode::Radio || to == SelectMode::Radio
}

/// Pure selection state machine: mode, explicit tail queue, bounded
/// history, and the guild set radio draws from.
///
/// The radio candidate pool is always computed per pick as `set - history`,
/// so evicted history entries become eligible again without any explicit
/// pool bookkeeping, and the explicit queue survives mode switches.
pub struct SelectionEngine {
    mode: SelectMode,
    queue: SongQueue,
    history: SongQueue,
    set: Arc<GuildSongSet>,
    min_repeat_interval: usize,
    current: Option<SongKey>,
    rng: StdRng,
}

impl SelectionEngine {
    pub fn new(
        registry: Arc<SongRegistry>,
        set: Arc<GuildSongSet>,
        min_repeat_interval: usize,
    ) -> Self {
        Self::with_rng(
            registry,
            set,
            min_repeat_interval,
            StdRng::from_entropy(),
        )
    }

    pub fn with_rng(
        registry: Arc<SongRegistry>,
        set: Arc<GuildSongSet>,
        min_repeat_interval: usize,
        rng: StdRng,
    ) -> Self {
        Self {
            mode: SelectMode::Queue,
            queue: SongQueue::new(registry.clone()),
            history: SongQueue::new(registry),
            set,
            min_repeat_interval: clamp_repeat_interval(min_repeat_interval),
            current: None,
            rng,
        }
    }

    pub fn mode(&self) -> SelectMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: SelectMode) {
        if self.mode == mode {
            return;
        }
        if transition_clears_history(self.mode, mode) {
            self.history.clear();
        }
        self.mode = mode;
    }

    pub fn min_repeat_interval(&self) -> usize {
        self.min_repeat_interval
    }

    pub fn set_min_repeat_interval(&mut self, value: usize) {
        self.min_repeat_interval = clamp_repeat_interval(value);
    }

    /// Key of the track currently playing, if any.
    pub fn current(&self) -> Option<&SongKey> {
        self.current.as_ref()
    }

    /// Forget the currently playing track without selecting a new one.
    pub fn clear_current(&mut self) {
        self.current = None;
    }

    pub fn song_set(&self) -> &GuildSongSet {
        &self.set
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn queue_duration_secs(&self) -> u64 {
        self.queue.duration_secs()
    }

    /// Append an explicit request to the tail queue.
    pub fn enqueue(&mut self, key: SongKey) {
        self.queue.push(key);
    }

    /// Whether another pick could produce a track right now.
    pub fn has_pending(&self) -> bool {
        !self.queue.is_empty() || (self.mode == SelectMode::Radio && !self.set.is_empty())
    }

    /// Reset to defaults: empty queue and history, queue mode, no current
    /// track. The guild song set is untouched.
    pub fn reset(&mut self) {
        self.queue.clear();
        self.history.clear();
        self.mode = SelectMode::Queue;
        self.current = None;
    }

    /// Select the next track under the active mode, mutating queue, history
    /// and the current-track marker.
    pub fn select_next(&mut self) -> Option<SongInfo> {
        let picked = match self.mode {
            SelectMode::Queue => self.queue.pop(),
            SelectMode::Shuffle => self.queue.pop_random(&mut self.rng),
            SelectMode::Radio => self.select_radio(),
        };
        self.current = picked.as_ref().map(|song| song.key.clone());
        picked
    }

    fn select_radio(&mut self) -> Option<SongInfo> {
        // the just-finished track joins the window first
        if let Some(current) = self.current.take() {
            self.history.push(current);
        }
        while self.history.len() > self.min_repeat_interval {
            self.history.pop();
        }

        // an explicit request always wins the turn
        if let Some(song) = self.queue.pop() {
            return Some(song);
        }

        let mut exclude: HashSet<SongKey> = self.history.keys().cloned().collect();
        loop {
            if let Some(song) = self.set.select_random(&mut self.rng, &exclude, |_| true) {
                return Some(song);
            }
            // window not smaller than the set: shrink it for this pick by
            // letting the oldest plays back into the pool
            match self.history.pop() {
                Some(evicted) => {
                    exclude.remove(&evicted.key);
                }
                None => return None,
            }
        }
    }
}
