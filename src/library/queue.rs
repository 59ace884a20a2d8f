use std::collections::VecDeque;
use std::sync::Arc;

use rand::Rng;
use tracing::warn;

use crate::library::registry::SongRegistry;
use crate::library::song::{SongInfo, SongKey};

/// FIFO sequence of song keys with a running total duration.
///
/// Entries are keys only; metadata is fetched from the shared registry on
/// demand so many guild queues never duplicate it. Also reused, unmodified,
/// as the bounded anti-repeat history in radio mode.
pub struct SongQueue {
    registry: Arc<SongRegistry>,
    entries: VecDeque<SongKey>,
    duration_secs: u64,
}

impl SongQueue {
    pub fn new(registry: Arc<SongRegistry>) -> Self {
        Self {
            registry,
            entries: VecDeque::new(),
            duration_secs: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total duration in seconds of everything currently queued.
    pub fn duration_secs(&self) -> u64 {
        self.duration_secs
    }

    pub fn contains(&self, key: &SongKey) -> bool {
        self.entries.contains(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &SongKey> {
        self.entries.iter()
    }

    /// Append a key. Keys unknown to the registry are dropped with a
    /// warning instead of poisoning the duration total.
    pub fn push(&mut self, key: SongKey) {
        match self.registry.get(&key) {
            Some(info) => {
                self.duration_secs += info.duration_secs;
                self.entries.push_back(key);
            }
            None => warn!("{} not found in song registry, dropping from queue", key),
        }
    }

    pub fn extend(&mut self, keys: impl IntoIterator<Item = SongKey>) {
        for key in keys {
            self.push(key);
        }
    }

    /// Remove and return the head of the queue.
    pub fn pop(&mut self) -> Option<SongInfo> {
        while let Some(key) = self.entries.pop_front() {
            if let Some(info) = self.take_duration(&key) {
                return Some(info);
            }
        }
        self.duration_secs = 0;
        None
    }

    /// Remove and return a uniformly random entry, O(1) via swap-with-last.
    pub fn pop_random<R: Rng>(&mut self, rng: &mut R) -> Option<SongInfo> {
        while !self.entries.is_empty() {
            let idx = rng.gen_range(0..self.entries.len());
            let key = self
                .entries
                .swap_remove_back(idx)
                .expect("index checked against len");
            if let Some(info) = self.take_duration(&key) {
                return Some(info);
            }
        }
        self.duration_secs = 0;
        None
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.duration_secs = 0;
    }

    fn take_duration(&mut self, key: &SongKey) -> Option<SongInfo> {
        let info = self.registry.get(key);
        match &info {
            Some(info) => {
                self.duration_secs = self.duration_secs.saturating_sub(info.duration_secs);
            }
            // registry entries are never removed in-process, so this only
            // fires if the backing log was edited underneath us
            None => warn!("{} vanished from song registry, skipping", key),
        }
        if self.entries.is_empty() {
            self.duration_secs = 0;
        }
        info
    }
}
