use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use dashmap::DashSet;
use parking_lot::Mutex;
use rand::Rng;
use tracing::warn;

use crate::common::types::GuildId;
use crate::library::registry::SongRegistry;
use crate::library::song::{SongInfo, SongKey};

const HEADER: &str = "domain;id";

/// Monotonically growing set of every song ever queued in one guild.
///
/// Backs radio mode. Membership is durable: each first insertion appends a
/// `domain;id` row to the guild's log. Removal only happens through
/// out-of-band maintenance tooling.
pub struct GuildSongSet {
    guild_id: GuildId,
    registry: Arc<SongRegistry>,
    keys: DashSet<SongKey>,
    log: Mutex<BufWriter<File>>,
}

impl GuildSongSet {
    /// Open (or create) the guild's set log and load its contents. Keys the
    /// registry no longer knows are skipped with a warning.
    pub fn open(
        guild_id: GuildId,
        path: impl AsRef<Path>,
        registry: Arc<SongRegistry>,
    ) -> std::io::Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let keys = DashSet::new();
        let fresh = !path.exists();

        if !fresh {
            let reader = BufReader::new(File::open(path)?);
            for (number, line) in reader.lines().enumerate() {
                let line = line?;
                if number == 0 && line == HEADER {
                    continue;
                }
                if line.is_empty() {
                    continue;
                }
                match parse_row(&line) {
                    Some(key) if registry.contains(&key) => {
                        keys.insert(key);
                    }
                    Some(key) => warn!("{} not found in song registry, skipping", key),
                    None => warn!(
                        "skipping malformed guild set row {}: {:?}",
                        number + 1,
                        line
                    ),
                }
            }
        }

        let mut log = BufWriter::new(OpenOptions::new().create(true).append(true).open(path)?);
        if fresh {
            writeln!(log, "{}", HEADER)?;
            log.flush()?;
        }

        Ok(Self {
            guild_id,
            registry,
            keys,
            log: Mutex::new(log),
        })
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn contains(&self, key: &SongKey) -> bool {
        self.keys.contains(key)
    }

    /// Snapshot of the current membership, in arbitrary order.
    pub fn keys(&self) -> Vec<SongKey> {
        self.keys.iter().map(|key| key.key().clone()).collect()
    }

    /// Record a song for this guild. Returns true (and appends to the log)
    /// only on first insertion.
    pub fn add(&self, key: &SongKey) -> std::io::Result<bool> {
        if !self.keys.insert(key.clone()) {
            return Ok(false);
        }
        let mut log = self.log.lock();
        writeln!(log, "{};{}", key.domain, key.id)?;
        log.flush()?;
        Ok(true)
    }

    /// Uniformly sample a member that is not in `exclude` and satisfies
    /// `allow`. Returns `None` when no candidate qualifies.
    pub fn select_random<R, F>(
        &self,
        rng: &mut R,
        exclude: &HashSet<SongKey>,
        allow: F,
    ) -> Option<SongInfo>
    where
        R: Rng,
        F: Fn(&SongInfo) -> bool,
    {
        let candidates: Vec<SongInfo> = self
            .keys
            .iter()
            .filter(|key| !exclude.contains(key.key()))
            .filter_map(|key| self.registry.get(key.key()))
            .filter(|info| allow(info))
            .collect();

        if candidates.is_empty() {
            return None;
        }
        let idx = rng.gen_range(0..candidates.len());
        Some(candidates[idx].clone())
    }
}

fn parse_row(line: &str) -> Option<SongKey> {
    let mut fields = line.splitn(2, ';');
    let domain = fields.next()?;
    let id = fields.next()?;
    if domain.is_empty() || id.is_empty() {
        return None;
    }
    Some(SongKey::new(domain, id))
}
