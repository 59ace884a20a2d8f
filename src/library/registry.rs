use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::warn;

use crate::library::song::{SongInfo, SongKey};

const HEADER: &str = "domain;id;duration;title";

/// Durable collection of every song the bot has ever seen, looked up by
/// domain + source-local id.
///
/// Backed by an append-only `;`-delimited log. On reload a later record for
/// the same key wins; malformed rows are skipped with a warning, never
/// fatal. Single writer (the owning process), many readers.
pub struct SongRegistry {
    entries: DashMap<SongKey, (u64, String)>,
    log: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl SongRegistry {
    /// Open (or create) the registry log at `path` and load its contents.
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let entries = DashMap::new();
        let fresh = !path.exists();

        if !fresh {
            let reader = BufReader::new(File::open(&path)?);
            for (number, line) in reader.lines().enumerate() {
                let line = line?;
                if number == 0 && line == HEADER {
                    continue;
                }
                match parse_row(&line) {
                    Some(song) => {
                        // last write wins
                        entries.insert(song.key, (song.duration_secs, song.title));
                    }
                    None if line.is_empty() => {}
                    None => warn!("skipping malformed registry row {}: {:?}", number + 1, line),
                }
            }
        }

        let mut log = BufWriter::new(OpenOptions::new().create(true).append(true).open(&path)?);
        if fresh {
            writeln!(log, "{}", HEADER)?;
            log.flush()?;
        }

        Ok(Self {
            entries,
            log: Mutex::new(log),
            path,
        })
    }

    pub fn get(&self, key: &SongKey) -> Option<SongInfo> {
        self.entries.get(key).map(|entry| {
            let (duration_secs, title) = entry.value().clone();
            SongInfo::new(key.clone(), duration_secs, title)
        })
    }

    pub fn contains(&self, key: &SongKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record a song, updating the in-memory cache and appending to the log.
    pub fn put(&self, song: &SongInfo) -> std::io::Result<()> {
        self.entries.insert(
            song.key.clone(),
            (song.duration_secs, song.title.clone()),
        );

        let mut log = self.log.lock();
        writeln!(log, "{}", format_row(song))?;
        log.flush()
    }
}

fn format_row(song: &SongInfo) -> String {
    // title is the last field, so embedded ';' survive the round trip;
    // newlines would break the log framing
    let title = song.title.replace(['\n', '\r'], " ");
    format!(
        "{};{};{};{}",
        song.key.domain, song.key.id, song.duration_secs, title
    )
}

fn parse_row(line: &str) -> Option<SongInfo> {
    let mut fields = line.splitn(4, ';');
    let domain = fields.next()?;
    let id = fields.next()?;
    let duration_secs: u64 = fields.next()?.parse().ok()?;
    let title = fields.next()?;
    if domain.is_empty() || id.is_empty() {
        return None;
    }
    Some(SongInfo::new(
        SongKey::new(domain, id),
        duration_secs,
        title,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn song(id: &str, duration_secs: u64, title: &str) -> SongInfo {
        SongInfo::new(SongKey::new("youtube", id), duration_secs, title)
    }

    #[test]
    fn test_put_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let registry = SongRegistry::open(dir.path().join("songs.csv")).unwrap();

        let a = song("a", 10, "First");
        registry.put(&a).unwrap();

        assert!(registry.contains(&a.key));
        assert_eq!(registry.get(&a.key), Some(a));
        assert_eq!(registry.len(), 1);
        assert!(registry.get(&SongKey::new("youtube", "missing")).is_none());
    }

    #[test]
    fn test_reload_preserves_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("songs.csv");

        {
            let registry = SongRegistry::open(&path).unwrap();
            registry.put(&song("a", 10, "First")).unwrap();
            registry.put(&song("b", 20, "Second; with a semicolon")).unwrap();
        }

        let registry = SongRegistry::open(&path).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.get(&SongKey::new("youtube", "b")).unwrap().title,
            "Second; with a semicolon"
        );
    }

    #[test]
    fn test_reload_is_last_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("songs.csv");

        {
            let registry = SongRegistry::open(&path).unwrap();
            registry.put(&song("a", 10, "Old Title")).unwrap();
            registry.put(&song("a", 11, "New Title")).unwrap();
        }

        let registry = SongRegistry::open(&path).unwrap();
        assert_eq!(registry.len(), 1);
        let info = registry.get(&SongKey::new("youtube", "a")).unwrap();
        assert_eq!(info.duration_secs, 11);
        assert_eq!(info.title, "New Title");
    }

    #[test]
    fn test_malformed_rows_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("songs.csv");
        std::fs::write(
            &path,
            "domain;id;duration;title\n\
             youtube;a;10;Good\n\
             not a row\n\
             youtube;b;not-a-number;Bad Duration\n\
             youtube;c;30;Also Good\n",
        )
        .unwrap();

        let registry = SongRegistry::open(&path).unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.contains(&SongKey::new("youtube", "a")));
        assert!(registry.contains(&SongKey::new("youtube", "c")));
    }
}
