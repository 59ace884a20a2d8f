use serde::{Deserialize, Serialize};

/// Default on-disk audio container extension for cached tracks.
pub const AUDIO_EXTENSION: &str = "opus";

/// Stable, globally unique identity of a track: the source domain plus the
/// source-local id (e.g. `("youtube", "dQw4w9WgXcQ")`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SongKey {
    pub domain: String,
    pub id: String,
}

impl SongKey {
    pub fn new(domain: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            id: id.into(),
        }
    }
}

impl std::fmt::Display for SongKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.domain, self.id)
    }
}

/// Track metadata as stored in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongInfo {
    pub key: SongKey,
    /// Track length in whole seconds.
    pub duration_secs: u64,
    pub title: String,
}

impl SongInfo {
    pub fn new(key: SongKey, duration_secs: u64, title: impl Into<String>) -> Self {
        Self {
            key,
            duration_secs,
            title: title.into(),
        }
    }

    /// Deterministic cache filename derived from the key.
    pub fn filename(&self) -> String {
        format!("{}_{}.{}", self.key.domain, self.key.id, AUDIO_EXTENSION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filename_is_deterministic() {
        let song = SongInfo::new(SongKey::new("youtube", "dQw4w9WgXcQ"), 212, "Test");
        assert_eq!(song.filename(), "youtube_dQw4w9WgXcQ.opus");
    }

    #[test]
    fn test_key_display() {
        let key = SongKey::new("youtube", "abc123");
        assert_eq!(key.to_string(), "youtube abc123");
    }
}
