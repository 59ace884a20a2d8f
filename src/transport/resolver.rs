use async_trait::async_trait;
use thiserror::Error;

use crate::library::song::SongInfo;
use crate::transport::voice::AudioSource;

#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ResolveError(pub String);

/// Resolves user queries into track metadata and opens playable sources.
///
/// Implementations are expected to be slow and fallible (network, download,
/// loudness normalization) and should cache aggressively; `open` sits on
/// the playback hot path.
#[async_trait]
pub trait AudioResolver: Send + Sync {
    /// Resolve a query (URL or search string) into zero or more tracks.
    async fn resolve(&self, query: &str) -> Result<Vec<SongInfo>, ResolveError>;

    /// Open a playable source for a known track.
    async fn open(&self, song: &SongInfo) -> Result<Box<dyn AudioSource>, ResolveError>;
}
