use crate::core::{
    errors::SourceError,
    types::{CanonicalTrack, NormalizedRelease, Playlist},
};
use async_trait::async_trait;

/// A music source: either the radio protocol backend or an external catalog
/// provider. Each source normalizes its native shapes into the canonical
/// model and owns its own request budget.
///
/// Operations a source does not serve keep the default `NotFound`
/// implementation, so adapters only override what they actually support.
#[async_trait]
pub trait MusicSource: Send + Sync {
    /// Stable source name used as the identifier prefix (e.g. `"discogs"`).
    fn name(&self) -> &'static str;

    /// Whether this source participates in catalog search fan-out.
    fn supports_search(&self) -> bool {
        false
    }

    /// Search the provider catalog for releases matching `query`.
    async fn search_releases(
        &self,
        _query: &str,
        _limit: usize,
    ) -> Result<Vec<NormalizedRelease>, SourceError> {
        Err(SourceError::NotFound(format!(
            "{} does not support catalog search",
            self.name()
        )))
    }

    /// Fetch a release and its track listing by provider-native id.
    async fn album_tracks(
        &self,
        _id: &str,
    ) -> Result<(NormalizedRelease, Vec<CanonicalTrack>), SourceError> {
        Err(SourceError::NotFound(format!(
            "{} does not support album lookup",
            self.name()
        )))
    }

    /// Resolve a provider-native id to a playable stream URL.
    async fn stream_url(&self, _id: &str) -> Result<String, SourceError> {
        Err(SourceError::NotFound(format!(
            "{} does not support stream resolution",
            self.name()
        )))
    }

    /// List the playlists (stations) this source owns for the current user.
    async fn list_playlists(&self) -> Result<Vec<Playlist>, SourceError> {
        Err(SourceError::NotFound(format!(
            "{} does not expose playlists",
            self.name()
        )))
    }
}
