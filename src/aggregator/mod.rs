pub mod identity;

use crate::core::errors::SourceError;
use crate::core::traits::MusicSource;
use crate::core::types::{CanonicalTrack, NormalizedRelease, Playlist};
use futures_util::future::join_all;
use std::cmp::Ordering;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{instrument, warn};

/// Fans queries out across the configured sources and fuses the results.
///
/// The constructor's source order doubles as provider priority: it breaks
/// confidence ties during ranking and decides which duplicate survives a
/// merge.
pub struct SourceAggregator {
    sources: Vec<Arc<dyn MusicSource>>,
}

impl SourceAggregator {
    pub fn new(sources: Vec<Arc<dyn MusicSource>>) -> Self {
        Self { sources }
    }

    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    fn source_named(&self, name: &str) -> Result<&Arc<dyn MusicSource>, SourceError> {
        self.sources
            .iter()
            .find(|s| s.name() == name)
            .ok_or_else(|| SourceError::NotFound(format!("unknown source '{}'", name)))
    }

    /// Search every source that supports it, concurrently. One source
    /// failing never cancels the others - its results are simply missing
    /// from the merge. Only when *no* source succeeds does the first error
    /// propagate, so an all-failed query is never reported as an empty
    /// success.
    #[instrument(skip(self), fields(query = %query, limit = limit))]
    pub async fn search_all(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<NormalizedRelease>, SourceError> {
        let searchable: Vec<(usize, &Arc<dyn MusicSource>)> = self
            .sources
            .iter()
            .enumerate()
            .filter(|(_, s)| s.supports_search())
            .collect();

        let results = join_all(
            searchable
                .iter()
                .map(|(_, source)| source.search_releases(query, limit)),
        )
        .await;

        let mut merged: HashMap<String, (usize, NormalizedRelease)> = HashMap::new();
        let mut first_error = None;
        let mut any_succeeded = false;

        for ((priority, source), result) in searchable.into_iter().zip(results) {
            match result {
                Ok(releases) => {
                    any_succeeded = true;
                    for release in releases {
                        merge_entry(&mut merged, priority, release);
                    }
                }
                Err(e) => {
                    warn!(
                        source = source.name(),
                        error = %e,
                        "source search failed, continuing without it"
                    );
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        if !any_succeeded {
            if let Some(e) = first_error {
                return Err(e);
            }
        }

        let mut ranked: Vec<(usize, NormalizedRelease)> = merged.into_values().collect();
        ranked.sort_by(|a, b| {
            b.1.confidence
                .partial_cmp(&a.1.confidence)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });

        Ok(ranked.into_iter().map(|(_, release)| release).collect())
    }

    /// Fetch an album and its tracks from the source owning `source`.
    pub async fn album_tracks(
        &self,
        source: &str,
        id: &str,
    ) -> Result<(NormalizedRelease, Vec<CanonicalTrack>), SourceError> {
        self.source_named(source)?.album_tracks(id).await
    }

    /// Resolve a stream URL from the source owning `source`.
    pub async fn stream_url(&self, source: &str, id: &str) -> Result<String, SourceError> {
        self.source_named(source)?.stream_url(id).await
    }

    /// Collect playlists from every source that serves them. Sources
    /// answering `NotFound` (no playlist support) or failing outright are
    /// skipped.
    #[instrument(skip(self))]
    pub async fn list_all_playlists(&self) -> Result<Vec<Playlist>, SourceError> {
        let results = join_all(self.sources.iter().map(|source| source.list_playlists())).await;

        let mut playlists = Vec::new();
        for (source, result) in self.sources.iter().zip(results) {
            match result {
                Ok(list) => playlists.extend(list),
                Err(SourceError::NotFound(_)) => {}
                Err(e) => {
                    warn!(
                        source = source.name(),
                        error = %e,
                        "playlist listing failed, skipping source"
                    );
                }
            }
        }
        Ok(playlists)
    }
}

/// Fold `release` into the merge map keyed by fingerprint. The higher
/// confidence wins the slot and absorbs the loser's identifiers, scores, and
/// any display fields it was missing itself.
fn merge_entry(
    merged: &mut HashMap<String, (usize, NormalizedRelease)>,
    priority: usize,
    mut release: NormalizedRelease,
) {
    match merged.entry(release.fingerprint.clone()) {
        Entry::Vacant(slot) => {
            slot.insert((priority, release));
        }
        Entry::Occupied(mut slot) => {
            let (current_priority, current) = slot.get_mut();
            if release.confidence > current.confidence {
                absorb(&mut release, current);
                *current = release;
                *current_priority = priority;
            } else {
                absorb(current, &release);
            }
        }
    }
}

fn absorb(winner: &mut NormalizedRelease, loser: &NormalizedRelease) {
    for id in &loser.ids {
        if !winner.ids.contains(id) {
            winner.ids.push(id.clone());
        }
    }
    for (source, score) in &loser.source_scores {
        winner.source_scores.entry(source.clone()).or_insert(*score);
    }
    if winner.artwork_url.is_none() {
        winner.artwork_url = loser.artwork_url.clone();
    }
    if winner.year.is_none() {
        winner.year = loser.year;
    }
    if winner.genres.is_empty() {
        winner.genres = loser.genres.clone();
    }
}
