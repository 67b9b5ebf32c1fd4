use crate::core::config::ProviderConfig;
use crate::core::errors::SourceError;
use crate::core::kernel::{
    RateLimiter, ReqwestRest, RestClient, RestClientBuilder, RestClientConfig,
};
use crate::core::traits::MusicSource;
use crate::core::types::{
    clamp_confidence, fingerprint, parse_year, ArtistCredit, CanonicalTrack, NormalizedRelease,
    ReleaseType, SourceId,
};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::instrument;

const SOURCE: &str = "itunes";
const DEFAULT_BASE_URL: &str = "https://itunes.apple.com";

/// iTunes Search API adapter.
///
/// The API is anonymous but throttled to roughly twenty calls per minute;
/// the limiter mirrors that budget with a small burst.
pub struct ItunesSource {
    rest: ReqwestRest,
    limiter: RateLimiter,
}

impl ItunesSource {
    pub fn new(config: &ProviderConfig) -> Result<Self, SourceError> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Ok(Self {
            rest: RestClientBuilder::new(
                RestClientConfig::new(base_url, SOURCE.to_string())
                    .with_user_agent(config.user_agent()),
            )
            .build()?,
            limiter: RateLimiter::new(SOURCE, 5, 20.0 / 60.0).with_max_retries(3),
        })
    }
}

#[async_trait]
impl MusicSource for ItunesSource {
    fn name(&self) -> &'static str {
        SOURCE
    }

    fn supports_search(&self) -> bool {
        true
    }

    #[instrument(skip(self), fields(source = SOURCE, query = %query))]
    async fn search_releases(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<NormalizedRelease>, SourceError> {
        let limit_str = limit.to_string();
        let params = [
            ("term", query),
            ("entity", "album"),
            ("media", "music"),
            ("limit", limit_str.as_str()),
        ];

        let response: LookupResponse = self
            .limiter
            .execute(|| self.rest.get_json("/search", &params))
            .await?;

        let query_lower = query.to_lowercase();
        Ok(response
            .results
            .into_iter()
            .filter(|item| item.collection_id.is_some())
            .map(|item| convert_collection(item, &query_lower))
            .collect())
    }

    #[instrument(skip(self), fields(source = SOURCE, collection = %id))]
    async fn album_tracks(
        &self,
        id: &str,
    ) -> Result<(NormalizedRelease, Vec<CanonicalTrack>), SourceError> {
        let params = [("id", id), ("entity", "song")];

        let response: LookupResponse = self
            .limiter
            .execute(|| self.rest.get_json("/lookup", &params))
            .await?;

        // Lookup returns the collection first, then its songs.
        let mut collection = None;
        let mut tracks = Vec::new();
        for item in response.results {
            match item.wrapper_type.as_deref() {
                Some("collection") => collection = Some(item),
                Some("track") => tracks.push(item),
                _ => {}
            }
        }

        let collection = collection
            .ok_or_else(|| SourceError::NotFound(format!("itunes collection {} not found", id)))?;
        let album = convert_collection(collection, "");
        let artwork = album.artwork_url.clone();

        let tracks = tracks
            .into_iter()
            .map(|item| CanonicalTrack {
                id: SourceId::new(
                    SOURCE,
                    item.track_id.map_or_else(String::new, |t| t.to_string()),
                ),
                title: item.track_name.unwrap_or_else(|| "Unknown".to_string()),
                artist: item.artist_name.unwrap_or_else(|| "Unknown".to_string()),
                album: album.title.clone(),
                duration_secs: item.track_time_millis.map(|ms| (ms / 1000) as u32),
                artwork_url: item.artwork_url100.or_else(|| artwork.clone()),
            })
            .collect();

        Ok((album, tracks))
    }
}

// ---------------------------------------------------------------------------
// Wire types (private to this adapter)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    results: Vec<LookupItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupItem {
    #[serde(default)]
    wrapper_type: Option<String>,
    #[serde(default)]
    collection_type: Option<String>,
    #[serde(default)]
    collection_id: Option<i64>,
    #[serde(default)]
    collection_name: Option<String>,
    #[serde(default)]
    artist_id: Option<i64>,
    #[serde(default)]
    artist_name: Option<String>,
    #[serde(default)]
    release_date: Option<String>,
    #[serde(default)]
    primary_genre_name: Option<String>,
    #[serde(default)]
    artwork_url100: Option<String>,
    #[serde(default)]
    track_id: Option<i64>,
    #[serde(default)]
    track_name: Option<String>,
    #[serde(default)]
    track_time_millis: Option<u64>,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

/// Map the iTunes collection taxonomy onto the canonical enum. iTunes only
/// distinguishes albums and compilations at the type level; EP/single status
/// is carried as a marker suffix on the collection name. Everything
/// unrecognized defaults to `Album`, the provider's own fallback.
fn map_release_type(collection_type: Option<&str>, name: &str) -> ReleaseType {
    if let Some("Compilation") = collection_type {
        return ReleaseType::Compilation;
    }
    if name.ends_with(" - EP") {
        return ReleaseType::Ep;
    }
    if name.ends_with(" - Single") {
        return ReleaseType::Single;
    }
    ReleaseType::Album
}

/// Trim the ` - EP` / ` - Single` markers off a collection name.
fn display_title(name: &str) -> &str {
    name.strip_suffix(" - EP")
        .or_else(|| name.strip_suffix(" - Single"))
        .unwrap_or(name)
}

fn convert_collection(item: LookupItem, query_lower: &str) -> NormalizedRelease {
    let raw_name = item.collection_name.unwrap_or_else(|| "Unknown".to_string());
    let release_type = map_release_type(item.collection_type.as_deref(), &raw_name);
    let title = display_title(&raw_name).to_string();
    let artist = item.artist_name.unwrap_or_else(|| "Unknown".to_string());

    let mut artist_credit = ArtistCredit::named(artist.clone());
    if let Some(artist_id) = item.artist_id {
        artist_credit
            .ids
            .push(SourceId::new(SOURCE, artist_id.to_string()));
    }

    let mut confidence = 0.6;
    if !query_lower.is_empty() && title.to_lowercase().contains(query_lower) {
        confidence += 0.2;
    }

    NormalizedRelease {
        fingerprint: fingerprint(&artist, &title),
        title,
        artists: vec![artist_credit],
        release_type,
        year: item.release_date.as_deref().and_then(parse_year),
        ids: vec![SourceId::new(
            SOURCE,
            item.collection_id.map_or_else(String::new, |c| c.to_string()),
        )],
        confidence: clamp_confidence(confidence),
        // No relevance-ranked genre data; a single primary genre at most.
        genres: item.primary_genre_name.into_iter().collect(),
        artwork_url: item.artwork_url100,
        source_scores: HashMap::new(),
    }
}
