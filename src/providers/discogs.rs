use crate::core::config::ProviderConfig;
use crate::core::errors::SourceError;
use crate::core::kernel::{
    RateLimiter, ReqwestRest, RestClient, RestClientBuilder, RestClientConfig,
};
use crate::core::traits::MusicSource;
use crate::core::types::{
    clamp_confidence, fingerprint, ArtistCredit, CanonicalTrack, NormalizedRelease, ReleaseType,
    SourceId,
};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::instrument;

const SOURCE: &str = "discogs";
const DEFAULT_BASE_URL: &str = "https://api.discogs.com";

/// Discogs catalog adapter.
///
/// Discogs allows 60 requests per minute for authenticated clients and
/// returns 429 beyond that; the limiter holds a small burst over a
/// one-per-second refill.
pub struct DiscogsSource {
    rest: ReqwestRest,
    limiter: RateLimiter,
}

impl DiscogsSource {
    pub fn new(config: &ProviderConfig) -> Result<Self, SourceError> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let mut rest_config = RestClientConfig::new(base_url, SOURCE.to_string())
            .with_user_agent(config.user_agent());
        if let Some(token) = config.token_value() {
            rest_config = rest_config
                .with_header("Authorization", format!("Discogs token={}", token));
        }

        Ok(Self {
            rest: RestClientBuilder::new(rest_config).build()?,
            limiter: RateLimiter::new(SOURCE, 3, 1.0).with_max_retries(3),
        })
    }
}

#[async_trait]
impl MusicSource for DiscogsSource {
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
        let per_page = limit.to_string();
        let params = [
            ("q", query),
            ("type", "release"),
            ("per_page", per_page.as_str()),
        ];

        let response: SearchResponse = self
            .limiter
            .execute(|| self.rest.get_json("/database/search", &params))
            .await?;

        let query_lower = query.to_lowercase();
        Ok(response
            .results
            .into_iter()
            .map(|result| convert_search_result(result, &query_lower))
            .collect())
    }

    #[instrument(skip(self), fields(source = SOURCE, release = %id))]
    async fn album_tracks(
        &self,
        id: &str,
    ) -> Result<(NormalizedRelease, Vec<CanonicalTrack>), SourceError> {
        let endpoint = format!("/releases/{}", id);
        let release: ReleaseDetail = self
            .limiter
            .execute(|| self.rest.get_json(&endpoint, &[]))
            .await?;

        Ok(convert_release_detail(release))
    }
}

// ---------------------------------------------------------------------------
// Wire types (private to this adapter)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    id: i64,
    /// Discogs encodes the credit as `"Artist - Title"`.
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    year: Option<String>,
    #[serde(default)]
    format: Vec<String>,
    #[serde(default)]
    genre: Vec<String>,
    #[serde(default)]
    style: Vec<String>,
    #[serde(default)]
    cover_image: Option<String>,
    #[serde(default)]
    community: Option<Community>,
}

#[derive(Debug, Deserialize)]
struct Community {
    #[serde(default)]
    want: i64,
    #[serde(default)]
    have: i64,
}

#[derive(Debug, Deserialize)]
struct ReleaseDetail {
    id: i64,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    year: Option<i32>,
    #[serde(default)]
    artists: Vec<ReleaseArtist>,
    #[serde(default)]
    genres: Vec<String>,
    #[serde(default)]
    styles: Vec<String>,
    #[serde(default)]
    tracklist: Vec<TracklistEntry>,
    #[serde(default)]
    thumb: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReleaseArtist {
    #[serde(default)]
    id: Option<i64>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TracklistEntry {
    #[serde(default)]
    position: Option<String>,
    #[serde(default)]
    title: Option<String>,
    /// Formatted as `"mm:ss"`, often empty.
    #[serde(default)]
    duration: Option<String>,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

/// Map Discogs format descriptors onto the canonical enum. The first
/// recognized descriptor wins; unknown formats map to `Other`.
fn map_release_type(formats: &[String]) -> ReleaseType {
    for format in formats {
        match format.as_str() {
            "Compilation" => return ReleaseType::Compilation,
            "Soundtrack" => return ReleaseType::Soundtrack,
            "Live" => return ReleaseType::Live,
            "Remix" | "Mixed" => return ReleaseType::Remix,
            "EP" | "Mini-Album" => return ReleaseType::Ep,
            "Single" | "Maxi-Single" => return ReleaseType::Single,
            "Album" | "LP" => return ReleaseType::Album,
            _ => {}
        }
    }
    ReleaseType::Other
}

/// Split the `"Artist - Title"` credit Discogs puts in one field. A missing
/// separator leaves the whole string as the title with an unknown artist.
fn split_credit(combined: &str) -> (String, String) {
    match combined.split_once(" - ") {
        Some((artist, title)) => (artist.trim().to_string(), title.trim().to_string()),
        None => ("Unknown".to_string(), combined.trim().to_string()),
    }
}

/// Discogs search has no relevance score; derive a conservative confidence
/// from how well the title matches the query.
fn match_confidence(query_lower: &str, title: &str, has_year: bool) -> f64 {
    let mut confidence = 0.5;
    if title.to_lowercase().contains(query_lower) {
        confidence += 0.3;
    }
    if has_year {
        confidence += 0.1;
    }
    clamp_confidence(confidence)
}

fn convert_search_result(result: SearchResult, query_lower: &str) -> NormalizedRelease {
    let combined = result.title.unwrap_or_default();
    let (artist, title) = split_credit(&combined);
    let year = result.year.as_deref().and_then(|y| y.parse().ok());

    // Genre before style: Discogs reports genres as the broader, more
    // relevant grouping.
    let mut genres = result.genre;
    genres.extend(result.style);

    let community_score = result
        .community
        .map_or(0.0, |c| (c.want + c.have) as f64);
    let mut source_scores = HashMap::new();
    source_scores.insert(SOURCE.to_string(), community_score);

    NormalizedRelease {
        fingerprint: fingerprint(&artist, &title),
        confidence: match_confidence(query_lower, &title, year.is_some()),
        title,
        artists: vec![ArtistCredit::named(artist)],
        release_type: map_release_type(&result.format),
        year,
        ids: vec![SourceId::new(SOURCE, result.id.to_string())],
        genres,
        artwork_url: result.cover_image,
        source_scores,
    }
}

/// Parse a `"mm:ss"` (or `"h:mm:ss"`) duration into seconds.
fn parse_duration_secs(formatted: &str) -> Option<u32> {
    let mut total: u32 = 0;
    for part in formatted.split(':') {
        let value: u32 = part.trim().parse().ok()?;
        total = total.checked_mul(60)?.checked_add(value)?;
    }
    if formatted.contains(':') {
        Some(total)
    } else {
        None
    }
}

fn convert_release_detail(release: ReleaseDetail) -> (NormalizedRelease, Vec<CanonicalTrack>) {
    let title = release.title.unwrap_or_else(|| "Unknown".to_string());
    let artists: Vec<ArtistCredit> = if release.artists.is_empty() {
        vec![ArtistCredit::unknown()]
    } else {
        release
            .artists
            .into_iter()
            .map(|artist| ArtistCredit {
                name: artist.name.unwrap_or_else(|| "Unknown".to_string()),
                ids: artist
                    .id
                    .map(|id| SourceId::new(SOURCE, id.to_string()))
                    .into_iter()
                    .collect(),
            })
            .collect()
    };
    let artist_name = artists[0].name.clone();

    let mut genres = release.genres;
    genres.extend(release.styles);

    let album = NormalizedRelease {
        fingerprint: fingerprint(&artist_name, &title),
        title: title.clone(),
        artists,
        release_type: ReleaseType::Album,
        year: release.year.filter(|y| *y > 0),
        ids: vec![SourceId::new(SOURCE, release.id.to_string())],
        confidence: 1.0,
        genres,
        artwork_url: release.thumb,
        source_scores: HashMap::new(),
    };

    let tracks = release
        .tracklist
        .into_iter()
        .map(|entry| CanonicalTrack {
            id: SourceId::new(
                SOURCE,
                format!(
                    "{}#{}",
                    release.id,
                    entry.position.unwrap_or_default()
                ),
            ),
            title: entry.title.unwrap_or_else(|| "Unknown".to_string()),
            artist: artist_name.clone(),
            album: title.clone(),
            duration_secs: entry.duration.as_deref().and_then(parse_duration_secs),
            artwork_url: None,
        })
        .collect();

    (album, tracks)
}
