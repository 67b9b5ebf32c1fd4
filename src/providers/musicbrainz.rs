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

const SOURCE: &str = "musicbrainz";
const DEFAULT_BASE_URL: &str = "https://musicbrainz.org";

/// MusicBrainz catalog adapter.
///
/// MusicBrainz enforces one request per second per client; the limiter is
/// sized to exactly that budget.
pub struct MusicBrainzSource {
    rest: ReqwestRest,
    limiter: RateLimiter,
}

impl MusicBrainzSource {
    pub fn new(config: &ProviderConfig) -> Result<Self, SourceError> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let rest = RestClientBuilder::new(
            RestClientConfig::new(base_url, SOURCE.to_string())
                .with_user_agent(config.user_agent()),
        )
        .build()?;

        Ok(Self {
            rest,
            limiter: RateLimiter::new(SOURCE, 1, 1.0).with_max_retries(3),
        })
    }
}

#[async_trait]
impl MusicSource for MusicBrainzSource {
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
            ("query", query),
            ("limit", limit_str.as_str()),
            ("fmt", "json"),
        ];

        let response: ReleaseGroupSearchResponse = self
            .limiter
            .execute(|| self.rest.get_json("/ws/2/release-group", &params))
            .await?;

        Ok(response
            .release_groups
            .into_iter()
            .map(convert_release_group)
            .collect())
    }

    #[instrument(skip(self), fields(source = SOURCE, release = %id))]
    async fn album_tracks(
        &self,
        id: &str,
    ) -> Result<(NormalizedRelease, Vec<CanonicalTrack>), SourceError> {
        let endpoint = format!("/ws/2/release/{}", id);
        let params = [("inc", "recordings+artist-credits"), ("fmt", "json")];

        let release: MbRelease = self
            .limiter
            .execute(|| self.rest.get_json(&endpoint, &params))
            .await?;

        Ok(convert_release_with_tracks(release))
    }
}

// ---------------------------------------------------------------------------
// Wire types (private to this adapter)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ReleaseGroupSearchResponse {
    #[serde(rename = "release-groups", default)]
    release_groups: Vec<ReleaseGroup>,
}

#[derive(Debug, Deserialize)]
struct ReleaseGroup {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    score: Option<f64>,
    #[serde(rename = "primary-type", default)]
    primary_type: Option<String>,
    #[serde(rename = "secondary-types", default)]
    secondary_types: Vec<String>,
    #[serde(rename = "first-release-date", default)]
    first_release_date: Option<String>,
    #[serde(rename = "artist-credit", default)]
    artist_credit: Vec<MbArtistCredit>,
    #[serde(default)]
    tags: Vec<MbTag>,
}

#[derive(Debug, Deserialize)]
struct MbArtistCredit {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    artist: Option<MbArtist>,
}

#[derive(Debug, Deserialize)]
struct MbArtist {
    id: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MbTag {
    #[serde(default)]
    count: i64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct MbRelease {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    date: Option<String>,
    #[serde(rename = "artist-credit", default)]
    artist_credit: Vec<MbArtistCredit>,
    #[serde(default)]
    media: Vec<MbMedium>,
}

#[derive(Debug, Deserialize)]
struct MbMedium {
    #[serde(default)]
    tracks: Vec<MbTrack>,
}

#[derive(Debug, Deserialize)]
struct MbTrack {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    /// Track length in milliseconds.
    #[serde(default)]
    length: Option<u64>,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

/// Map the MusicBrainz primary/secondary type taxonomy onto the canonical
/// enum. Secondary types are more specific and take precedence; unknown
/// values map to `Other`.
fn map_release_type(primary: Option<&str>, secondary: &[String]) -> ReleaseType {
    for s in secondary {
        match s.as_str() {
            "Compilation" => return ReleaseType::Compilation,
            "Soundtrack" => return ReleaseType::Soundtrack,
            "Live" => return ReleaseType::Live,
            "Remix" => return ReleaseType::Remix,
            _ => {}
        }
    }
    match primary {
        Some("Album") => ReleaseType::Album,
        Some("EP") => ReleaseType::Ep,
        Some("Single") => ReleaseType::Single,
        _ => ReleaseType::Other,
    }
}

/// Order genres by descending community tag votes; ties keep the provider's
/// order.
fn genres_by_vote(mut tags: Vec<MbTag>) -> Vec<String> {
    tags.sort_by_key(|t| std::cmp::Reverse(t.count));
    tags.into_iter().map(|t| t.name).collect()
}

fn convert_artist_credits(credits: Vec<MbArtistCredit>) -> Vec<ArtistCredit> {
    let converted: Vec<ArtistCredit> = credits
        .into_iter()
        .map(|credit| {
            let mut ids = Vec::new();
            let mut name = credit.name;
            if let Some(artist) = credit.artist {
                ids.push(SourceId::new(SOURCE, artist.id));
                if name.is_none() {
                    name = artist.name;
                }
            }
            ArtistCredit {
                name: name.unwrap_or_else(|| "Unknown".to_string()),
                ids,
            }
        })
        .collect();

    if converted.is_empty() {
        vec![ArtistCredit::unknown()]
    } else {
        converted
    }
}

fn convert_release_group(group: ReleaseGroup) -> NormalizedRelease {
    let title = group.title.unwrap_or_else(|| "Unknown".to_string());
    let artists = convert_artist_credits(group.artist_credit);
    let release_type = map_release_type(group.primary_type.as_deref(), &group.secondary_types);
    let score = group.score.unwrap_or(0.0);

    let mut source_scores = HashMap::new();
    source_scores.insert(SOURCE.to_string(), score);

    NormalizedRelease {
        fingerprint: fingerprint(&artists[0].name, &title),
        title,
        artists,
        release_type,
        year: group.first_release_date.as_deref().and_then(parse_year),
        ids: vec![SourceId::new(SOURCE, group.id)],
        confidence: clamp_confidence(score / 100.0),
        genres: genres_by_vote(group.tags),
        artwork_url: None,
        source_scores,
    }
}

fn convert_release_with_tracks(release: MbRelease) -> (NormalizedRelease, Vec<CanonicalTrack>) {
    let title = release.title.unwrap_or_else(|| "Unknown".to_string());
    let artists = convert_artist_credits(release.artist_credit);
    let artist_name = artists[0].name.clone();

    let album = NormalizedRelease {
        fingerprint: fingerprint(&artist_name, &title),
        title: title.clone(),
        artists,
        release_type: ReleaseType::Album,
        year: release.date.as_deref().and_then(parse_year),
        ids: vec![SourceId::new(SOURCE, release.id.clone())],
        confidence: 1.0,
        genres: Vec::new(),
        artwork_url: None,
        source_scores: HashMap::new(),
    };

    let tracks = release
        .media
        .into_iter()
        .flat_map(|medium| medium.tracks)
        .map(|track| CanonicalTrack {
            id: SourceId::new(SOURCE, track.id.unwrap_or_default()),
            title: track.title.unwrap_or_else(|| "Unknown".to_string()),
            artist: artist_name.clone(),
            album: title.clone(),
            duration_secs: track.length.map(|ms| (ms / 1000) as u32),
            artwork_url: None,
        })
        .collect();

    (album, tracks)
}
