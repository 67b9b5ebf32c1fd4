//! Aggregator tests: fan-out, fingerprint merging, ranking, routing, and
//! partial-failure behavior over scripted sources.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tunefuse::aggregator::identity::parse_id;
use tunefuse::aggregator::SourceAggregator;
use tunefuse::core::errors::SourceError;
use tunefuse::core::traits::MusicSource;
use tunefuse::core::types::{
    fingerprint, ArtistCredit, CanonicalTrack, NormalizedRelease, Playlist, ReleaseType, SourceId,
};

/// A scripted source: fixed search results (or a scripted failure), a fixed
/// stream URL, and optional playlists.
struct StubSource {
    name: &'static str,
    searchable: bool,
    releases: Result<Vec<NormalizedRelease>, &'static str>,
    playlists: Option<Vec<Playlist>>,
    stream: Option<&'static str>,
}

impl StubSource {
    fn searching(name: &'static str, releases: Vec<NormalizedRelease>) -> Self {
        Self {
            name,
            searchable: true,
            releases: Ok(releases),
            playlists: None,
            stream: None,
        }
    }

    fn failing(name: &'static str, message: &'static str) -> Self {
        Self {
            name,
            searchable: true,
            releases: Err(message),
            playlists: None,
            stream: None,
        }
    }

    fn with_playlists(mut self, playlists: Vec<Playlist>) -> Self {
        self.playlists = Some(playlists);
        self
    }

    fn with_stream(mut self, url: &'static str) -> Self {
        self.stream = Some(url);
        self
    }
}

#[async_trait]
impl MusicSource for StubSource {
    fn name(&self) -> &'static str {
        self.name
    }

    fn supports_search(&self) -> bool {
        self.searchable
    }

    async fn search_releases(
        &self,
        _query: &str,
        _limit: usize,
    ) -> Result<Vec<NormalizedRelease>, SourceError> {
        match &self.releases {
            Ok(releases) => Ok(releases.clone()),
            Err(message) => Err(SourceError::remote("search", Some(500), *message)),
        }
    }

    async fn album_tracks(
        &self,
        id: &str,
    ) -> Result<(NormalizedRelease, Vec<CanonicalTrack>), SourceError> {
        let album = release(self.name, "Stub Artist", "Stub Album", 1.0);
        let track = CanonicalTrack {
            id: SourceId::new(self.name, format!("{}#1", id)),
            title: "Track One".into(),
            artist: "Stub Artist".into(),
            album: "Stub Album".into(),
            duration_secs: Some(200),
            artwork_url: None,
        };
        Ok((album, vec![track]))
    }

    async fn stream_url(&self, id: &str) -> Result<String, SourceError> {
        self.stream
            .map(str::to_string)
            .ok_or_else(|| SourceError::NotFound(format!("no stream for {}", id)))
    }

    async fn list_playlists(&self) -> Result<Vec<Playlist>, SourceError> {
        if let Err(message) = &self.releases {
            return Err(SourceError::remote("playlists", Some(500), *message));
        }
        match &self.playlists {
            Some(playlists) => Ok(playlists.clone()),
            None => Err(SourceError::NotFound(format!(
                "{} does not expose playlists",
                self.name
            ))),
        }
    }
}

fn release(source: &str, artist: &str, title: &str, confidence: f64) -> NormalizedRelease {
    let mut source_scores = HashMap::new();
    source_scores.insert(source.to_string(), confidence * 100.0);
    NormalizedRelease {
        fingerprint: fingerprint(artist, title),
        title: title.to_string(),
        artists: vec![ArtistCredit::named(artist)],
        release_type: ReleaseType::Album,
        year: None,
        ids: vec![SourceId::new(source, format!("{}-{}", source, title))],
        confidence,
        genres: Vec::new(),
        artwork_url: None,
        source_scores,
    }
}

fn aggregator(sources: Vec<StubSource>) -> SourceAggregator {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    SourceAggregator::new(
        sources
            .into_iter()
            .map(|s| Arc::new(s) as Arc<dyn MusicSource>)
            .collect(),
    )
}

#[tokio::test]
async fn duplicate_releases_merge_and_higher_confidence_wins() {
    let mut weak = release("alpha", "Daft Punk", "Homework", 0.7);
    weak.year = Some(1997);
    let mut strong = release("beta", "daft-punk", "HOMEWORK", 0.9);
    strong.artwork_url = Some("https://art.example/hw.jpg".into());

    let agg = aggregator(vec![
        StubSource::searching("alpha", vec![weak]),
        StubSource::searching("beta", vec![strong]),
    ]);

    let results = agg.search_all("homework", 10).await.unwrap();
    assert_eq!(results.len(), 1);

    let merged = &results[0];
    assert_eq!(merged.title, "HOMEWORK");
    assert!((merged.confidence - 0.9).abs() < 1e-9);
    // The winner absorbs the loser's ids, scores, and missing fields.
    assert_eq!(merged.ids.len(), 2);
    assert!(merged.source_scores.contains_key("alpha"));
    assert!(merged.source_scores.contains_key("beta"));
    assert_eq!(merged.year, Some(1997));
    assert!(merged.artwork_url.is_some());
}

#[tokio::test]
async fn ranking_is_confidence_then_source_priority() {
    let agg = aggregator(vec![
        StubSource::searching("alpha", vec![release("alpha", "A", "First Album", 0.8)]),
        StubSource::searching(
            "beta",
            vec![
                release("beta", "B", "Best Album", 0.9),
                release("beta", "C", "Other Album", 0.8),
            ],
        ),
    ]);

    let results = agg.search_all("album", 10).await.unwrap();
    let titles: Vec<&str> = results.iter().map(|r| r.title.as_str()).collect();
    // Highest confidence first; the 0.8 tie goes to the earlier source.
    assert_eq!(titles, vec!["Best Album", "First Album", "Other Album"]);
}

#[tokio::test]
async fn failing_source_is_skipped_when_another_succeeds() {
    let agg = aggregator(vec![
        StubSource::failing("alpha", "upstream exploded"),
        StubSource::searching("beta", vec![release("beta", "B", "Survivor", 0.6)]),
    ]);

    let results = agg.search_all("survivor", 10).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].title, "Survivor");
}

#[tokio::test]
async fn all_sources_failing_propagates_the_first_error() {
    let agg = aggregator(vec![
        StubSource::failing("alpha", "alpha down"),
        StubSource::failing("beta", "beta down"),
    ]);

    let err = agg.search_all("anything", 10).await.unwrap_err();
    match err {
        SourceError::RemoteCall { message, .. } => assert_eq!(message, "alpha down"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn non_searchable_sources_are_not_queried() {
    // A non-searchable source scripted to fail: it must never be asked.
    let mut silent = StubSource::failing("silent", "should not be called");
    silent.searchable = false;

    let agg = aggregator(vec![
        silent,
        StubSource::searching("beta", vec![release("beta", "B", "Only Hit", 0.5)]),
    ]);

    let results = agg.search_all("hit", 10).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].title, "Only Hit");
}

#[tokio::test]
async fn routing_follows_the_identifier_source() {
    let agg = aggregator(vec![
        StubSource::searching("alpha", vec![]).with_stream("https://stream.example/a"),
        StubSource::searching("beta", vec![]),
    ]);

    // Opaque id -> owning source.
    let id = parse_id("alpha:track-7");
    let url = agg.stream_url(&id.source, &id.id).await.unwrap();
    assert_eq!(url, "https://stream.example/a");

    let (album, tracks) = agg.album_tracks("beta", "r-1").await.unwrap();
    assert_eq!(album.ids[0].source, "beta");
    assert_eq!(tracks.len(), 1);

    // Unknown source names are a lookup failure, not a panic or a fallback.
    assert!(matches!(
        agg.stream_url("gamma", "x").await,
        Err(SourceError::NotFound(_))
    ));
    assert!(matches!(
        agg.album_tracks("gamma", "x").await,
        Err(SourceError::NotFound(_))
    ));
}

#[tokio::test]
async fn playlists_concatenate_across_sources() {
    let radio_playlists = vec![
        Playlist {
            id: SourceId::new("radio", "s1"),
            name: "Morning Mix".into(),
            track_count: None,
        },
        Playlist {
            id: SourceId::new("radio", "s2"),
            name: "Evening Mix".into(),
            track_count: None,
        },
    ];

    let agg = aggregator(vec![
        StubSource::searching("radio", vec![]).with_playlists(radio_playlists),
        // No playlist support: skipped, not fatal.
        StubSource::searching("alpha", vec![]),
        // Outright failure: also skipped.
        StubSource::failing("beta", "down"),
    ]);

    let playlists = agg.list_all_playlists().await.unwrap();
    assert_eq!(playlists.len(), 2);
    assert_eq!(playlists[0].name, "Morning Mix");
}
