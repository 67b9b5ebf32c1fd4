use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Canonical release taxonomy every provider maps into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseType {
    Album,
    Ep,
    Single,
    Compilation,
    Soundtrack,
    Live,
    Remix,
    Other,
}

impl fmt::Display for ReleaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Album => "album",
            Self::Ep => "ep",
            Self::Single => "single",
            Self::Compilation => "compilation",
            Self::Soundtrack => "soundtrack",
            Self::Live => "live",
            Self::Remix => "remix",
            Self::Other => "other",
        };
        write!(f, "{}", name)
    }
}

/// A provider-native identifier tagged with the source it came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceId {
    pub source: String,
    pub id: String,
}

impl SourceId {
    pub fn new(source: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.id)
    }
}

/// One credited artist on a release, with any source-tagged artist ids the
/// provider exposed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtistCredit {
    pub name: String,
    #[serde(default)]
    pub ids: Vec<SourceId>,
}

impl ArtistCredit {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ids: Vec::new(),
        }
    }

    /// Fallback credit used when a provider omits the artist entirely.
    pub fn unknown() -> Self {
        Self::named("Unknown")
    }
}

/// Provider-agnostic release shape produced by every catalog adapter and
/// merged by the aggregator. Ephemeral - never persisted by this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedRelease {
    /// Dedup key derived from artist and title, see [`fingerprint`].
    pub fingerprint: String,
    pub title: String,
    pub artists: Vec<ArtistCredit>,
    pub release_type: ReleaseType,
    pub year: Option<i32>,
    /// Every source-tagged id known for this release.
    pub ids: Vec<SourceId>,
    /// Match confidence in `[0, 1]`.
    pub confidence: f64,
    /// Ordered by descending provider-reported relevance, not alphabetically.
    pub genres: Vec<String>,
    pub artwork_url: Option<String>,
    /// Raw per-source ranking scores, keyed by source name.
    pub source_scores: HashMap<String, f64>,
}

impl NormalizedRelease {
    /// Primary display artist, `"Unknown"` when no credit survived
    /// normalization.
    pub fn display_artist(&self) -> &str {
        self.artists.first().map_or("Unknown", |a| a.name.as_str())
    }
}

/// Canonical track shape crossing the system boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalTrack {
    pub id: SourceId,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub duration_secs: Option<u32>,
    pub artwork_url: Option<String>,
}

/// A playlist (or station) owned by one source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Playlist {
    pub id: SourceId,
    pub name: String,
    pub track_count: Option<u32>,
}

/// Dedup fingerprint for a release: lowercase alphanumerics of
/// `artist|title`. Spelling noise (punctuation, spacing, case) from different
/// providers collapses to the same key.
pub fn fingerprint(artist: &str, title: &str) -> String {
    let normalize = |s: &str| {
        s.chars()
            .filter(char::is_ascii_alphanumeric)
            .map(|c| c.to_ascii_lowercase())
            .collect::<String>()
    };
    format!("{}|{}", normalize(artist), normalize(title))
}

/// Clamp a provider-derived confidence into the `[0, 1]` invariant.
pub fn clamp_confidence(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

/// Lenient year extraction from provider date strings like `"1997-08-26"` or
/// `"1997"`.
pub fn parse_year(date: &str) -> Option<i32> {
    let digits: String = date.chars().take_while(char::is_ascii_digit).collect();
    if digits.len() == 4 {
        digits.parse().ok()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_collapses_spelling_noise() {
        assert_eq!(
            fingerprint("Daft Punk", "Homework"),
            fingerprint("daft-punk", "HOMEWORK!")
        );
        assert_ne!(
            fingerprint("Daft Punk", "Homework"),
            fingerprint("Daft Punk", "Discovery")
        );
    }

    #[test]
    fn confidence_clamped_to_unit_interval() {
        assert_eq!(clamp_confidence(1.7), 1.0);
        assert_eq!(clamp_confidence(-0.2), 0.0);
        assert_eq!(clamp_confidence(0.42), 0.42);
    }

    #[test]
    fn year_parsing_is_lenient() {
        assert_eq!(parse_year("1997-08-26"), Some(1997));
        assert_eq!(parse_year("2003"), Some(2003));
        assert_eq!(parse_year(""), None);
        assert_eq!(parse_year("unknown"), None);
    }
}
