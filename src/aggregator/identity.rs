use crate::core::types::SourceId;

/// Source assumed for bare identifiers minted before ids carried a source
/// prefix.
pub const LEGACY_SOURCE: &str = "pandora";

/// Delimiter between source and provider-native id.
const DELIMITER: char = ':';

/// Encode a source-tagged identifier into the opaque `"source:id"` string
/// that crosses the system boundary. This codec is the only way raw provider
/// ids leave the core.
pub fn encode_id(source: &str, id: &str) -> String {
    format!("{}{}{}", source, DELIMITER, id)
}

/// Decode an opaque composite identifier, splitting on the *first* delimiter
/// only - provider ids are free to contain the delimiter themselves. A bare
/// id without a delimiter decodes against [`LEGACY_SOURCE`].
pub fn parse_id(composite: &str) -> SourceId {
    match composite.split_once(DELIMITER) {
        Some((source, id)) => SourceId::new(source, id),
        None => SourceId::new(LEGACY_SOURCE, composite),
    }
}

impl SourceId {
    /// Opaque boundary representation, see [`encode_id`].
    pub fn encoded(&self) -> String {
        encode_id(&self.source, &self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_source_and_id() {
        let pairs = [
            ("musicbrainz", "0bc7e2d0-4f23-4ba5-9f77-d0c0f4a4a5c2"),
            ("discogs", "1234567"),
            ("pandora", "station-88"),
        ];
        for (source, id) in pairs {
            let decoded = parse_id(&encode_id(source, id));
            assert_eq!(decoded, SourceId::new(source, id));
        }
    }

    #[test]
    fn ids_may_contain_the_delimiter() {
        let decoded = parse_id(&encode_id("itunes", "album:42:deluxe"));
        assert_eq!(decoded.source, "itunes");
        assert_eq!(decoded.id, "album:42:deluxe");
    }

    #[test]
    fn bare_ids_decode_against_the_legacy_source() {
        let decoded = parse_id("tok-12345");
        assert_eq!(decoded.source, LEGACY_SOURCE);
        assert_eq!(decoded.id, "tok-12345");
    }

    #[test]
    fn encoded_matches_display() {
        let id = SourceId::new("discogs", "99");
        assert_eq!(id.encoded(), "discogs:99");
        assert_eq!(id.to_string(), "discogs:99");
    }
}
