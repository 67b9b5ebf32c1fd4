//! Catalog provider adapters.
//!
//! Each adapter owns its own REST client (provider base URL, mandated
//! User-Agent, auth headers) and its own rate limiter, and normalizes the
//! provider's native shapes into the canonical release/track model.
pub mod discogs;
pub mod itunes;
pub mod musicbrainz;

pub use discogs::DiscogsSource;
pub use itunes::ItunesSource;
pub use musicbrainz::MusicBrainzSource;
