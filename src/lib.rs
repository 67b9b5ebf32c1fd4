pub mod aggregator;
pub mod core;
pub mod pandora;
pub mod providers;

pub use aggregator::SourceAggregator;
pub use crate::core::{errors::SourceError, traits::MusicSource, types::*};
pub use pandora::PandoraSource;
pub use providers::{DiscogsSource, ItunesSource, MusicBrainzSource};
