use crate::core::errors::SourceError;
use crate::core::kernel::RestClient;
use crate::core::traits::MusicSource;
use crate::core::types::{Playlist, SourceId};
use crate::pandora::session::SessionManager;
use crate::pandora::types::{PlaylistResponse, StationListResponse};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::instrument;

/// The radio backend as a [`MusicSource`]: stations surface as playlists and
/// stream resolution fetches a playlist fragment. It has no open catalog, so
/// search and album lookups keep the default unsupported behavior.
pub struct PandoraSource<R: RestClient + 'static> {
    session: Arc<SessionManager<R>>,
}

impl<R: RestClient + 'static> PandoraSource<R> {
    pub fn new(session: Arc<SessionManager<R>>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl<R: RestClient + 'static> MusicSource for PandoraSource<R> {
    fn name(&self) -> &'static str {
        "pandora"
    }

    #[instrument(skip(self), fields(source = "pandora"))]
    async fn list_playlists(&self) -> Result<Vec<Playlist>, SourceError> {
        let result = self
            .session
            .call_with_reauth("user.getStationList", json!({}), true)
            .await?;

        let response: StationListResponse = serde_json::from_value(result).map_err(|e| {
            SourceError::remote(
                "user.getStationList",
                None,
                format!("malformed station list: {}", e),
            )
        })?;

        Ok(response
            .stations
            .into_iter()
            .map(|station| Playlist {
                id: SourceId::new("pandora", station.station_id),
                name: station.station_name,
                track_count: None,
            })
            .collect())
    }

    #[instrument(skip(self), fields(source = "pandora", station = %id))]
    async fn stream_url(&self, id: &str) -> Result<String, SourceError> {
        let payload = json!({
            "stationToken": id,
            "includeTrackLength": true,
        });
        let result = self
            .session
            .call_with_reauth("station.getPlaylist", payload, true)
            .await?;

        let response: PlaylistResponse = serde_json::from_value(result).map_err(|e| {
            SourceError::remote(
                "station.getPlaylist",
                None,
                format!("malformed playlist: {}", e),
            )
        })?;

        // Ad entries carry no audio map; take the first playable track.
        response
            .items
            .iter()
            .filter_map(|item| item.audio_url_map.as_ref())
            .filter_map(|map| map.best_url())
            .next()
            .map(str::to_string)
            .ok_or_else(|| {
                SourceError::NotFound(format!("station {} returned no playable track", id))
            })
    }
}
