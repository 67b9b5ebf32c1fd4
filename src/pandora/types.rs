use serde::Deserialize;

/// Result payload of `auth.partnerLogin`. `sync_time` arrives encrypted with
/// the device decrypt key.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerLoginResponse {
    pub sync_time: String,
    pub partner_auth_token: String,
    pub partner_id: String,
}

/// Result payload of `auth.userLogin`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLoginResponse {
    pub user_auth_token: String,
    pub user_id: String,
}

/// Result payload of `user.getStationList`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationListResponse {
    #[serde(default)]
    pub stations: Vec<Station>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Station {
    pub station_id: String,
    pub station_name: String,
}

/// Result payload of `station.getPlaylist`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistResponse {
    #[serde(default)]
    pub items: Vec<PlaylistItem>,
}

/// One playlist fragment entry. Ad entries carry no `audio_url_map`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItem {
    #[serde(default)]
    pub song_name: Option<String>,
    #[serde(default)]
    pub artist_name: Option<String>,
    #[serde(default)]
    pub album_name: Option<String>,
    #[serde(default)]
    pub track_token: Option<String>,
    #[serde(default)]
    pub album_art_url: Option<String>,
    #[serde(default)]
    pub audio_url_map: Option<AudioUrlMap>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioUrlMap {
    #[serde(default)]
    pub high_quality: Option<AudioQuality>,
    #[serde(default)]
    pub medium_quality: Option<AudioQuality>,
    #[serde(default)]
    pub low_quality: Option<AudioQuality>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioQuality {
    pub audio_url: String,
}

impl AudioUrlMap {
    /// Best available stream, highest quality first.
    pub fn best_url(&self) -> Option<&str> {
        [&self.high_quality, &self.medium_quality, &self.low_quality]
            .into_iter()
            .flatten()
            .map(|q| q.audio_url.as_str())
            .next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn best_url_falls_back_by_quality() {
        let map: AudioUrlMap = serde_json::from_value(serde_json::json!({
            "mediumQuality": {"audioUrl": "http://m"},
            "lowQuality": {"audioUrl": "http://l"}
        }))
        .unwrap();
        assert_eq!(map.best_url(), Some("http://m"));

        let empty: AudioUrlMap = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(empty.best_url(), None);
    }
}
