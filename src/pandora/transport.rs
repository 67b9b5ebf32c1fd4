use crate::core::errors::SourceError;
use crate::core::kernel::{
    BlowfishCodec, ReqwestRest, RestClient, RestClientBuilder, RestClientConfig,
};
use crate::pandora::device::DeviceKey;
use serde_json::Value;
use tracing::instrument;

/// Production JSON endpoint of the radio backend.
pub const DEFAULT_ENDPOINT: &str = "https://tuner.pandora.com/services/json/";

/// Tokens attached to one protocol call. Which fields are present depends on
/// how far the handshake has progressed.
#[derive(Debug, Default, Clone)]
pub struct CallTokens<'a> {
    /// `partner_id` query parameter.
    pub partner_id: Option<&'a str>,
    /// `auth_token` query parameter (partner token during login, user token
    /// afterwards).
    pub auth_token: Option<&'a str>,
    /// `user_id` query parameter, present once user-authenticated.
    pub user_id: Option<&'a str>,
    /// Merged into encrypted bodies as `userAuthToken`.
    pub user_auth_token: Option<&'a str>,
    /// Synchronized timestamp merged into encrypted bodies as `syncTime`.
    pub sync_time: Option<i64>,
}

impl<'a> CallTokens<'a> {
    /// No tokens at all - only valid for `auth.partnerLogin`.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Partner-authenticated tokens, used for `auth.userLogin`.
    pub fn partner(partner_id: &'a str, partner_auth_token: &'a str) -> Self {
        Self {
            partner_id: Some(partner_id),
            auth_token: Some(partner_auth_token),
            ..Self::default()
        }
    }
}

/// Encrypted JSON-RPC transport for the radio protocol.
///
/// Builds each call's query string, optionally encrypts the body with the
/// device encode key, and parses the `{"stat": ..., "result": ...}` response
/// envelope into either a result value or a typed [`SourceError::RemoteCall`].
/// This layer performs no retries; resilience policy belongs to the caller.
pub struct JsonTransport<R: RestClient> {
    rest: R,
    encoder: BlowfishCodec,
}

impl JsonTransport<ReqwestRest> {
    /// Create a transport for `device` against the production endpoint.
    pub fn new(device: &DeviceKey) -> Result<Self, SourceError> {
        Self::with_endpoint(device, DEFAULT_ENDPOINT.to_string())
    }

    /// Create a transport against a custom endpoint (tests, proxies).
    pub fn with_endpoint(device: &DeviceKey, endpoint: String) -> Result<Self, SourceError> {
        let rest = RestClientBuilder::new(
            RestClientConfig::new(endpoint, "pandora".to_string()).with_timeout(30),
        )
        .build()?;
        Self::from_parts(rest, device)
    }
}

impl<R: RestClient> JsonTransport<R> {
    /// Assemble a transport from an existing REST client (dependency
    /// injection for tests).
    pub fn from_parts(rest: R, device: &DeviceKey) -> Result<Self, SourceError> {
        let encoder = BlowfishCodec::new(device.encrypt_key)?;
        Ok(Self { rest, encoder })
    }

    /// Issue one protocol call and return the envelope's `result` value.
    #[instrument(skip(self, tokens, payload), fields(method = %method, encrypted = encrypted))]
    pub async fn call(
        &self,
        method: &str,
        tokens: &CallTokens<'_>,
        mut payload: Value,
        encrypted: bool,
    ) -> Result<Value, SourceError> {
        let mut query: Vec<(&str, &str)> = vec![("method", method)];
        if let Some(auth_token) = tokens.auth_token {
            query.push(("auth_token", auth_token));
        }
        if let Some(partner_id) = tokens.partner_id {
            query.push(("partner_id", partner_id));
        }
        if let Some(user_id) = tokens.user_id {
            query.push(("user_id", user_id));
        }

        let body = if encrypted {
            if let Value::Object(map) = &mut payload {
                if let Some(token) = tokens.user_auth_token {
                    map.insert("userAuthToken".to_string(), Value::from(token));
                }
                if let Some(sync_time) = tokens.sync_time {
                    map.insert("syncTime".to_string(), Value::from(sync_time));
                }
            }
            self.encoder.encrypt_hex(&payload.to_string())?
        } else {
            payload.to_string()
        };

        let envelope = match self.rest.post_text_value("", &query, body).await {
            Ok(value) => value,
            // Re-tag transport failures with the protocol method name.
            Err(SourceError::RemoteCall { code, message, .. }) => {
                return Err(SourceError::remote(method, code, message))
            }
            Err(e) => return Err(e),
        };

        parse_envelope(method, envelope)
    }
}

/// Split a protocol response envelope into its `result` or a typed error
/// carrying the envelope's numeric code.
pub(crate) fn parse_envelope(method: &str, envelope: Value) -> Result<Value, SourceError> {
    match envelope.get("stat").and_then(Value::as_str) {
        Some("ok") => Ok(envelope.get("result").cloned().unwrap_or(Value::Null)),
        Some(_) => {
            let code = envelope.get("code").and_then(Value::as_i64);
            let message = envelope
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("no message")
                .to_string();
            Err(SourceError::remote(method, code, message))
        }
        None => Err(SourceError::remote(
            method,
            None,
            "response envelope is missing 'stat'",
        )),
    }
}
